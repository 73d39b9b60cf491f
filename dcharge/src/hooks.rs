//! Lifecycle notifications for charge creation and authorization updates.
//!
//! Hooks are defined via the [`ChargeHooks`] trait, which has default no-op
//! implementations for all methods. Implement only the hooks you need, e.g. to
//! persist a local charge-session record.
//!
//! Hooks observe; they cannot veto or alter a transition. They run after the
//! new state has been derived, in registration order, and the machine's result
//! is the same whether or not any hook is registered.

use std::fmt::{self, Debug};

use serde_json::Value;

use crate::authorization::AuthorizationSubmission;
use crate::charge::ChargeState;
use crate::proto::DirectChargeRequest;
use crate::transport::BoxFuture;

/// Emitted after the processor accepts a create-charge call.
#[derive(Clone)]
pub struct ChargeCreated {
    /// Charge object from the processor's response.
    pub charge_data: Value,
    /// Request that created the charge. Card fields are encrypted.
    pub original_request: DirectChargeRequest,
    /// State derived from the response.
    pub state: ChargeState,
}

impl Debug for ChargeCreated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChargeCreated")
            .field("charge_id", &self.state.id)
            .field("status", &self.state.status)
            .finish_non_exhaustive()
    }
}

/// Emitted after the processor answers an authorization submission.
#[derive(Clone)]
pub struct ChargeUpdated {
    /// Charge object from the processor's response.
    pub charge_data: Value,
    /// Submission that was sent.
    pub submission: AuthorizationSubmission,
    /// State derived from the response.
    pub state: ChargeState,
}

impl Debug for ChargeUpdated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChargeUpdated")
            .field("charge_id", &self.state.id)
            .field("submission", &self.submission.kind())
            .field("status", &self.state.status)
            .finish_non_exhaustive()
    }
}

/// Observers of charge lifecycle events.
///
/// All methods have default no-op implementations. This trait is
/// dyn-compatible for use in heterogeneous hook lists.
pub trait ChargeHooks: Send + Sync {
    /// Called after a charge has been created.
    fn on_charge_created<'a>(&'a self, _event: &'a ChargeCreated) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }

    /// Called after an authorization submission has been answered.
    fn on_charge_updated<'a>(&'a self, _event: &'a ChargeUpdated) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}
