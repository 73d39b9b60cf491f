//! The charge authorization state machine.
//!
//! ```text
//! Pending ──────────────────────────────► Succeeded | Failed
//!    │
//!    ▼
//! RequiresAction ──submit_authorization──► RequiresAction (new next action)
//!    │                                  └► Succeeded | Failed | Cancelled | Timeout
//!    └──refresh / await_settlement──────► same set
//! ```
//!
//! Terminal statuses are sticky: no submission or refresh leaves them. Each
//! operation takes the current [`ChargeState`] by reference and returns a new
//! one; on error the caller's state is untouched and still valid. The machine
//! holds no per-charge state, so the caller owns the single-writer rule of
//! one in-flight submission per charge.

use std::fmt::{self, Debug};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "telemetry")]
use tracing::{info, instrument, warn};

use crate::authorization::AuthorizationSubmission;
use crate::charge::{ChargeState, ChargeStatus};
use crate::error::{ChargeError, IllegalTransitionError, ProtocolParseError};
use crate::hooks::{ChargeCreated, ChargeHooks, ChargeUpdated};
use crate::polling::{PollOutcome, PollingSupervisor};
use crate::proto::{DirectChargeRequest, charge_data};
use crate::transport::{ChargeTransport, TransportError};

/// Drives a charge from creation to a terminal status over a [`ChargeTransport`].
pub struct ChargeAuthorizationMachine<T> {
    transport: T,
    hooks: Vec<Box<dyn ChargeHooks>>,
}

impl<T: Debug> Debug for ChargeAuthorizationMachine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChargeAuthorizationMachine")
            .field("transport", &self.transport)
            .field("hooks", &format!("[{} hooks]", self.hooks.len()))
            .finish()
    }
}

impl<T> ChargeAuthorizationMachine<T> {
    /// Creates a machine over `transport` with no hooks.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            hooks: Vec::new(),
        }
    }

    /// Registers a lifecycle hook. Hooks execute in registration order.
    #[must_use]
    pub fn with_hook(mut self, hook: impl ChargeHooks + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Adds a hook after construction.
    pub fn add_hook(&mut self, hook: impl ChargeHooks + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Returns the number of registered hooks.
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Checks whether `submission` may be sent for `state`, without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransitionError`] unless the charge is in
    /// `requires_action` and the submission kind answers its next action.
    pub fn check_submission(
        state: &ChargeState,
        submission: &AuthorizationSubmission,
    ) -> Result<(), IllegalTransitionError> {
        if state.status != ChargeStatus::RequiresAction {
            return Err(IllegalTransitionError::WrongStatus {
                id: state.id.clone(),
                status: state.status,
            });
        }
        let got = submission.kind();
        match state.next_action.expected_authorization() {
            Some(expected) if expected == got => Ok(()),
            Some(expected) => Err(IllegalTransitionError::KindMismatch {
                id: state.id.clone(),
                expected,
                got,
            }),
            None => Err(IllegalTransitionError::NoAuthorizationExpected {
                id: state.id.clone(),
                got,
            }),
        }
    }
}

impl<T: ChargeTransport> ChargeAuthorizationMachine<T> {
    /// Creates a charge and derives its initial state.
    ///
    /// # Errors
    ///
    /// Returns [`ChargeError::Validation`] for a malformed request (before any
    /// call is made), [`ChargeError::Transport`] if the call fails, and
    /// [`ChargeError::Protocol`] if the response has no charge id.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "dcharge.machine.create", skip_all, err, fields(reference = %request.reference))
    )]
    pub async fn create(&self, request: &DirectChargeRequest) -> Result<ChargeState, ChargeError> {
        request.validate()?;
        let payload = serde_json::to_value(request).map_err(ProtocolParseError::from)?;

        let response = self
            .transport
            .create_charge(&payload)
            .await
            .map_err(|err| transport_failed("create_charge", err))?;
        let state = ChargeState::from_response(&response)?;

        #[cfg(feature = "telemetry")]
        info!(
            charge_id = %state.id,
            status = %state.status,
            next_action = state.next_action.type_name().unwrap_or("none"),
            "Charge created"
        );

        if !self.hooks.is_empty() {
            let event = ChargeCreated {
                charge_data: charge_data(&response).clone(),
                original_request: request.clone(),
                state: state.clone(),
            };
            for hook in &self.hooks {
                hook.on_charge_created(&event).await;
            }
        }
        Ok(state)
    }

    /// Submits authorization for a charge in `requires_action`.
    ///
    /// The state is checked first; an illegal submission is rejected without
    /// calling the processor. On success the processor's response replaces the
    /// state wholesale, which may be terminal or ask for a further action.
    ///
    /// # Errors
    ///
    /// Returns [`ChargeError::IllegalTransition`] for a wrong status or a
    /// mismatched submission kind, [`ChargeError::Transport`] if the call
    /// fails, and [`ChargeError::Protocol`] if the response is unusable or
    /// describes another charge.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "dcharge.machine.submit_authorization",
            skip_all,
            err,
            fields(charge_id = %state.id, kind = %submission.kind())
        )
    )]
    pub async fn submit_authorization(
        &self,
        state: &ChargeState,
        submission: AuthorizationSubmission,
    ) -> Result<ChargeState, ChargeError> {
        Self::check_submission(state, &submission)?;
        let payload = submission.update_payload().map_err(ProtocolParseError::from)?;

        let response = self
            .transport
            .update_charge_authorization(&state.id, &payload)
            .await
            .map_err(|err| transport_failed("update_charge_authorization", err))?;
        let next = Self::reconcile(state, &response)?;

        if !self.hooks.is_empty() {
            let event = ChargeUpdated {
                charge_data: charge_data(&response).clone(),
                submission,
                state: next.clone(),
            };
            for hook in &self.hooks {
                hook.on_charge_updated(&event).await;
            }
        }
        Ok(next)
    }

    /// Re-fetches a charge from the processor.
    ///
    /// A terminal state is returned as is, without a call.
    ///
    /// # Errors
    ///
    /// Returns [`ChargeError::Transport`] if the call fails and
    /// [`ChargeError::Protocol`] if the response is unusable or describes
    /// another charge.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "dcharge.machine.refresh", skip_all, err, fields(charge_id = %state.id))
    )]
    pub async fn refresh(&self, state: &ChargeState) -> Result<ChargeState, ChargeError> {
        if state.is_terminal() {
            return Ok(state.clone());
        }
        let response = self
            .transport
            .retrieve_charge(&state.id)
            .await
            .map_err(|err| transport_failed("retrieve_charge", err))?;
        Ok(Self::reconcile(state, &response)?)
    }

    /// Polls a charge until it settles, the supervisor gives up, or `token`
    /// is cancelled.
    ///
    /// Meant for redirect and offline-instruction charges. A terminal state
    /// settles immediately without polling. If a fetched state starts asking
    /// for a PIN, OTP or address, polling stops with
    /// [`PollOutcome::ActionRequired`].
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransitionError::AwaitingCustomerInput`] if the charge
    /// is waiting for a PIN, OTP or address, since polling cannot advance it.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "dcharge.machine.await_settlement", skip_all, err, fields(charge_id = %state.id))
    )]
    pub async fn await_settlement(
        &self,
        state: &ChargeState,
        supervisor: &PollingSupervisor,
        token: &CancellationToken,
    ) -> Result<PollOutcome, ChargeError> {
        if state.is_terminal() {
            return Ok(PollOutcome::Settled(state.clone()));
        }
        if state.next_action.requires_customer_input() {
            return Err(IllegalTransitionError::AwaitingCustomerInput {
                id: state.id.clone(),
            }
            .into());
        }
        Ok(supervisor.run(token, |_| self.refresh(state)).await)
    }

    /// Callers reject terminal `current` states before any call is made.
    fn reconcile(current: &ChargeState, response: &Value) -> Result<ChargeState, ProtocolParseError> {
        let next = ChargeState::from_response(response)?;
        if next.id != current.id {
            return Err(ProtocolParseError::IdMismatch {
                expected: current.id.clone(),
                got: next.id,
            });
        }

        #[cfg(feature = "telemetry")]
        info!(
            charge_id = %next.id,
            from = %current.status,
            to = %next.status,
            next_action = next.next_action.type_name().unwrap_or("none"),
            "Charge transitioned"
        );
        Ok(next)
    }
}

#[cfg_attr(not(feature = "telemetry"), allow(unused_variables))]
fn transport_failed(operation: &'static str, err: TransportError) -> TransportError {
    #[cfg(feature = "telemetry")]
    warn!(error = %err, operation, "Processor call failed");
    err
}
