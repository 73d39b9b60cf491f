//! Boundary to the processor's HTTP API.
//!
//! This crate never performs HTTP. Callers supply a [`ChargeTransport`] that
//! wraps their own client, token cache and retry policy; the state machine
//! only sees JSON values and [`TransportError`]s.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

/// Boxed future returned by [`ChargeTransport`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Failure reported by a [`ChargeTransport`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The processor could not be reached.
    #[error("connection to processor failed: {0}")]
    Connection(String),
    /// The call did not complete in time.
    #[error("processor request timed out")]
    Timeout,
    /// The processor answered with a non-success HTTP status.
    #[error("processor returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response message.
        message: String,
    },
    /// The response body was not JSON.
    #[error("processor response body is not valid JSON: {0}")]
    Decode(String),
}

/// Remote operations the state machine depends on.
///
/// Implementations are expected to apply their own retry and backoff. The
/// machine treats each call as a single fallible step.
pub trait ChargeTransport: Send + Sync {
    /// Creates a direct charge from a serialized request.
    fn create_charge<'a>(&'a self, payload: &'a Value) -> BoxFuture<'a, Result<Value, TransportError>>;

    /// Submits an authorization update for charge `id`.
    fn update_charge_authorization<'a>(
        &'a self,
        id: &'a str,
        payload: &'a Value,
    ) -> BoxFuture<'a, Result<Value, TransportError>>;

    /// Fetches the latest state of charge `id`.
    fn retrieve_charge<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Value, TransportError>>;
}

impl<T: ChargeTransport + ?Sized> ChargeTransport for Arc<T> {
    fn create_charge<'a>(&'a self, payload: &'a Value) -> BoxFuture<'a, Result<Value, TransportError>> {
        self.as_ref().create_charge(payload)
    }

    fn update_charge_authorization<'a>(
        &'a self,
        id: &'a str,
        payload: &'a Value,
    ) -> BoxFuture<'a, Result<Value, TransportError>> {
        self.as_ref().update_charge_authorization(id, payload)
    }

    fn retrieve_charge<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Value, TransportError>> {
        self.as_ref().retrieve_charge(id)
    }
}
