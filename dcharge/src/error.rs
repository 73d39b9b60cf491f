//! Error types for charge operations.
//!
//! Input and cipher failures live next to the code that raises them
//! ([`ValidationError`], [`CipherError`](crate::cipher::CipherError),
//! [`EncryptionError`]). This module holds the state machine and protocol
//! errors and the [`ChargeError`] umbrella returned by
//! [`ChargeAuthorizationMachine`](crate::machine::ChargeAuthorizationMachine).

use crate::card::ValidationError;
use crate::charge::ChargeStatus;
use crate::encryptor::{EncryptionError, FieldEncryptionError};
use crate::next_action::AuthorizationKind;
use crate::proto::{AsChargeProblem, ChargeProblem, ErrorReason};
use crate::transport::TransportError;

/// An operation was attempted that the charge's current state does not allow.
///
/// The charge is left untouched and can be retried from its prior state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum IllegalTransitionError {
    /// Authorization was submitted for a charge not in `requires_action`.
    #[error("charge {id} is {status}; authorization is only accepted in requires_action")]
    WrongStatus {
        /// Charge id.
        id: String,
        /// Current status.
        status: ChargeStatus,
    },
    /// The submission does not answer the charge's next action.
    #[error("charge {id} expects {expected} authorization, got {got}")]
    KindMismatch {
        /// Charge id.
        id: String,
        /// Kind the next action asks for.
        expected: AuthorizationKind,
        /// Kind that was submitted.
        got: AuthorizationKind,
    },
    /// The next action cannot be answered with any authorization.
    #[error("charge {id} does not accept authorization; got {got}")]
    NoAuthorizationExpected {
        /// Charge id.
        id: String,
        /// Kind that was submitted.
        got: AuthorizationKind,
    },
    /// Polling was requested for a charge that is waiting on the payer.
    #[error("charge {id} is waiting for customer input and cannot be polled")]
    AwaitingCustomerInput {
        /// Charge id.
        id: String,
    },
}

/// A processor response could not be turned into a charge state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ProtocolParseError {
    /// The charge payload is not a JSON object.
    #[error("processor response is not a JSON object")]
    NotAnObject,
    /// The charge payload has no usable `id`.
    #[error("processor response has no charge id")]
    MissingId,
    /// The response describes a different charge than the one tracked.
    #[error("processor response is for charge {got}, expected {expected}")]
    IdMismatch {
        /// Tracked charge id.
        expected: String,
        /// Id found in the response.
        got: String,
    },
    /// An outgoing payload could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for ProtocolParseError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value.to_string())
    }
}

/// Any failure of a charge operation.
#[derive(Debug, thiserror::Error)]
pub enum ChargeError {
    /// Plaintext input is malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Encryption failed or no key is configured.
    #[error(transparent)]
    Encryption(#[from] EncryptionError),
    /// The charge's state does not allow the operation.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransitionError),
    /// The processor's response could not be understood.
    #[error(transparent)]
    Protocol(#[from] ProtocolParseError),
    /// The transport call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<FieldEncryptionError> for ChargeError {
    fn from(value: FieldEncryptionError) -> Self {
        match value {
            FieldEncryptionError::Validation(e) => Self::Validation(e),
            FieldEncryptionError::Encryption(e) => Self::Encryption(e),
        }
    }
}

impl ChargeError {
    /// Returns the machine-readable reason for this error.
    #[must_use]
    pub const fn reason(&self) -> ErrorReason {
        match self {
            Self::Validation(_) => ErrorReason::InvalidInput,
            Self::Encryption(EncryptionError::MissingKey) => ErrorReason::MissingEncryptionKey,
            Self::Encryption(_) => ErrorReason::EncryptionFailed,
            Self::IllegalTransition(IllegalTransitionError::WrongStatus { .. }) => {
                ErrorReason::IllegalTransition
            }
            Self::IllegalTransition(IllegalTransitionError::AwaitingCustomerInput { .. }) => {
                ErrorReason::AwaitingCustomerInput
            }
            Self::IllegalTransition(_) => ErrorReason::AuthorizationMismatch,
            Self::Protocol(ProtocolParseError::Encode(_)) => ErrorReason::UnexpectedError,
            Self::Protocol(_) => ErrorReason::InvalidProcessorResponse,
            Self::Transport(_) => ErrorReason::ProcessorUnavailable,
        }
    }

    /// Returns a message safe to show the payer.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        self.reason().public_message()
    }
}

impl AsChargeProblem for ChargeError {
    fn as_charge_problem(&self) -> ChargeProblem {
        ChargeProblem::new(self.reason(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::CipherError;

    #[test]
    fn test_reasons() {
        let err = ChargeError::from(FieldEncryptionError::Validation(ValidationError::Otp));
        assert_eq!(err.reason(), ErrorReason::InvalidInput);

        let err = ChargeError::from(EncryptionError::MissingKey);
        assert_eq!(err.reason(), ErrorReason::MissingEncryptionKey);

        let err = ChargeError::from(EncryptionError::Cipher(CipherError::Aead));
        assert_eq!(err.reason(), ErrorReason::EncryptionFailed);

        let err = ChargeError::from(IllegalTransitionError::KindMismatch {
            id: "chg_1".into(),
            expected: AuthorizationKind::Pin,
            got: AuthorizationKind::Otp,
        });
        assert_eq!(err.reason(), ErrorReason::AuthorizationMismatch);

        let err = ChargeError::from(TransportError::Timeout);
        assert_eq!(err.reason(), ErrorReason::ProcessorUnavailable);
    }

    #[test]
    fn test_problem_keeps_details_but_public_message_is_generic() {
        let err = ChargeError::from(IllegalTransitionError::WrongStatus {
            id: "chg_1".into(),
            status: ChargeStatus::Failed,
        });
        let problem = err.as_charge_problem();
        assert_eq!(problem.reason(), ErrorReason::IllegalTransition);
        assert!(problem.details().contains("chg_1"));
        assert!(!err.public_message().contains("chg_1"));
    }
}
