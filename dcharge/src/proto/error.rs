//! Machine-readable failure codes for charge operations.
//!
//! Every library error maps to an [`ErrorReason`]. The reason carries a fixed
//! payer-safe message; the error's own `Display` text is kept for operator logs.

use serde::{Deserialize, Serialize};

/// Machine-readable reason a charge operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorReason {
    /// Card, PIN, OTP, address or request input is malformed.
    InvalidInput,
    /// No encryption key is configured.
    MissingEncryptionKey,
    /// The key, nonce or cipher operation was rejected.
    EncryptionFailed,
    /// The charge is not in a state that accepts this operation.
    IllegalTransition,
    /// The submission does not answer the charge's next action.
    AuthorizationMismatch,
    /// The charge is waiting for the payer, not the processor.
    AwaitingCustomerInput,
    /// The processor returned something that could not be understood.
    InvalidProcessorResponse,
    /// The processor could not be reached or refused the call.
    ProcessorUnavailable,
    /// An unexpected error occurred.
    UnexpectedError,
}

impl ErrorReason {
    /// Returns the `snake_case` string representation matching the wire format.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::MissingEncryptionKey => "missing_encryption_key",
            Self::EncryptionFailed => "encryption_failed",
            Self::IllegalTransition => "illegal_transition",
            Self::AuthorizationMismatch => "authorization_mismatch",
            Self::AwaitingCustomerInput => "awaiting_customer_input",
            Self::InvalidProcessorResponse => "invalid_processor_response",
            Self::ProcessorUnavailable => "processor_unavailable",
            Self::UnexpectedError => "unexpected_error",
        }
    }

    /// Returns a message safe to show the payer.
    ///
    /// Never contains cipher or validation detail.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Please check your payment details and try again.",
            Self::MissingEncryptionKey | Self::EncryptionFailed | Self::UnexpectedError => {
                "We could not process your payment. Please try again later."
            }
            Self::IllegalTransition | Self::AuthorizationMismatch => {
                "This payment can no longer be updated."
            }
            Self::AwaitingCustomerInput => "Please complete the requested verification step.",
            Self::InvalidProcessorResponse | Self::ProcessorUnavailable => {
                "The payment service is temporarily unavailable. Please try again."
            }
        }
    }
}

impl core::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for converting errors into structured charge problems.
pub trait AsChargeProblem {
    /// Converts this error into a [`ChargeProblem`].
    fn as_charge_problem(&self) -> ChargeProblem;
}

/// A structured charge failure with reason code and operator details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeProblem {
    reason: ErrorReason,
    details: String,
}

impl ChargeProblem {
    /// Creates a new charge problem with the given reason and details.
    #[must_use]
    pub const fn new(reason: ErrorReason, details: String) -> Self {
        Self { reason, details }
    }

    /// Returns the error reason code.
    #[must_use]
    pub const fn reason(&self) -> ErrorReason {
        self.reason
    }

    /// Returns the operator-facing details.
    #[must_use]
    pub fn details(&self) -> &str {
        &self.details
    }

    /// Returns the payer-facing message for this problem's reason.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        self.reason.public_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_serializes_as_snake_case() {
        let json = serde_json::to_string(&ErrorReason::AwaitingCustomerInput).unwrap();
        assert_eq!(json, "\"awaiting_customer_input\"");
        assert_eq!(ErrorReason::AwaitingCustomerInput.as_str(), "awaiting_customer_input");
    }

    #[test]
    fn test_public_message_is_generic() {
        let problem = ChargeProblem::new(
            ErrorReason::EncryptionFailed,
            "AES-GCM authentication failed".into(),
        );
        assert!(!problem.public_message().contains("AES"));
        assert_eq!(problem.details(), "AES-GCM authentication failed");
    }
}
