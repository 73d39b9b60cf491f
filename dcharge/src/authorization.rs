//! What the payer supplied to answer a [`NextAction`](crate::next_action::NextAction).
//!
//! Each variant can only be built through a checking constructor, so a
//! submission that reaches the state machine always has a well-formed payload.
//! On the wire a submission is
//! `{"authorization": {"type": "<kind>", "<kind>": {...}}}`.

use std::fmt::{self, Debug, Formatter};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::card::ValidationError;
use crate::cipher::{Nonce, TAG_LEN};
use crate::encryptor::EncryptedPinPayload;
use crate::next_action::AuthorizationKind;
use crate::proto::BillingAddress;

const MIN_OTP_DIGITS: usize = 4;
const MAX_OTP_DIGITS: usize = 10;

/// An encrypted PIN answering [`NextAction::RequiresPin`](crate::next_action::NextAction::RequiresPin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PinAuthorization(EncryptedPinPayload);

impl PinAuthorization {
    /// Returns the nonce the PIN was sealed under.
    #[must_use]
    pub const fn nonce(&self) -> &Nonce {
        &self.0.nonce
    }

    /// Returns the encrypted PIN payload.
    #[must_use]
    pub const fn payload(&self) -> &EncryptedPinPayload {
        &self.0
    }
}

/// A one-time passcode answering [`NextAction::RequiresOtp`](crate::next_action::NextAction::RequiresOtp).
#[derive(Clone, PartialEq, Eq, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct OtpCode {
    code: String,
}

impl Debug for OtpCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(<redacted>)")
    }
}

/// A billing address answering
/// [`NextAction::RequiresAdditionalFields`](crate::next_action::NextAction::RequiresAdditionalFields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvsAuthorization {
    address: BillingAddress,
}

impl AvsAuthorization {
    /// Returns the submitted address.
    #[must_use]
    pub const fn address(&self) -> &BillingAddress {
        &self.address
    }
}

/// Authorization data submitted for a charge in `requires_action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationSubmission {
    /// Encrypted PIN.
    Pin(PinAuthorization),
    /// One-time passcode.
    Otp(OtpCode),
    /// Address verification.
    Avs(AvsAuthorization),
}

impl AuthorizationSubmission {
    /// Wraps an encrypted PIN.
    ///
    /// Payloads from [`CardFieldEncryptor::encrypt_pin`](crate::encryptor::CardFieldEncryptor::encrypt_pin)
    /// always pass. Payloads received from elsewhere are checked to be base64
    /// of at least one byte plus the authentication tag.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EncryptedPin`] otherwise.
    pub fn pin(payload: EncryptedPinPayload) -> Result<Self, ValidationError> {
        match payload.encrypted_pin.decode() {
            Ok(sealed) if sealed.len() > TAG_LEN => Ok(Self::Pin(PinAuthorization(payload))),
            _ => Err(ValidationError::EncryptedPin),
        }
    }

    /// Wraps a one-time passcode of 4 to 10 digits.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Otp`] otherwise.
    pub fn otp(code: impl Into<String>) -> Result<Self, ValidationError> {
        let mut code = code.into();
        let trimmed = code.trim();
        let valid = (MIN_OTP_DIGITS..=MAX_OTP_DIGITS).contains(&trimmed.len())
            && trimmed.bytes().all(|b| b.is_ascii_digit());
        if !valid {
            code.zeroize();
            return Err(ValidationError::Otp);
        }
        let otp = OtpCode {
            code: trimmed.to_owned(),
        };
        code.zeroize();
        Ok(Self::Otp(otp))
    }

    /// Wraps a billing address for address verification.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Address`] if a required field is blank.
    pub fn avs(address: BillingAddress) -> Result<Self, ValidationError> {
        address.validate()?;
        Ok(Self::Avs(AvsAuthorization { address }))
    }

    /// Returns the kind of this submission.
    #[must_use]
    pub const fn kind(&self) -> AuthorizationKind {
        match self {
            Self::Pin(_) => AuthorizationKind::Pin,
            Self::Otp(_) => AuthorizationKind::Otp,
            Self::Avs(_) => AuthorizationKind::Avs,
        }
    }

    /// Builds the body of the update-authorization call.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn update_payload(&self) -> Result<Value, serde_json::Error> {
        #[derive(Serialize)]
        struct Update<'a> {
            authorization: &'a AuthorizationSubmission,
        }
        serde_json::to_value(Update {
            authorization: self,
        })
    }
}

impl Serialize for AuthorizationSubmission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = self.kind().as_str();
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", kind)?;
        match self {
            Self::Pin(pin) => map.serialize_entry(kind, pin)?,
            Self::Otp(otp) => map.serialize_entry(kind, otp)?,
            Self::Avs(avs) => map.serialize_entry(kind, avs)?,
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Base64String;
    use serde_json::json;

    fn pin_payload() -> EncryptedPinPayload {
        EncryptedPinPayload {
            nonce: Nonce::parse("abc123ABC456").unwrap(),
            encrypted_pin: Base64String::encode([7u8; 20]),
        }
    }

    fn address() -> BillingAddress {
        BillingAddress {
            line1: "1 Marina".into(),
            line2: Some("Floor 2".into()),
            city: "Lagos".into(),
            state: "Lagos".into(),
            postal_code: "101001".into(),
            country: "NG".into(),
        }
    }

    #[test]
    fn test_pin_wire_shape() {
        let payload = pin_payload();
        let submission = AuthorizationSubmission::pin(payload.clone()).unwrap();
        assert_eq!(submission.kind(), AuthorizationKind::Pin);
        assert_eq!(
            submission.update_payload().unwrap(),
            json!({
                "authorization": {
                    "type": "pin",
                    "pin": {"nonce": "abc123ABC456", "encrypted_pin": payload.encrypted_pin.as_str()}
                }
            })
        );
    }

    #[test]
    fn test_pin_rejects_non_ciphertext() {
        let mut payload = pin_payload();
        payload.encrypted_pin = Base64String::from("not base64!");
        assert_eq!(
            AuthorizationSubmission::pin(payload.clone()),
            Err(ValidationError::EncryptedPin)
        );
        payload.encrypted_pin = Base64String::encode([1u8; TAG_LEN]);
        assert_eq!(
            AuthorizationSubmission::pin(payload),
            Err(ValidationError::EncryptedPin)
        );
    }

    #[test]
    fn test_otp_wire_shape() {
        let submission = AuthorizationSubmission::otp(" 123456 ").unwrap();
        assert_eq!(
            submission.update_payload().unwrap(),
            json!({"authorization": {"type": "otp", "otp": {"code": "123456"}}})
        );
    }

    #[test]
    fn test_otp_validation() {
        for bad in ["", "123", "12345678901", "12a456"] {
            assert_eq!(
                AuthorizationSubmission::otp(bad),
                Err(ValidationError::Otp),
                "{bad:?}"
            );
        }
        assert!(AuthorizationSubmission::otp("1234").is_ok());
    }

    #[test]
    fn test_otp_debug_is_redacted() {
        let submission = AuthorizationSubmission::otp("987654").unwrap();
        assert!(!format!("{submission:?}").contains("987654"));
    }

    #[test]
    fn test_avs_wire_shape_and_validation() {
        let submission = AuthorizationSubmission::avs(address()).unwrap();
        let body = submission.update_payload().unwrap();
        assert_eq!(body["authorization"]["type"], "avs");
        assert_eq!(body["authorization"]["avs"]["address"]["line2"], "Floor 2");

        let mut blank = address();
        blank.country = String::new();
        assert_eq!(
            AuthorizationSubmission::avs(blank),
            Err(ValidationError::Address("country"))
        );
    }
}
