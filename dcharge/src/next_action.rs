//! What the payer must do next to complete a charge.
//!
//! The processor describes the follow-up step as
//! `{"type": "<t>", "<t>": {...payload...}}` inside the charge's
//! `next_action` field. [`NextAction::from_response`] turns that into exactly
//! one variant. Anything it does not recognize becomes [`NextAction::None`];
//! it never guesses a variant.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use serde_with::{DefaultOnError, VecSkipError, serde_as};
use url::Url;

use crate::proto::charge_data;

/// Kind of authorization a payer can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationKind {
    /// Encrypted card PIN.
    Pin,
    /// One-time passcode.
    Otp,
    /// Address verification (additional billing fields).
    Avs,
}

impl AuthorizationKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pin => "pin",
            Self::Otp => "otp",
            Self::Avs => "avs",
        }
    }
}

impl Display for AuthorizationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Follow-up step required before a charge can settle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NextAction {
    /// The payer must enter their card PIN.
    RequiresPin {
        /// Prompt from the processor.
        message: Option<String>,
    },
    /// The payer must enter a one-time passcode.
    RequiresOtp {
        /// Prompt from the processor.
        message: Option<String>,
        /// Processor reference for the OTP challenge.
        reference: Option<String>,
    },
    /// The payer must supply additional fields, typically a billing address.
    RequiresAdditionalFields {
        /// Names of the requested fields.
        fields: Vec<String>,
        /// Prompt from the processor.
        message: Option<String>,
    },
    /// The payer must authenticate at an external page.
    RedirectUrl {
        /// Absolute `http` or `https` URL to send the payer to, in parsed
        /// form: the host is lowercased and an empty path becomes `/`.
        url: Url,
    },
    /// The payer must complete payment offline, e.g. by bank transfer.
    PaymentInstruction {
        /// Human-readable note.
        note: Option<String>,
        /// Every other instruction field, as sent.
        instructions: Map<String, Value>,
    },
    /// Nothing further is required, or the action was not understood.
    #[default]
    None,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ActionPayload {
    #[serde_as(deserialize_as = "DefaultOnError")]
    message: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    reference: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError<VecSkipError<_>>")]
    fields: Vec<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    url: Option<String>,
}

impl NextAction {
    /// Parses the next action out of a processor response.
    ///
    /// Accepts either the `{status, message, data}` envelope or the bare
    /// charge object. A missing `next_action`, a missing or unknown `type`, or
    /// a redirect without a usable URL all give [`NextAction::None`]. A known
    /// type whose payload is missing or malformed yields that variant with
    /// empty fields.
    #[must_use]
    pub fn from_response(raw: &Value) -> Self {
        charge_data(raw)
            .get("next_action")
            .map_or(Self::None, Self::from_next_action)
    }

    /// Parses a bare `next_action` object.
    #[must_use]
    pub fn from_next_action(value: &Value) -> Self {
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Self::None;
        };
        let body = value.get(kind).cloned().unwrap_or(Value::Null);

        if kind == "payment_instruction" {
            let mut instructions = match body {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            let note = match instructions.remove("note") {
                Some(Value::String(note)) => Some(note),
                _ => None,
            };
            return Self::PaymentInstruction { note, instructions };
        }

        let payload: ActionPayload = serde_json::from_value(body).unwrap_or_default();
        match kind {
            "requires_pin" => Self::RequiresPin {
                message: payload.message,
            },
            "requires_otp" => Self::RequiresOtp {
                message: payload.message,
                reference: payload.reference,
            },
            "requires_additional_fields" => Self::RequiresAdditionalFields {
                fields: payload.fields,
                message: payload.message,
            },
            "redirect_url" => payload
                .url
                .as_deref()
                .and_then(|u| Url::parse(u).ok())
                .filter(|u| matches!(u.scheme(), "http" | "https"))
                .map_or(Self::None, |url| Self::RedirectUrl { url }),
            _ => Self::None,
        }
    }

    /// Renders this action in the processor's wire shape, or `null` for
    /// [`NextAction::None`].
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let Some(kind) = self.type_name() else {
            return Value::Null;
        };
        let body = match self {
            Self::RequiresPin { message } => json!({ "message": message }),
            Self::RequiresOtp { message, reference } => {
                json!({ "message": message, "reference": reference })
            }
            Self::RequiresAdditionalFields { fields, message } => {
                json!({ "fields": fields, "message": message })
            }
            Self::RedirectUrl { url } => json!({ "url": url.as_str() }),
            Self::PaymentInstruction { note, instructions } => {
                let mut body = instructions.clone();
                if let Some(note) = note {
                    body.insert("note".to_owned(), Value::String(note.clone()));
                }
                Value::Object(body)
            }
            Self::None => Value::Null,
        };
        json!({ "type": kind, kind: body })
    }

    /// Returns the processor's type string, or `None` for [`NextAction::None`].
    #[must_use]
    pub const fn type_name(&self) -> Option<&'static str> {
        match self {
            Self::RequiresPin { .. } => Some("requires_pin"),
            Self::RequiresOtp { .. } => Some("requires_otp"),
            Self::RequiresAdditionalFields { .. } => Some("requires_additional_fields"),
            Self::RedirectUrl { .. } => Some("redirect_url"),
            Self::PaymentInstruction { .. } => Some("payment_instruction"),
            Self::None => None,
        }
    }

    /// Returns the redirect target, only for [`NextAction::RedirectUrl`].
    ///
    /// This is the normalized URL, which may differ in text from what the
    /// processor sent while pointing at the same page.
    #[must_use]
    pub const fn redirect_url(&self) -> Option<&Url> {
        match self {
            Self::RedirectUrl { url } => Some(url),
            _ => None,
        }
    }

    /// Returns the prompt, only for actions that ask the payer for input.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::RequiresPin { message }
            | Self::RequiresOtp { message, .. }
            | Self::RequiresAdditionalFields { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Returns the note, only for [`NextAction::PaymentInstruction`].
    #[must_use]
    pub fn payment_instruction_note(&self) -> Option<&str> {
        match self {
            Self::PaymentInstruction { note, .. } => note.as_deref(),
            _ => None,
        }
    }

    /// Returns the requested field names, only for
    /// [`NextAction::RequiresAdditionalFields`].
    #[must_use]
    pub fn additional_fields(&self) -> Option<&[String]> {
        match self {
            Self::RequiresAdditionalFields { fields, .. } => Some(fields.as_slice()),
            _ => None,
        }
    }

    /// True when the payer must supply PIN, OTP or additional fields.
    #[must_use]
    pub const fn requires_customer_input(&self) -> bool {
        matches!(
            self,
            Self::RequiresPin { .. } | Self::RequiresOtp { .. } | Self::RequiresAdditionalFields { .. }
        )
    }

    /// True only for [`NextAction::RedirectUrl`].
    #[must_use]
    pub const fn requires_redirect(&self) -> bool {
        matches!(self, Self::RedirectUrl { .. })
    }

    /// True when payment completes outside the request/response cycle.
    #[must_use]
    pub const fn is_asynchronous(&self) -> bool {
        matches!(self, Self::RedirectUrl { .. } | Self::PaymentInstruction { .. })
    }

    /// True for [`NextAction::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the authorization kind that answers this action, if any.
    #[must_use]
    pub const fn expected_authorization(&self) -> Option<AuthorizationKind> {
        match self {
            Self::RequiresPin { .. } => Some(AuthorizationKind::Pin),
            Self::RequiresOtp { .. } => Some(AuthorizationKind::Otp),
            Self::RequiresAdditionalFields { .. } => Some(AuthorizationKind::Avs),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_pin() {
        let raw = json!({
            "id": "chg_1",
            "next_action": {"type": "requires_pin", "requires_pin": {"message": "Enter PIN"}}
        });
        let action = NextAction::from_response(&raw);
        assert_eq!(
            action,
            NextAction::RequiresPin {
                message: Some("Enter PIN".into())
            }
        );
        assert_eq!(action.message(), Some("Enter PIN"));
        assert!(action.requires_customer_input());
        assert!(!action.is_asynchronous());
        assert_eq!(action.expected_authorization(), Some(AuthorizationKind::Pin));
    }

    #[test]
    fn test_envelope_is_unwrapped() {
        let raw = json!({
            "status": "success",
            "message": "Charge created",
            "data": {
                "id": "chg_1",
                "next_action": {
                    "type": "requires_otp",
                    "requires_otp": {"message": "Enter OTP", "reference": "otp_9"}
                }
            }
        });
        let action = NextAction::from_response(&raw);
        assert_eq!(
            action,
            NextAction::RequiresOtp {
                message: Some("Enter OTP".into()),
                reference: Some("otp_9".into())
            }
        );
    }

    #[test]
    fn test_redirect_url() {
        let raw = json!({
            "id": "chg_1",
            "next_action": {"type": "redirect_url", "redirect_url": {"url": "https://bank.example/3ds"}}
        });
        let action = NextAction::from_response(&raw);
        assert!(action.requires_redirect());
        assert!(action.is_asynchronous());
        assert!(!action.requires_customer_input());
        assert_eq!(action.redirect_url().unwrap().as_str(), "https://bank.example/3ds");
        assert_eq!(action.message(), None);
        assert_eq!(action.expected_authorization(), None);
    }

    #[test]
    fn test_redirect_url_is_normalized() {
        let next = json!({"type": "redirect_url", "redirect_url": {"url": "https://Bank.Example"}});
        let action = NextAction::from_next_action(&next);
        assert_eq!(action.redirect_url().unwrap().as_str(), "https://bank.example/");
        assert_eq!(action.to_wire()["redirect_url"]["url"], "https://bank.example/");
    }

    #[test]
    fn test_redirect_without_usable_url_is_none() {
        for body in [
            json!({}),
            json!({"url": "/relative/path"}),
            json!({"url": "javascript:alert(1)"}),
            json!({"url": 42}),
        ] {
            let next = json!({"type": "redirect_url", "redirect_url": body});
            assert_eq!(NextAction::from_next_action(&next), NextAction::None);
        }
    }

    #[test]
    fn test_payment_instruction_splits_note() {
        let raw = json!({
            "id": "chg_1",
            "next_action": {
                "type": "payment_instruction",
                "payment_instruction": {
                    "note": "Transfer within 30 minutes",
                    "account_number": "0123456789",
                    "bank_name": "Example Bank"
                }
            }
        });
        let action = NextAction::from_response(&raw);
        assert_eq!(action.payment_instruction_note(), Some("Transfer within 30 minutes"));
        assert!(action.is_asynchronous());
        let NextAction::PaymentInstruction { instructions, .. } = &action else {
            panic!("expected payment instruction");
        };
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions["account_number"], "0123456789");
    }

    #[test]
    fn test_additional_fields_skip_non_strings() {
        let next = json!({
            "type": "requires_additional_fields",
            "requires_additional_fields": {"fields": ["city", 7, "country"], "message": "Need address"}
        });
        let action = NextAction::from_next_action(&next);
        assert_eq!(
            action.additional_fields(),
            Some(&["city".to_owned(), "country".to_owned()][..])
        );
        assert_eq!(action.expected_authorization(), Some(AuthorizationKind::Avs));
    }

    #[test]
    fn test_unknown_or_missing_type_is_none() {
        for raw in [
            json!({"id": "chg_1"}),
            json!({"id": "chg_1", "next_action": null}),
            json!({"id": "chg_1", "next_action": {"requires_pin": {}}}),
            json!({"id": "chg_1", "next_action": {"type": "requires_biometrics"}}),
            json!({"id": "chg_1", "next_action": {"type": 5}}),
        ] {
            assert_eq!(NextAction::from_response(&raw), NextAction::None);
        }
    }

    #[test]
    fn test_known_type_with_malformed_payload_keeps_variant() {
        let next = json!({"type": "requires_pin", "requires_pin": "oops"});
        assert_eq!(
            NextAction::from_next_action(&next),
            NextAction::RequiresPin { message: None }
        );
        let next = json!({"type": "requires_otp", "requires_otp": {"message": 12, "reference": "r"}});
        assert_eq!(
            NextAction::from_next_action(&next),
            NextAction::RequiresOtp {
                message: None,
                reference: Some("r".into())
            }
        );
    }

    #[test]
    fn test_wire_form_parses_back() {
        let actions = [
            NextAction::RequiresPin {
                message: Some("PIN".into()),
            },
            NextAction::RedirectUrl {
                url: Url::parse("https://bank.example/3ds").unwrap(),
            },
        ];
        for action in actions {
            assert_eq!(NextAction::from_next_action(&action.to_wire()), action);
        }
        assert_eq!(NextAction::None.to_wire(), Value::Null);
    }
}
