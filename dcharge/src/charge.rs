//! Charge status and the caller-held snapshot of an in-flight charge.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use serde_with::DeserializeFromStr;

use crate::error::ProtocolParseError;
use crate::next_action::NextAction;
use crate::proto::charge_data;

/// Lifecycle status of a charge.
///
/// `Succeeded`, `Failed`, `Cancelled` and `Timeout` are terminal. Deserializing
/// goes through [`ChargeStatus::parse`], so it never fails on a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, DeserializeFromStr)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    /// Created, not yet settled, nothing asked of the payer.
    Pending,
    /// Waiting on the payer to complete a next action.
    RequiresAction,
    /// Funds captured.
    Succeeded,
    /// Declined or otherwise failed.
    Failed,
    /// Cancelled before completion.
    Cancelled,
    /// Expired at the processor.
    Timeout,
}

impl ChargeStatus {
    /// Maps a processor status string to a status.
    ///
    /// Matching is case-insensitive and accepts the processor's synonyms.
    /// Unrecognized strings map to [`ChargeStatus::Failed`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "processing" => Self::Pending,
            "requires_action" => Self::RequiresAction,
            "succeeded" | "successful" | "success" | "completed" => Self::Succeeded,
            "cancelled" | "canceled" => Self::Cancelled,
            "timeout" | "expired" => Self::Timeout,
            _ => Self::Failed,
        }
    }

    /// Returns true for statuses no transition can leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::Timeout
        )
    }

    /// Returns the `snake_case` name of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::RequiresAction => "requires_action",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        }
    }
}

impl FromStr for ChargeStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Display for ChargeStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a charge, derived from the latest processor response.
///
/// A state is never edited in place. Every transition of
/// [`ChargeAuthorizationMachine`](crate::machine::ChargeAuthorizationMachine)
/// returns a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeState {
    /// Processor's charge id.
    pub id: String,
    /// Merchant reference, if echoed back.
    pub reference: Option<String>,
    /// Amount in major units; zero when the processor omits it.
    pub amount: Decimal,
    /// Currency code; empty when the processor omits it.
    pub currency: String,
    /// Normalized status.
    pub status: ChargeStatus,
    /// What the payer must do next.
    pub next_action: NextAction,
    /// Processor's free-text response, e.g. a decline reason.
    pub processor_response: Option<String>,
}

impl ChargeState {
    /// Builds a state from a processor response.
    ///
    /// Accepts either the `{status, message, data}` envelope or the bare
    /// charge. Only `id` is required; other missing or malformed fields fall
    /// back to defaults. A missing status is read as `pending`.
    ///
    /// The raw status is reconciled with the next action: `pending` with a
    /// next action becomes [`ChargeStatus::RequiresAction`], and
    /// `requires_action` without one becomes [`ChargeStatus::Pending`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolParseError`] if the charge is not a JSON object or
    /// has no string `id`.
    pub fn from_response(raw: &Value) -> Result<Self, ProtocolParseError> {
        let data = charge_data(raw);
        let object = data.as_object().ok_or(ProtocolParseError::NotAnObject)?;

        let id = object
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(ProtocolParseError::MissingId)?
            .to_owned();

        let next_action = object
            .get("next_action")
            .map_or(NextAction::None, NextAction::from_next_action);

        let status = match object.get("status").and_then(Value::as_str) {
            Some(raw) => ChargeStatus::parse(raw),
            None => ChargeStatus::Pending,
        };
        let status = match status {
            ChargeStatus::Pending if !next_action.is_none() => ChargeStatus::RequiresAction,
            ChargeStatus::RequiresAction if next_action.is_none() => ChargeStatus::Pending,
            other => other,
        };

        Ok(Self {
            id,
            reference: string_field(object.get("reference")),
            amount: object.get("amount").and_then(decimal_field).unwrap_or_default(),
            currency: string_field(object.get("currency")).unwrap_or_default(),
            status,
            next_action,
            processor_response: string_field(object.get("processor_response")),
        })
    }

    /// True once the charge can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True if the charge succeeded.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.status == ChargeStatus::Succeeded
    }

    /// True if the charge is waiting on the payer.
    #[must_use]
    pub fn requires_action(&self) -> bool {
        self.status == ChargeStatus::RequiresAction
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_owned)
}

fn decimal_field(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_owned(),
        _ => return None,
    };
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
