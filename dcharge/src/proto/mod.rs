//! Wire types exchanged with the card processor's direct-charge API.
//!
//! # Key Types
//!
//! - [`DirectChargeRequest`] - Body of the create-charge call
//! - [`BillingAddress`] - Address sent with a card or an AVS authorization
//! - [`Customer`] - Payer identity attached to a charge
//! - [`charge_data`] - Unwraps the `{status, message, data}` envelope
//! - [`ErrorReason`] - Machine-readable failure codes
//!
//! # Wire Format
//!
//! All field names are `snake_case`. Optional fields are omitted, not null.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::card::ValidationError;
use crate::encryptor::EncryptedCardPayload;

mod error;

pub use error::*;

/// Arbitrary merchant metadata attached to a charge.
pub type Meta = Map<String, Value>;

/// Billing address, sent in the clear with a card or in an AVS authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingAddress {
    /// First address line.
    pub line1: String,
    /// Second address line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    /// City.
    pub city: String,
    /// State or region.
    pub state: String,
    /// Postal code.
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

impl BillingAddress {
    /// Checks that every required field is non-blank.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Address`] naming the first blank field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(ValidationError::Address(*name)),
            None => Ok(()),
        }
    }
}

/// Payer's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerName {
    /// Given name.
    pub first: String,
    /// Family name.
    pub last: String,
}

/// Payer's phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    /// Dialing code without the leading `+`, e.g. `234`.
    pub country_code: String,
    /// Subscriber number.
    pub number: String,
}

/// Payer identity attached to a direct charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Contact email address.
    pub email: String,
    /// Optional name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<CustomerName>,
    /// Optional phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<Phone>,
}

impl Customer {
    /// Creates a customer with only an email address.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            phone: None,
        }
    }

    /// Sets the customer's name.
    #[must_use]
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.name = Some(CustomerName {
            first: first.into(),
            last: last.into(),
        });
        self
    }

    /// Sets the customer's phone number.
    #[must_use]
    pub fn with_phone(mut self, country_code: impl Into<String>, number: impl Into<String>) -> Self {
        self.phone = Some(Phone {
            country_code: country_code.into(),
            number: number.into(),
        });
        self
    }
}

/// Payment instrument of a direct charge.
///
/// Serialized as `{"type": "card", "card": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum PaymentMethod {
    /// An encrypted card.
    Card {
        /// Encrypted card fields.
        card: EncryptedCardPayload,
    },
}

/// Body of the create-charge call.
///
/// Only encrypted card fields can be carried, so a request built from this
/// type never holds a plaintext card number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectChargeRequest {
    /// Amount in major currency units.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// ISO 4217 currency code, e.g. `NGN`.
    pub currency: String,
    /// Merchant's unique reference for this charge.
    pub reference: String,
    /// Payer identity.
    pub customer: Customer,
    /// Payment instrument.
    pub payment_method: PaymentMethod,
    /// Where the payer returns after a redirect-based authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<Url>,
    /// Merchant metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl DirectChargeRequest {
    /// Creates a card charge request.
    pub fn card(
        amount: Decimal,
        currency: impl Into<String>,
        reference: impl Into<String>,
        customer: Customer,
        card: EncryptedCardPayload,
    ) -> Self {
        Self {
            amount,
            currency: currency.into(),
            reference: reference.into(),
            customer,
            payment_method: PaymentMethod::Card { card },
            redirect_url: None,
            meta: None,
        }
    }

    /// Sets the post-authentication redirect target.
    #[must_use]
    pub fn with_redirect_url(mut self, url: Url) -> Self {
        self.redirect_url = Some(url);
        self
    }

    /// Sets merchant metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Checks the plaintext parts of the request.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ChargeField`] for a non-positive amount, a
    /// currency that is not three ASCII letters, a blank reference, or an email
    /// without `@`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::ChargeField("amount"));
        }
        if self.currency.len() != 3 || !self.currency.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(ValidationError::ChargeField("currency"));
        }
        if self.reference.trim().is_empty() {
            return Err(ValidationError::ChargeField("reference"));
        }
        if !self.customer.email.contains('@') {
            return Err(ValidationError::ChargeField("customer.email"));
        }
        let PaymentMethod::Card { card } = &self.payment_method;
        if let Some(address) = &card.billing_address {
            address.validate()?;
        }
        Ok(())
    }
}

/// Returns the charge object inside a processor response.
///
/// Responses come either wrapped as `{"status", "message", "data": {...}}` or
/// as the bare charge. A top-level `id` marks the bare form.
#[must_use]
pub fn charge_data(response: &Value) -> &Value {
    match response.get("data") {
        Some(data) if data.is_object() && response.get("id").is_none() => data,
        _ => response,
    }
}

/// Returns the envelope's human-readable `message`, if present.
#[must_use]
pub fn envelope_message(response: &Value) -> Option<&str> {
    if response.get("id").is_some() {
        return None;
    }
    response.get("message").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::Nonce;
    use crate::encoding::Base64String;
    use serde_json::json;

    fn encrypted_card() -> EncryptedCardPayload {
        EncryptedCardPayload {
            nonce: Nonce::parse("abc123ABC456").unwrap(),
            encrypted_card_number: Base64String::from("bnVtYmVy"),
            encrypted_cvv: None,
            encrypted_expiry_month: Base64String::from("bW9udGg="),
            encrypted_expiry_year: Base64String::from("eWVhcg=="),
            billing_address: None,
        }
    }

    fn request() -> DirectChargeRequest {
        DirectChargeRequest::card(
            Decimal::from(5000),
            "NGN",
            "ref-001",
            Customer::new("ada@example.com").with_name("Ada", "Obi"),
            encrypted_card(),
        )
    }

    #[test]
    fn test_request_wire_shape() {
        let json = serde_json::to_value(request()).unwrap();
        assert_eq!(json["amount"], json!(5000.0));
        assert_eq!(json["currency"], "NGN");
        assert_eq!(json["customer"]["name"]["first"], "Ada");
        assert!(json["customer"].get("phone").is_none());
        assert_eq!(json["payment_method"]["type"], "card");
        assert_eq!(json["payment_method"]["card"]["nonce"], "abc123ABC456");
        assert!(json.get("redirect_url").is_none());
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn test_request_validation() {
        assert!(request().validate().is_ok());

        let mut bad = request();
        bad.amount = Decimal::ZERO;
        assert_eq!(bad.validate(), Err(ValidationError::ChargeField("amount")));

        let mut bad = request();
        bad.currency = "NG".into();
        assert_eq!(bad.validate(), Err(ValidationError::ChargeField("currency")));

        let mut bad = request();
        bad.customer.email = "nobody".into();
        assert_eq!(
            bad.validate(),
            Err(ValidationError::ChargeField("customer.email"))
        );
    }

    #[test]
    fn test_billing_address_reports_first_blank_field() {
        let address = BillingAddress {
            line1: "1 Marina".into(),
            line2: None,
            city: " ".into(),
            state: String::new(),
            postal_code: "101001".into(),
            country: "NG".into(),
        };
        assert_eq!(address.validate(), Err(ValidationError::Address("city")));
    }

    #[test]
    fn test_charge_data_unwraps_envelope() {
        let wrapped = json!({"status": "success", "message": "Charge created", "data": {"id": "chg_1"}});
        assert_eq!(charge_data(&wrapped)["id"], "chg_1");
        assert_eq!(envelope_message(&wrapped), Some("Charge created"));

        let bare = json!({"id": "chg_2", "data": {"id": "other"}, "message": "x"});
        assert_eq!(charge_data(&bare)["id"], "chg_2");
        assert_eq!(envelope_message(&bare), None);
    }
}
