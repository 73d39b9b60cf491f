//! Command implementations.
//!
//! Each command returns a JSON value; printing is left to the binary.

use dcharge::card::{RawCard, RawPin};
use dcharge::charge::ChargeState;
use dcharge::cipher::{EncryptedField, Nonce};
use dcharge::encoding::Base64String;
use dcharge::encryptor::{CardFieldEncryptor, EncryptionError};
use dcharge::polling::PollingSupervisor;
use dcharge::proto::envelope_message;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::CliError;

/// Plaintext card input for [`encrypt_card`].
#[derive(Clone)]
pub struct CardInput {
    /// Card number, spaces allowed.
    pub number: String,
    /// Two-digit expiry month.
    pub expiry_month: String,
    /// Two-digit expiry year.
    pub expiry_year: String,
    /// Optional CVV.
    pub cvv: Option<String>,
}

impl std::fmt::Debug for CardInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CardInput(<redacted>)")
    }
}

fn parse_nonce(nonce: Option<&str>) -> Result<Option<Nonce>, CliError> {
    Ok(nonce.map(Nonce::parse).transpose()?)
}

/// Validates and encrypts a card, printing the wire payload.
///
/// # Errors
///
/// Returns an error for invalid card input or a malformed `nonce`.
pub fn encrypt_card(
    encryptor: &CardFieldEncryptor,
    input: CardInput,
    nonce: Option<&str>,
) -> Result<Value, CliError> {
    let mut card = RawCard::new(input.number, input.expiry_month, input.expiry_year);
    if let Some(cvv) = input.cvv {
        card = card.with_cvv(cvv);
    }
    let brand = card.brand();
    let payload = match parse_nonce(nonce)? {
        Some(nonce) => encryptor.encrypt_card_with_nonce(card, None, nonce)?,
        None => encryptor.encrypt_card(card, None)?,
    };
    info!(%brand, nonce = %payload.nonce, "Encrypted card");
    Ok(serde_json::to_value(payload)?)
}

/// Validates and encrypts a PIN, printing the wire payload.
///
/// # Errors
///
/// Returns an error for an invalid PIN or a malformed `nonce`.
pub fn encrypt_pin(
    encryptor: &CardFieldEncryptor,
    pin: String,
    nonce: Option<&str>,
) -> Result<Value, CliError> {
    let pin = RawPin::new(pin);
    let payload = match parse_nonce(nonce)? {
        Some(nonce) => encryptor.encrypt_pin_with_nonce(pin, nonce)?,
        None => encryptor.encrypt_pin(pin)?,
    };
    info!(nonce = %payload.nonce, "Encrypted PIN");
    Ok(serde_json::to_value(payload)?)
}

/// Decrypts one field and returns its plaintext as UTF-8 text.
///
/// # Errors
///
/// Returns an error for a malformed nonce or ciphertext, or when the field
/// does not authenticate under the configured key.
pub fn decrypt(
    encryptor: &CardFieldEncryptor,
    nonce: &str,
    ciphertext: &str,
) -> Result<Value, CliError> {
    let field = EncryptedField {
        nonce: Nonce::parse(nonce)?,
        ciphertext: Base64String::from(ciphertext.trim()),
    };
    let plaintext = encryptor.decrypt_field(&field).map_err(|e| match e {
        EncryptionError::Cipher(c) => CliError::Cipher(c),
        other => CliError::Key(other),
    })?;
    debug!(bytes = plaintext.len(), "Decrypted field");
    Ok(json!({ "plaintext": String::from_utf8_lossy(&plaintext) }))
}

/// Reports brand, number validity and last four digits of a card number.
#[must_use]
pub fn brand(number: &str) -> Value {
    let card = RawCard::new(number, "", "");
    let brand = card.brand();
    let problem = card.validate_number().err();
    json!({
        "brand": brand,
        "number_valid": problem.is_none(),
        "problem": problem.map(|e| e.to_string()),
        "last_four": card.last_four(),
        "cvv_lengths": brand.cvv_lengths(),
    })
}

/// Classifies a saved processor response.
///
/// # Errors
///
/// Returns an error if the response has no charge id or is not an object.
pub fn inspect(response: &Value, supervisor: &PollingSupervisor) -> Result<Value, CliError> {
    let state = ChargeState::from_response(response)?;
    let action = &state.next_action;

    let poll = (action.is_asynchronous() && !state.is_terminal()).then(|| {
        json!({
            "interval_ms": u64::try_from(supervisor.interval().as_millis()).unwrap_or(u64::MAX),
            "max_attempts": supervisor.max_attempts().get(),
        })
    });

    debug!(charge_id = %state.id, status = %state.status, "Inspected response");
    Ok(json!({
        "id": state.id,
        "reference": state.reference,
        "amount": state.amount.to_string(),
        "currency": state.currency,
        "status": state.status,
        "terminal": state.is_terminal(),
        "successful": state.is_successful(),
        "message": envelope_message(response),
        "processor_response": state.processor_response,
        "next_action": {
            "type": action.type_name(),
            "message": action.message(),
            "redirect_url": action.redirect_url().map(|url| url.as_str()),
            "note": action.payment_instruction_note(),
            "fields": action.additional_fields(),
            "expected_authorization": action.expected_authorization(),
            "requires_customer_input": action.requires_customer_input(),
            "asynchronous": action.is_asynchronous(),
        },
        "poll": poll,
    }))
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::time::Duration;

    use dcharge::card::ValidationError;
    use dcharge::cipher::SymmetricKey;

    use super::*;

    fn encryptor() -> CardFieldEncryptor {
        CardFieldEncryptor::new(SymmetricKey::from_bytes([11u8; 32]))
    }

    #[test]
    fn test_encrypt_card_then_decrypt_each_field() {
        let enc = encryptor();
        let input = CardInput {
            number: "5531 8866 5214 2950".into(),
            expiry_month: "09".into(),
            expiry_year: "32".into(),
            cvv: Some("564".into()),
        };
        let payload = encrypt_card(&enc, input, Some("abc123ABC456")).unwrap();
        assert_eq!(payload["nonce"], "abc123ABC456");

        let number = payload["encrypted_card_number"].as_str().unwrap();
        let out = decrypt(&enc, "abc123ABC456", number).unwrap();
        assert_eq!(out["plaintext"], "5531886652142950");

        let cvv = payload["encrypted_cvv"].as_str().unwrap();
        assert_eq!(decrypt(&enc, "abc123ABC456", cvv).unwrap()["plaintext"], "564");
    }

    #[test]
    fn test_bad_nonce_is_reported() {
        let err = encrypt_pin(&encryptor(), "1234".into(), Some("short")).unwrap_err();
        assert!(matches!(err, CliError::Cipher(_)));
    }

    #[test]
    fn test_decrypt_with_wrong_nonce_fails() {
        let enc = encryptor();
        let payload = encrypt_pin(&enc, "1234".into(), Some("abc123ABC456")).unwrap();
        let sealed = payload["encrypted_pin"].as_str().unwrap();
        let err = decrypt(&enc, "zzz123ABC456", sealed).unwrap_err();
        assert!(matches!(err, CliError::Cipher(_)));
    }

    #[test]
    fn test_brand_report() {
        let report = brand("3782 822463 10005");
        assert_eq!(report["brand"], "amex");
        assert_eq!(report["number_valid"], true);
        assert_eq!(report["problem"], Value::Null);
        assert_eq!(report["last_four"], "0005");
        assert_eq!(report["cvv_lengths"], json!([3, 4]));

        let report = brand("4242424242424241");
        assert_eq!(report["brand"], "visa");
        assert_eq!(report["number_valid"], false);
        assert_eq!(report["last_four"], "4241");
    }

    #[test]
    fn test_brand_report_agrees_with_card_checks() {
        let report = brand("4242 4242 42");
        assert_eq!(report["number_valid"], false);
        assert_eq!(
            report["problem"],
            ValidationError::CardNumberLength(10).to_string()
        );
        assert_eq!(report["last_four"], "4242");
        assert_eq!(report["cvv_lengths"], json!([3]));
    }

    #[test]
    fn test_inspect_redirect_suggests_polling() {
        let response = json!({
            "status": "success",
            "message": "Charge created",
            "data": {
                "id": "chg_1",
                "status": "pending",
                "next_action": {"type": "redirect_url", "redirect_url": {"url": "https://bank.example/3ds"}}
            }
        });
        let supervisor = PollingSupervisor::new(Duration::from_secs(2), NonZeroU32::new(4).unwrap());
        let report = inspect(&response, &supervisor).unwrap();
        assert_eq!(report["status"], "requires_action");
        assert_eq!(report["message"], "Charge created");
        assert_eq!(report["next_action"]["type"], "redirect_url");
        assert_eq!(report["next_action"]["redirect_url"], "https://bank.example/3ds");
        assert_eq!(report["poll"], json!({"interval_ms": 2000, "max_attempts": 4}));
    }

    #[test]
    fn test_inspect_pin_challenge() {
        let response = json!({
            "id": "chg_2",
            "status": "requires_action",
            "next_action": {"type": "requires_pin", "requires_pin": {"message": "Enter PIN"}}
        });
        let report = inspect(&response, &PollingSupervisor::default()).unwrap();
        assert_eq!(report["next_action"]["expected_authorization"], "pin");
        assert_eq!(report["next_action"]["requires_customer_input"], true);
        assert_eq!(report["poll"], Value::Null);
    }

    #[test]
    fn test_inspect_requires_id() {
        let err = inspect(&json!({"status": "pending"}), &PollingSupervisor::default()).unwrap_err();
        assert!(matches!(err, CliError::Protocol(_)));
    }
}
