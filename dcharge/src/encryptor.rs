//! Validation and group encryption of card and PIN submissions.
//!
//! A card submission is one encryption group: a single [`Nonce`] is drawn and
//! every present field is sealed under it. The same holds for a PIN.

use serde::{Deserialize, Serialize};
#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};

use crate::card::{DEFAULT_PIN_LENGTH, RawCard, RawPin, ValidationError};
use crate::cipher::{CipherError, EncryptedField, FieldCipher, Nonce, SymmetricKey};
use crate::encoding::Base64String;
use crate::proto::BillingAddress;

/// Failure to encrypt a validated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EncryptionError {
    /// No key material was configured.
    #[error("encryption key is not configured")]
    MissingKey,
    /// The cipher rejected the key, the nonce, or the operation.
    #[error("field encryption failed: {0}")]
    Cipher(#[from] CipherError),
}

/// Error returned by [`CardFieldEncryptor`] operations.
///
/// Validation failures are reported before the cipher is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldEncryptionError {
    /// The plaintext input is malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Encryption of valid input failed.
    #[error(transparent)]
    Encryption(#[from] EncryptionError),
}

impl From<CipherError> for FieldEncryptionError {
    fn from(err: CipherError) -> Self {
        Self::Encryption(EncryptionError::Cipher(err))
    }
}

/// Encrypted card details, as submitted inside a direct charge.
///
/// Wire shape:
///
/// ```json
/// {
///   "nonce": "abc123ABC456",
///   "encrypted_card_number": "<base64>",
///   "encrypted_cvv": "<base64>",
///   "encrypted_expiry_month": "<base64>",
///   "encrypted_expiry_year": "<base64>",
///   "billing_address": { ... }
/// }
/// ```
///
/// `encrypted_cvv` and `billing_address` are omitted when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedCardPayload {
    /// Nonce shared by every encrypted field in this payload.
    pub nonce: Nonce,
    /// Encrypted card number (whitespace removed before encryption).
    pub encrypted_card_number: Base64String,
    /// Encrypted CVV, if one was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_cvv: Option<Base64String>,
    /// Encrypted two-digit expiry month.
    pub encrypted_expiry_month: Base64String,
    /// Encrypted two-digit expiry year.
    pub encrypted_expiry_year: Base64String,
    /// Billing address, sent in the clear.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<BillingAddress>,
}

impl EncryptedCardPayload {
    /// Returns the encrypted card number as a standalone field.
    #[must_use]
    pub fn card_number_field(&self) -> EncryptedField {
        self.field(&self.encrypted_card_number)
    }

    /// Returns the encrypted CVV as a standalone field, if present.
    #[must_use]
    pub fn cvv_field(&self) -> Option<EncryptedField> {
        self.encrypted_cvv.as_ref().map(|c| self.field(c))
    }

    /// Returns the encrypted expiry month as a standalone field.
    #[must_use]
    pub fn expiry_month_field(&self) -> EncryptedField {
        self.field(&self.encrypted_expiry_month)
    }

    /// Returns the encrypted expiry year as a standalone field.
    #[must_use]
    pub fn expiry_year_field(&self) -> EncryptedField {
        self.field(&self.encrypted_expiry_year)
    }

    fn field(&self, ciphertext: &Base64String) -> EncryptedField {
        EncryptedField {
            nonce: self.nonce,
            ciphertext: ciphertext.clone(),
        }
    }
}

/// Encrypted PIN, as submitted in a PIN authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPinPayload {
    /// Nonce the PIN was sealed under.
    pub nonce: Nonce,
    /// Encrypted PIN.
    pub encrypted_pin: Base64String,
}

impl EncryptedPinPayload {
    /// Returns the encrypted PIN as a standalone field.
    #[must_use]
    pub fn pin_field(&self) -> EncryptedField {
        EncryptedField {
            nonce: self.nonce,
            ciphertext: self.encrypted_pin.clone(),
        }
    }
}

/// Validates and encrypts card and PIN input under the merchant key.
///
/// The key is supplied at construction and checked there, so a misconfigured
/// key is reported before a payer ever enters card details.
///
/// # Examples
///
/// ```
/// use dcharge::card::RawCard;
/// use dcharge::cipher::SymmetricKey;
/// use dcharge::encryptor::CardFieldEncryptor;
///
/// let encryptor = CardFieldEncryptor::new(SymmetricKey::from_bytes([9; 32]));
/// let card = RawCard::new("5531886652142950", "09", "32").with_cvv("564");
/// let payload = encryptor.encrypt_card(card, None).unwrap();
/// assert_eq!(payload.nonce.as_str().len(), 12);
/// assert!(payload.encrypted_cvv.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct CardFieldEncryptor {
    key: SymmetricKey,
    pin_length: usize,
}

impl CardFieldEncryptor {
    /// Creates an encryptor over an already validated key.
    #[must_use]
    pub const fn new(key: SymmetricKey) -> Self {
        Self {
            key,
            pin_length: DEFAULT_PIN_LENGTH,
        }
    }

    /// Creates an encryptor from the base64 key in configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EncryptionError::MissingKey`] for an empty or blank string, and
    /// [`EncryptionError::Cipher`] if the key is not base64 of exactly 32 bytes.
    pub fn from_base64_key(encoded: &str) -> Result<Self, EncryptionError> {
        if encoded.trim().is_empty() {
            return Err(EncryptionError::MissingKey);
        }
        Ok(Self::new(SymmetricKey::from_base64(encoded)?))
    }

    /// Sets the number of digits a PIN must have.
    #[must_use]
    pub const fn with_pin_length(mut self, pin_length: usize) -> Self {
        self.pin_length = pin_length;
        self
    }

    /// Returns the configured PIN length.
    #[must_use]
    pub const fn pin_length(&self) -> usize {
        self.pin_length
    }

    /// Validates and encrypts a card under a freshly generated nonce.
    ///
    /// The card is consumed and its plaintext wiped when this returns.
    ///
    /// # Errors
    ///
    /// Returns [`FieldEncryptionError::Validation`] for malformed card or
    /// address input, and [`FieldEncryptionError::Encryption`] if sealing fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "dcharge.encryptor.encrypt_card", skip_all, err)
    )]
    pub fn encrypt_card(
        &self,
        card: RawCard,
        billing_address: Option<BillingAddress>,
    ) -> Result<EncryptedCardPayload, FieldEncryptionError> {
        self.encrypt_card_with_nonce(card, billing_address, Nonce::generate())
    }

    /// Validates and encrypts a card under a caller-supplied nonce.
    ///
    /// Intended for interoperability tests against a reference encryptor. A
    /// nonce must never be reused for a second submission.
    ///
    /// # Errors
    ///
    /// Same as [`CardFieldEncryptor::encrypt_card`].
    pub fn encrypt_card_with_nonce(
        &self,
        card: RawCard,
        billing_address: Option<BillingAddress>,
        nonce: Nonce,
    ) -> Result<EncryptedCardPayload, FieldEncryptionError> {
        card.validate()?;
        if let Some(address) = &billing_address {
            address.validate()?;
        }

        let number = card.normalized_number();
        let seal = |plaintext: &str| -> Result<Base64String, CipherError> {
            FieldCipher::encrypt(&self.key, &nonce, plaintext.as_bytes()).map(|f| f.ciphertext)
        };

        let payload = EncryptedCardPayload {
            nonce,
            encrypted_card_number: seal(&number)?,
            encrypted_cvv: card.cvv().map(seal).transpose()?,
            encrypted_expiry_month: seal(card.expiry_month())?,
            encrypted_expiry_year: seal(card.expiry_year())?,
            billing_address,
        };

        #[cfg(feature = "telemetry")]
        debug!(
            brand = %card.brand(),
            has_cvv = payload.encrypted_cvv.is_some(),
            "Encrypted card fields"
        );

        Ok(payload)
    }

    /// Validates and encrypts a PIN under a freshly generated nonce.
    ///
    /// # Errors
    ///
    /// Returns [`FieldEncryptionError::Validation`] unless the PIN is a digit
    /// string of the configured length, and [`FieldEncryptionError::Encryption`]
    /// if sealing fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "dcharge.encryptor.encrypt_pin", skip_all, err)
    )]
    pub fn encrypt_pin(&self, pin: RawPin) -> Result<EncryptedPinPayload, FieldEncryptionError> {
        self.encrypt_pin_with_nonce(pin, Nonce::generate())
    }

    /// Validates and encrypts a PIN under a caller-supplied nonce.
    ///
    /// # Errors
    ///
    /// Same as [`CardFieldEncryptor::encrypt_pin`].
    pub fn encrypt_pin_with_nonce(
        &self,
        pin: RawPin,
        nonce: Nonce,
    ) -> Result<EncryptedPinPayload, FieldEncryptionError> {
        pin.validate(self.pin_length)?;
        let sealed = FieldCipher::encrypt(&self.key, &nonce, pin.as_str().as_bytes())?;
        Ok(EncryptedPinPayload {
            nonce,
            encrypted_pin: sealed.ciphertext,
        })
    }

    /// Decrypts one field of a payload produced under this encryptor's key.
    ///
    /// # Errors
    ///
    /// Returns [`EncryptionError::Cipher`] if the field does not authenticate.
    pub fn decrypt_field(
        &self,
        field: &EncryptedField,
    ) -> Result<zeroize::Zeroizing<Vec<u8>>, EncryptionError> {
        Ok(FieldCipher::decrypt(&self.key, field)?)
    }
}
