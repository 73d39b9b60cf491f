//! Plaintext card and PIN input, and the checks run on it before encryption.
//!
//! [`RawCard`] and [`RawPin`] only exist between the moment a payer types
//! their details and the moment [`CardFieldEncryptor`](crate::encryptor::CardFieldEncryptor)
//! consumes them. They are never serialized, their `Debug` output is
//! redacted, and their buffers are wiped on drop.

use std::fmt::{self, Debug, Display, Formatter};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Shortest accepted card number, in digits.
pub const MIN_CARD_DIGITS: usize = 13;

/// Longest accepted card number, in digits.
pub const MAX_CARD_DIGITS: usize = 19;

/// PIN length used when none is configured.
pub const DEFAULT_PIN_LENGTH: usize = 4;

/// Malformed plaintext input, caught before any cryptographic operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The card number contains something other than digits and whitespace.
    #[error("card number must contain only digits")]
    CardNumberCharacters,
    /// The card number is shorter than 13 or longer than 19 digits.
    #[error("card number must be {MIN_CARD_DIGITS} to {MAX_CARD_DIGITS} digits, got {0}")]
    CardNumberLength(usize),
    /// The card number fails the Luhn checksum.
    #[error("card number fails the Luhn check")]
    CardNumberChecksum,
    /// The expiry month is not `01` through `12`.
    #[error("expiry month must be two digits between 01 and 12")]
    ExpiryMonth,
    /// The expiry year is not exactly two digits.
    #[error("expiry year must be exactly two digits")]
    ExpiryYear,
    /// The CVV length is not accepted for the detected brand.
    #[error("CVV of {length} digits is not accepted for {brand} cards")]
    Cvv {
        /// Brand detected from the card number.
        brand: CardBrand,
        /// Number of characters supplied.
        length: usize,
    },
    /// The PIN is not a digit string of the configured length.
    #[error("PIN must be exactly {0} digits")]
    Pin(usize),
    /// The OTP is not a short digit string.
    #[error("OTP must be 4 to 10 digits")]
    Otp,
    /// A required billing address field is empty.
    #[error("billing address field `{0}` is required")]
    Address(&'static str),
    /// A charge request field is missing or out of range.
    #[error("charge request field `{0}` is invalid")]
    ChargeField(&'static str),
    /// An encrypted PIN is not base64 of a sealed value.
    #[error("encrypted PIN is not a valid ciphertext")]
    EncryptedPin,
}

/// Card network, detected from the leading digits of the card number.
///
/// Used for the CVV length policy and for display, never for cryptography.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardBrand {
    /// Visa: starts with `4`.
    Visa,
    /// Mastercard: starts with `51`-`55` or `22`-`27`.
    Mastercard,
    /// Verve: starts with `5060`, `5061`, `5078`, `5079` or `6500`.
    Verve,
    /// American Express: starts with `34` or `37`.
    Amex,
    /// Anything else.
    Unknown,
}

static BRAND_PATTERNS: LazyLock<[(CardBrand, Regex); 4]> = LazyLock::new(|| {
    [
        (CardBrand::Verve, Regex::new(r"^(?:506[01]|507[89]|6500)").expect("valid pattern")),
        (CardBrand::Visa, Regex::new(r"^4").expect("valid pattern")),
        (CardBrand::Mastercard, Regex::new(r"^(?:5[1-5]|2[2-7])").expect("valid pattern")),
        (CardBrand::Amex, Regex::new(r"^3[47]").expect("valid pattern")),
    ]
});

impl CardBrand {
    /// Detects the brand from a card number. Whitespace is ignored.
    #[must_use]
    pub fn detect(number: &str) -> Self {
        let digits = strip_whitespace(number);
        BRAND_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(&digits))
            .map_or(Self::Unknown, |(brand, _)| *brand)
    }

    /// CVV lengths accepted for this brand.
    ///
    /// Four digits are only accepted for Amex; a brand that cannot be
    /// identified accepts either length.
    #[must_use]
    pub const fn cvv_lengths(self) -> &'static [usize] {
        match self {
            Self::Visa | Self::Mastercard | Self::Verve => &[3],
            Self::Amex | Self::Unknown => &[3, 4],
        }
    }

    /// Returns the lowercase brand name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Visa => "visa",
            Self::Mastercard => "mastercard",
            Self::Verve => "verve",
            Self::Amex => "amex",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for CardBrand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `true` if `digits` is a non-empty digit string passing the Luhn checksum.
#[must_use]
pub fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() {
        return false;
    }
    let mut sum = 0u32;
    for (i, byte) in digits.bytes().rev().enumerate() {
        if !byte.is_ascii_digit() {
            return false;
        }
        let mut digit = u32::from(byte - b'0');
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

fn strip_whitespace(input: &str) -> Zeroizing<String> {
    Zeroizing::new(input.chars().filter(|c| !c.is_whitespace()).collect())
}

fn is_digits(input: &str, len: usize) -> bool {
    input.len() == len && input.bytes().all(|b| b.is_ascii_digit())
}

/// Plaintext card details as entered by the payer.
///
/// # Examples
///
/// ```
/// use dcharge::card::{CardBrand, RawCard};
///
/// let card = RawCard::new("5531 8866 5214 2950", "09", "32").with_cvv("564");
/// assert!(card.validate().is_ok());
/// assert_eq!(card.brand(), CardBrand::Mastercard);
/// assert_eq!(card.last_four(), "2950");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RawCard {
    number: String,
    expiry_month: String,
    expiry_year: String,
    cvv: Option<String>,
}

impl RawCard {
    /// Creates card input without a CVV.
    pub fn new(
        number: impl Into<String>,
        expiry_month: impl Into<String>,
        expiry_year: impl Into<String>,
    ) -> Self {
        Self {
            number: number.into(),
            expiry_month: expiry_month.into(),
            expiry_year: expiry_year.into(),
            cvv: None,
        }
    }

    /// Attaches a CVV.
    #[must_use]
    pub fn with_cvv(mut self, cvv: impl Into<String>) -> Self {
        self.cvv = Some(cvv.into());
        self
    }

    /// Brand detected from the card number.
    #[must_use]
    pub fn brand(&self) -> CardBrand {
        CardBrand::detect(&self.number)
    }

    /// Last four digits of the card number, for display.
    #[must_use]
    pub fn last_four(&self) -> String {
        let digits = strip_whitespace(&self.number);
        let skip = digits.chars().count().saturating_sub(4);
        digits.chars().skip(skip).collect()
    }

    /// Runs every format check on the card.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, checking the number, then
    /// the expiry, then the CVV.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_number()?;

        let month_ok = is_digits(&self.expiry_month, 2)
            && matches!(self.expiry_month.parse::<u8>(), Ok(1..=12));
        if !month_ok {
            return Err(ValidationError::ExpiryMonth);
        }
        if !is_digits(&self.expiry_year, 2) {
            return Err(ValidationError::ExpiryYear);
        }

        if let Some(cvv) = &self.cvv {
            let brand = self.brand();
            let length = cvv.len();
            let accepted = brand
                .cvv_lengths()
                .iter()
                .any(|&allowed| is_digits(cvv, allowed));
            if !accepted {
                return Err(ValidationError::Cvv { brand, length });
            }
        }
        Ok(())
    }

    /// Checks only the card number: digits, length and Luhn checksum.
    ///
    /// # Errors
    ///
    /// Returns the first number-related [`ValidationError`] found.
    pub fn validate_number(&self) -> Result<(), ValidationError> {
        let digits = strip_whitespace(&self.number);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::CardNumberCharacters);
        }
        if !(MIN_CARD_DIGITS..=MAX_CARD_DIGITS).contains(&digits.len()) {
            return Err(ValidationError::CardNumberLength(digits.len()));
        }
        if !luhn_valid(&digits) {
            return Err(ValidationError::CardNumberChecksum);
        }
        Ok(())
    }

    pub(crate) fn normalized_number(&self) -> Zeroizing<String> {
        strip_whitespace(&self.number)
    }

    pub(crate) fn expiry_month(&self) -> &str {
        &self.expiry_month
    }

    pub(crate) fn expiry_year(&self) -> &str {
        &self.expiry_year
    }

    pub(crate) fn cvv(&self) -> Option<&str> {
        self.cvv.as_deref()
    }
}

impl Debug for RawCard {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCard")
            .field("brand", &self.brand())
            .field("last_four", &self.last_four())
            .finish_non_exhaustive()
    }
}

/// Plaintext PIN as entered by the payer.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RawPin(String);

impl RawPin {
    /// Wraps a PIN string.
    pub fn new(pin: impl Into<String>) -> Self {
        Self(pin.into())
    }

    /// Checks that the PIN is exactly `length` digits.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Pin`] otherwise.
    pub fn validate(&self, length: usize) -> Result<(), ValidationError> {
        if is_digits(&self.0, length) {
            Ok(())
        } else {
            Err(ValidationError::Pin(length))
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for RawPin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("RawPin(<redacted>)")
    }
}
