//! AES-256-GCM encryption of individual card and PIN fields.
//!
//! Every field in one submission is encrypted under the same [`Nonce`] and the
//! merchant's [`SymmetricKey`]. No associated data is authenticated, and the
//! ciphertext carries the 16-byte GCM tag appended, base64 encoded.
//!
//! # Nonce format
//!
//! A nonce is 12 ASCII alphanumeric characters and the characters themselves
//! are the IV bytes. This matches the processor's decryptor and the browser
//! encryptors that feed it. Twelve characters from a 62-symbol alphabet give
//! roughly 71 bits of entropy instead of the 96 a random IV would carry; the
//! format is kept for interoperability.

use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as GcmNonce};
use rand::RngExt;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::encoding::Base64String;

/// Length of an AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of a GCM nonce in bytes (and characters, since nonces are ASCII).
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Errors produced by the cipher layer.
///
/// Shape violations are reported before any AEAD work is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CipherError {
    /// Decoded key material is not exactly [`KEY_LEN`] bytes.
    #[error("invalid key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),
    /// Key material is not valid base64.
    #[error("encryption key is not valid base64")]
    InvalidKeyEncoding,
    /// Nonce is not exactly [`NONCE_LEN`] bytes.
    #[error("invalid nonce length: expected {NONCE_LEN} bytes, got {0}")]
    InvalidNonceLength(usize),
    /// Nonce contains a character outside `[A-Za-z0-9]`.
    #[error("nonce must contain only ASCII letters and digits")]
    InvalidNonceCharacter,
    /// Ciphertext is not valid base64.
    #[error("ciphertext is not valid base64")]
    InvalidCiphertextEncoding,
    /// The AEAD operation failed (for decryption: tag mismatch).
    #[error("AES-GCM operation failed")]
    Aead,
}

/// A 256-bit symmetric key shared with the processor.
///
/// Construction fails unless exactly [`KEY_LEN`] bytes are supplied; input is
/// never truncated or padded. The key bytes are wiped when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    /// Decodes a key from its base64 configuration form.
    ///
    /// Surrounding whitespace is ignored, which tolerates keys pasted into
    /// environment files with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyEncoding`] for malformed base64 and
    /// [`CipherError::InvalidKeyLength`] if the decoded key is not 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let decoded = Zeroizing::new(
            Base64String::from(encoded.trim())
                .decode()
                .map_err(|_| CipherError::InvalidKeyEncoding)?,
        );
        Self::from_slice(&decoded)
    }

    /// Builds a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] unless `bytes` is 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CipherError> {
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CipherError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(key))
    }

    /// Builds a key from a fixed-size array.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Debug for SymmetricKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// A 12-character alphanumeric GCM nonce.
///
/// One nonce is generated per encryption group (all fields of one card, or
/// one PIN) and is never reused across groups or retries.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Generates a fresh nonce from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        Self(std::array::from_fn(|_| rng.sample(Alphanumeric)))
    }

    /// Parses a nonce received on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidNonceLength`] unless `text` is exactly 12
    /// bytes, and [`CipherError::InvalidNonceCharacter`] if any byte is not an
    /// ASCII letter or digit.
    pub fn parse(text: &str) -> Result<Self, CipherError> {
        let bytes: [u8; NONCE_LEN] = text
            .as_bytes()
            .try_into()
            .map_err(|_| CipherError::InvalidNonceLength(text.len()))?;
        if !bytes.iter().all(u8::is_ascii_alphanumeric) {
            return Err(CipherError::InvalidNonceCharacter);
        }
        Ok(Self(bytes))
    }

    /// Returns the nonce as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ASCII alphanumerics are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Returns the IV bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

impl FromStr for Nonce {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for Nonce {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Debug for Nonce {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self.as_str())
    }
}

impl Serialize for Nonce {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Nonce {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// One encrypted field: the nonce it was sealed under and the base64
/// ciphertext with the GCM tag appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    /// Nonce used as the GCM IV.
    pub nonce: Nonce,
    /// Base64 of `ciphertext || tag`.
    pub ciphertext: Base64String,
}

/// Stateless AES-256-GCM field cipher.
///
/// Safe to call concurrently: it holds no state and each call builds its own
/// cipher instance from the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldCipher;

impl FieldCipher {
    /// Encrypts `plaintext` under `key` and `nonce` with no associated data.
    ///
    /// Deterministic for a given `(key, nonce, plaintext)`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Aead`] if the underlying cipher rejects the input.
    pub fn encrypt(
        key: &SymmetricKey,
        nonce: &Nonce,
        plaintext: &[u8],
    ) -> Result<EncryptedField, CipherError> {
        let cipher = Aes256Gcm::new(key.as_bytes().into());
        let sealed = cipher
            .encrypt(&GcmNonce::from(*nonce.as_bytes()), plaintext)
            .map_err(|_| CipherError::Aead)?;
        Ok(EncryptedField {
            nonce: *nonce,
            ciphertext: Base64String::encode(sealed),
        })
    }

    /// Decrypts a field sealed by [`FieldCipher::encrypt`].
    ///
    /// The returned buffer is wiped when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidCiphertextEncoding`] for malformed base64
    /// and [`CipherError::Aead`] when authentication fails (wrong key, wrong
    /// nonce or tampered ciphertext).
    pub fn decrypt(
        key: &SymmetricKey,
        field: &EncryptedField,
    ) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        let sealed = field
            .ciphertext
            .decode()
            .map_err(|_| CipherError::InvalidCiphertextEncoding)?;
        if sealed.len() < TAG_LEN {
            return Err(CipherError::Aead);
        }
        let cipher = Aes256Gcm::new(key.as_bytes().into());
        cipher
            .decrypt(&GcmNonce::from(*field.nonce.as_bytes()), sealed.as_ref())
            .map(Zeroizing::new)
            .map_err(|_| CipherError::Aead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SymmetricKey {
        SymmetricKey::from_bytes([7u8; KEY_LEN])
    }

    #[test]
    fn test_key_from_base64_accepts_32_bytes() {
        let encoded = Base64String::encode([1u8; 32]);
        assert!(SymmetricKey::from_base64(encoded.as_str()).is_ok());
    }

    #[test]
    fn test_key_from_base64_tolerates_trailing_newline() {
        let encoded = format!("{}\n", Base64String::encode([1u8; 32]));
        assert!(SymmetricKey::from_base64(&encoded).is_ok());
    }

    #[test]
    fn test_key_rejects_short_and_long_material() {
        for len in [0usize, 16, 31, 33, 64] {
            let encoded = Base64String::encode(vec![1u8; len]);
            assert_eq!(
                SymmetricKey::from_base64(encoded.as_str()).unwrap_err(),
                CipherError::InvalidKeyLength(len)
            );
        }
    }

    #[test]
    fn test_key_rejects_invalid_base64() {
        assert_eq!(
            SymmetricKey::from_base64("not base64!").unwrap_err(),
            CipherError::InvalidKeyEncoding
        );
    }

    #[test]
    fn test_key_debug_is_redacted() {
        assert_eq!(format!("{:?}", test_key()), "SymmetricKey(<redacted>)");
    }

    #[test]
    fn test_generated_nonce_is_twelve_alphanumerics() {
        for _ in 0..64 {
            let nonce = Nonce::generate();
            assert_eq!(nonce.as_str().len(), NONCE_LEN);
            assert!(nonce.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_generated_nonces_differ() {
        assert_ne!(Nonce::generate(), Nonce::generate());
    }

    #[test]
    fn test_nonce_parse_rejects_wrong_lengths() {
        for text in ["", "abc", "abc123ABC45", "abc123ABC4567"] {
            assert_eq!(
                Nonce::parse(text).unwrap_err(),
                CipherError::InvalidNonceLength(text.len())
            );
        }
    }

    #[test]
    fn test_nonce_parse_rejects_non_alphanumeric() {
        assert_eq!(
            Nonce::parse("abc123ABC45!").unwrap_err(),
            CipherError::InvalidNonceCharacter
        );
    }

    #[test]
    fn test_nonce_bytes_are_the_ascii_characters() {
        let nonce = Nonce::parse("abc123ABC456").unwrap();
        assert_eq!(nonce.as_bytes(), b"abc123ABC456");
        assert_eq!(nonce.to_string(), "abc123ABC456");
    }

    #[test]
    fn test_nonce_serde_roundtrip() {
        let nonce = Nonce::parse("abc123ABC456").unwrap();
        let json = serde_json::to_string(&nonce).unwrap();
        assert_eq!(json, "\"abc123ABC456\"");
        let back: Nonce = serde_json::from_str(&json).unwrap();
        assert_eq!(back, nonce);
        assert!(serde_json::from_str::<Nonce>("\"short\"").is_err());
    }

    #[test]
    fn test_encrypt_is_deterministic_for_same_key_and_nonce() {
        let nonce = Nonce::parse("abc123ABC456").unwrap();
        let a = FieldCipher::encrypt(&test_key(), &nonce, b"5531886652142950").unwrap();
        let b = FieldCipher::encrypt(&test_key(), &nonce, b"5531886652142950").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_encrypt_matches_known_vector() {
        let nonce = Nonce::parse("abc123ABC456").unwrap();
        let field = FieldCipher::encrypt(&test_key(), &nonce, b"5531886652142950").unwrap();
        assert_eq!(
            field.ciphertext.as_str(),
            "lwVallXBWAJ0ODc30GZRn3SR43du/l7k5DMfNDH9LQk="
        );
    }

    #[test]
    fn test_encrypt_depends_on_nonce() {
        let a = FieldCipher::encrypt(&test_key(), &Nonce::parse("abc123ABC456").unwrap(), b"564")
            .unwrap();
        let b = FieldCipher::encrypt(&test_key(), &Nonce::parse("abc123ABC457").unwrap(), b"564")
            .unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_encrypt_depends_on_key() {
        let nonce = Nonce::parse("abc123ABC456").unwrap();
        let other = SymmetricKey::from_bytes([8u8; KEY_LEN]);
        let a = FieldCipher::encrypt(&test_key(), &nonce, b"564").unwrap();
        let b = FieldCipher::encrypt(&other, &nonce, b"564").unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_ciphertext_carries_tag() {
        let nonce = Nonce::generate();
        let field = FieldCipher::encrypt(&test_key(), &nonce, b"09").unwrap();
        assert_eq!(field.ciphertext.decode().unwrap().len(), 2 + TAG_LEN);
        assert_eq!(field.nonce, nonce);
    }

    #[test]
    fn test_decrypt_roundtrip() {
        let nonce = Nonce::generate();
        let field = FieldCipher::encrypt(&test_key(), &nonce, b"4242424242424242").unwrap();
        let plain = FieldCipher::decrypt(&test_key(), &field).unwrap();
        assert_eq!(plain.as_slice(), b"4242424242424242");
    }

    #[test]
    fn test_decrypt_detects_tampering() {
        let field = FieldCipher::encrypt(&test_key(), &Nonce::generate(), b"1234").unwrap();
        let mut sealed = field.ciphertext.decode().unwrap();
        sealed[0] ^= 0x01;
        let tampered = EncryptedField {
            nonce: field.nonce,
            ciphertext: Base64String::encode(sealed),
        };
        assert_eq!(
            FieldCipher::decrypt(&test_key(), &tampered).unwrap_err(),
            CipherError::Aead
        );
    }

    #[test]
    fn test_decrypt_with_wrong_nonce_fails() {
        let field =
            FieldCipher::encrypt(&test_key(), &Nonce::parse("abc123ABC456").unwrap(), b"1234")
                .unwrap();
        let moved = EncryptedField {
            nonce: Nonce::parse("zzz123ABC456").unwrap(),
            ciphertext: field.ciphertext,
        };
        assert_eq!(
            FieldCipher::decrypt(&test_key(), &moved).unwrap_err(),
            CipherError::Aead
        );
    }

    #[test]
    fn test_decrypt_rejects_bad_encoding_and_short_input() {
        let nonce = Nonce::generate();
        let bad = EncryptedField {
            nonce,
            ciphertext: Base64String::from("***"),
        };
        assert_eq!(
            FieldCipher::decrypt(&test_key(), &bad).unwrap_err(),
            CipherError::InvalidCiphertextEncoding
        );
        let short = EncryptedField {
            nonce,
            ciphertext: Base64String::encode([0u8; 4]),
        };
        assert_eq!(
            FieldCipher::decrypt(&test_key(), &short).unwrap_err(),
            CipherError::Aead
        );
    }
}
