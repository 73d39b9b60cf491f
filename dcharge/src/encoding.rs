//! Base64 text used for ciphertext and key material on the wire.
//!
//! The processor expects the standard alphabet with padding, which is what a
//! browser's `btoa` produces, so both sides of an encryption agree byte for byte.

use std::fmt::{self, Display, Formatter};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::{Deserialize, Serialize};

/// A base64-encoded string (standard alphabet, padded).
///
/// Holds the encoded text rather than the raw bytes, since the encoded form
/// is what crosses the wire and is compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Base64String(String);

impl Base64String {
    /// Encodes raw binary data into base64 text.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        Self(b64.encode(input.as_ref()))
    }

    /// Decodes the base64 text back to raw binary data.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid standard base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Returns the encoded text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Base64String {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Base64String {
    fn from(text: &str) -> Self {
        Self(text.to_owned())
    }
}

impl From<String> for Base64String {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl Display for Base64String {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_uses_padded_standard_alphabet() {
        let encoded = Base64String::encode([0xfb, 0xff]);
        assert_eq!(encoded.as_str(), "+/8=");
    }

    #[test]
    fn test_decode_rejects_url_safe_alphabet() {
        let text = Base64String::from("-_8=");
        assert!(text.decode().is_err());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let encoded = Base64String::encode(b"hi");
        let json = serde_json::to_string(&encoded).unwrap();
        assert_eq!(json, "\"aGk=\"");
    }
}
