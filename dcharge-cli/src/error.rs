//! Error types for the operator tool.

use dcharge::cipher::CipherError;
use dcharge::encryptor::{EncryptionError, FieldEncryptionError};
use dcharge::error::ProtocolParseError;

/// Errors that can occur while running a command.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML or has invalid values.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Input or output JSON could not be processed.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The key is missing or malformed.
    #[error("encryption key: {0}")]
    Key(#[from] EncryptionError),

    /// Card or PIN input failed validation or encryption.
    #[error("{0}")]
    Encryption(#[from] FieldEncryptionError),

    /// A nonce or ciphertext argument is malformed, or decryption failed.
    #[error("{0}")]
    Cipher(#[from] CipherError),

    /// A processor response could not be interpreted.
    #[error("{0}")]
    Protocol(#[from] ProtocolParseError),
}
