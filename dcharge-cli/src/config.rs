//! Operator tool configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! encryption_key = "$DCHARGE_ENCRYPTION_KEY"
//! pin_length = 4
//!
//! [polling]
//! interval_ms = 3000
//! max_attempts = 10
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `dcharge.toml`)
//! - `DCHARGE_ENCRYPTION_KEY` - Overrides `encryption_key`
//! - Any variable referenced by `$VAR` in the config file

use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use dcharge::card::DEFAULT_PIN_LENGTH;
use dcharge::encryptor::{CardFieldEncryptor, EncryptionError};
use dcharge::polling::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, PollingSupervisor};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Environment variable that overrides `encryption_key`.
pub const KEY_ENV: &str = "DCHARGE_ENCRYPTION_KEY";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "dcharge.toml";

/// Top-level configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Base64 merchant key (32 bytes decoded).
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Digits in a card PIN (default: `4`).
    #[serde(default = "default_pin_length")]
    pub pin_length: usize,

    /// Settlement polling parameters.
    #[serde(default)]
    pub polling: PollingConfig,
}

impl std::fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliConfig")
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
            .field("pin_length", &self.pin_length)
            .field("polling", &self.polling)
            .finish()
    }
}

/// Settlement polling parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between fetches in milliseconds (default: `3000`).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Fetches before giving up (default: `10`, must be at least 1).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: NonZeroU32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

const fn default_pin_length() -> usize {
    DEFAULT_PIN_LENGTH
}

fn default_interval_ms() -> u64 {
    u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(u64::MAX)
}

const fn default_max_attempts() -> NonZeroU32 {
    DEFAULT_MAX_ATTEMPTS
}

impl CliConfig {
    /// Loads configuration from `path`, or from the process environment and
    /// defaults if the file does not exist.
    ///
    /// String values with `$VAR` / `${VAR}` references are expanded from the
    /// process environment, and `DCHARGE_ENCRYPTION_KEY` overrides the file's key.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, CliError> {
        let content = if path.exists() {
            std::fs::read_to_string(path)?
        } else {
            String::new()
        };
        Self::parse(&content, |name| std::env::var(name).ok())
    }

    /// Parses configuration text, resolving variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if the expanded text is not valid configuration.
    pub fn parse(content: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CliError> {
        let expanded = expand_env_vars(content, &lookup);
        let mut config: Self = toml::from_str(&expanded)?;

        if let Some(key) = lookup(KEY_ENV).filter(|k| !k.trim().is_empty()) {
            config.encryption_key = Some(key);
        }
        Ok(config)
    }

    /// Builds an encryptor from the configured key and PIN length.
    ///
    /// A key that is empty or still an unresolved `$VAR` reference counts as
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`EncryptionError::MissingKey`] if no key is configured, or a
    /// cipher error if the key is not base64 of 32 bytes.
    pub fn encryptor(&self) -> Result<CardFieldEncryptor, EncryptionError> {
        let key = self
            .encryption_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.starts_with('$'))
            .unwrap_or_default();
        Ok(CardFieldEncryptor::from_base64_key(key)?.with_pin_length(self.pin_length))
    }

    /// Builds the polling supervisor described by `[polling]`.
    #[must_use]
    pub const fn supervisor(&self) -> PollingSupervisor {
        PollingSupervisor::new(
            Duration::from_millis(self.polling.interval_ms),
            self.polling.max_attempts,
        )
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string through `lookup`.
///
/// Unresolved variables are left as-is.
fn expand_env_vars(input: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        let braced = chars.next_if_eq(&'{').is_some();
        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            var_name.push(c);
            chars.next();
        }

        match lookup(&var_name) {
            Some(value) if !var_name.is_empty() => result.push_str(&value),
            _ => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&var_name);
                if braced {
                    result.push('}');
                }
            }
        }
    }

    result
}
