//! Operator tool for direct card charges.
//!
//! Encrypts card and PIN fields the way the client library sends them,
//! decrypts single fields for support investigations, and classifies saved
//! processor responses.
//!
//! # Modules
//!
//! - [`commands`] - Command implementations returning JSON
//! - [`config`] - Configuration with environment variable expansion
//! - [`error`] - Error types

pub mod commands;
pub mod config;
pub mod error;

pub use config::CliConfig;
pub use error::CliError;
