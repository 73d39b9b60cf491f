#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Card field encryption and charge authorization for direct card charges.
//!
//! Card number, CVV, expiry and PIN never leave the process in plaintext: they
//! are validated and sealed with AES-256-GCM under a merchant key, then sent to
//! the processor as base64 ciphertext. The processor may answer a charge with a
//! follow-up step (PIN, OTP, address, redirect, offline instruction); the state
//! machine tracks those steps until the charge reaches a terminal status.
//!
//! # Overview
//!
//! ```text
//! RawCard ─► CardFieldEncryptor ─► DirectChargeRequest ─► ChargeTransport
//!                                                              │
//!        AuthorizationSubmission ◄── NextAction ◄── ChargeState ◄┘
//!                │
//!                └─► ChargeAuthorizationMachine ─► PollingSupervisor
//! ```
//!
//! # Modules
//!
//! - [`cipher`] - AES-256-GCM field cipher, keys and nonces
//! - [`encoding`] - Base64 text wrapper
//! - [`card`] - Plaintext card and PIN input, brand detection, validation
//! - [`encryptor`] - Group encryption of card and PIN submissions
//! - [`next_action`] - What the payer must do next
//! - [`authorization`] - What the payer supplied in answer
//! - [`charge`] - Charge status and state snapshot
//! - [`machine`] - The authorization state machine
//! - [`polling`] - Bounded, cancellable settlement polling
//! - [`transport`] - Boundary trait to the processor API
//! - [`hooks`] - Lifecycle notifications
//! - [`proto`] - Wire types and error reason codes
//! - [`error`] - State machine and protocol errors
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod authorization;
pub mod card;
pub mod charge;
pub mod cipher;
pub mod encoding;
pub mod encryptor;
pub mod error;
pub mod hooks;
pub mod machine;
pub mod next_action;
pub mod polling;
pub mod proto;
pub mod transport;

pub use authorization::AuthorizationSubmission;
pub use charge::{ChargeState, ChargeStatus};
pub use encryptor::CardFieldEncryptor;
pub use error::ChargeError;
pub use machine::ChargeAuthorizationMachine;
pub use next_action::NextAction;
pub use polling::{PollOutcome, PollingSupervisor};
pub use transport::ChargeTransport;
