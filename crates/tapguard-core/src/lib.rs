//! Tapguard Core - Shared types for card sessions and privileged-action authorization
//!
//! This crate provides the vocabulary shared by the card and authorization
//! crates: card and signer identifiers, signature entries, the opaque tokens
//! exchanged with the server, and a software signer that produces the same
//! signature entries a hardware card does.

pub mod error;
pub mod software;
pub mod target;
pub mod types;

pub use error::{CoreError, RemoteError, Result};
pub use software::{verify_entry, SoftwareSigner};
pub use target::TargetAction;
pub use types::{
    AuthorizationToken, CardId, Fingerprint, SecurityQuestionToken, SignatureEntry, VerifyToken,
};

/// Length of a signer fingerprint in bytes
pub const FINGERPRINT_LEN: usize = 4;

/// Message surfaced when a remote failure carries no text
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";
