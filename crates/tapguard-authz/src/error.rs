//! Error types for privileged-action authorization

use tapguard_card::CardError;
use thiserror::Error;

/// Result type alias for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;

/// Errors that can occur while authorizing a privileged action
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    /// Step-up verification failed; the message is shown as is
    #[error("{0}")]
    Verification(String),

    /// A signer's token could not be derived; no bundle was built
    #[error("Cannot authorize signer {fingerprint}: {reason}")]
    Aggregation { fingerprint: String, reason: String },

    /// Card failure while collecting a signature
    #[error("Card error: {0}")]
    Card(#[from] CardError),

    /// Call not allowed in the session's current state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// User dismissed the verification prompt
    #[error("Verification cancelled")]
    Cancelled,

    /// Policy server rejected the request
    #[error("Submission failed: {0}")]
    Submission(String),
}

/// Why a single token derivation failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeriveError {
    #[error("fingerprint must be 8 hex characters, got {0:?}")]
    InvalidFingerprint(String),

    #[error("signature is not hex")]
    SignatureNotHex,

    #[error("signature must be 64 or 65 bytes, got {0}")]
    SignatureLength(usize),

    /// Failure reported by an injected derivation engine
    #[error("{0}")]
    Engine(String),
}
