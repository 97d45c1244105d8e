//! Error types for the tapguard core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while building core values
#[derive(Debug, Error)]
pub enum CoreError {
    /// Fingerprint is not 8 hex characters
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// Hex decoding failed
    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Target action name not recognized
    #[error("Unknown target action: {0}")]
    UnknownTargetAction(String),

    /// Key or signature material rejected
    #[error("Crypto error: {0}")]
    Crypto(String),
}

/// Failure reported by a remote repository (identity or policy server)
///
/// The message is carried verbatim so the caller can show it to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Raw message as received
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Message to surface, falling back to a generic text when the server sent none
    pub fn message_or_unknown(&self) -> String {
        if self.message.trim().is_empty() {
            crate::UNKNOWN_ERROR_MESSAGE.to_string()
        } else {
            self.message.clone()
        }
    }
}

impl From<String> for RemoteError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for RemoteError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
