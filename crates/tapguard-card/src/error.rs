//! Error types for card sessions

use thiserror::Error;

/// Result type alias for card operations
pub type Result<T> = std::result::Result<T, CardError>;

/// Marker the native engine embeds when the card reports its lockout delay
pub const RATE_LIMIT_MARKER: &str = "RATE_LIMIT";

/// Marker the native engine embeds when the card rejects the CVC
pub const BAD_AUTH_MARKER: &str = "BAD_AUTH";

/// Classified outcome of a failed card operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardError {
    /// Card could not be reached or the tag was lost; the user must retap
    #[error("Connection error: {0}")]
    Connection(String),

    /// Card hardware lockout is active
    #[error("Card is rate limited: {0}")]
    RateLimited(String),

    /// Wrong CVC, reported only while no lockout is known for the card
    #[error("Bad auth: {0}")]
    BadAuth(String),

    /// Any other card or engine failure, passed through unchanged
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// What the user should be told for a card failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserHint {
    RetapCard,
    CardTemporarilyLocked,
    WrongCode,
    Unexpected,
}

impl CardError {
    /// Classify a raw native engine message by its embedded marker
    pub fn classify(message: &str) -> Self {
        if message.contains(RATE_LIMIT_MARKER) {
            CardError::RateLimited(message.to_string())
        } else if message.contains(BAD_AUTH_MARKER) {
            CardError::BadAuth(message.to_string())
        } else {
            CardError::Protocol(message.to_string())
        }
    }

    pub fn user_hint(&self) -> UserHint {
        match self {
            CardError::Connection(_) => UserHint::RetapCard,
            CardError::RateLimited(_) => UserHint::CardTemporarilyLocked,
            CardError::BadAuth(_) => UserHint::WrongCode,
            CardError::Protocol(_) => UserHint::Unexpected,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CardError::RateLimited(_))
    }
}

/// Failure raised by a card transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// Tag left the field mid-exchange
    #[error("Tag was lost")]
    TagLost,

    /// Underlying I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport cannot perform the requested step
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl From<TransportError> for CardError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::TagLost | TransportError::Io(_) => CardError::Connection(e.to_string()),
            TransportError::Unsupported(_) => CardError::Protocol(e.to_string()),
        }
    }
}

/// Raw error text returned by the native card engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct NativeError(pub String);

impl From<NativeError> for CardError {
    fn from(e: NativeError) -> Self {
        CardError::classify(&e.0)
    }
}

/// Configuration load/save failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
