//! # tapguard-card
//!
//! Card sessions for tap-style signing cards: connect, run one operation,
//! always close. Lockout handling sits on top through the rate-limit
//! tracker, and [`CardClient`] ties both to a native card engine.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod registry;
pub mod session;
pub mod tracker;
pub mod transport;

pub use client::CardClient;
pub use config::{CardConfig, CONFIG_ENV_VAR};
pub use engine::{
    CardOperation, CardStatus, Cvc, NativeCardApi, SatscardStatus, SignerEngine, UnsealedSlot,
};
pub use error::{
    CardError, ConfigError, NativeError, Result, TransportError, UserHint, BAD_AUTH_MARKER,
    RATE_LIMIT_MARKER,
};
pub use handle::{CardHandle, CANNOT_CONNECT_MESSAGE, DEFAULT_TIMEOUT_MS};
pub use registry::{InMemoryRateLimitRegistry, RateLimitRegistry};
pub use session::{CardFuture, TagResponse};
pub use tracker::RateLimitTracker;
pub use transport::{CardTransport, DataRecord, TagTransport};
