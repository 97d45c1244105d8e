//! Transport abstraction for tapped cards
//!
//! A transport is one NFC connection to one physical tag. The raw
//! request/response primitive is [`CardTransport::transceive`]; tags that
//! accept data records (Coldcard-style NDEF) also implement [`TagTransport`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Connection to one tapped card
#[async_trait]
pub trait CardTransport: Send {
    /// Hardware tag id reported by the NFC stack
    fn tag_id(&self) -> &[u8];

    /// Apply the read/write timeout for subsequent exchanges
    fn set_timeout(&mut self, timeout: Duration);

    /// Open the connection
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Whether the connection is currently open
    fn is_connected(&self) -> bool;

    /// Close the connection
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Send one command and wait for the response
    async fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError>;
}

/// Transport for tags that accept written data records
#[async_trait]
pub trait TagTransport: CardTransport {
    /// Write the records as one message, replacing the tag's content
    async fn write_records(&mut self, records: &[DataRecord]) -> Result<(), TransportError>;
}

/// Typed payload written to a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRecord {
    /// MIME type of the payload
    pub media_type: String,
    /// Payload bytes
    pub payload: Vec<u8>,
}

impl DataRecord {
    pub fn mime(media_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            media_type: media_type.into(),
            payload: payload.into(),
        }
    }

    /// Plain UTF-8 text record
    pub fn text(text: &str) -> Self {
        Self::mime("text/plain", text.as_bytes())
    }
}

#[async_trait]
impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn tag_id(&self) -> &[u8] {
        (**self).tag_id()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        (**self).set_timeout(timeout)
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        (**self).close().await
    }

    async fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        (**self).transceive(command).await
    }
}
