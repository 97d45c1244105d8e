//! Handle for one physical card tap
//!
//! The handle owns the transport for the tap. Sessions borrow it mutably, so
//! the type system already rules out two concurrent sessions on the same
//! handle. Two handles for the same card (two taps racing) remain a caller
//! error.

use std::time::Duration;

use tracing::{debug, warn};

use tapguard_core::CardId;

use crate::error::{CardError, Result};
use crate::transport::{CardTransport, DataRecord, TagTransport};

/// Message surfaced when a tap cannot be connected
pub const CANNOT_CONNECT_MESSAGE: &str = "cannot connect to nfc card";

/// Default read/write timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// One tap session's card
pub struct CardHandle<T: CardTransport> {
    transport: T,
    card_id: CardId,
    timeout: Duration,
    live: bool,
}

impl<T: CardTransport> CardHandle<T> {
    /// Wrap a transport, deriving the card id from its tag id
    pub fn new(transport: T) -> Self {
        let card_id = CardId::from_tag_id(transport.tag_id());
        Self {
            transport,
            card_id,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            live: false,
        }
    }

    pub fn card_id(&self) -> &CardId {
        &self.card_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a session currently holds the card open
    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send one raw command
    pub async fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        Ok(self.transport.transceive(command).await?)
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        self.transport.set_timeout(timeout);
    }

    /// Connect, failing unless the transport reports connected afterwards
    pub(crate) async fn open(&mut self) -> Result<()> {
        if let Err(e) = self.transport.connect().await {
            debug!("Connect to card {} failed: {}", self.card_id, e);
        }

        if !self.transport.is_connected() {
            return Err(CardError::Connection(CANNOT_CONNECT_MESSAGE.to_string()));
        }

        self.live = true;
        debug!("Card {} connected", self.card_id);
        Ok(())
    }

    /// Close the transport; a close failure is logged and never surfaced
    pub(crate) async fn release(&mut self) {
        if let Err(e) = self.transport.close().await {
            warn!("Failed to close card {}: {}", self.card_id, e);
        }
        self.live = false;
    }
}

impl<T: TagTransport> CardHandle<T> {
    /// Write data records back to the tag
    pub async fn write_records(&mut self, records: &[DataRecord]) -> Result<()> {
        debug!("Writing {} records to card {}", records.len(), self.card_id);
        Ok(self.transport.write_records(records).await?)
    }
}
