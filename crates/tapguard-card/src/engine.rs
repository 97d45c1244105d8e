//! Signer engine boundary
//!
//! The native card engine speaks the card protocol over a transport and
//! reports failures as plain text. [`SignerEngine`] is the one place that
//! text is turned into a [`CardError`]; nothing above it inspects strings.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use tapguard_core::{Fingerprint, SignatureEntry};

use crate::error::{NativeError, Result};
use crate::handle::CardHandle;
use crate::transport::{CardTransport, DataRecord};

/// Card verification code (zeroized on drop)
#[derive(Clone)]
pub struct Cvc(Zeroizing<String>);

impl Cvc {
    pub fn new(code: impl Into<String>) -> Self {
        Self(Zeroizing::new(code.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Cvc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cvc(..)")
    }
}

/// What a TapSigner reports about itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStatus {
    /// Remaining lockout delay in seconds (0 when unlocked)
    pub auth_delay_secs: u32,
    /// Whether the card has a chain code and CVC set
    pub is_setup: bool,
    /// Block height the card was first set up at
    pub birth_height: Option<u32>,
    /// Card applet version
    pub applet_version: String,
}

impl CardStatus {
    pub fn is_rate_limited(&self) -> bool {
        self.auth_delay_secs > 0
    }
}

/// What a Satscard reports about itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatscardStatus {
    /// Index of the slot currently in use
    pub active_slot: u32,
    /// Total slots on the card
    pub num_slots: u32,
    /// Remaining lockout delay in seconds
    pub auth_delay_secs: u32,
}

/// Slot revealed by unsealing a Satscard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsealedSlot {
    pub index: u32,
    pub address: String,
}

/// Card operation classes, as seen by the rate-limit tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardOperation {
    CardStatus,
    Setup,
    ChangeCvc,
    HealthCheck,
    SignTransaction,
    SignMessage,
    GetBackup,
    CacheXpub,
    CreateSigner,
    SatscardStatus,
    Unseal,
}

impl CardOperation {
    /// Whether success proves the lockout is over
    ///
    /// Status queries succeed during a lockout, so they leave the flag alone.
    pub fn clears_rate_limit(&self) -> bool {
        self.requires_auth()
    }

    /// Whether the operation presents a CVC to the card
    ///
    /// Only these wait out a recorded lockout first; a status query reports
    /// the remaining delay instead.
    pub fn requires_auth(&self) -> bool {
        !matches!(
            self,
            CardOperation::CardStatus | CardOperation::SatscardStatus
        )
    }
}

impl fmt::Display for CardOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Raw native card API; every error is the engine's own text
#[async_trait]
pub trait NativeCardApi: Send + Sync {
    async fn card_status(
        &self,
        transport: &mut dyn CardTransport,
    ) -> std::result::Result<CardStatus, NativeError>;

    /// Block until the card's lockout delay has run out
    async fn wait_for_unlock(
        &self,
        transport: &mut dyn CardTransport,
    ) -> std::result::Result<CardStatus, NativeError>;

    async fn setup(
        &self,
        transport: &mut dyn CardTransport,
        starting_cvc: &Cvc,
        new_cvc: &Cvc,
        chain_code: Option<[u8; 32]>,
    ) -> std::result::Result<(), NativeError>;

    async fn change_cvc(
        &self,
        transport: &mut dyn CardTransport,
        old_cvc: &Cvc,
        new_cvc: &Cvc,
    ) -> std::result::Result<(), NativeError>;

    /// Returns the fingerprint the card's key reports
    async fn health_check(
        &self,
        transport: &mut dyn CardTransport,
        cvc: &Cvc,
    ) -> std::result::Result<Fingerprint, NativeError>;

    /// Sign a base64 PSBT, returning the signed PSBT
    async fn sign_transaction(
        &self,
        transport: &mut dyn CardTransport,
        cvc: &Cvc,
        psbt: &str,
    ) -> std::result::Result<String, NativeError>;

    async fn sign_message(
        &self,
        transport: &mut dyn CardTransport,
        cvc: &Cvc,
        message: &[u8],
        derivation_path: &str,
    ) -> std::result::Result<SignatureEntry, NativeError>;

    /// Encrypted backup blob
    async fn get_backup(
        &self,
        transport: &mut dyn CardTransport,
        cvc: &Cvc,
    ) -> std::result::Result<Vec<u8>, NativeError>;

    async fn cache_xpubs(
        &self,
        transport: &mut dyn CardTransport,
        cvc: &Cvc,
    ) -> std::result::Result<(), NativeError>;

    async fn create_signer(
        &self,
        transport: &mut dyn CardTransport,
        cvc: &Cvc,
        name: &str,
    ) -> std::result::Result<Fingerprint, NativeError>;

    async fn satscard_status(
        &self,
        transport: &mut dyn CardTransport,
    ) -> std::result::Result<SatscardStatus, NativeError>;

    async fn unseal(
        &self,
        transport: &mut dyn CardTransport,
        cvc: &Cvc,
    ) -> std::result::Result<UnsealedSlot, NativeError>;

    /// Encode a PSBT as the records a Coldcard-style tag reads
    fn transaction_records(&self, psbt: &str) -> std::result::Result<Vec<DataRecord>, NativeError>;

    /// Encode a wallet configuration as tag records
    fn wallet_records(&self, wallet_config: &str)
        -> std::result::Result<Vec<DataRecord>, NativeError>;
}

/// Typed adapter over a [`NativeCardApi`]
pub struct SignerEngine<N> {
    native: N,
}

impl<N: NativeCardApi> SignerEngine<N> {
    pub fn new(native: N) -> Self {
        Self { native }
    }

    pub fn native(&self) -> &N {
        &self.native
    }

    pub async fn card_status<T: CardTransport>(
        &self,
        handle: &mut CardHandle<T>,
    ) -> Result<CardStatus> {
        Ok(self.native.card_status(handle.transport_mut()).await?)
    }

    pub async fn wait_for_unlock<T: CardTransport>(
        &self,
        handle: &mut CardHandle<T>,
    ) -> Result<CardStatus> {
        Ok(self.native.wait_for_unlock(handle.transport_mut()).await?)
    }

    pub async fn setup<T: CardTransport>(
        &self,
        handle: &mut CardHandle<T>,
        starting_cvc: &Cvc,
        new_cvc: &Cvc,
        chain_code: Option<[u8; 32]>,
    ) -> Result<()> {
        Ok(self
            .native
            .setup(handle.transport_mut(), starting_cvc, new_cvc, chain_code)
            .await?)
    }

    pub async fn change_cvc<T: CardTransport>(
        &self,
        handle: &mut CardHandle<T>,
        old_cvc: &Cvc,
        new_cvc: &Cvc,
    ) -> Result<()> {
        Ok(self
            .native
            .change_cvc(handle.transport_mut(), old_cvc, new_cvc)
            .await?)
    }

    pub async fn health_check<T: CardTransport>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: &Cvc,
    ) -> Result<Fingerprint> {
        Ok(self.native.health_check(handle.transport_mut(), cvc).await?)
    }

    pub async fn sign_transaction<T: CardTransport>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: &Cvc,
        psbt: &str,
    ) -> Result<String> {
        Ok(self
            .native
            .sign_transaction(handle.transport_mut(), cvc, psbt)
            .await?)
    }

    pub async fn sign_message<T: CardTransport>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: &Cvc,
        message: &[u8],
        derivation_path: &str,
    ) -> Result<SignatureEntry> {
        Ok(self
            .native
            .sign_message(handle.transport_mut(), cvc, message, derivation_path)
            .await?)
    }

    pub async fn get_backup<T: CardTransport>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: &Cvc,
    ) -> Result<Vec<u8>> {
        Ok(self.native.get_backup(handle.transport_mut(), cvc).await?)
    }

    pub async fn cache_xpubs<T: CardTransport>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: &Cvc,
    ) -> Result<()> {
        Ok(self.native.cache_xpubs(handle.transport_mut(), cvc).await?)
    }

    pub async fn create_signer<T: CardTransport>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: &Cvc,
        name: &str,
    ) -> Result<Fingerprint> {
        Ok(self
            .native
            .create_signer(handle.transport_mut(), cvc, name)
            .await?)
    }

    pub async fn satscard_status<T: CardTransport>(
        &self,
        handle: &mut CardHandle<T>,
    ) -> Result<SatscardStatus> {
        Ok(self.native.satscard_status(handle.transport_mut()).await?)
    }

    pub async fn unseal<T: CardTransport>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: &Cvc,
    ) -> Result<UnsealedSlot> {
        Ok(self.native.unseal(handle.transport_mut(), cvc).await?)
    }

    pub fn transaction_records(&self, psbt: &str) -> Result<Vec<DataRecord>> {
        Ok(self.native.transaction_records(psbt)?)
    }

    pub fn wallet_records(&self, wallet_config: &str) -> Result<Vec<DataRecord>> {
        Ok(self.native.wallet_records(wallet_config)?)
    }
}
