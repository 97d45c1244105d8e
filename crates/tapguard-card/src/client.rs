//! Card client: typed operations, each in its own tracked session

use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info};

use tapguard_core::{Fingerprint, SignatureEntry};

use crate::config::CardConfig;
use crate::engine::{
    CardOperation, CardStatus, Cvc, NativeCardApi, SatscardStatus, SignerEngine, UnsealedSlot,
};
use crate::error::{CardError, Result};
use crate::handle::CardHandle;
use crate::registry::RateLimitRegistry;
use crate::session::{self, CardFuture, TagResponse};
use crate::tracker::RateLimitTracker;
use crate::transport::{CardTransport, TagTransport};

/// Entry point for card operations
///
/// Every call is one tap: the handle is connected, the operation runs (after
/// a lockout wait when the card is flagged) and the handle is closed again.
pub struct CardClient<N> {
    engine: Arc<SignerEngine<N>>,
    tracker: RateLimitTracker,
    config: CardConfig,
}

impl<N: NativeCardApi + 'static> CardClient<N> {
    pub fn new(native: N, registry: Arc<dyn RateLimitRegistry>, config: CardConfig) -> Self {
        let tracker = RateLimitTracker::new(registry).with_wait_for_unlock(config.wait_for_unlock);
        Self {
            engine: Arc::new(SignerEngine::new(native)),
            tracker,
            config,
        }
    }

    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    pub fn engine(&self) -> &SignerEngine<N> {
        &self.engine
    }

    pub fn registry(&self) -> &Arc<dyn RateLimitRegistry> {
        self.tracker.registry()
    }

    async fn tracked<T, R, F>(
        &self,
        handle: &mut CardHandle<T>,
        operation: CardOperation,
        primary: F,
    ) -> Result<R>
    where
        T: CardTransport + 'static,
        R: Send + 'static,
        F: for<'a> FnOnce(&'a mut CardHandle<T>) -> CardFuture<'a, R> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        self.tracker
            .run(
                handle,
                self.config.transceive_timeout(),
                operation,
                move |h| {
                    async move {
                        let status = engine.wait_for_unlock(h).await?;
                        debug!("Card {} unlocked (delay {}s)", h.card_id(), status.auth_delay_secs);
                        Ok::<(), CardError>(())
                    }
                    .boxed()
                },
                primary,
            )
            .await
    }

    pub async fn card_status<T: CardTransport + 'static>(
        &self,
        handle: &mut CardHandle<T>,
    ) -> Result<CardStatus> {
        let engine = Arc::clone(&self.engine);
        self.tracked(handle, CardOperation::CardStatus, move |h| {
            async move { engine.card_status(h).await }.boxed()
        })
        .await
    }

    /// First-time setup: replace the factory CVC and set the chain code
    pub async fn setup<T: CardTransport + 'static>(
        &self,
        handle: &mut CardHandle<T>,
        starting_cvc: Cvc,
        new_cvc: Cvc,
        chain_code: Option<[u8; 32]>,
    ) -> Result<()> {
        let engine = Arc::clone(&self.engine);
        self.tracked(handle, CardOperation::Setup, move |h| {
            async move { engine.setup(h, &starting_cvc, &new_cvc, chain_code).await }.boxed()
        })
        .await?;
        info!("Card {} set up", handle.card_id());
        Ok(())
    }

    pub async fn change_cvc<T: CardTransport + 'static>(
        &self,
        handle: &mut CardHandle<T>,
        old_cvc: Cvc,
        new_cvc: Cvc,
    ) -> Result<()> {
        let engine = Arc::clone(&self.engine);
        self.tracked(handle, CardOperation::ChangeCvc, move |h| {
            async move { engine.change_cvc(h, &old_cvc, &new_cvc).await }.boxed()
        })
        .await
    }

    pub async fn health_check<T: CardTransport + 'static>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: Cvc,
    ) -> Result<Fingerprint> {
        let engine = Arc::clone(&self.engine);
        self.tracked(handle, CardOperation::HealthCheck, move |h| {
            async move { engine.health_check(h, &cvc).await }.boxed()
        })
        .await
    }

    /// Sign a base64 PSBT
    pub async fn sign_transaction<T: CardTransport + 'static>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: Cvc,
        psbt: String,
    ) -> Result<String> {
        let engine = Arc::clone(&self.engine);
        self.tracked(handle, CardOperation::SignTransaction, move |h| {
            async move { engine.sign_transaction(h, &cvc, &psbt).await }.boxed()
        })
        .await
    }

    /// Sign a challenge message with the key at `derivation_path`
    pub async fn sign_message<T: CardTransport + 'static>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: Cvc,
        message: Vec<u8>,
        derivation_path: String,
    ) -> Result<SignatureEntry> {
        let engine = Arc::clone(&self.engine);
        self.tracked(handle, CardOperation::SignMessage, move |h| {
            async move {
                engine
                    .sign_message(h, &cvc, &message, &derivation_path)
                    .await
            }
            .boxed()
        })
        .await
    }

    pub async fn get_backup<T: CardTransport + 'static>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: Cvc,
    ) -> Result<Vec<u8>> {
        let engine = Arc::clone(&self.engine);
        self.tracked(handle, CardOperation::GetBackup, move |h| {
            async move { engine.get_backup(h, &cvc).await }.boxed()
        })
        .await
    }

    pub async fn cache_xpubs<T: CardTransport + 'static>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: Cvc,
    ) -> Result<()> {
        let engine = Arc::clone(&self.engine);
        self.tracked(handle, CardOperation::CacheXpub, move |h| {
            async move { engine.cache_xpubs(h, &cvc).await }.boxed()
        })
        .await
    }

    pub async fn create_signer<T: CardTransport + 'static>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: Cvc,
        name: String,
    ) -> Result<Fingerprint> {
        let engine = Arc::clone(&self.engine);
        self.tracked(handle, CardOperation::CreateSigner, move |h| {
            async move { engine.create_signer(h, &cvc, &name).await }.boxed()
        })
        .await
    }

    pub async fn satscard_status<T: CardTransport + 'static>(
        &self,
        handle: &mut CardHandle<T>,
    ) -> Result<SatscardStatus> {
        let engine = Arc::clone(&self.engine);
        self.tracked(handle, CardOperation::SatscardStatus, move |h| {
            async move { engine.satscard_status(h).await }.boxed()
        })
        .await
    }

    pub async fn unseal<T: CardTransport + 'static>(
        &self,
        handle: &mut CardHandle<T>,
        cvc: Cvc,
    ) -> Result<UnsealedSlot> {
        let engine = Arc::clone(&self.engine);
        self.tracked(handle, CardOperation::Unseal, move |h| {
            async move { engine.unseal(h, &cvc).await }.boxed()
        })
        .await
    }

    /// Write a PSBT to a Coldcard-style tag
    pub async fn export_transaction<T: TagTransport + 'static>(
        &self,
        handle: &mut CardHandle<T>,
        psbt: String,
    ) -> Result<()> {
        let engine = Arc::clone(&self.engine);
        session::run_and_write(handle, self.config.transceive_timeout(), move |_| {
            async move {
                let records = engine.transaction_records(&psbt)?;
                Ok::<_, CardError>(TagResponse::new((), records))
            }
            .boxed()
        })
        .await
    }

    /// Write a wallet configuration to a Coldcard-style tag
    pub async fn export_wallet<T: TagTransport + 'static>(
        &self,
        handle: &mut CardHandle<T>,
        wallet_config: String,
    ) -> Result<()> {
        let engine = Arc::clone(&self.engine);
        session::run_and_write(handle, self.config.transceive_timeout(), move |_| {
            async move {
                let records = engine.wallet_records(&wallet_config)?;
                Ok::<_, CardError>(TagResponse::new((), records))
            }
            .boxed()
        })
        .await
    }
}
