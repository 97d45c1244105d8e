//! Rate-limit recovery
//!
//! Cards lock out CVC attempts for an increasing delay after repeated
//! failures. Inside that window a fresh attempt comes back as `BAD_AUTH`
//! even though the cause is the lockout. The tracker remembers which cards
//! were last seen locked out, waits the lockout off before the next real
//! operation, and reports such `BAD_AUTH` failures as rate limiting.
//!
//! The first `BAD_AUTH` from a card that locked out without the tracker
//! noticing still reads as a wrong code.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, info, warn};

use tapguard_core::CardId;

use crate::engine::CardOperation;
use crate::error::{CardError, Result};
use crate::handle::CardHandle;
use crate::registry::RateLimitRegistry;
use crate::session::{self, CardFuture};
use crate::transport::CardTransport;

/// Wraps card sessions with per-card lockout memory
#[derive(Clone)]
pub struct RateLimitTracker {
    registry: Arc<dyn RateLimitRegistry>,
    wait_for_unlock: bool,
}

impl RateLimitTracker {
    pub fn new(registry: Arc<dyn RateLimitRegistry>) -> Self {
        Self {
            registry,
            wait_for_unlock: true,
        }
    }

    /// Skip the pre-operation wait even when a lockout is recorded
    pub fn with_wait_for_unlock(mut self, enabled: bool) -> Self {
        self.wait_for_unlock = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<dyn RateLimitRegistry> {
        &self.registry
    }

    /// Run `primary` in one card session
    ///
    /// When the card is flagged and the operation authenticates,
    /// `wait_unlock` runs first in the same tap; its failure is logged and
    /// otherwise ignored.
    pub async fn run<T, R, U, F>(
        &self,
        handle: &mut CardHandle<T>,
        timeout: Duration,
        operation: CardOperation,
        wait_unlock: U,
        primary: F,
    ) -> Result<R>
    where
        T: CardTransport + 'static,
        R: Send + 'static,
        U: for<'a> FnOnce(&'a mut CardHandle<T>) -> CardFuture<'a, ()> + Send + 'static,
        F: for<'a> FnOnce(&'a mut CardHandle<T>) -> CardFuture<'a, R> + Send + 'static,
    {
        let card_id = handle.card_id().clone();
        let should_wait = self.wait_for_unlock
            && operation.requires_auth()
            && self.registry.needs_wait(&card_id);

        let result = session::run(handle, timeout, move |h| {
            async move {
                if should_wait {
                    debug!("Waiting for card {} to unlock before {}", h.card_id(), operation);
                    if let Err(e) = wait_unlock(&mut *h).await {
                        warn!("Wait for unlock on card {} failed: {}", h.card_id(), e);
                    }
                }
                primary(h).await
            }
            .boxed()
        })
        .await;

        self.record(&card_id, operation, result)
    }

    /// Update the flag from an outcome and reclassify it if needed
    fn record<R>(
        &self,
        card_id: &CardId,
        operation: CardOperation,
        result: Result<R>,
    ) -> Result<R> {
        match result {
            Ok(value) => {
                if operation.clears_rate_limit() {
                    let was_flagged = self.registry.update(card_id, &mut |_| false);
                    if was_flagged {
                        debug!("Lockout on card {} cleared by {}", card_id, operation);
                    }
                }
                Ok(value)
            }
            Err(CardError::RateLimited(message)) => {
                if !self.registry.update(card_id, &mut |_| true) {
                    info!("Card {} is rate limited", card_id);
                }
                Err(CardError::RateLimited(message))
            }
            Err(CardError::BadAuth(message)) if self.registry.needs_wait(card_id) => {
                debug!("Bad auth from card {} during lockout", card_id);
                Err(CardError::RateLimited(message))
            }
            Err(e) => Err(e),
        }
    }
}
