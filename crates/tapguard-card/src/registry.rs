//! Per-card "needs wait" flags
//!
//! The flag records that a card was last seen in hardware lockout. It is
//! keyed by [`CardId`] and shared by every session in the process.

use std::collections::HashMap;

use parking_lot::Mutex;

use tapguard_core::CardId;

/// Store of per-card lockout flags
///
/// Implementations must make [`RateLimitRegistry::update`] atomic for a
/// card; the tracker relies on it for read-modify-write.
pub trait RateLimitRegistry: Send + Sync {
    /// Whether the card was last seen locked out (false for unknown cards)
    fn needs_wait(&self, card_id: &CardId) -> bool;

    fn set_needs_wait(&self, card_id: &CardId, value: bool);

    /// Atomically replace the flag with `f(current)`, returning the old value
    fn update(&self, card_id: &CardId, f: &mut dyn FnMut(bool) -> bool) -> bool;

    /// Forget every card
    fn clear(&self);
}

/// Process-local registry
#[derive(Debug, Default)]
pub struct InMemoryRateLimitRegistry {
    flags: Mutex<HashMap<CardId, bool>>,
}

impl InMemoryRateLimitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cards with a recorded flag
    pub fn len(&self) -> usize {
        self.flags.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.lock().is_empty()
    }
}

impl RateLimitRegistry for InMemoryRateLimitRegistry {
    fn needs_wait(&self, card_id: &CardId) -> bool {
        self.flags.lock().get(card_id).copied().unwrap_or(false)
    }

    fn set_needs_wait(&self, card_id: &CardId, value: bool) {
        self.flags.lock().insert(card_id.clone(), value);
    }

    fn update(&self, card_id: &CardId, f: &mut dyn FnMut(bool) -> bool) -> bool {
        let mut flags = self.flags.lock();
        let entry = flags.entry(card_id.clone()).or_insert(false);
        let previous = *entry;
        *entry = f(previous);
        previous
    }

    fn clear(&self) {
        self.flags.lock().clear();
    }
}
