//! Quorum authorization
//!
//! Collects one signature per required signer over the same challenge and
//! turns the set into an [`AuthorizationBundle`]. The build is all or
//! nothing: one bad entry fails it and nothing is returned.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use tapguard_core::{SecurityQuestionToken, SignatureEntry, VerifyToken};

use crate::bundle::AuthorizationBundle;
use crate::error::{AuthzError, Result};
use crate::token::{CompactTokenDeriver, TokenDeriver};

/// Signatures keyed by signer fingerprint, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureSet {
    entries: IndexMap<String, String>,
}

impl SignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a signer's signature
    ///
    /// A replaced signer keeps its original position.
    pub fn insert(&mut self, fingerprint: impl Into<String>, signature_hex: impl Into<String>) {
        self.entries.insert(fingerprint.into(), signature_hex.into());
    }

    pub fn insert_entry(&mut self, entry: &SignatureEntry) {
        self.insert(entry.fingerprint.to_hex(), entry.signature_hex.clone());
    }

    pub fn remove(&mut self, fingerprint: &str) -> Option<String> {
        self.entries.shift_remove(fingerprint)
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SignatureSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (fingerprint, signature) in iter {
            set.insert(fingerprint, signature);
        }
        set
    }
}

impl From<Vec<SignatureEntry>> for SignatureSet {
    fn from(entries: Vec<SignatureEntry>) -> Self {
        let mut set = Self::new();
        for entry in &entries {
            set.insert_entry(entry);
        }
        set
    }
}

/// Builds authorization bundles from signature sets
#[derive(Clone)]
pub struct QuorumAggregator {
    deriver: Arc<dyn TokenDeriver>,
}

impl Default for QuorumAggregator {
    fn default() -> Self {
        Self::new(Arc::new(CompactTokenDeriver))
    }
}

impl QuorumAggregator {
    pub fn new(deriver: Arc<dyn TokenDeriver>) -> Self {
        Self { deriver }
    }

    /// Derive one token per signer and assemble the bundle
    pub fn build(
        &self,
        signatures: &SignatureSet,
        verify_token: Option<VerifyToken>,
        security_question_token: Option<SecurityQuestionToken>,
    ) -> Result<AuthorizationBundle> {
        let tokens = signatures
            .iter()
            .map(|(fingerprint, signature)| {
                self.deriver
                    .derive(fingerprint, signature)
                    .map_err(|e| AuthzError::Aggregation {
                        fingerprint: fingerprint.to_string(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Built authorization bundle with {} signer tokens", tokens.len());

        Ok(AuthorizationBundle {
            tokens,
            verify_token,
            security_question_token,
        })
    }
}
