//! Per-signer request token derivation

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use tapguard_core::{AuthorizationToken, Fingerprint};

use crate::error::DeriveError;

/// Turns one signer's signature into the token the server expects
///
/// Derivation is local and synchronous; implementations must not touch the
/// network.
pub trait TokenDeriver: Send + Sync {
    fn derive(
        &self,
        fingerprint: &str,
        signature_hex: &str,
    ) -> std::result::Result<AuthorizationToken, DeriveError>;
}

/// `<fingerprint>.<base64url signature>` tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactTokenDeriver;

impl CompactTokenDeriver {
    pub fn new() -> Self {
        Self
    }
}

impl TokenDeriver for CompactTokenDeriver {
    fn derive(
        &self,
        fingerprint: &str,
        signature_hex: &str,
    ) -> std::result::Result<AuthorizationToken, DeriveError> {
        let fingerprint = Fingerprint::from_hex(fingerprint)
            .map_err(|_| DeriveError::InvalidFingerprint(fingerprint.to_string()))?;

        let signature = hex::decode(signature_hex).map_err(|_| DeriveError::SignatureNotHex)?;
        if !matches!(signature.len(), 64 | 65) {
            return Err(DeriveError::SignatureLength(signature.len()));
        }

        Ok(AuthorizationToken::new(format!(
            "{}.{}",
            fingerprint.to_hex(),
            URL_SAFE_NO_PAD.encode(&signature)
        )))
    }
}
