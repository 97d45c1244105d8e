//! Software signer producing the same signature entries a card does
//!
//! The signer holds a secp256k1 key in memory and signs the SHA-256 digest
//! of the challenge message (RFC6979 deterministic nonces). Its fingerprint
//! is the first four bytes of SHA-256 over the compressed public key.

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{CoreError, Result};
use crate::types::{Fingerprint, SignatureEntry};
use crate::FINGERPRINT_LEN;

/// In-memory secp256k1 signer
pub struct SoftwareSigner {
    signing_key: SigningKey,
    fingerprint: Fingerprint,
}

impl SoftwareSigner {
    /// Build a signer from a 32-byte secret
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Result<Self> {
        let secret = Zeroizing::new(*secret);
        let signing_key = SigningKey::from_slice(&secret[..])
            .map_err(|e| CoreError::Crypto(format!("Invalid secret key: {}", e)))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Generate a fresh random signer
    pub fn random() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let fingerprint = fingerprint_of(&compressed_public_key(signing_key.verifying_key()));
        Self {
            signing_key,
            fingerprint,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Compressed SEC1 public key
    pub fn public_key(&self) -> [u8; 33] {
        compressed_public_key(self.signing_key.verifying_key())
    }

    /// Sign a challenge message
    pub fn sign(&self, message: &[u8]) -> SignatureEntry {
        let signature: Signature = self.signing_key.sign(message);
        SignatureEntry::new(self.fingerprint, hex::encode(signature.to_bytes()))
    }
}

/// Verify a signature entry against a compressed public key
pub fn verify_entry(public_key: &[u8; 33], message: &[u8], entry: &SignatureEntry) -> Result<()> {
    let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| CoreError::Crypto(format!("Invalid public key: {}", e)))?;

    if fingerprint_of(public_key) != entry.fingerprint {
        return Err(CoreError::Crypto(
            "Fingerprint does not match public key".to_string(),
        ));
    }

    let bytes = hex::decode(&entry.signature_hex)?;
    let signature = Signature::from_slice(&bytes)
        .map_err(|e| CoreError::Crypto(format!("Invalid signature: {}", e)))?;

    verifying_key
        .verify(message, &signature)
        .map_err(|_| CoreError::Crypto("Signature verification failed".to_string()))
}

fn compressed_public_key(key: &VerifyingKey) -> [u8; 33] {
    let encoded = key.to_encoded_point(true);
    let mut result = [0u8; 33];
    result.copy_from_slice(encoded.as_bytes());
    result
}

fn fingerprint_of(public_key: &[u8; 33]) -> Fingerprint {
    let digest = Sha256::digest(public_key);
    let mut bytes = [0u8; FINGERPRINT_LEN];
    bytes.copy_from_slice(&digest[..FINGERPRINT_LEN]);
    Fingerprint::new(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = SoftwareSigner::random();
        let entry = signer.sign(b"delete wallet 42");

        assert_eq!(entry.fingerprint, signer.fingerprint());
        assert_eq!(entry.signature_hex.len(), 128);
        verify_entry(&signer.public_key(), b"delete wallet 42", &entry).unwrap();
        assert!(verify_entry(&signer.public_key(), b"delete wallet 43", &entry).is_err());
    }

    #[test]
    fn test_deterministic_from_secret() {
        let a = SoftwareSigner::from_secret_bytes(&[0x11; 32]).unwrap();
        let b = SoftwareSigner::from_secret_bytes(&[0x11; 32]).unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.sign(b"challenge"), b.sign(b"challenge"));
    }

    #[test]
    fn test_zero_secret_rejected() {
        assert!(SoftwareSigner::from_secret_bytes(&[0u8; 32]).is_err());
    }
}
