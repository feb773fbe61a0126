//! ECDSA key management for the light client
//!
//! Provides key pair generation, signing, and verification using the
//! secp256k1 elliptic curve, plus an explicitly unlocked signing
//! credential with an optional expiry checked on each use.

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::time::{Duration, Instant};
use thiserror::Error;

use super::address::Address;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Key handle expired")]
    Expired,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Derive the address of this key pair's public key
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key)
    }
}

/// Parse a compressed public key from a hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Sign a 32-byte digest with a secret key, returning the compact
/// 64-byte signature
pub fn sign_digest(secret_key: &SecretKey, digest: &[u8; 32]) -> Result<[u8; 64], KeyError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(digest)?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(signature.serialize_compact())
}

/// Verify a compact signature over a 32-byte digest
pub fn verify_digest(
    public_key: &PublicKey,
    digest: &[u8; 32],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(digest)?;
    let sig = secp256k1::ecdsa::Signature::from_compact(signature)
        .map_err(|_| KeyError::InvalidSignature)?;

    match secp.verify_ecdsa(&message, &sig, public_key) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}

// =============================================================================
// Key Handle
// =============================================================================

/// An unlocked signing credential with an optional expiry.
///
/// The expiry is checked on every signing call; once past it the handle
/// refuses to sign and a new one must be unlocked. This keeps the
/// "auto-locking" behavior without a background timer mutating shared
/// state.
pub struct KeyHandle {
    key_pair: KeyPair,
    valid_until: Option<Instant>,
}

impl KeyHandle {
    /// Unlock a key pair indefinitely
    pub fn unlock(key_pair: KeyPair) -> Self {
        Self {
            key_pair,
            valid_until: None,
        }
    }

    /// Unlock a key pair for a bounded duration
    pub fn unlock_for(key_pair: KeyPair, ttl: Duration) -> Self {
        Self {
            key_pair,
            valid_until: Some(Instant::now() + ttl),
        }
    }

    /// Whether the handle is still usable for signing
    pub fn is_unlocked(&self) -> bool {
        match self.valid_until {
            Some(deadline) => Instant::now() < deadline,
            None => true,
        }
    }

    /// The public key behind this handle
    pub fn public_key(&self) -> &PublicKey {
        &self.key_pair.public_key
    }

    /// The address this handle signs for
    pub fn address(&self) -> Address {
        self.key_pair.address()
    }

    /// Sign a 32-byte digest, failing if the handle has expired
    pub fn sign(&self, digest: &[u8; 32]) -> Result<[u8; 64], KeyError> {
        if !self.is_unlocked() {
            return Err(KeyError::Expired);
        }
        sign_digest(&self.key_pair.secret_key, digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::double_sha256;

    #[test]
    fn test_key_pair_generation() {
        let kp = KeyPair::generate();
        assert!(!kp.private_key_hex().is_empty());
        assert_eq!(kp.public_key_hex().len(), 66); // 33 bytes compressed
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let digest = double_sha256(b"hello dag");

        let sig = sign_digest(&kp.secret_key, &digest).unwrap();
        assert!(verify_digest(&kp.public_key, &digest, &sig).unwrap());

        let other = double_sha256(b"tampered");
        assert!(!verify_digest(&kp.public_key, &other, &sig).unwrap());
    }

    #[test]
    fn test_key_pair_from_hex() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::from_private_key_hex(&kp1.private_key_hex()).unwrap();
        assert_eq!(kp1.public_key_hex(), kp2.public_key_hex());
        assert_eq!(kp1.address(), kp2.address());
    }

    #[test]
    fn test_handle_expiry() {
        let kp = KeyPair::generate();
        let digest = double_sha256(b"msg");

        let handle = KeyHandle::unlock_for(kp.clone(), Duration::from_secs(60));
        assert!(handle.is_unlocked());
        assert!(handle.sign(&digest).is_ok());

        let expired = KeyHandle {
            key_pair: kp,
            valid_until: Some(Instant::now() - Duration::from_secs(1)),
        };
        assert!(!expired.is_unlocked());
        assert!(matches!(expired.sign(&digest), Err(KeyError::Expired)));
    }
}
