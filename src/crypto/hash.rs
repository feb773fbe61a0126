//! Cryptographic hashing utilities for the light client
//!
//! Provides SHA-256 based hashing used for transaction ids and
//! signed-message digests. The network moved from single to double
//! SHA-256 across protocol epochs, so both are exposed behind
//! [`HashScheme`].

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
/// Used for transaction ids in the current network epoch
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Hashing scheme selected by network epoch.
///
/// Older epochs derived ids and signed digests with a single SHA-256
/// pass; the current epoch double-hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScheme {
    /// Single SHA-256 (legacy epoch)
    Legacy,
    /// Double SHA-256 (current epoch)
    Double,
}

impl HashScheme {
    /// Hash `data` according to this scheme
    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        match self {
            HashScheme::Legacy => sha256(data),
            HashScheme::Double => double_sha256(data),
        }
    }
}
