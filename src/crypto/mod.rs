//! Cryptographic utilities for the light client
//!
//! This module provides:
//! - SHA-256 hashing (single and double, epoch-selectable)
//! - Identifier-prefixed Base58Check codec (addresses, transaction ids)
//! - ECDSA key management (secp256k1) and expiring signing handles

pub mod address;
pub mod hash;
pub mod keys;

pub use address::{
    decode_with_identifier, encode_with_identifier, Address, AddressError, TxId, ADDR_IDENTIFIER,
    TX_IDENTIFIER,
};
pub use hash::{double_sha256, sha256, HashScheme};
pub use keys::{public_key_from_hex, sign_digest, verify_digest, KeyError, KeyHandle, KeyPair};
