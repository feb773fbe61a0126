//! Identifier-prefixed Base58Check codec and the validated `Address` /
//! `TxId` newtypes built on it.
//!
//! Every human-readable identifier on the network is
//! `Base58(identifier || payload || checksum)` where `identifier` is a
//! 2-byte network prefix and `checksum` is the first 4 bytes of the
//! double SHA-256 of everything before it. Addresses carry a
//! RIPEMD160(SHA256(pubkey)) payload, transaction ids carry the raw
//! 32-byte transaction hash.

use ripemd::{Digest, Ripemd160};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::hash::{double_sha256, sha256};

/// 2-byte prefix identifying address strings on this network
pub const ADDR_IDENTIFIER: [u8; 2] = [0x0F, 0xC7];

/// 2-byte prefix identifying transaction id strings on this network
pub const TX_IDENTIFIER: [u8; 2] = [0x0E, 0xEF];

/// Length of the Base58Check checksum suffix
const CHECKSUM_LEN: usize = 4;

/// Errors produced when decoding an address or transaction id
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Not valid base58: {0}")]
    InvalidBase58(String),
    #[error("Checksum mismatch")]
    ChecksumMismatch,
    #[error("Wrong network identifier prefix")]
    WrongIdentifier,
    #[error("Decoded data too short")]
    TooShort,
    #[error("Unexpected payload length: {0}")]
    BadPayloadLength(usize),
}

/// Encode `payload` with the given 2-byte identifier prefix and a
/// 4-byte double-SHA256 checksum
pub fn encode_with_identifier(payload: &[u8], identifier: [u8; 2]) -> String {
    let mut bytes = Vec::with_capacity(2 + payload.len() + CHECKSUM_LEN);
    bytes.extend_from_slice(&identifier);
    bytes.extend_from_slice(payload);
    let checksum = double_sha256(&bytes);
    bytes.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    bs58::encode(bytes).into_string()
}

/// Decode a Base58Check string, verifying the checksum and that it
/// carries the expected identifier prefix. Returns the payload.
pub fn decode_with_identifier(s: &str, identifier: [u8; 2]) -> Result<Vec<u8>, AddressError> {
    let bytes = bs58::decode(s)
        .into_vec()
        .map_err(|e| AddressError::InvalidBase58(e.to_string()))?;

    if bytes.len() < 2 + CHECKSUM_LEN {
        return Err(AddressError::TooShort);
    }

    let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let expected = double_sha256(body);
    if checksum != &expected[..CHECKSUM_LEN] {
        return Err(AddressError::ChecksumMismatch);
    }

    if body[..2] != identifier {
        return Err(AddressError::WrongIdentifier);
    }

    Ok(body[2..].to_vec())
}

// =============================================================================
// Address
// =============================================================================

/// A validated, checksummed account address.
///
/// Only constructible through [`Address::from_public_key`] or the
/// validating [`FromStr`] impl, so holding one implies the string
/// decoded correctly under [`ADDR_IDENTIFIER`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Derive the address of a compressed secp256k1 public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let sha = sha256(&public_key.serialize());
        let mut ripemd = Ripemd160::new();
        ripemd.update(sha);
        let payload = ripemd.finalize();
        Address(encode_with_identifier(&payload, ADDR_IDENTIFIER))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a string is a well-formed address
    pub fn is_valid(s: &str) -> bool {
        decode_with_identifier(s, ADDR_IDENTIFIER).is_ok()
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_with_identifier(s, ADDR_IDENTIFIER)?;
        Ok(Address(s.to_string()))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(a: Address) -> String {
        a.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// TxId
// =============================================================================

/// A validated transaction identifier.
///
/// Wraps the Base58Check encoding (under [`TX_IDENTIFIER`]) of the
/// 32-byte canonical transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxId(String);

impl TxId {
    /// Build the id encoding a 32-byte transaction hash
    pub fn from_hash(hash: &[u8; 32]) -> Self {
        TxId(encode_with_identifier(hash, TX_IDENTIFIER))
    }

    /// Recover the 32-byte hash this id encodes
    pub fn to_hash(&self) -> [u8; 32] {
        // The payload was length-checked at construction
        let payload = decode_with_identifier(&self.0, TX_IDENTIFIER).unwrap_or_default();
        let mut hash = [0u8; 32];
        if payload.len() == hash.len() {
            hash.copy_from_slice(&payload);
        }
        hash
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a string is a well-formed transaction id
    pub fn is_valid(s: &str) -> bool {
        TxId::from_str(s).is_ok()
    }
}

impl FromStr for TxId {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let payload = decode_with_identifier(s, TX_IDENTIFIER)?;
        if payload.len() != 32 {
            return Err(AddressError::BadPayloadLength(payload.len()));
        }
        Ok(TxId(s.to_string()))
    }
}

impl TryFrom<String> for TxId {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TxId> for String {
    fn from(id: TxId) -> String {
        id.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyPair;

    #[test]
    fn test_codec_round_trip() {
        let payload = [7u8; 20];
        let encoded = encode_with_identifier(&payload, ADDR_IDENTIFIER);
        let decoded = decode_with_identifier(&encoded, ADDR_IDENTIFIER).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_address_round_trip_from_key() {
        let kp = KeyPair::generate();
        let addr = Address::from_public_key(&kp.public_key);
        let reparsed: Address = addr.as_str().parse().unwrap();
        assert_eq!(reparsed, addr);
    }

    #[test]
    fn test_identifier_mismatch_rejected() {
        let kp = KeyPair::generate();
        let addr = Address::from_public_key(&kp.public_key);
        // A valid address is not a valid transaction id
        assert!(TxId::from_str(addr.as_str()).is_err());
        assert!(!TxId::is_valid(addr.as_str()));
    }

    #[test]
    fn test_corrupted_checksum_rejected() {
        let kp = KeyPair::generate();
        let mut s = Address::from_public_key(&kp.public_key).as_str().to_string();
        // Flip the final character to another base58 digit
        let last = s.pop().unwrap();
        s.push(if last == '1' { '2' } else { '1' });
        assert!(Address::from_str(&s).is_err());
    }

    #[test]
    fn test_txid_hash_round_trip() {
        let hash = double_sha256(b"some transaction");
        let id = TxId::from_hash(&hash);
        assert_eq!(id.to_hash(), hash);
        assert!(TxId::is_valid(id.as_str()));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(Address::from_str("not-base58-0OIl").is_err());
        assert!(Address::from_str("").is_err());
        assert!(TxId::from_str("1111").is_err());
    }
}
