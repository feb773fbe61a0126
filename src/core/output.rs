//! Transaction outputs
//!
//! An output credits an amount to an address. On the wire an output is
//! the comma-separated string `"address,hex(amount)"`; a third field,
//! when present, names a transaction claiming the output as an input.
//! State queries additionally report whether the output is spent and
//! the full set of claiming transactions with their statuses.

use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

use crate::core::state::TxStatus;
use crate::core::TOTAL_UNITS;
use crate::crypto::{Address, AddressError, TxId};

/// Errors produced when building or decoding an output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(u64),
    #[error("Malformed output string: {0:?}")]
    MalformedString(String),
    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),
}

/// A transaction output crediting `amount` base units to `address`
#[derive(Debug, Clone, PartialEq)]
pub struct TxOutput {
    address: Address,
    amount: u64,
    spent: bool,
    claimers: HashMap<TxId, TxStatus>,
}

impl TxOutput {
    /// Create a new unspent output.
    /// The amount must be positive and within the total supply.
    pub fn new(address: Address, amount: u64) -> Result<Self, OutputError> {
        if amount == 0 || amount > TOTAL_UNITS {
            return Err(OutputError::InvalidAmount(amount));
        }
        Ok(Self {
            address,
            amount,
            spent: false,
            claimers: HashMap::new(),
        })
    }

    /// Create an output with a known spent flag and claimer set, as
    /// reported by a state query
    pub fn with_state(
        address: Address,
        amount: u64,
        spent: bool,
        claimers: HashMap<TxId, TxStatus>,
    ) -> Result<Self, OutputError> {
        let mut output = Self::new(address, amount)?;
        output.spent = spent;
        output.claimers = claimers;
        Ok(output)
    }

    /// Decode the wire form `"address,hex(amount)"`.
    /// A third comma field naming the claiming transaction is accepted
    /// and must itself be a valid transaction id.
    pub fn from_wire_string(s: &str) -> Result<Self, OutputError> {
        let parts: Vec<&str> = s.split(',').collect();

        match parts.as_slice() {
            [address, amount] => {
                let address = Address::from_str(address)?;
                let amount = u64::from_str_radix(amount, 16)
                    .map_err(|_| OutputError::MalformedString(s.to_string()))?;
                Self::new(address, amount)
            }
            [address, amount, claimer] => {
                TxId::from_str(claimer)?;
                let address = Address::from_str(address)?;
                let amount = u64::from_str_radix(amount, 16)
                    .map_err(|_| OutputError::MalformedString(s.to_string()))?;
                Self::new(address, amount)
            }
            _ => Err(OutputError::MalformedString(s.to_string())),
        }
    }

    /// Encode the wire form `"address,hex(amount)"`
    pub fn to_wire_string(&self) -> String {
        format!("{},{:x}", self.address, self.amount)
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }

    /// Transactions currently claiming this output as an input,
    /// pending or confirmed
    pub fn claimers(&self) -> &HashMap<TxId, TxStatus> {
        &self.claimers
    }

    /// Whether any claiming transaction is still pending. Spending an
    /// output in this situation would race the in-flight claim.
    pub fn has_pending_claimer(&self) -> bool {
        self.claimers.values().any(|s| s.is_pending())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn some_address() -> Address {
        KeyPair::generate().address()
    }

    #[test]
    fn test_wire_string_round_trip() {
        let output = TxOutput::new(some_address(), 123_456_789).unwrap();
        let reparsed = TxOutput::from_wire_string(&output.to_wire_string()).unwrap();
        assert_eq!(reparsed.address(), output.address());
        assert_eq!(reparsed.amount(), output.amount());
    }

    #[test]
    fn test_amount_bounds() {
        let addr = some_address();
        assert!(TxOutput::new(addr.clone(), 0).is_err());
        assert!(TxOutput::new(addr.clone(), TOTAL_UNITS + 1).is_err());
        assert!(TxOutput::new(addr, TOTAL_UNITS).is_ok());
    }

    #[test]
    fn test_malformed_strings_rejected() {
        assert!(TxOutput::from_wire_string("").is_err());
        assert!(TxOutput::from_wire_string("noseparator").is_err());
        assert!(TxOutput::from_wire_string("bad-address,ff").is_err());

        let addr = some_address();
        // amount not hex
        assert!(TxOutput::from_wire_string(&format!("{},zz", addr)).is_err());
        // claimer field must be a valid tx id
        assert!(TxOutput::from_wire_string(&format!("{},ff,not-a-txid", addr)).is_err());
    }

    #[test]
    fn test_pending_claimer_detection() {
        let tx_id = TxId::from_hash(&crate::crypto::double_sha256(b"claimer"));
        let mut claimers = HashMap::new();
        claimers.insert(tx_id.clone(), TxStatus::Confirmed);

        let output =
            TxOutput::with_state(some_address(), 10, false, claimers.clone()).unwrap();
        assert!(!output.has_pending_claimer());

        claimers.insert(tx_id, TxStatus::Pending);
        let output = TxOutput::with_state(some_address(), 10, false, claimers).unwrap();
        assert!(output.has_pending_claimer());
    }
}
