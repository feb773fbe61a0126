//! Ledger entities and network constants
//!
//! This module contains the value objects the client exchanges with the
//! network:
//! - Transaction outputs (with wire-string codec and claimer tracking)
//! - Transactions (standard / beacon variants, canonical hashing,
//!   validating wire decoder, hard-coded genesis)
//! - Transaction state snapshots, balances, address history pages and
//!   proof-of-work parameters
//!
//! All entities are immutable once constructed; decoding a peer payload
//! either yields a fully validated object or a typed error.

pub mod output;
pub mod state;
pub mod transaction;

/// Number of decimal places of the network's unit
pub const DECIMALS: u32 = 8;

/// Total coin supply of the network
pub const TOTAL_COINS: u64 = 32_032_000;

/// Total supply in base units
pub const TOTAL_UNITS: u64 = TOTAL_COINS * 10u64.pow(DECIMALS);

/// Flat fee divisor: the fee is `outputs_value / FEE_DIVISOR` (0.5%)
pub const FEE_DIVISOR: u64 = 200;

pub use output::{OutputError, TxOutput};
pub use state::{
    AddressBalance, AddressTxKind, AddressTxs, BeaconState, PowInfo, TransactionState, TxStatus,
};
pub use transaction::{
    Transaction, TxError, TxJson, TxPayload, GENESIS_ADDRESS, GENESIS_TX_ID,
};
