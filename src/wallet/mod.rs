//! Wallet-side transaction assembly

pub mod builder;

pub use builder::{BuildError, TransactionBuilder};
