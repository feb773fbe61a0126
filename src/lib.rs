//! A light client library for a DAG-structured UTXO ledger
//!
//! Instead of a single chain of blocks, the ledger is a directed
//! acyclic graph of transactions: each transaction attaches to one or
//! more parents, and proof-of-work "beacon" transactions periodically
//! confirm everything they reach. This crate talks to full nodes over
//! their REST surface and provides:
//! - Base58Check address and transaction-id codecs with typed wrappers
//! - full local validation of peer-supplied transactions (canonical
//!   hash recomputation and ECDSA signature checks)
//! - a scored, self-refreshing provider set ordered by DAG weight
//! - peer-resilient queries that fall through misbehaving providers
//! - a transaction builder handling input selection, fees, change,
//!   signing and broadcast
//!
//! # Example
//!
//! ```rust,no_run
//! use dag_light_client::client::{ClientConfig, DagClient};
//! use dag_light_client::crypto::{KeyHandle, KeyPair};
//! use dag_light_client::network::Provider;
//! use dag_light_client::wallet::TransactionBuilder;
//! # use std::sync::Arc;
//! # async fn example(channel: Arc<dyn dag_light_client::network::HttpChannel>) {
//! let client = DagClient::new(ClientConfig::default());
//! client.add_provider(Provider::new("https://node:8000", channel)).await;
//!
//! let tips = client.get_tips().await.unwrap();
//! println!("current tips: {:?}", tips);
//!
//! let key = KeyHandle::unlock(KeyPair::generate());
//! let recipient = KeyPair::generate().address();
//! let tx = TransactionBuilder::new(&client)
//!     .output(recipient, 1_000)
//!     .unwrap()
//!     .send(&key)
//!     .await
//!     .unwrap();
//! println!("sent {}", tx.id());
//! # }
//! ```

pub mod client;
pub mod core;
pub mod crypto;
pub mod network;
pub mod wallet;

#[cfg(test)]
mod testutil;

// Re-export commonly used types
pub use client::{ClientConfig, ClientError, DagClient};
pub use core::{
    AddressBalance, AddressTxKind, AddressTxs, BeaconState, PowInfo, Transaction,
    TransactionState, TxOutput, TxPayload, TxStatus,
};
pub use crypto::{Address, KeyHandle, KeyPair, TxId};
pub use network::{HttpChannel, Provider, ProvidersWatcher};
pub use wallet::{BuildError, TransactionBuilder};
