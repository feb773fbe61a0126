//! Network-reported state snapshots
//!
//! Everything in this file is a point-in-time answer from a peer:
//! transaction states, beacon states, address balances, address
//! history pages and proof-of-work parameters. Snapshots are never
//! mutated locally; observing a newer state requires a fresh query.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

use crate::core::output::{OutputError, TxOutput};
use crate::crypto::{Address, AddressError, TxId};

/// Errors produced when decoding a state payload
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Confirmed state without a confirming beacon")]
    MissingBeacon,
    #[error("Invalid identifier: {0}")]
    Address(#[from] AddressError),
    #[error("Invalid output: {0}")]
    Output(#[from] OutputError),
    #[error("Malformed payload: {0}")]
    Malformed(String),
}

// =============================================================================
// TxStatus
// =============================================================================

/// Lifecycle status of a transaction as judged by the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Seen but not yet confirmed by an accepted beacon
    Pending,
    /// Referenced by an accepted beacon
    Confirmed,
    /// Rejected by the network (lost a conflict)
    Refused,
}

impl TxStatus {
    /// Numeric wire code of this status
    pub fn code(&self) -> u8 {
        match self {
            TxStatus::Pending => 0,
            TxStatus::Confirmed => 1,
            TxStatus::Refused => 2,
        }
    }

    /// Decode a wire status code; unknown codes degrade to `Pending`,
    /// the weakest claim a peer can make
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => TxStatus::Confirmed,
            2 => TxStatus::Refused,
            _ => TxStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        *self == TxStatus::Pending
    }

    pub fn is_confirmed(&self) -> bool {
        *self == TxStatus::Confirmed
    }

    pub fn is_refused(&self) -> bool {
        *self == TxStatus::Refused
    }
}

// =============================================================================
// TransactionState
// =============================================================================

/// Wire shape of `GET /tx/{id}/state`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxStateJson {
    pub status: u8,
    pub confirmations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beacon: Option<String>,
    #[serde(rename = "outputsState")]
    pub outputs_state: Vec<OutputStateJson>,
}

/// Wire shape of one output's state within a transaction state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputStateJson {
    pub address: String,
    pub amount: u64,
    pub spent: bool,
    pub claimers: Vec<ClaimerJson>,
}

/// Wire shape of one claiming transaction reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimerJson {
    pub id: String,
    pub status: u8,
}

/// A snapshot of a transaction's confirmation state.
///
/// `Unknown` is the explicit variant for identifiers no queried peer
/// could answer: on a gossip network the absence of data is not proof
/// of absence, so callers see "unknown, treat as pending" rather than
/// fabricated data.
#[derive(Debug, Clone)]
pub enum TransactionState {
    Known {
        tx_id: TxId,
        status: TxStatus,
        /// Beacon that confirmed this transaction, when confirmations > 0
        confirming_beacon: Option<TxId>,
        confirmations: u32,
        outputs: HashMap<Address, TxOutput>,
    },
    Unknown { tx_id: TxId },
}

impl TransactionState {
    /// Decode and validate a peer-reported state for `tx_id`
    pub fn from_wire(tx_id: TxId, json: &TxStateJson) -> Result<Self, StateError> {
        let confirming_beacon = if json.confirmations > 0 {
            let beacon = json.beacon.as_ref().ok_or(StateError::MissingBeacon)?;
            Some(TxId::from_str(beacon)?)
        } else {
            None
        };

        let mut outputs = HashMap::new();
        for output_state in &json.outputs_state {
            let mut claimers = HashMap::new();
            for claimer in &output_state.claimers {
                claimers.insert(
                    TxId::from_str(&claimer.id)?,
                    TxStatus::from_code(claimer.status),
                );
            }

            let address = Address::from_str(&output_state.address)?;
            let output = TxOutput::with_state(
                address.clone(),
                output_state.amount,
                output_state.spent,
                claimers,
            )?;
            outputs.insert(address, output);
        }

        Ok(TransactionState::Known {
            tx_id,
            status: TxStatus::from_code(json.status),
            confirming_beacon,
            confirmations: json.confirmations,
            outputs,
        })
    }

    /// The synthetic state for an identifier no peer could answer
    pub fn unknown(tx_id: TxId) -> Self {
        TransactionState::Unknown { tx_id }
    }

    pub fn tx_id(&self) -> &TxId {
        match self {
            TransactionState::Known { tx_id, .. } => tx_id,
            TransactionState::Unknown { tx_id } => tx_id,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, TransactionState::Known { .. })
    }

    /// Status of the transaction; unknown states read as pending
    pub fn status(&self) -> TxStatus {
        match self {
            TransactionState::Known { status, .. } => *status,
            TransactionState::Unknown { .. } => TxStatus::Pending,
        }
    }

    pub fn confirmations(&self) -> u32 {
        match self {
            TransactionState::Known { confirmations, .. } => *confirmations,
            TransactionState::Unknown { .. } => 0,
        }
    }

    pub fn confirming_beacon(&self) -> Option<&TxId> {
        match self {
            TransactionState::Known {
                confirming_beacon, ..
            } => confirming_beacon.as_ref(),
            TransactionState::Unknown { .. } => None,
        }
    }

    /// The output state crediting `address`, if reported
    pub fn output(&self, address: &Address) -> Option<&TxOutput> {
        match self {
            TransactionState::Known { outputs, .. } => outputs.get(address),
            TransactionState::Unknown { .. } => None,
        }
    }
}

// =============================================================================
// AddressBalance
// =============================================================================

/// Wire shape of `GET /address/{addr}/balance`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceJson {
    pub address: String,
    pub received: u64,
    pub sent: u64,
}

/// Totals received and sent by an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBalance {
    pub address: Address,
    pub received: u64,
    pub sent: u64,
}

impl AddressBalance {
    pub fn from_wire(json: &BalanceJson) -> Result<Self, StateError> {
        Ok(Self {
            address: Address::from_str(&json.address)?,
            received: json.received,
            sent: json.sent,
        })
    }

    /// Net balance of the address
    pub fn balance(&self) -> u64 {
        self.received.saturating_sub(self.sent)
    }
}

// =============================================================================
// Address history
// =============================================================================

/// Which slice of an address's history to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressTxKind {
    /// All transactions involving the address
    Txs,
    /// Transactions spending from the address
    Inputs,
    /// Transactions crediting the address
    Outputs,
    /// Transactions with an unspent output for the address
    Unspent,
}

impl AddressTxKind {
    /// Path segment and response key used on the wire
    pub fn key(&self) -> &'static str {
        match self {
            AddressTxKind::Txs => "txs",
            AddressTxKind::Inputs => "inputs",
            AddressTxKind::Outputs => "outputs",
            AddressTxKind::Unspent => "unspent",
        }
    }
}

/// One page of transaction ids for an address, plus the total count
/// the peer reports for the requested kind
#[derive(Debug, Clone)]
pub struct AddressTxs {
    pub address: Address,
    pub txs: Vec<TxId>,
    pub total: usize,
}

impl AddressTxs {
    /// Decode a history page: `{"<kind>": [ids...], "size": n}`.
    /// Every id must validate; a single bad element rejects the page.
    pub fn from_wire(
        address: Address,
        kind: AddressTxKind,
        json: &serde_json::Value,
    ) -> Result<Self, StateError> {
        let ids = json
            .get(kind.key())
            .and_then(|v| v.as_array())
            .ok_or(StateError::MissingField("ids"))?;

        let txs: Vec<TxId> = ids
            .iter()
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| StateError::Malformed("non-string id".to_string()))
                    .and_then(|s| TxId::from_str(s).map_err(StateError::from))
            })
            .collect::<Result<_, _>>()?;

        let total = json
            .get("size")
            .and_then(|v| v.as_u64())
            .ok_or(StateError::MissingField("size"))? as usize;

        Ok(Self {
            address,
            txs,
            total,
        })
    }
}

// =============================================================================
// PoW parameters
// =============================================================================

/// Wire shape of `GET /work`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowInfoJson {
    #[serde(rename = "parentBeacon")]
    pub parent_beacon: String,
    pub key: String,
    pub difficulty: String,
    #[serde(rename = "parentTxs")]
    pub parent_txs: Vec<String>,
}

/// Everything a miner needs to anchor a new beacon
#[derive(Debug, Clone)]
pub struct PowInfo {
    /// Recommended parent beacon
    pub parent_beacon: TxId,
    /// Current RandomX key (hex)
    pub randomx_key: String,
    pub difficulty: u128,
    /// Recommended parent transactions
    pub parent_txs: Vec<TxId>,
}

impl PowInfo {
    pub fn from_wire(json: &PowInfoJson) -> Result<Self, StateError> {
        let parent_txs: Vec<TxId> = json
            .parent_txs
            .iter()
            .map(|s| TxId::from_str(s).map_err(StateError::from))
            .collect::<Result<_, _>>()?;

        let difficulty: u128 = json
            .difficulty
            .parse()
            .map_err(|_| StateError::Malformed(json.difficulty.clone()))?;

        Ok(Self {
            parent_beacon: TxId::from_str(&json.parent_beacon)?,
            randomx_key: json.key.clone(),
            difficulty,
            parent_txs,
        })
    }
}

// =============================================================================
// Beacon state
// =============================================================================

/// Wire shape of `GET /beacon/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconStateJson {
    pub difficulty: u64,
    #[serde(rename = "isMainChainMember")]
    pub main_chain: bool,
    pub weight: u64,
    #[serde(rename = "parentBeacon")]
    pub parent_beacon: String,
    pub confirmations: u64,
    pub height: u64,
    #[serde(rename = "randomXKey")]
    pub randomx_key: String,
}

/// A snapshot of a beacon's position in the DAG
#[derive(Debug, Clone)]
pub struct BeaconState {
    pub beacon_id: TxId,
    pub difficulty: u64,
    pub main_chain: bool,
    pub weight: u64,
    pub parent_beacon: TxId,
    pub confirmations: u64,
    pub height: u64,
    pub randomx_key: String,
}

impl BeaconState {
    pub fn from_wire(beacon_id: TxId, json: &BeaconStateJson) -> Result<Self, StateError> {
        Ok(Self {
            beacon_id,
            difficulty: json.difficulty,
            main_chain: json.main_chain,
            weight: json.weight,
            parent_beacon: TxId::from_str(&json.parent_beacon)?,
            confirmations: json.confirmations,
            height: json.height,
            randomx_key: json.randomx_key.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{double_sha256, KeyPair};

    fn some_tx_id(tag: &[u8]) -> TxId {
        TxId::from_hash(&double_sha256(tag))
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(TxStatus::from_code(0), TxStatus::Pending);
        assert_eq!(TxStatus::from_code(1), TxStatus::Confirmed);
        assert_eq!(TxStatus::from_code(2), TxStatus::Refused);
        assert_eq!(TxStatus::from_code(99), TxStatus::Pending);
        assert_eq!(TxStatus::Refused.code(), 2);
    }

    #[test]
    fn test_state_decoding() {
        let addr = KeyPair::generate().address();
        let json = TxStateJson {
            status: 1,
            confirmations: 5,
            beacon: Some(some_tx_id(b"beacon").to_string()),
            outputs_state: vec![OutputStateJson {
                address: addr.to_string(),
                amount: 1000,
                spent: false,
                claimers: vec![ClaimerJson {
                    id: some_tx_id(b"claimer").to_string(),
                    status: 0,
                }],
            }],
        };

        let state = TransactionState::from_wire(some_tx_id(b"tx"), &json).unwrap();
        assert!(state.is_known());
        assert_eq!(state.status(), TxStatus::Confirmed);
        assert_eq!(state.confirmations(), 5);
        assert!(state.confirming_beacon().is_some());
        let output = state.output(&addr).unwrap();
        assert_eq!(output.amount(), 1000);
        assert!(output.has_pending_claimer());
    }

    #[test]
    fn test_confirmed_state_requires_beacon() {
        let json = TxStateJson {
            status: 1,
            confirmations: 3,
            beacon: None,
            outputs_state: vec![],
        };
        assert!(matches!(
            TransactionState::from_wire(some_tx_id(b"tx"), &json),
            Err(StateError::MissingBeacon)
        ));
    }

    #[test]
    fn test_unknown_state_reads_as_pending() {
        let state = TransactionState::unknown(some_tx_id(b"missing"));
        assert!(!state.is_known());
        assert_eq!(state.status(), TxStatus::Pending);
        assert_eq!(state.confirmations(), 0);
        assert!(state.output(&KeyPair::generate().address()).is_none());
    }

    #[test]
    fn test_balance() {
        let addr = KeyPair::generate().address();
        let balance = AddressBalance::from_wire(&BalanceJson {
            address: addr.to_string(),
            received: 500,
            sent: 120,
        })
        .unwrap();
        assert_eq!(balance.balance(), 380);
        assert_eq!(balance.address, addr);
    }

    #[test]
    fn test_address_txs_page() {
        let addr = KeyPair::generate().address();
        let json = serde_json::json!({
            "unspent": [some_tx_id(b"a").to_string(), some_tx_id(b"b").to_string()],
            "size": 17,
        });
        let page = AddressTxs::from_wire(addr, AddressTxKind::Unspent, &json).unwrap();
        assert_eq!(page.txs.len(), 2);
        assert_eq!(page.total, 17);
    }

    #[test]
    fn test_address_txs_bad_element_rejects_page() {
        let addr = KeyPair::generate().address();
        let json = serde_json::json!({
            "txs": [some_tx_id(b"a").to_string(), "garbage"],
            "size": 2,
        });
        assert!(AddressTxs::from_wire(addr, AddressTxKind::Txs, &json).is_err());
    }

    #[test]
    fn test_pow_info_decoding() {
        let json = PowInfoJson {
            parent_beacon: some_tx_id(b"beacon").to_string(),
            key: "ab".repeat(32),
            difficulty: "123456789012345678901".to_string(),
            parent_txs: vec![some_tx_id(b"p1").to_string()],
        };
        let info = PowInfo::from_wire(&json).unwrap();
        assert_eq!(info.difficulty, 123456789012345678901u128);
        assert_eq!(info.parent_txs.len(), 1);

        let bad = PowInfoJson {
            difficulty: "not-a-number".to_string(),
            ..json
        };
        assert!(PowInfo::from_wire(&bad).is_err());
    }
}
