//! Peer-resilient query protocol
//!
//! Every read follows the same pattern: validate caller input locally,
//! take the ready providers in descending-score order, and ask them one
//! by one with a bounded timeout until the request is satisfied. A
//! malformed or partially valid answer is treated exactly like no
//! answer: logged and skipped. Single-identifier calls return the first
//! fully valid response; multi-identifier calls accumulate the
//! still-missing identifiers across providers and stop early once every
//! one is resolved.
//!
//! The hard-coded genesis transaction is answered synthetically, with
//! zero network calls, by every operation that could return it.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::core::state::{BalanceJson, BeaconStateJson, PowInfoJson, TxStateJson};
use crate::core::{
    AddressBalance, AddressTxKind, AddressTxs, BeaconState, PowInfo, Transaction,
    TransactionState, TxJson, TxStatus, GENESIS_TX_ID,
};
use crate::crypto::{Address, TxId};
use crate::network::{ChannelResponse, Provider, ProvidersWatcher, DEFAULT_CHECK_RATE};

/// Default bound on a single provider attempt
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors surfaced by query operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Caller input rejected before any network call
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// No reachable provider could answer; distinguishable from "data
    /// confirmed absent" only by asking again later
    #[error("Not found on any reachable provider")]
    NotFound,
    /// No provider acknowledged a broadcast
    #[error("Broadcast failed: no provider acknowledged the transaction")]
    BroadcastFailed,
}

/// Client tuning knobs
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Interval between provider probe cycles
    pub check_rate: Duration,
    /// Bound on each single provider attempt
    pub request_timeout: Duration,
    /// Overall deadline per operation; remaining provider attempts are
    /// abandoned once past it, keeping already-validated results
    pub overall_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            check_rate: DEFAULT_CHECK_RATE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            overall_timeout: None,
        }
    }
}

/// A light client for the DAG ledger network.
///
/// Owns the provider watcher; constructed explicitly and passed by
/// reference wherever needed.
pub struct DagClient {
    watcher: ProvidersWatcher,
    config: ClientConfig,
}

impl DagClient {
    /// Build a client and start its provider watcher.
    ///
    /// Spawns the watcher's refresh loop, so this must be called from
    /// within a Tokio runtime.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            watcher: ProvidersWatcher::new(config.check_rate),
            config,
        }
    }

    /// The underlying provider watcher
    pub fn watcher(&self) -> &ProvidersWatcher {
        &self.watcher
    }

    /// Register a provider; it becomes usable once probed successfully
    pub async fn add_provider(&self, provider: Provider) -> bool {
        self.watcher.add_provider(provider).await
    }

    pub async fn remove_provider(&self, hostname: &str) {
        self.watcher.remove_provider(hostname).await
    }

    /// Stop the background watcher loop
    pub fn shutdown(&self) {
        self.watcher.shutdown();
    }

    // =========================================================================
    // Single-identifier reads: first fully valid response wins
    // =========================================================================

    /// Current tips: transactions not yet referenced as parents,
    /// answered by the most up-to-date reachable provider
    pub async fn get_tips(&self) -> Result<Vec<TxId>, ClientError> {
        self.first_valid_id_list("/tips").await
    }

    /// The `wanted` most recent transactions known to a provider
    pub async fn get_latest_txs(&self, wanted: usize) -> Result<Vec<TxId>, ClientError> {
        if wanted == 0 {
            return Err(ClientError::BadRequest("wanted must be positive".into()));
        }
        self.first_valid_id_list(&format!("/tx/latest/{}", wanted)).await
    }

    /// The `wanted` most recent beacons known to a provider
    pub async fn get_latest_beacons(&self, wanted: usize) -> Result<Vec<TxId>, ClientError> {
        if wanted == 0 {
            return Err(ClientError::BadRequest("wanted must be positive".into()));
        }
        self.first_valid_id_list(&format!("/beacon/latest/{}", wanted)).await
    }

    /// Proof-of-work parameters for mining a new beacon
    pub async fn get_pow_info(&self) -> Result<PowInfo, ClientError> {
        let deadline = self.deadline();
        let providers = self.ready_providers().await?;

        for provider in &providers {
            if past(&deadline) {
                break;
            }
            let response = self.get_bounded(provider, "/work").await;
            let Some(json) = ok_body::<PowInfoJson>(&response) else {
                continue;
            };
            match PowInfo::from_wire(&json) {
                Ok(info) => return Ok(info),
                Err(e) => {
                    log::debug!("Rejecting /work payload from {}: {}", provider.hostname(), e)
                }
            }
        }

        Err(ClientError::NotFound)
    }

    /// Fetch a single transaction by id
    pub async fn get_transaction(&self, id: &TxId) -> Result<Transaction, ClientError> {
        let mut found = self.get_transactions(std::slice::from_ref(id)).await?;
        found.remove(id).ok_or(ClientError::NotFound)
    }

    // =========================================================================
    // Multi-identifier reads: accumulate across providers
    // =========================================================================

    /// Fetch transactions by id. Each provider contributes the subset
    /// of still-missing ids it can validly answer; a transaction whose
    /// recomputed hash differs from the requested id is treated as
    /// not found on that provider.
    pub async fn get_transactions(
        &self,
        ids: &[TxId],
    ) -> Result<HashMap<TxId, Transaction>, ClientError> {
        let mut wanted = dedup(ids)?;
        let mut found = HashMap::new();

        // Genesis is hard-coded; never ask the network for it
        if let Some(pos) = wanted.iter().position(|id| id.as_str() == GENESIS_TX_ID) {
            let genesis = Transaction::genesis();
            found.insert(wanted.remove(pos), genesis);
        }
        if wanted.is_empty() {
            return Ok(found);
        }

        let deadline = self.deadline();
        let providers = self.ready_providers().await?;

        'providers: for provider in &providers {
            for id in &wanted {
                if found.contains_key(id) {
                    continue;
                }
                if past(&deadline) {
                    break 'providers;
                }
                let response = self.get_bounded(provider, &format!("/tx/{}", id)).await;
                let Some(json) = ok_body::<TxJson>(&response) else {
                    continue;
                };
                match Transaction::from_wire(&json, Some(id)) {
                    Ok(tx) => {
                        found.insert(id.clone(), tx);
                    }
                    Err(e) => log::debug!(
                        "Rejecting transaction {} from {}: {}",
                        id,
                        provider.hostname(),
                        e
                    ),
                }
            }
            if wanted.iter().all(|id| found.contains_key(id)) {
                break;
            }
        }

        if found.is_empty() {
            return Err(ClientError::NotFound);
        }
        Ok(found)
    }

    /// Fetch one page of each address's history of the given kind
    pub async fn get_address_txs(
        &self,
        addresses: &[Address],
        kind: AddressTxKind,
        per_page: usize,
        page: usize,
    ) -> Result<HashMap<Address, AddressTxs>, ClientError> {
        if addresses.is_empty() {
            return Err(ClientError::BadRequest("no addresses requested".into()));
        }
        if per_page == 0 || page == 0 {
            return Err(ClientError::BadRequest("pagination starts at page 1".into()));
        }

        let wanted = dedup_addresses(addresses);
        let mut found: HashMap<Address, AddressTxs> = HashMap::new();
        let deadline = self.deadline();
        let providers = self.ready_providers().await?;

        'providers: for provider in &providers {
            for address in &wanted {
                if found.contains_key(address) {
                    continue;
                }
                if past(&deadline) {
                    break 'providers;
                }
                let path = format!("/address/{}/{}/{}/{}", address, kind.key(), per_page, page);
                let response = self.get_bounded(provider, &path).await;
                let Some(json) = ok_body::<serde_json::Value>(&response) else {
                    continue;
                };
                match AddressTxs::from_wire(address.clone(), kind, &json) {
                    Ok(txs) => {
                        found.insert(address.clone(), txs);
                    }
                    Err(e) => log::debug!(
                        "Rejecting history page for {} from {}: {}",
                        address,
                        provider.hostname(),
                        e
                    ),
                }
            }
            if found.len() == wanted.len() {
                break;
            }
        }

        if found.is_empty() {
            return Err(ClientError::NotFound);
        }
        Ok(found)
    }

    /// Fetch the received/sent totals of each address
    pub async fn get_balances(
        &self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, AddressBalance>, ClientError> {
        if addresses.is_empty() {
            return Err(ClientError::BadRequest("no addresses requested".into()));
        }

        let wanted = dedup_addresses(addresses);
        let mut found: HashMap<Address, AddressBalance> = HashMap::new();
        let deadline = self.deadline();
        let providers = self.ready_providers().await?;

        'providers: for provider in &providers {
            for address in &wanted {
                if found.contains_key(address) {
                    continue;
                }
                if past(&deadline) {
                    break 'providers;
                }
                let path = format!("/address/{}/balance", address);
                let response = self.get_bounded(provider, &path).await;
                let Some(json) = ok_body::<BalanceJson>(&response) else {
                    continue;
                };
                match AddressBalance::from_wire(&json) {
                    // A provider answering for a different address than
                    // asked is lying; skip it
                    Ok(balance) if &balance.address == address => {
                        found.insert(address.clone(), balance);
                    }
                    Ok(_) => log::debug!(
                        "Balance for wrong address from {}",
                        provider.hostname()
                    ),
                    Err(e) => log::debug!(
                        "Rejecting balance for {} from {}: {}",
                        address,
                        provider.hostname(),
                        e
                    ),
                }
            }
            if found.len() == wanted.len() {
                break;
            }
        }

        if found.is_empty() {
            return Err(ClientError::NotFound);
        }
        Ok(found)
    }

    /// Fetch the confirmation state of each transaction.
    ///
    /// Identifiers no provider could answer come back as the explicit
    /// [`TransactionState::Unknown`] variant: on a gossip network the
    /// absence of data is not proof of absence.
    pub async fn get_txs_state(
        &self,
        ids: &[TxId],
    ) -> Result<HashMap<TxId, TransactionState>, ClientError> {
        let mut wanted = dedup(ids)?;
        let mut found: HashMap<TxId, TransactionState> = HashMap::new();

        if let Some(pos) = wanted.iter().position(|id| id.as_str() == GENESIS_TX_ID) {
            let id = wanted.remove(pos);
            found.insert(id.clone(), genesis_state(id));
        }
        if wanted.is_empty() {
            return Ok(found);
        }

        let deadline = self.deadline();
        let providers = self.ready_providers().await?;

        'providers: for provider in &providers {
            for id in &wanted {
                if found.contains_key(id) {
                    continue;
                }
                if past(&deadline) {
                    break 'providers;
                }
                let response = self.get_bounded(provider, &format!("/tx/{}/state", id)).await;
                let Some(json) = ok_body::<TxStateJson>(&response) else {
                    continue;
                };
                match TransactionState::from_wire(id.clone(), &json) {
                    Ok(state) => {
                        found.insert(id.clone(), state);
                    }
                    Err(e) => log::debug!(
                        "Rejecting state for {} from {}: {}",
                        id,
                        provider.hostname(),
                        e
                    ),
                }
            }
            if wanted.iter().all(|id| found.contains_key(id)) {
                break;
            }
        }

        for id in wanted {
            found
                .entry(id.clone())
                .or_insert_with(|| TransactionState::unknown(id));
        }
        Ok(found)
    }

    /// Fetch the DAG position of each beacon
    pub async fn get_beacons_state(
        &self,
        ids: &[TxId],
    ) -> Result<HashMap<TxId, BeaconState>, ClientError> {
        let wanted = dedup(ids)?;
        let mut found: HashMap<TxId, BeaconState> = HashMap::new();
        let deadline = self.deadline();
        let providers = self.ready_providers().await?;

        'providers: for provider in &providers {
            for id in &wanted {
                if found.contains_key(id) {
                    continue;
                }
                if past(&deadline) {
                    break 'providers;
                }
                let response = self.get_bounded(provider, &format!("/beacon/{}", id)).await;
                let Some(json) = ok_body::<BeaconStateJson>(&response) else {
                    continue;
                };
                match BeaconState::from_wire(id.clone(), &json) {
                    Ok(state) => {
                        found.insert(id.clone(), state);
                    }
                    Err(e) => log::debug!(
                        "Rejecting beacon state for {} from {}: {}",
                        id,
                        provider.hostname(),
                        e
                    ),
                }
            }
            if found.len() == wanted.len() {
                break;
            }
        }

        if found.is_empty() {
            return Err(ClientError::NotFound);
        }
        Ok(found)
    }

    // =========================================================================
    // Broadcast
    // =========================================================================

    /// Submit a transaction to the network. The submission succeeds as
    /// soon as one provider acknowledges it; the message is then
    /// relayed best-effort to every other provider to speed up
    /// propagation. Returns the acknowledging provider's hostname.
    pub async fn broadcast_transaction(&self, tx: &TxJson) -> Result<String, ClientError> {
        let body = serde_json::to_string(tx)
            .map_err(|e| ClientError::BadRequest(e.to_string()))?;

        let deadline = self.deadline();
        let providers = self.ready_providers().await?;

        let mut acceptor: Option<String> = None;
        for provider in &providers {
            if past(&deadline) {
                break;
            }
            let response = self.post_bounded(provider, "/tx", &body).await;
            if response.code.is_success() {
                acceptor = Some(provider.hostname().to_string());
                break;
            }
            log::debug!(
                "Provider {} did not accept the transaction ({:?})",
                provider.hostname(),
                response.code
            );
        }

        let Some(acceptor) = acceptor else {
            return Err(ClientError::BroadcastFailed);
        };

        for provider in &providers {
            if provider.hostname() != acceptor {
                let _ = self.post_bounded(provider, "/tx", &body).await;
            }
        }

        log::info!("Transaction accepted by {}", acceptor);
        Ok(acceptor)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Ready providers by descending score; an empty set means no
    /// query can be answered right now
    async fn ready_providers(&self) -> Result<Vec<Provider>, ClientError> {
        let providers = self.watcher.ordered_providers().await;
        if providers.is_empty() {
            return Err(ClientError::NotFound);
        }
        Ok(providers)
    }

    fn deadline(&self) -> Option<Instant> {
        self.config.overall_timeout.map(|d| Instant::now() + d)
    }

    async fn get_bounded(&self, provider: &Provider, path: &str) -> ChannelResponse {
        match tokio::time::timeout(self.config.request_timeout, provider.get(path)).await {
            Ok(response) => response,
            Err(_) => ChannelResponse::timeout(),
        }
    }

    async fn post_bounded(&self, provider: &Provider, path: &str, body: &str) -> ChannelResponse {
        match tokio::time::timeout(self.config.request_timeout, provider.post(path, body)).await {
            Ok(response) => response,
            Err(_) => ChannelResponse::timeout(),
        }
    }

    /// Shared loop for calls answering a plain list of transaction ids
    async fn first_valid_id_list(&self, path: &str) -> Result<Vec<TxId>, ClientError> {
        let deadline = self.deadline();
        let providers = self.ready_providers().await?;

        for provider in &providers {
            if past(&deadline) {
                break;
            }
            let response = self.get_bounded(provider, path).await;
            let Some(raw) = ok_body::<Vec<String>>(&response) else {
                continue;
            };
            // The whole list must validate; a prefix is evidence of a
            // forged or truncated message
            let ids: Result<Vec<TxId>, _> = raw.iter().map(|s| s.parse()).collect();
            match ids {
                Ok(ids) if !ids.is_empty() => return Ok(ids),
                Ok(_) => log::debug!("Empty id list from {}", provider.hostname()),
                Err(e) => {
                    log::debug!("Rejecting id list from {}: {}", provider.hostname(), e)
                }
            }
        }

        Err(ClientError::NotFound)
    }
}

/// Synthetic, always-confirmed state of the genesis transaction
fn genesis_state(id: TxId) -> TransactionState {
    let genesis = Transaction::genesis();
    let outputs = genesis
        .outputs()
        .iter()
        .map(|o| (o.address().clone(), o.clone()))
        .collect();
    TransactionState::Known {
        tx_id: id,
        status: TxStatus::Confirmed,
        confirming_beacon: None,
        confirmations: u32::MAX,
        outputs,
    }
}

fn past(deadline: &Option<Instant>) -> bool {
    deadline.map_or(false, |d| Instant::now() >= d)
}

/// Deduplicate requested ids, preserving order; empty input is a
/// caller error
fn dedup(ids: &[TxId]) -> Result<Vec<TxId>, ClientError> {
    if ids.is_empty() {
        return Err(ClientError::BadRequest("no identifiers requested".into()));
    }
    let mut out: Vec<TxId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    Ok(out)
}

fn dedup_addresses(addresses: &[Address]) -> Vec<Address> {
    let mut out: Vec<Address> = Vec::with_capacity(addresses.len());
    for address in addresses {
        if !out.contains(address) {
            out.push(address.clone());
        }
    }
    out
}

/// Extract and deserialize the body of an OK response
fn ok_body<T: DeserializeOwned>(response: &ChannelResponse) -> Option<T> {
    if response.code != crate::network::ResponseCode::Ok {
        return None;
    }
    response
        .body
        .as_deref()
        .and_then(|body| serde_json::from_str(body).ok())
}
