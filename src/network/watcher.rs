//! Provider watcher: a scored, live set of reachable providers
//!
//! Every registered provider is either `Pending` (not yet proven
//! reachable) or `Ready` with a score taken from the DAG weight it
//! reports on its info endpoint. A background task re-probes the whole
//! set at a fixed rate, promoting pending providers that answer with a
//! well-formed info payload and demoting ready ones that stop
//! answering. Queries consume [`ProvidersWatcher::ordered_providers`],
//! the ready set sorted by descending score.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::network::provider::Provider;
use crate::network::response::ResponseCode;

/// Default interval between probe cycles
pub const DEFAULT_CHECK_RATE: Duration = Duration::from_secs(10);

/// Info endpoint probed for liveness and score
const NODE_INFO_PATH: &str = "/nodeinfos";

/// Liveness state of one registered provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProviderStatus {
    /// Registered but not yet proven reachable
    Pending,
    /// Answering probes; score is the reported DAG weight
    Ready { score: u64 },
}

struct ProviderEntry {
    provider: Provider,
    status: ProviderStatus,
}

/// Wire shape of the info endpoint payload
#[derive(Deserialize)]
struct NodeInfoJson {
    #[serde(rename = "DAGWeight")]
    dag_weight: u64,
}

type ProviderMap = Arc<RwLock<HashMap<String, ProviderEntry>>>;

/// Maintains the scored provider set and its background refresh loop
pub struct ProvidersWatcher {
    entries: ProviderMap,
    probe_tx: mpsc::UnboundedSender<String>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProvidersWatcher {
    /// Start a watcher probing at `check_rate`.
    ///
    /// The refresh loop is spawned immediately, so this must be called
    /// from within a Tokio runtime; outside one it panics.
    pub fn new(check_rate: Duration) -> Self {
        let entries: ProviderMap = Arc::new(RwLock::new(HashMap::new()));
        let (probe_tx, mut probe_rx) = mpsc::unbounded_channel::<String>();

        let loop_entries = Arc::clone(&entries);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(check_rate);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        refresh_all(&loop_entries).await;
                    }
                    Some(hostname) = probe_rx.recv() => {
                        probe_one(&loop_entries, &hostname).await;
                    }
                }
            }
        });

        Self {
            entries,
            probe_tx,
            task: Mutex::new(Some(task)),
        }
    }

    /// Register a provider as `Pending` and request an immediate probe.
    /// Returns false if a provider with the same hostname is already
    /// registered.
    pub async fn add_provider(&self, provider: Provider) -> bool {
        let hostname = provider.hostname().to_string();
        {
            let mut entries = self.entries.write().await;
            if entries.contains_key(&hostname) {
                return false;
            }
            entries.insert(
                hostname.clone(),
                ProviderEntry {
                    provider,
                    status: ProviderStatus::Pending,
                },
            );
        }
        log::info!("Registered provider {}", hostname);
        // The probe loop ignores hostnames removed before the probe runs
        let _ = self.probe_tx.send(hostname);
        true
    }

    /// Purge a provider from the set. Queued probe requests for it
    /// become no-ops.
    pub async fn remove_provider(&self, hostname: &str) {
        let removed = self.entries.write().await.remove(hostname).is_some();
        if removed {
            log::info!("Removed provider {}", hostname);
        }
    }

    /// Apply a transport-pushed score (e.g. from a handshake) to a
    /// known provider, promoting it to `Ready`
    pub async fn set_score(&self, hostname: &str, score: u64) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(hostname) {
            entry.status = ProviderStatus::Ready { score };
        }
    }

    /// Ready providers sorted by descending score; ties broken by
    /// hostname so the order is deterministic per call
    pub async fn ordered_providers(&self) -> Vec<Provider> {
        let entries = self.entries.read().await;
        let mut ready: Vec<(u64, &String, &ProviderEntry)> = entries
            .iter()
            .filter_map(|(hostname, entry)| match entry.status {
                ProviderStatus::Ready { score } => Some((score, hostname, entry)),
                ProviderStatus::Pending => None,
            })
            .collect();
        ready.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        ready.into_iter().map(|(_, _, e)| e.provider.clone()).collect()
    }

    /// Hostnames of every registered provider, ready or pending
    pub async fn provider_hostnames(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    /// Number of providers currently `Ready`
    pub async fn ready_count(&self) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| matches!(e.status, ProviderStatus::Ready { .. }))
            .count()
    }

    /// Stop the background loop. Pending probe requests are dropped.
    pub fn shutdown(&self) {
        if let Some(task) = self.task.lock().ok().and_then(|mut t| t.take()) {
            task.abort();
            log::info!("Provider watcher stopped");
        }
    }
}

impl Drop for ProvidersWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Probe every registered provider once and apply the results
async fn refresh_all(entries: &ProviderMap) {
    let snapshot: Vec<Provider> = entries
        .read()
        .await
        .values()
        .map(|e| e.provider.clone())
        .collect();

    for provider in snapshot {
        probe_one(entries, provider.hostname()).await;
    }
}

/// Probe a single provider's info endpoint and promote/demote it.
/// The probe runs without holding the lock; the result is only applied
/// if the provider is still registered.
async fn probe_one(entries: &ProviderMap, hostname: &str) {
    let provider = match entries.read().await.get(hostname) {
        Some(entry) => entry.provider.clone(),
        None => return,
    };

    let response = provider.get(NODE_INFO_PATH).await;
    let score = if response.code == ResponseCode::Ok {
        response
            .body
            .as_deref()
            .and_then(|body| serde_json::from_str::<NodeInfoJson>(body).ok())
            .map(|info| info.dag_weight)
    } else {
        None
    };

    let mut entries = entries.write().await;
    let Some(entry) = entries.get_mut(hostname) else {
        return; // removed while probing
    };

    match (score, entry.status) {
        (Some(score), _) => {
            log::debug!("Provider {} ready with score {}", hostname, score);
            entry.status = ProviderStatus::Ready { score };
        }
        (None, ProviderStatus::Ready { .. }) => {
            log::warn!("Provider {} stopped answering, demoting", hostname);
            entry.status = ProviderStatus::Pending;
        }
        (None, ProviderStatus::Pending) => {}
    }
}
