//! Networking module
//!
//! Providers are remote nodes exposing the ledger REST surface. This
//! module keeps a scored, live set of them and defines the transport
//! seam the rest of the crate talks through:
//! - `HttpChannel` / `Provider`: the injected transport abstraction
//! - `ProvidersWatcher`: liveness probing, scoring and ordering
//! - `ResponseCode` / `ChannelResponse`: uniform request outcomes

pub mod provider;
pub mod response;
pub mod watcher;

pub use provider::{HttpChannel, Provider};
pub use response::{ChannelResponse, ResponseCode};
pub use watcher::{ProvidersWatcher, DEFAULT_CHECK_RATE};
