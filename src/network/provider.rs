//! Provider transport seam
//!
//! The concrete HTTP stack lives outside this crate; everything here
//! talks to providers through the [`HttpChannel`] trait. A channel is
//! expected to enforce its own connect timeout and to map transport
//! failures to [`ResponseCode::RequestTimeout`] rather than erroring.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::network::response::ChannelResponse;

/// Transport over which a REST provider is reached
#[async_trait]
pub trait HttpChannel: Send + Sync {
    /// Perform a GET against the provider
    async fn get(&self, path: &str) -> ChannelResponse;

    /// Perform a POST with a JSON body against the provider
    async fn post(&self, path: &str, body: &str) -> ChannelResponse;
}

/// A handle to one remote provider: its hostname plus the channel used
/// to reach it
#[derive(Clone)]
pub struct Provider {
    hostname: String,
    channel: Arc<dyn HttpChannel>,
}

impl Provider {
    pub fn new(hostname: impl Into<String>, channel: Arc<dyn HttpChannel>) -> Self {
        Self {
            hostname: hostname.into(),
            channel,
        }
    }

    /// Hostname identifying this provider, e.g. `https://node:8000`
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub async fn get(&self, path: &str) -> ChannelResponse {
        self.channel.get(path).await
    }

    pub async fn post(&self, path: &str, body: &str) -> ChannelResponse {
        self.channel.post(path, body).await
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("hostname", &self.hostname)
            .finish()
    }
}
