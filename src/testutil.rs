//! Shared in-memory transport for tests
//!
//! `MockChannel` plays the role of a remote provider: scripted GET
//! responses per path, a configurable info endpoint, and recording of
//! every request so tests can assert on what was (not) sent.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::network::{ChannelResponse, HttpChannel, ResponseCode};

pub struct MockChannel {
    responses: Mutex<HashMap<String, ChannelResponse>>,
    post_response: Mutex<ChannelResponse>,
    delay: Mutex<Option<Duration>>,
    fail_all: AtomicBool,
    calls: Mutex<Vec<String>>,
    posts: Mutex<Vec<(String, String)>>,
}

impl MockChannel {
    pub fn new() -> Arc<Self> {
        // First channel of the process wires up test logging
        let _ = env_logger::builder().is_test(true).try_init();
        Arc::new(Self {
            responses: Mutex::new(HashMap::new()),
            post_response: Mutex::new(ChannelResponse::new(ResponseCode::Ok, None)),
            delay: Mutex::new(None),
            fail_all: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
        })
    }

    /// A channel whose info endpoint reports the given DAG weight
    pub fn with_dag_weight(weight: u64) -> Arc<Self> {
        let channel = Self::new();
        channel.respond_ok_json("/nodeinfos", serde_json::json!({ "DAGWeight": weight }));
        channel
    }

    /// Script the response for a GET path
    pub fn respond(&self, path: &str, response: ChannelResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), response);
    }

    /// Script an OK JSON response for a GET path
    pub fn respond_ok_json(&self, path: &str, value: serde_json::Value) {
        self.respond(path, ChannelResponse::ok(value.to_string()));
    }

    /// Script the response for every POST
    pub fn respond_to_posts(&self, response: ChannelResponse) {
        *self.post_response.lock().unwrap() = response;
    }

    /// Make every subsequent request time out
    pub fn fail_everything(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    /// Make every subsequent request take `delay` before answering
    pub fn delay_responses(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    async fn apply_delay(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Every request made so far, e.g. `"GET /tips"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Every POST body made so far, as `(path, body)`
    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpChannel for MockChannel {
    async fn get(&self, path: &str) -> ChannelResponse {
        self.calls.lock().unwrap().push(format!("GET {}", path));
        self.apply_delay().await;
        if self.fail_all.load(Ordering::SeqCst) {
            return ChannelResponse::timeout();
        }
        self.responses
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(ChannelResponse::not_found)
    }

    async fn post(&self, path: &str, body: &str) -> ChannelResponse {
        self.calls.lock().unwrap().push(format!("POST {}", path));
        self.posts
            .lock()
            .unwrap()
            .push((path.to_string(), body.to_string()));
        self.apply_delay().await;
        if self.fail_all.load(Ordering::SeqCst) {
            return ChannelResponse::timeout();
        }
        self.post_response.lock().unwrap().clone()
    }
}
