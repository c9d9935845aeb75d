use crate::llm_client::{InferenceTransport, VERSION_ENDPOINT};
use log::warn;
use std::future::Future;
use std::time::{Duration, Instant};

/// Shown in place of a version when the server can't be reached.
pub const VERSION_NOT_AVAILABLE: &str = "Not Available";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Online,
    Offline,
}

impl ServerStatus {
    pub fn from_version(version: &str) -> Self {
        if version == VERSION_NOT_AVAILABLE {
            ServerStatus::Offline
        } else {
            ServerStatus::Online
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ServerStatus::Online => "✅ Online",
            ServerStatus::Offline => "❌ Offline",
        }
    }
}

/// Ask the server for its version, degrading to [`VERSION_NOT_AVAILABLE`].
pub async fn fetch_version<T: InferenceTransport + ?Sized>(transport: &T) -> String {
    match transport.get_version(VERSION_ENDPOINT).await {
        Ok(version) => version,
        Err(e) => {
            warn!("Ollama server version unavailable: {}", e);
            VERSION_NOT_AVAILABLE.to_string()
        }
    }
}

/// A single value that goes stale after `ttl`.
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    entry: Option<(Instant, T)>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    /// The cached value, if it is still fresh.
    pub fn get(&self) -> Option<&T> {
        match &self.entry {
            Some((fetched_at, value)) if fetched_at.elapsed() < self.ttl => Some(value),
            _ => None,
        }
    }

    pub fn insert(&mut self, value: T) {
        self.entry = Some((Instant::now(), value));
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub async fn get_or_refresh<F, Fut>(&mut self, fetch: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(value) = self.get() {
            return value.clone();
        }
        let value = fetch().await;
        self.insert(value.clone());
        value
    }
}
