//! Configuration for bus endpoints and the dispatch engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a bus connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Endpoint name to connect to. The empty string selects
    /// `default_endpoint`.
    #[serde(default)]
    pub endpoint: String,

    /// Medium used when `endpoint` is empty.
    #[serde(default = "default_endpoint")]
    pub default_endpoint: String,

    /// Capacity of the pause buffer. When paused, inbound frames beyond
    /// this count evict the oldest buffered frame.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// How often the background worker wakes from a quiet transport to
    /// check for control commands and shutdown.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

fn default_endpoint() -> String {
    "inproc".to_string()
}

fn default_queue_size() -> usize {
    16
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            default_endpoint: default_endpoint(),
            queue_size: default_queue_size(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl BusConfig {
    /// Create a new config with a custom endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Create a new config with a custom default endpoint.
    #[must_use]
    pub fn with_default_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.default_endpoint = endpoint.into();
        self
    }

    /// Create a new config with a custom pause-buffer capacity.
    #[must_use]
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Create a new config with a custom worker poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The endpoint this config resolves to: `endpoint`, or
    /// `default_endpoint` when `endpoint` is empty.
    #[must_use]
    pub fn resolved_endpoint(&self) -> &str {
        if self.endpoint.is_empty() {
            &self.default_endpoint
        } else {
            &self.endpoint
        }
    }
}
