//! Client configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::NewTask;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for a client session.
///
/// Every field is optional in the JSON form; missing fields take the defaults
/// from `ClientConfig::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when `QUICKTASK_LOG` is unset
    pub log_filter: String,
    /// Simulated round-trip time of the in-memory server
    pub remote_latency_ms: u64,
    /// Tasks pre-loaded into the in-memory server
    pub seed: Vec<NewTask>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            remote_latency_ms: 0,
            seed: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn with_latency_ms(mut self, ms: u64) -> Self {
        self.remote_latency_ms = ms;
        self
    }

    pub fn with_seed(mut self, tasks: impl IntoIterator<Item = NewTask>) -> Self {
        self.seed.extend(tasks);
        self
    }

    pub fn remote_latency(&self) -> Duration {
        Duration::from_millis(self.remote_latency_ms)
    }
}
