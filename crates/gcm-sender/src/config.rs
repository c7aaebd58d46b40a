//! Sender configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffPolicy;
use crate::error::{GcmError, Result};

/// Default gateway endpoint.
pub const GCM_SEND_ENDPOINT: &str = "https://android.googleapis.com/gcm/send";

/// Configuration shared by every delivery call of a [`Sender`](crate::Sender).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Pre-shared key sent as `Authorization: key=<api_key>`.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_endpoint() -> String {
    GCM_SEND_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    1_024_000
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl SenderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Read `GCM_API_KEY` (required), `GCM_ENDPOINT` and `GCM_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GCM_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GcmError::config("GCM_API_KEY must be set"))?;

        let mut config = Self::new(api_key);
        if let Ok(endpoint) = std::env::var("GCM_ENDPOINT")
            && !endpoint.trim().is_empty()
        {
            config.endpoint = endpoint.trim().to_string();
        }
        if let Ok(timeout) = std::env::var("GCM_TIMEOUT_SECS") {
            config.timeout_secs = timeout
                .trim()
                .parse()
                .map_err(|e| GcmError::config(format!("Invalid GCM_TIMEOUT_SECS: {e}")))?;
        }
        Ok(config)
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}
