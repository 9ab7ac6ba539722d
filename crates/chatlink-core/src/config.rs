use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed endpoint of the local chat server.
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:31418";

/// Interval between connection attempts.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 5_000;

/// Agent configuration: where to dial and how often to retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    #[serde(alias = "serverUrl")]
    pub server_url: String,
    #[serde(alias = "retryIntervalMs")]
    pub retry_interval_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
        }
    }
}

impl AgentConfig {
    /// Config pointing at an explicit endpoint, default retry interval.
    pub fn with_server_url(url: impl Into<String>) -> Self {
        Self { server_url: url.into(), ..Default::default() }
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Reject configs the agent cannot run with.
    pub fn validate(&self) -> Result<(), crate::ChatLinkError> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(crate::ChatLinkError::ConfigurationInvalid {
                reason: format!("server_url must be a ws:// or wss:// URL, got {:?}", self.server_url),
            });
        }
        if self.retry_interval_ms == 0 {
            return Err(crate::ChatLinkError::ConfigurationInvalid {
                reason: "retry_interval_ms must be greater than zero".to_owned(),
            });
        }
        Ok(())
    }
}
