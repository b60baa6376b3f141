//! Synchronization layer configuration.

use crate::reconnect::ReconnectConfig;

/// Configuration for the event bus client and REST wrapper.
///
/// All fields have defaults suitable for local development; override via
/// environment variables in production.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// WebSocket base URL of the push endpoint (default: `ws://localhost:8100`).
    pub ws_url: String,
    /// HTTP base URL of the job API (default: `http://localhost:8100`).
    pub api_url: String,
    /// Push channel to subscribe to (default: `jobs`).
    pub channel: String,
    /// Event name carrying job updates (default: `job.updated`).
    pub event: String,
    /// Backoff policy for re-establishing the subscription.
    pub reconnect: ReconnectConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8100".into(),
            api_url: "http://localhost:8100".into(),
            channel: "jobs".into(),
            event: "job.updated".into(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var            | Default                 |
    /// |--------------------|-------------------------|
    /// | `TRANSMUX_WS_URL`  | `ws://localhost:8100`   |
    /// | `TRANSMUX_API_URL` | `http://localhost:8100` |
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(ws_url) = std::env::var("TRANSMUX_WS_URL") {
            config.ws_url = ws_url;
        }
        if let Ok(api_url) = std::env::var("TRANSMUX_API_URL") {
            config.api_url = api_url;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_the_job_channel() {
        let config = SyncConfig::default();
        assert_eq!(config.channel, "jobs");
        assert_eq!(config.event, "job.updated");
    }
}
