//! Hub configuration.

use crate::error::{HubError, HubResult};
use mstat_core::{MachineSpec, FETCH_TOKEN, OFFLINE_PLACEHOLDER};
use mstat_source::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Aggregation hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Exporter machines: `host:port` or `host:port->alias`, in display order.
    #[serde(default)]
    pub machines: Vec<String>,
    /// Upper bound on one fetch (trigger sent to reply received).
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Upper bound on one connection attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Status text sent to viewers for a source that is down.
    #[serde(default = "default_offline_placeholder")]
    pub offline_placeholder: String,
    /// Trigger token sent to exporters.
    #[serde(default = "default_fetch_token")]
    pub fetch_token: String,
    /// Dial exporters with `wss://`.
    #[serde(default)]
    pub secure_sources: bool,
    /// WebSocket path on the exporters.
    #[serde(default = "default_source_path")]
    pub source_path: String,
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_offline_placeholder() -> String {
    OFFLINE_PLACEHOLDER.to_string()
}

fn default_fetch_token() -> String {
    FETCH_TOKEN.to_string()
}

fn default_source_path() -> String {
    "/ws".to_string()
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            machines: Vec::new(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            offline_placeholder: default_offline_placeholder(),
            fetch_token: default_fetch_token(),
            secure_sources: false,
            source_path: default_source_path(),
        }
    }
}

impl HubConfig {
    /// Parse the configured machine list.
    pub fn machine_specs(&self) -> HubResult<Vec<MachineSpec>> {
        if self.machines.is_empty() {
            return Err(HubError::NoSources);
        }
        self.machines
            .iter()
            .map(|m| MachineSpec::parse(m).map_err(HubError::from))
            .collect()
    }

    /// Validate values that would otherwise fail at runtime.
    pub fn validate(&self) -> HubResult<()> {
        self.machine_specs()?;
        if self.fetch_timeout_ms == 0 {
            return Err(HubError::Config("fetch_timeout_ms must be > 0".to_string()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(HubError::Config("connect_timeout_ms must be > 0".to_string()));
        }
        if self.fetch_token.is_empty() {
            return Err(HubError::Config("fetch_token must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Transport settings for `WsConnector`.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            secure: self.secure_sources,
            path: self.source_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.fetch_token, "fetch");
        assert_eq!(config.offline_placeholder, OFFLINE_PLACEHOLDER);
    }

    #[test]
    fn test_empty_machine_list_rejected() {
        let config = HubConfig::default();
        assert!(matches!(config.validate(), Err(HubError::NoSources)));
    }

    #[test]
    fn test_machine_specs_keep_order() {
        let config = HubConfig {
            machines: vec![
                "b:9200".to_string(),
                "a:9200->Alpha".to_string(),
                "c:9200".to_string(),
            ],
            ..Default::default()
        };
        let specs = config.machine_specs().unwrap();
        let ids: Vec<_> = specs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b:9200", "a:9200", "c:9200"]);
        assert_eq!(specs[1].alias, "Alpha");
    }

    #[test]
    fn test_malformed_machine_rejected() {
        let config = HubConfig {
            machines: vec!["a:9200".to_string(), "no-port".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HubError::Core(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = HubConfig {
            machines: vec!["a:9200".to_string()],
            fetch_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HubError::Config(_))));
    }
}
