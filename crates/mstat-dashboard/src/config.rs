//! Dashboard configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Viewer endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// How often viewers are expected to ask for a refresh. Advertised to
    /// pages through `/api/snapshot`; the server itself never polls.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Maximum concurrent viewer connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Basic auth username (empty = disabled).
    #[serde(default)]
    pub username: String,
    /// Basic auth password (empty = disabled).
    #[serde(default)]
    pub password: String,
    /// Static assets served under `/web`.
    #[serde(default)]
    pub web_dir: Option<PathBuf>,
}

fn default_port() -> u16 {
    8080
}

fn default_refresh_interval_ms() -> u64 {
    1000
}

fn default_max_connections() -> usize {
    64
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            refresh_interval_ms: default_refresh_interval_ms(),
            max_connections: default_max_connections(),
            username: String::new(),
            password: String::new(),
            web_dir: None,
        }
    }
}

impl DashboardConfig {
    /// Check if basic auth is enabled.
    pub fn auth_enabled(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}
