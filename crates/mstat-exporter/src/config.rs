//! Exporter configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ExporterError, ExporterResult};

/// Exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Command whose stdout is the machine status.
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Pause between command runs.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_port() -> u16 {
    9200
}

fn default_program() -> String {
    "./scripts/sys-usage".to_string()
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            program: default_program(),
            args: Vec::new(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl ExporterConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> ExporterResult<()> {
        if self.program.trim().is_empty() {
            return Err(ExporterError::Config("program must not be empty".to_string()));
        }
        if self.interval_ms == 0 {
            return Err(ExporterError::Config("interval_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExporterConfig::default();
        assert_eq!(config.port, 9200);
        assert_eq!(config.interval(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = ExporterConfig {
            interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ExporterError::Config(_))));
    }
}
