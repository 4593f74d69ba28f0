//! Application configuration.
//!
//! One TOML file with a section per role. Every field has a default, so an
//! empty file (or no file) is valid until role-specific validation runs.

use crate::error::{AppError, AppResult};
use mstat_dashboard::DashboardConfig;
use mstat_exporter::ExporterConfig;
use mstat_hub::HubConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "MSTAT_CONFIG";

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Aggregation hub (server role).
    #[serde(default)]
    pub hub: HubConfig,
    /// Viewer endpoint (server role).
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Status exporter (exporter role).
    #[serde(default)]
    pub exporter: ExporterConfig,
}

impl AppConfig {
    /// Load configuration from file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load from the CLI path, else the path in `MSTAT_CONFIG`, else defaults.
    pub fn load(cli_path: Option<&str>) -> AppResult<Self> {
        let env_path = std::env::var(CONFIG_ENV).ok();
        match resolve_path(cli_path, env_path.as_deref()) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Checks required by the `server` role.
    pub fn validate_server(&self) -> AppResult<()> {
        self.hub.validate()?;
        if self.dashboard.max_connections == 0 {
            return Err(AppError::Config(
                "dashboard.max_connections must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks required by the `exporter` role.
    pub fn validate_exporter(&self) -> AppResult<()> {
        self.exporter.validate()?;
        Ok(())
    }
}

/// CLI path wins over the environment; empty values count as unset.
fn resolve_path<'a>(cli: Option<&'a str>, env: Option<&'a str>) -> Option<&'a str> {
    cli.filter(|p| !p.is_empty())
        .or(env.filter(|p| !p.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.hub.machines.is_empty());
        assert_eq!(config.dashboard.port, 8080);
        assert_eq!(config.exporter.port, 9200);
        // No machines configured
        assert!(config.validate_server().is_err());
        assert!(config.validate_exporter().is_ok());
    }

    #[test]
    fn test_from_file_with_partial_sections() {
        let file = write_config(
            r#"
            [hub]
            machines = ["gpu1:9200", "gpu2:9200->Render box"]
            fetch_timeout_ms = 3000

            [dashboard]
            port = 8000
            username = "ops"
            password = "s3cret"
            "#,
        );

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.hub.machines.len(), 2);
        assert_eq!(config.hub.fetch_timeout_ms, 3000);
        assert_eq!(config.hub.connect_timeout_ms, 10_000);
        assert_eq!(config.dashboard.port, 8000);
        assert!(config.dashboard.auth_enabled());
        assert_eq!(config.exporter.interval_ms, 1000);
        assert!(config.validate_server().is_ok());

        let specs = config.hub.machine_specs().unwrap();
        assert_eq!(specs[1].alias, "Render box");
    }

    #[test]
    fn test_malformed_machine_fails_validation() {
        let file = write_config("[hub]\nmachines = [\"gpu1\"]\n");
        let config = AppConfig::from_file(file.path()).unwrap();
        assert!(matches!(config.validate_server(), Err(AppError::Hub(_))));
    }

    #[test]
    fn test_unparseable_file() {
        let file = write_config("[hub\nmachines = ");
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::from_file(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_resolve_path_precedence() {
        assert_eq!(resolve_path(Some("a.toml"), Some("b.toml")), Some("a.toml"));
        assert_eq!(resolve_path(None, Some("b.toml")), Some("b.toml"));
        assert_eq!(resolve_path(Some(""), Some("b.toml")), Some("b.toml"));
        assert_eq!(resolve_path(None, None), None);
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = toml::to_string(&AppConfig::default()).unwrap();
        assert!(toml_str.contains("[hub]"));
        assert!(toml_str.contains("fetch_timeout_ms"));
        assert!(toml_str.contains("[exporter]"));
    }
}
