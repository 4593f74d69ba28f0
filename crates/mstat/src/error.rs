//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hub error: {0}")]
    Hub(#[from] mstat_hub::HubError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] mstat_dashboard::DashboardError),

    #[error("Exporter error: {0}")]
    Exporter(#[from] mstat_exporter::ExporterError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] mstat_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
