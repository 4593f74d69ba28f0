//! Application wiring.

use std::sync::Arc;

use mstat_dashboard::validator_from_config;
use mstat_hub::Hub;
use mstat_source::WsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Runs one role of the application until shutdown.
pub struct Application {
    config: AppConfig,
    shutdown: CancellationToken,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the running role when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancel the shutdown token on Ctrl-C.
    pub fn shutdown_on_ctrl_c(&self) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
            shutdown.cancel();
        });
    }

    /// Hub plus viewer endpoint.
    pub async fn run_server(self) -> AppResult<()> {
        self.config.validate_server()?;

        let connector = Arc::new(WsConnector::new(self.config.hub.connection_config()));
        let (hub, reconnector) = Hub::start(&self.config.hub, connector).await?;
        info!(
            sources = hub.source_count(),
            fetch_timeout_ms = self.config.hub.fetch_timeout_ms,
            "Hub started"
        );

        let validator = validator_from_config(&self.config.dashboard);
        let result = mstat_dashboard::run_server(
            hub.clone(),
            self.config.dashboard.clone(),
            validator,
            self.shutdown.clone(),
        )
        .await;

        hub.shutdown();
        if let Err(e) = reconnector.await {
            error!(error = %e, "Reconnector task failed");
        }
        info!("Server stopped");
        Ok(result?)
    }

    /// Status exporter.
    pub async fn run_exporter(self) -> AppResult<()> {
        self.config.validate_exporter()?;
        mstat_exporter::run_exporter(self.config.exporter.clone(), self.shutdown.clone()).await?;
        info!("Exporter stopped");
        Ok(())
    }
}
