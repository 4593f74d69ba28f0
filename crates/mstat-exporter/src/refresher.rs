//! Periodic status command runner.

use std::sync::Arc;
use std::time::Duration;

use mstat_telemetry::Metrics;
use tokio::process::Command;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::StatusCache;
use crate::config::ExporterConfig;
use crate::error::{ExporterError, ExporterResult};

/// Runs the status command and stores its stdout in the cache.
pub struct Refresher {
    program: String,
    args: Vec<String>,
    interval: Duration,
    cache: Arc<StatusCache>,
}

impl Refresher {
    pub fn new(config: &ExporterConfig, cache: Arc<StatusCache>) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            interval: config.interval(),
            cache,
        }
    }

    /// Run the command once. On failure the cache keeps its previous text.
    pub async fn refresh_once(&self) -> ExporterResult<()> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExporterError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExporterError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(bytes = text.len(), "Status cache updated");
        self.cache.update(text);
        Ok(())
    }

    /// Refresh every `interval` until shutdown.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            program = %self.program,
            interval_ms = self.interval.as_millis() as u64,
            "Status refresher started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("Shutdown requested, refresher exiting");
                    return;
                }
                _ = ticker.tick() => {
                    let result = self.refresh_once().await;
                    Metrics::exporter_refresh(result.is_ok());
                    if let Err(e) = result {
                        warn!(error = %e, "Status refresh failed, serving previous output");
                    }
                }
            }
        }
    }
}
