//! machine-status entry point.

use anyhow::Result;
use clap::Parser;
use mstat::{AppConfig, Application, Cli, Command};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    mstat_telemetry::init_logging(cli.debug)?;

    info!("Starting machine-status v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > MSTAT_CONFIG env var > built-in defaults
    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Server(args) => {
            args.apply(&mut config);
            info!(
                machines = ?config.hub.machines,
                port = config.dashboard.port,
                "Configuration loaded"
            );
            let app = Application::new(config);
            app.shutdown_on_ctrl_c();
            app.run_server().await?;
        }
        Command::Exporter(args) => {
            args.apply(&mut config);
            info!(
                program = %config.exporter.program,
                port = config.exporter.port,
                "Configuration loaded"
            );
            let app = Application::new(config);
            app.shutdown_on_ctrl_c();
            app.run_exporter().await?;
        }
    }

    Ok(())
}
