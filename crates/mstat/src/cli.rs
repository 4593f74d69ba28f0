//! Command line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;

/// machine-status: a live status dashboard for many machines.
#[derive(Parser, Debug)]
#[command(name = "mstat", version, about, long_about = None)]
pub struct Cli {
    /// Debug logging
    #[arg(long, global = true, env = "MSTAT_DEBUG")]
    pub debug: bool,

    /// Configuration file path (can also be set via MSTAT_CONFIG env var)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the aggregation hub and the viewer endpoint
    Server(ServerArgs),
    /// Run a status exporter
    Exporter(ExporterArgs),
}

/// Overrides for the `[hub]` and `[dashboard]` sections.
#[derive(Args, Debug, Default)]
pub struct ServerArgs {
    /// Exporter machines, comma separated (`host:9200` or `host:9200->alias`)
    #[arg(long = "machine", value_delimiter = ',', env = "MSTAT_MACHINE")]
    pub machines: Vec<String>,

    /// Viewer endpoint port
    #[arg(long, env = "MSTAT_PORT")]
    pub port: Option<u16>,

    /// Refresh interval advertised to viewers, in milliseconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Static asset directory served under /web
    #[arg(long)]
    pub web_dir: Option<PathBuf>,

    /// Basic auth username
    #[arg(long, env = "MSTAT_USERNAME")]
    pub username: Option<String>,

    /// Basic auth password
    #[arg(long, env = "MSTAT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Dial exporters over wss://
    #[arg(long)]
    pub wss: bool,
}

impl ServerArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if !self.machines.is_empty() {
            config.hub.machines = self.machines.clone();
        }
        if let Some(port) = self.port {
            config.dashboard.port = port;
        }
        if let Some(interval) = self.interval {
            config.dashboard.refresh_interval_ms = interval;
        }
        if let Some(dir) = &self.web_dir {
            config.dashboard.web_dir = Some(dir.clone());
        }
        if let Some(username) = &self.username {
            config.dashboard.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.dashboard.password = password.clone();
        }
        if self.wss {
            config.hub.secure_sources = true;
        }
    }
}

/// Overrides for the `[exporter]` section.
#[derive(Args, Debug, Default)]
pub struct ExporterArgs {
    /// Port to serve
    #[arg(long, env = "MSTAT_PORT")]
    pub port: Option<u16>,

    /// Status command
    #[arg(long)]
    pub program: Option<String>,

    /// Pause between command runs, in milliseconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Arguments passed to the status command (after `--`)
    #[arg(last = true)]
    pub args: Vec<String>,
}

impl ExporterArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.exporter.port = port;
        }
        if let Some(program) = &self.program {
            config.exporter.program = program.clone();
        }
        if let Some(interval) = self.interval {
            config.exporter.interval_ms = interval;
        }
        if !self.args.is_empty() {
            config.exporter.args = self.args.clone();
        }
    }
}
