//! machine-status application.
//!
//! Two roles behind one binary:
//! - `server`: aggregation hub plus the viewer endpoint
//! - `exporter`: runs a status command and serves its output to hubs

pub mod app;
pub mod cli;
pub mod config;
pub mod error;

pub use app::Application;
pub use cli::{Cli, Command, ExporterArgs, ServerArgs};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
