//! Source side of machine-status.
//!
//! An exporter runs a status command on an interval, keeps its latest output
//! in a `StatusCache`, and answers every WebSocket message with that output.

pub mod cache;
pub mod config;
pub mod error;
pub mod refresher;
pub mod server;

pub use cache::{CachedStatus, StatusCache};
pub use config::ExporterConfig;
pub use error::{ExporterError, ExporterResult};
pub use refresher::Refresher;
pub use server::{create_router, run_exporter, serve};
