//! Hub error types.

use mstat_core::{CoreError, SourceId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Unknown source: {0}")]
    UnknownSource(SourceId),

    #[error("Duplicate source: {0}")]
    DuplicateSource(SourceId),

    #[error("No sources configured")]
    NoSources,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid machine: {0}")]
    Core(#[from] CoreError),
}

pub type HubResult<T> = Result<T, HubError>;
