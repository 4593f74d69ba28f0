//! Error types for mstat-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid source address: {0}")]
    InvalidAddress(String),

    #[error("Invalid machine spec: {0}")]
    InvalidMachineSpec(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
