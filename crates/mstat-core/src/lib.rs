//! Core domain types for machine-status.
//!
//! This crate provides the types shared by the hub, the viewer endpoint and
//! the exporter:
//! - `SourceId`: identity of a status source (`host:port`)
//! - `MachineSpec`: a configured machine with its display alias
//! - `AggregatedRecord`: one `{Machine, Data}` entry of a fetch cycle
//! - `BoxFuture`: boxed future for dyn-compatible async traits

pub mod error;
pub mod record;
pub mod source;

pub use error::{CoreError, Result};
pub use record::AggregatedRecord;
pub use source::{MachineSpec, SourceId, ALIAS_SEPARATOR};

use std::future::Future;
use std::pin::Pin;

/// Trigger token sent to a status source to request its cached status.
pub const FETCH_TOKEN: &str = "fetch";

/// Status text substituted for a source that is offline or failed to reply.
pub const OFFLINE_PLACEHOLDER: &str = "Server is offline";

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
