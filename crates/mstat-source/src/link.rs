//! Source connection traits.
//!
//! Trait-based seam between the hub and the transport, so the hub can be
//! driven by in-memory links in tests.

use crate::error::SourceResult;
use mstat_core::{BoxFuture, SourceId};

/// An established, exclusively owned connection to one status source.
///
/// Exactly one reply per trigger; callers must never issue a second fetch
/// before the first completes.
pub trait SourceLink: Send {
    /// Send the trigger token and wait for the single reply.
    fn fetch<'a>(&'a mut self, token: &'a str) -> BoxFuture<'a, SourceResult<String>>;

    /// Close the connection. Errors are swallowed.
    fn close(self: Box<Self>) -> BoxFuture<'static, ()>;
}

/// Dials status sources.
pub trait SourceConnector: Send + Sync {
    /// Open a new connection to `source`.
    fn connect<'a>(&'a self, source: &'a SourceId)
        -> BoxFuture<'a, SourceResult<Box<dyn SourceLink>>>;
}
