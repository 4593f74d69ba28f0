//! Aggregation hub for machine-status.
//!
//! Owns the connections to every configured exporter and turns a viewer's
//! refresh request into one ordered record per source:
//! - `SourceRegistry`: per-source state behind a per-source lock
//! - `Reconnector`: single background loop restoring offline sources,
//!   woken by a coalescing trigger
//! - `FetchCoordinator`: parallel fetch to every source, ordered fan-in
//! - `Hub`: owns the above and exposes the narrow surface used by viewers

pub mod config;
pub mod coordinator;
pub mod error;
pub mod hub;
pub mod mock;
pub mod reconnector;
pub mod registry;

pub use config::HubConfig;
pub use coordinator::{FetchCoordinator, FetchOutcome, PendingCycle};
pub use error::{HubError, HubResult};
pub use hub::Hub;
pub use reconnector::{
    reconnect_channel, PassReport, ReconnectTrigger, Reconnector, ReconnectorHandle,
    ReconnectorState,
};
pub use registry::{SourceEntry, SourceRegistry, SourceSnapshot, SourceState};
