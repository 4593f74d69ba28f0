//! WebSocket client for machine-status exporter connections.
//!
//! The hub talks to every exporter through two small traits:
//! - `SourceConnector`: dials a source and hands back an owned link
//! - `SourceLink`: one request/reply exchange per fetch
//!
//! `WsConnector` / `WsLink` implement them over tokio-tungstenite.

pub mod connection;
pub mod error;
pub mod link;

pub use connection::{ConnectionConfig, WsConnector, WsLink};
pub use error::{SourceError, SourceResult};
pub use link::{SourceConnector, SourceLink};
