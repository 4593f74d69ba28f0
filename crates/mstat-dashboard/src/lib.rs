//! mstat-dashboard - viewer endpoint for machine-status.
//!
//! Viewers connect over WebSocket and send any message to request a
//! refresh; each request runs one hub fetch cycle and streams back one JSON
//! record per source.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   mstat server process                    │
//! │                                                          │
//! │  ┌──────────────┐   dispatch()    ┌───────────────────┐  │
//! │  │ ViewerSession│ ──────────────▶ │        Hub        │  │
//! │  │ (per viewer) │ ◀── records ─── │ registry/coord/   │  │
//! │  └──────┬───────┘ request_        │ reconnector       │  │
//! │         │         reconnect() ──▶ └───────────────────┘  │
//! │  ┌──────┴────────────────────────────────────────────┐   │
//! │  │ axum HTTP server                                   │   │
//! │  │  GET /ws           → viewer WebSocket              │   │
//! │  │  GET /api/snapshot → cached status, no fetch       │   │
//! │  │  GET /health       → liveness + online count       │   │
//! │  │  GET /metrics      → Prometheus text               │   │
//! │  │  GET /web/*        → static assets (optional)      │   │
//! │  └────────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod auth;
mod config;
mod error;
mod limiter;
mod server;
mod session;

pub use auth::{validator_from_config, AllowAll, BasicAuth, SessionValidator};
pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use limiter::{ConnectionGuard, ConnectionLimiter};
pub use server::{
    create_router, run_server, serve, AppState, HealthResponse, SnapshotResponse,
};
pub use session::{SessionStats, ViewerSession};
