//! HTTP server implementation using axum.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::routing::get;
use axum::Router;
use mstat_hub::{Hub, ReconnectorState, SourceSnapshot};
use mstat_telemetry::Metrics;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::auth::SessionValidator;
use crate::config::DashboardConfig;
use crate::error::DashboardResult;
use crate::limiter::ConnectionLimiter;
use crate::session::ViewerSession;

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    hub: Hub,
    validator: Arc<dyn SessionValidator>,
    limiter: Arc<ConnectionLimiter>,
    refresh_interval_ms: u64,
}

impl AppState {
    pub fn new(hub: Hub, config: &DashboardConfig, validator: Arc<dyn SessionValidator>) -> Self {
        Self {
            hub,
            validator,
            limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            refresh_interval_ms: config.refresh_interval_ms,
        }
    }

    pub fn connections(&self) -> usize {
        self.limiter.current_count()
    }
}

/// `GET /api/snapshot` body.
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub refresh_interval_ms: u64,
    pub offline_placeholder: String,
    pub sources: Vec<SourceSnapshot>,
}

/// `GET /health` body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sources: usize,
    pub online: usize,
    pub reconnector: &'static str,
    pub viewers: usize,
}

/// Create the axum router.
pub fn create_router(state: AppState, web_dir: Option<&Path>) -> Router {
    let mut router = Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/snapshot", get(get_snapshot))
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics));

    if let Some(dir) = web_dir {
        router = router
            .route("/", get(|| async { Redirect::temporary("/web/") }))
            .nest_service("/web", ServeDir::new(dir));
    }

    router.with_state(state)
}

async fn get_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SnapshotResponse>, Response> {
    if !state.validator.authorize(&headers) {
        return Err(unauthorized_response());
    }

    Ok(Json(SnapshotResponse {
        refresh_interval_ms: state.refresh_interval_ms,
        offline_placeholder: state.hub.offline_placeholder().to_string(),
        sources: state.hub.snapshot().await,
    }))
}

async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.hub.snapshot().await;
    let reconnector = match state.hub.reconnector_state() {
        ReconnectorState::Idle => "idle",
        ReconnectorState::Connecting => "connecting",
    };

    Json(HealthResponse {
        status: "ok",
        sources: snapshot.len(),
        online: snapshot.iter().filter(|s| s.online).count(),
        reconnector,
        viewers: state.connections(),
    })
}

async fn get_metrics() -> Response {
    match Metrics::render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if !state.validator.authorize(&headers) {
        return unauthorized_response();
    }

    let Some(guard) = state.limiter.try_acquire() else {
        warn!(
            current = state.limiter.current_count(),
            max = state.limiter.max(),
            "Viewer connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    let session = ViewerSession::new(state.hub.clone());
    info!(
        session = %session.id(),
        connections = state.limiter.current_count(),
        "Viewer connected"
    );

    ws.on_upgrade(move |socket| async move {
        let _guard = guard;
        let id = session.id();
        match session.run(socket).await {
            Ok(stats) => info!(
                session = %id,
                cycles = stats.cycles,
                records = stats.records,
                "Viewer disconnected"
            ),
            Err(e) => debug!(session = %id, error = %e, "Viewer session ended"),
        }
    })
}

/// Create an unauthorized response.
fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"machine-status\"")],
        "Unauthorized",
    )
        .into_response()
}

/// Serve the router on an already bound listener until shutdown.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> DashboardResult<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

/// Run the viewer endpoint until shutdown.
pub async fn run_server(
    hub: Hub,
    config: DashboardConfig,
    validator: Arc<dyn SessionValidator>,
    shutdown: CancellationToken,
) -> DashboardResult<()> {
    let state = AppState::new(hub, &config, validator);
    let router = create_router(state, config.web_dir.as_deref());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(
        port = config.port,
        auth = config.auth_enabled(),
        "Starting dashboard server"
    );

    let listener = TcpListener::bind(addr).await?;
    serve(listener, router, shutdown).await
}
