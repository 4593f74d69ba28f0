//! Exporter HTTP/WebSocket server.
//!
//! - `GET /`   raw cached status
//! - `GET /ws` WebSocket; every text/binary message is answered with the
//!   cached status in a frame of the same type

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use mstat_telemetry::Metrics;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::StatusCache;
use crate::config::ExporterConfig;
use crate::error::ExporterResult;
use crate::refresher::Refresher;

/// Create the exporter router.
pub fn create_router(cache: Arc<StatusCache>) -> Router {
    Router::new()
        .route("/", get(serve_status))
        .route("/ws", get(ws_handler))
        .with_state(cache)
}

async fn serve_status(State(cache): State<Arc<StatusCache>>) -> String {
    Metrics::exporter_request();
    cache.text()
}

async fn ws_handler(
    State(cache): State<Arc<StatusCache>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_hub_connection(socket, cache, peer))
}

async fn handle_hub_connection(mut socket: WebSocket, cache: Arc<StatusCache>, peer: SocketAddr) {
    info!(%peer, "Hub connected");

    while let Some(result) = socket.recv().await {
        let reply = match result {
            Ok(Message::Text(request)) => {
                debug!(%peer, request = %request.as_str(), "Status requested");
                Message::Text(cache.text().into())
            }
            Ok(Message::Binary(_)) => Message::Binary(cache.text().into_bytes().into()),
            Ok(Message::Close(_)) => break,
            // Pong replies are sent by axum
            Ok(_) => continue,
            Err(e) => {
                warn!(%peer, error = %e, "Read from hub failed");
                break;
            }
        };

        Metrics::exporter_request();
        if let Err(e) = socket.send(reply).await {
            warn!(%peer, error = %e, "Write to hub failed");
            break;
        }
    }

    info!(%peer, "Hub disconnected");
}

/// Serve the exporter on an already bound listener until shutdown.
pub async fn serve(
    listener: TcpListener,
    cache: Arc<StatusCache>,
    shutdown: CancellationToken,
) -> ExporterResult<()> {
    let app = create_router(cache).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

/// Run the exporter: refresher task plus server, until shutdown.
pub async fn run_exporter(config: ExporterConfig, shutdown: CancellationToken) -> ExporterResult<()> {
    config.validate()?;

    let cache = Arc::new(StatusCache::new());
    let refresher = Refresher::new(&config, cache.clone());
    let refresher_task = tokio::spawn(refresher.run(shutdown.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(port = config.port, program = %config.program, "Starting exporter");

    let result = serve(listener, cache, shutdown.clone()).await;
    shutdown.cancel();
    let _ = refresher_task.await;
    result
}
