//! WebSocket source connections.
//!
//! Dials `ws://<host:port>/ws` on an exporter and performs the
//! trigger/reply exchange over the resulting stream.

use crate::error::{SourceError, SourceResult};
use crate::link::{SourceConnector, SourceLink};
use futures_util::{SinkExt, StreamExt};
use mstat_core::{BoxFuture, SourceId};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Use `wss://` instead of `ws://`.
    pub secure: bool,
    /// Request path on the exporter.
    pub path: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            secure: false,
            path: "/ws".to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Build the WebSocket URL for a source.
    pub fn url_for(&self, source: &SourceId) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let path = self.path.trim_start_matches('/');
        format!("{scheme}://{source}/{path}")
    }
}

/// Dials exporters over WebSocket.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    config: ConnectionConfig,
}

impl WsConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    async fn dial(&self, source: &SourceId) -> SourceResult<WsLink> {
        let url = self.config.url_for(source);
        debug!(%source, %url, "Dialing exporter");

        // TCP_NODELAY: replies are single small frames
        let (stream, _response) = connect_async_tls_with_config(&url, None, true, None)
            .await
            .map_err(|e| SourceError::ConnectionFailed(format!("{url}: {e}")))?;

        info!(%source, "Exporter connected");
        Ok(WsLink {
            source: source.clone(),
            stream,
        })
    }
}

impl SourceConnector for WsConnector {
    fn connect<'a>(
        &'a self,
        source: &'a SourceId,
    ) -> BoxFuture<'a, SourceResult<Box<dyn SourceLink>>> {
        Box::pin(async move {
            let link = self.dial(source).await?;
            Ok(Box::new(link) as Box<dyn SourceLink>)
        })
    }
}

/// An open WebSocket connection to one exporter.
pub struct WsLink {
    source: SourceId,
    stream: WsStream,
}

impl WsLink {
    async fn exchange(&mut self, token: &str) -> SourceResult<String> {
        self.stream.send(Message::Text(token.to_string())).await?;

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(String::from_utf8_lossy(&data).into_owned());
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (f.code.into(), f.reason.to_string()))
                        .unwrap_or((1000, "Normal close".to_string()));
                    warn!(source = %self.source, code, %reason, "Exporter closed connection");
                    return Err(SourceError::ConnectionClosed { code, reason });
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(SourceError::ConnectionClosed {
                        code: 1006,
                        reason: "Stream ended before reply".to_string(),
                    });
                }
                // Ping replies are queued by tungstenite itself
                Some(Ok(_)) => {}
            }
        }
    }
}

impl SourceLink for WsLink {
    fn fetch<'a>(&'a mut self, token: &'a str) -> BoxFuture<'a, SourceResult<String>> {
        Box::pin(self.exchange(token))
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        let mut link = *self;
        Box::pin(async move {
            if let Err(e) = link.stream.close(None).await {
                debug!(source = %link.source, error = %e, "Close frame not delivered");
            }
        })
    }
}
