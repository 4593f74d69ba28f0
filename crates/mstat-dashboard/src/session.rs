//! Viewer sessions.
//!
//! Any data message from a viewer is a refresh request. Each request runs one
//! fetch cycle and streams the records back, one JSON text message per
//! source, in configured order, with no end marker.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt};
use mstat_hub::{Hub, PendingCycle};
use mstat_telemetry::Metrics;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::DashboardResult;

/// Counters for one finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub cycles: u64,
    pub records: u64,
}

/// One connected viewer.
pub struct ViewerSession {
    id: Uuid,
    hub: Hub,
}

impl ViewerSession {
    pub fn new(hub: Hub) -> Self {
        Self {
            id: Uuid::new_v4(),
            hub,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Serve the viewer until it disconnects or the transport fails.
    pub async fn run(self, mut socket: WebSocket) -> DashboardResult<SessionStats> {
        Metrics::viewer_connected();
        let mut stats = SessionStats::default();
        let result = self.serve(&mut socket, &mut stats).await;
        Metrics::viewer_disconnected();
        result.map(|()| stats)
    }

    async fn serve(&self, socket: &mut WebSocket, stats: &mut SessionStats) -> DashboardResult<()> {
        while let Some(msg) = socket.recv().await {
            match msg? {
                Message::Text(_) | Message::Binary(_) => {}
                Message::Close(_) => {
                    debug!(session = %self.id, "Viewer sent close frame");
                    return Ok(());
                }
                // Pong replies are sent by axum
                Message::Ping(_) | Message::Pong(_) => continue,
            }

            self.refresh(socket, stats).await?;
        }
        Ok(())
    }

    /// Run one cycle and stream its records to `sink`.
    ///
    /// A reconnect is requested for any offline source seen, even when the
    /// write fails partway through.
    async fn refresh<S>(&self, sink: &mut S, stats: &mut SessionStats) -> DashboardResult<()>
    where
        S: Sink<Message, Error = axum::Error> + Unpin,
    {
        stats.cycles += 1;
        let mut cycle = self.hub.dispatch();
        let delivered = deliver(&mut cycle, sink, stats).await;

        let offline = cycle.offline_count();
        trace!(session = %self.id, offline, ok = delivered.is_ok(), "Cycle ended");
        if offline > 0 {
            self.hub.request_reconnect();
        }
        delivered
    }
}

async fn deliver<S>(
    cycle: &mut PendingCycle,
    sink: &mut S,
    stats: &mut SessionStats,
) -> DashboardResult<()>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    while let Some(record) = cycle.next().await {
        let json = serde_json::to_string(&record)?;
        sink.send(Message::Text(json.into())).await?;
        stats.records += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use mstat_core::{MachineSpec, SourceId};
    use mstat_hub::mock::{MockBehavior, MockConnector, MockLink, MockSource};
    use mstat_hub::HubConfig;

    /// Sink whose peer has gone away.
    struct ClosedSink;

    impl Sink<Message> for ClosedSink {
        type Error = axum::Error;

        fn poll_ready(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Err(axum::Error::new(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            ))))
        }

        fn start_send(self: Pin<&mut Self>, _item: Message) -> Result<(), Self::Error> {
            Ok(())
        }

        fn poll_flush(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_still_requests_reconnect() {
        let machines = vec![
            MachineSpec::parse("a:1").unwrap(),
            MachineSpec::parse("b:2").unwrap(),
        ];
        let (hub, _reconnector) = Hub::new(
            &HubConfig::default(),
            machines,
            Arc::new(MockConnector::new()),
        )
        .unwrap();
        let a = SourceId::parse("a:1").unwrap();
        hub.registry()
            .set_online(&a, Box::new(MockLink::new(MockSource::new(MockBehavior::Fail))))
            .await
            .unwrap();

        let session = ViewerSession::new(hub.clone());
        let mut stats = SessionStats::default();
        let result = session.refresh(&mut ClosedSink, &mut stats).await;

        assert!(result.is_err());
        assert_eq!(stats, SessionStats { cycles: 1, records: 0 });
        // The session's trigger is still pending, so another one coalesces
        assert!(!hub.request_reconnect());
    }
}
