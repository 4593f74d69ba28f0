//! Reconnection loop.
//!
//! A single task owns the receiving side of a capacity-1 trigger channel.
//! Each received trigger runs one pass over the registry that dials every
//! offline source once. Triggers that arrive while a trigger is already
//! pending are dropped, so any burst of requests costs at most one extra
//! pass. There is no backoff: the next attempt happens on the next trigger.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use mstat_source::SourceConnector;
use mstat_telemetry::Metrics;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::{SourceEntry, SourceRegistry};

/// Reconnector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectorState {
    Idle,
    Connecting,
}

/// Non-blocking, coalescing trigger for the reconnector.
#[derive(Debug, Clone)]
pub struct ReconnectTrigger {
    tx: mpsc::Sender<()>,
}

impl ReconnectTrigger {
    /// Request a reconnection pass.
    ///
    /// Returns `false` when the request was folded into one already pending
    /// (or the reconnector has stopped).
    pub fn trigger(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("Reconnect already pending, trigger coalesced");
                false
            }
            Err(TrySendError::Closed(())) => false,
        }
    }
}

/// Create the single-slot trigger channel.
pub fn reconnect_channel() -> (ReconnectTrigger, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(1);
    (ReconnectTrigger { tx }, rx)
}

/// Outcome of one reconnection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Offline sources dialed.
    pub attempted: usize,
    /// Of those, how many are now online.
    pub restored: usize,
}

/// Observable side of the reconnector, shared with the hub.
#[derive(Debug, Clone)]
pub struct ReconnectorHandle {
    trigger: ReconnectTrigger,
    state: Arc<RwLock<ReconnectorState>>,
    passes: Arc<AtomicU64>,
}

impl ReconnectorHandle {
    pub fn trigger(&self) -> bool {
        self.trigger.trigger()
    }

    pub fn state(&self) -> ReconnectorState {
        *self.state.read()
    }

    /// Completed passes since start.
    pub fn completed_passes(&self) -> u64 {
        self.passes.load(Ordering::Acquire)
    }
}

/// The reconnection loop.
pub struct Reconnector {
    registry: Arc<SourceRegistry>,
    connector: Arc<dyn SourceConnector>,
    connect_timeout: Duration,
    trigger_rx: mpsc::Receiver<()>,
    handle: ReconnectorHandle,
    shutdown: CancellationToken,
}

impl Reconnector {
    pub fn new(
        registry: Arc<SourceRegistry>,
        connector: Arc<dyn SourceConnector>,
        connect_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let (trigger, trigger_rx) = reconnect_channel();
        Self {
            registry,
            connector,
            connect_timeout,
            trigger_rx,
            handle: ReconnectorHandle {
                trigger,
                state: Arc::new(RwLock::new(ReconnectorState::Idle)),
                passes: Arc::new(AtomicU64::new(0)),
            },
            shutdown,
        }
    }

    pub fn handle(&self) -> ReconnectorHandle {
        self.handle.clone()
    }

    /// Wait for triggers and run one pass per trigger until shutdown.
    pub async fn run(mut self) {
        info!(sources = self.registry.len(), "Reconnector started");
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested, reconnector exiting");
                    return;
                }
                msg = self.trigger_rx.recv() => {
                    if msg.is_none() {
                        return;
                    }
                    self.run_pass().await;
                }
            }
        }
    }

    /// Dial every offline source once, in parallel, and install the links
    /// that succeed.
    pub async fn run_pass(&self) -> PassReport {
        *self.handle.state.write() = ReconnectorState::Connecting;

        let results = join_all(
            self.registry
                .entries()
                .iter()
                .map(|entry| self.restore(entry)),
        )
        .await;
        let attempted = results.iter().filter(|r| r.is_some()).count();
        let restored = results.iter().filter(|r| **r == Some(true)).count();

        *self.handle.state.write() = ReconnectorState::Idle;
        self.handle.passes.fetch_add(1, Ordering::AcqRel);

        if attempted > 0 {
            info!(attempted, restored, "Reconnect pass finished");
        }
        PassReport { attempted, restored }
    }

    /// `None` when the source is already online, otherwise whether the dial
    /// brought it back.
    async fn restore(&self, entry: &SourceEntry) -> Option<bool> {
        // Waits out snapshots and in-flight fetches, all bounded
        let online = entry.lock().await.is_online();
        if online {
            return None;
        }
        Some(self.reconnect(entry).await)
    }

    async fn reconnect(&self, entry: &SourceEntry) -> bool {
        let dial = self.connector.connect(entry.id());
        let result = match tokio::time::timeout(self.connect_timeout, dial).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!(
                "no handshake within {}ms",
                self.connect_timeout.as_millis()
            )),
        };

        match result {
            Ok(link) => {
                Metrics::reconnect_attempt(entry.id().as_str(), true);
                entry.go_online(link).await;
                true
            }
            Err(error) => {
                Metrics::reconnect_attempt(entry.id().as_str(), false);
                warn!(source = %entry.id(), %error, "Dial failed, source stays offline");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBehavior, MockConnector};
    use mstat_core::{MachineSpec, SourceId};
    use tokio::time::timeout;

    fn setup(
        behaviors: &[(&str, MockBehavior)],
    ) -> (
        Arc<SourceRegistry>,
        Vec<Arc<crate::mock::MockSource>>,
        Reconnector,
    ) {
        let specs = behaviors
            .iter()
            .map(|(id, _)| MachineSpec::parse(id).unwrap())
            .collect();
        let registry = Arc::new(SourceRegistry::new(specs).unwrap());

        let mut connector = MockConnector::new();
        let mocks = behaviors
            .iter()
            .map(|(id, b)| connector.add(&SourceId::parse(id).unwrap(), b.clone()))
            .collect();

        let reconnector = Reconnector::new(
            registry.clone(),
            Arc::new(connector),
            Duration::from_millis(200),
            CancellationToken::new(),
        );
        (registry, mocks, reconnector)
    }

    fn ok() -> MockBehavior {
        MockBehavior::Reply {
            text: "ok".to_string(),
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_pass_restores_reachable_sources() {
        let (registry, mocks, reconnector) =
            setup(&[("a:1", ok()), ("b:2", MockBehavior::Refuse)]);

        let report = reconnector.run_pass().await;

        assert_eq!(report, PassReport { attempted: 2, restored: 1 });
        assert_eq!(mocks[0].dial_count(), 1);
        assert_eq!(mocks[1].dial_count(), 1);
        assert!(registry.get(&SourceId::parse("a:1").unwrap()).await.unwrap().online);
        assert!(!registry.get(&SourceId::parse("b:2").unwrap()).await.unwrap().online);
        assert_eq!(reconnector.handle().state(), ReconnectorState::Idle);
    }

    #[tokio::test]
    async fn test_pass_skips_online_sources() {
        let (_registry, mocks, reconnector) = setup(&[("a:1", ok())]);

        reconnector.run_pass().await;
        let report = reconnector.run_pass().await;

        assert_eq!(report.attempted, 0);
        assert_eq!(mocks[0].dial_count(), 1);
    }

    #[tokio::test]
    async fn test_refused_source_retried_on_next_pass() {
        let (registry, mocks, reconnector) = setup(&[("a:1", MockBehavior::Refuse)]);

        reconnector.run_pass().await;
        mocks[0].set_behavior(ok());
        let report = reconnector.run_pass().await;

        assert_eq!(report.restored, 1);
        assert_eq!(mocks[0].dial_count(), 2);
        assert!(registry.get(&SourceId::parse("a:1").unwrap()).await.unwrap().online);
    }

    #[tokio::test]
    async fn test_pass_dials_offline_source_whose_lock_is_held() {
        let (registry, mocks, reconnector) = setup(&[("a:1", ok())]);

        let guard = registry.entries()[0].lock().await;
        let pass = tokio::spawn(async move { reconnector.run_pass().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);

        let report = timeout(Duration::from_secs(1), pass)
            .await
            .expect("pass should finish once the lock is released")
            .unwrap();
        assert_eq!(report, PassReport { attempted: 1, restored: 1 });
        assert_eq!(mocks[0].dial_count(), 1);
        assert!(registry.get(&SourceId::parse("a:1").unwrap()).await.unwrap().online);
    }

    #[test]
    fn test_triggers_coalesce() {
        let (trigger, mut rx) = reconnect_channel();

        assert!(trigger.trigger());
        assert!(!trigger.trigger());
        assert!(!trigger.clone().trigger());

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_coalesced_triggers_run_one_pass() {
        let (_registry, mocks, reconnector) = setup(&[("a:1", MockBehavior::Refuse)]);
        let handle = reconnector.handle();

        // Both fire before the loop is running
        assert!(handle.trigger());
        assert!(!handle.trigger());

        let task = tokio::spawn(reconnector.run());
        timeout(Duration::from_secs(2), async {
            while handle.completed_passes() < 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("pass should run");

        // Give a hypothetical second pass time to start
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.completed_passes(), 1);
        assert_eq!(mocks[0].dial_count(), 1);

        task.abort();
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let (_registry, _mocks, reconnector) = setup(&[("a:1", ok())]);
        let shutdown = reconnector.shutdown.clone();

        let task = tokio::spawn(reconnector.run());
        shutdown.cancel();

        timeout(Duration::from_secs(1), task)
            .await
            .expect("reconnector should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_slow_dial_times_out() {
        use mstat_core::BoxFuture;
        use mstat_source::{SourceLink, SourceResult};

        struct SlowConnector;

        impl SourceConnector for SlowConnector {
            fn connect<'a>(
                &'a self,
                _source: &'a SourceId,
            ) -> BoxFuture<'a, SourceResult<Box<dyn SourceLink>>> {
                Box::pin(std::future::pending::<SourceResult<Box<dyn SourceLink>>>())
            }
        }

        let registry = Arc::new(
            SourceRegistry::new(vec![MachineSpec::parse("a:1").unwrap()]).unwrap(),
        );
        let reconnector = Reconnector::new(
            registry.clone(),
            Arc::new(SlowConnector),
            Duration::from_millis(50),
            CancellationToken::new(),
        );

        let report = timeout(Duration::from_secs(1), reconnector.run_pass())
            .await
            .expect("pass should be bounded by the connect timeout");
        assert_eq!(report, PassReport { attempted: 1, restored: 0 });
    }
}
