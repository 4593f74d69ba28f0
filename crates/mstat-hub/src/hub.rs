//! The aggregation hub.
//!
//! Owns the registry, the coordinator and the reconnector handle. Viewer
//! sessions only ever see this surface: run a cycle, ask for a reconnect,
//! read snapshots.

use std::sync::Arc;

use mstat_core::{AggregatedRecord, MachineSpec, SourceId};
use mstat_source::SourceConnector;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::HubConfig;
use crate::coordinator::{FetchCoordinator, PendingCycle};
use crate::error::HubResult;
use crate::reconnector::{PassReport, Reconnector, ReconnectorHandle, ReconnectorState};
use crate::registry::{SourceRegistry, SourceSnapshot};

/// Aggregation hub. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Hub {
    registry: Arc<SourceRegistry>,
    coordinator: FetchCoordinator,
    reconnector: ReconnectorHandle,
    shutdown: CancellationToken,
}

impl Hub {
    /// Build a hub and its (not yet running) reconnector.
    pub fn new(
        config: &HubConfig,
        machines: Vec<MachineSpec>,
        connector: Arc<dyn SourceConnector>,
    ) -> HubResult<(Self, Reconnector)> {
        let registry = Arc::new(SourceRegistry::new(machines)?);
        let coordinator = FetchCoordinator::new(
            registry.clone(),
            config.fetch_timeout(),
            config.fetch_token.as_str(),
            config.offline_placeholder.as_str(),
        );
        let shutdown = CancellationToken::new();
        let reconnector = Reconnector::new(
            registry.clone(),
            connector,
            config.connect_timeout(),
            shutdown.clone(),
        );

        let hub = Self {
            registry,
            coordinator,
            reconnector: reconnector.handle(),
            shutdown,
        };
        Ok((hub, reconnector))
    }

    /// Build the hub, connect every reachable source once, then start the
    /// reconnection loop in the background.
    pub async fn start(
        config: &HubConfig,
        connector: Arc<dyn SourceConnector>,
    ) -> HubResult<(Self, JoinHandle<()>)> {
        config.validate()?;
        let (hub, reconnector) = Self::new(config, config.machine_specs()?, connector)?;

        let PassReport { attempted, restored } = reconnector.run_pass().await;
        info!(
            sources = hub.registry.len(),
            online = restored,
            offline = attempted - restored,
            "Initial connection pass finished"
        );

        let task = tokio::spawn(reconnector.run());
        Ok((hub, task))
    }

    /// Run one fetch cycle: exactly one record per source, configured order.
    pub async fn run_cycle(&self) -> Vec<AggregatedRecord> {
        self.coordinator.run_cycle().await
    }

    /// Start a fetch cycle whose records are consumed one at a time.
    pub fn dispatch(&self) -> PendingCycle {
        self.coordinator.dispatch()
    }

    /// Ask the reconnector for a pass. Never blocks; returns `false` if a
    /// pass was already pending.
    pub fn request_reconnect(&self) -> bool {
        self.reconnector.trigger()
    }

    pub fn reconnector_state(&self) -> ReconnectorState {
        self.reconnector.state()
    }

    pub fn completed_reconnect_passes(&self) -> u64 {
        self.reconnector.completed_passes()
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Source identities in configured order.
    pub fn sources(&self) -> Vec<SourceId> {
        self.registry.ids().cloned().collect()
    }

    pub fn source_count(&self) -> usize {
        self.registry.len()
    }

    pub fn offline_placeholder(&self) -> &str {
        self.coordinator.placeholder()
    }

    /// Current state of every source, without fetching.
    pub async fn snapshot(&self) -> Vec<SourceSnapshot> {
        self.registry.snapshot().await
    }

    /// Stop the reconnector.
    pub fn shutdown(&self) {
        info!("Hub shutdown requested");
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBehavior, MockConnector};
    use std::time::Duration;

    fn config(machines: &[&str]) -> HubConfig {
        HubConfig {
            machines: machines.iter().map(|m| m.to_string()).collect(),
            fetch_timeout_ms: 500,
            connect_timeout_ms: 500,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_connects_reachable_sources() {
        let cfg = config(&["a:1", "b:2->Bravo"]);
        let mut connector = MockConnector::new();
        connector.add(&SourceId::parse("a:1").unwrap(), MockBehavior::Refuse);
        let b = connector.add(
            &SourceId::parse("b:2").unwrap(),
            MockBehavior::Reply {
                text: "bravo".to_string(),
                delay: Duration::ZERO,
            },
        );

        let (hub, task) = Hub::start(&cfg, Arc::new(connector)).await.unwrap();

        assert_eq!(b.dial_count(), 1);
        let snapshot = hub.snapshot().await;
        assert!(!snapshot[0].online);
        assert!(snapshot[1].online);
        assert_eq!(snapshot[1].alias, "Bravo");
        assert_eq!(hub.completed_reconnect_passes(), 1);

        let records = hub.run_cycle().await;
        assert_eq!(records[0].status, hub.offline_placeholder());
        assert_eq!(records[1].status, "bravo");

        hub.shutdown();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("reconnector should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_source_recovers_after_reconnect() {
        let cfg = config(&["a:1", "b:2", "c:3"]);
        let mut connector = MockConnector::new();
        for id in ["a:1", "c:3"] {
            connector.add(
                &SourceId::parse(id).unwrap(),
                MockBehavior::Reply {
                    text: format!("{id} ok"),
                    delay: Duration::ZERO,
                },
            );
        }
        let b = connector.add(&SourceId::parse("b:2").unwrap(), MockBehavior::Fail);

        let (hub, task) = Hub::start(&cfg, Arc::new(connector)).await.unwrap();

        let mut cycle = hub.dispatch();
        let mut statuses = Vec::new();
        while let Some(record) = cycle.next().await {
            statuses.push(record.status);
        }
        assert_eq!(statuses, vec!["a:1 ok", hub.offline_placeholder(), "c:3 ok"]);
        assert_eq!(cycle.offline_count(), 1);
        assert!(!hub.snapshot().await[1].online);

        b.set_behavior(MockBehavior::Reply {
            text: "b:2 back".to_string(),
            delay: Duration::ZERO,
        });
        assert!(hub.request_reconnect());
        tokio::time::timeout(Duration::from_secs(2), async {
            while hub.completed_reconnect_passes() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("reconnect pass should run");

        let records = hub.run_cycle().await;
        assert_eq!(records[1].status, "b:2 back");
        assert_eq!(b.dial_count(), 2);

        hub.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let result = Hub::start(&config(&[]), Arc::new(MockConnector::new())).await;
        assert!(result.is_err());
    }
}
