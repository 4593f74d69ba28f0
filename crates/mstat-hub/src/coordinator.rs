//! Fetch cycles.
//!
//! A cycle dispatches one fetch per source, all at once, each on its own task
//! reporting to its own oneshot channel. Fan-in then walks the channels in
//! configured order, so output order never depends on which exporter
//! answered first.
//!
//! ```text
//!  dispatch()                         PendingCycle::next()
//!  ┌────────┐  spawn  ┌──────────┐  oneshot  ┌─────────────────────┐
//!  │ src 0  │───────▶│ fetch 0  │─────────▶│ await slot 0 → rec 0 │
//!  │ src 1  │───────▶│ fetch 1  │─────────▶│ await slot 1 → rec 1 │
//!  │ src 2  │ (offline, no task)  ready ───▶│ slot 2 → placeholder │
//!  └────────┘        └──────────┘           └─────────────────────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use mstat_core::{AggregatedRecord, SourceId};
use mstat_telemetry::Metrics;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::registry::{SourceEntry, SourceRegistry};

/// Result of one source's fetch within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The source replied.
    Status(String),
    /// The source was offline at dispatch; nothing was sent.
    Offline,
    /// The fetch failed or timed out; the source is now offline.
    Failed(String),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Status(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Status(_) => "ok",
            Self::Offline => "offline",
            Self::Failed(_) => "failed",
        }
    }
}

enum Slot {
    Ready(FetchOutcome),
    Pending(oneshot::Receiver<FetchOutcome>),
}

/// Runs fetch cycles over a registry.
#[derive(Clone)]
pub struct FetchCoordinator {
    registry: Arc<SourceRegistry>,
    fetch_timeout: Duration,
    token: Arc<str>,
    placeholder: Arc<str>,
}

impl FetchCoordinator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        fetch_timeout: Duration,
        token: impl Into<Arc<str>>,
        placeholder: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            registry,
            fetch_timeout,
            token: token.into(),
            placeholder: placeholder.into(),
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Start a cycle: one fetch per online source, all in parallel.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self) -> PendingCycle {
        let mut slots = Vec::with_capacity(self.registry.len());

        for entry in self.registry.entries() {
            // Uncontended and offline: resolve now, no task needed
            let offline_now = entry.try_lock().is_some_and(|state| !state.is_online());
            let slot = if offline_now {
                Slot::Ready(FetchOutcome::Offline)
            } else {
                let (tx, rx) = oneshot::channel();
                tokio::spawn(fetch_source(
                    entry.clone(),
                    self.token.clone(),
                    self.fetch_timeout,
                    tx,
                ));
                Slot::Pending(rx)
            };
            slots.push((entry.id().clone(), slot));
        }

        trace!(sources = slots.len(), "Cycle dispatched");
        PendingCycle {
            slots: slots.into_iter(),
            placeholder: self.placeholder.clone(),
            offline: 0,
        }
    }

    /// Run a full cycle and collect its records in configured order.
    pub async fn run_cycle(&self) -> Vec<AggregatedRecord> {
        let mut cycle = self.dispatch();
        let mut records = Vec::with_capacity(self.registry.len());
        while let Some(record) = cycle.next().await {
            records.push(record);
        }
        records
    }
}

/// A dispatched cycle whose records are consumed in configured order.
pub struct PendingCycle {
    slots: std::vec::IntoIter<(SourceId, Slot)>,
    placeholder: Arc<str>,
    offline: usize,
}

impl PendingCycle {
    /// Next record in configured order, waiting for that source's fetch if
    /// it has not finished yet. `None` once every source has been emitted.
    pub async fn next(&mut self) -> Option<AggregatedRecord> {
        let (source, slot) = self.slots.next()?;

        let outcome = match slot {
            Slot::Ready(outcome) => outcome,
            Slot::Pending(rx) => rx
                .await
                .unwrap_or_else(|_| FetchOutcome::Failed("fetch task dropped".to_string())),
        };

        let status = match outcome {
            FetchOutcome::Status(text) => text,
            FetchOutcome::Offline | FetchOutcome::Failed(_) => {
                self.offline += 1;
                self.placeholder.to_string()
            }
        };
        Some(AggregatedRecord::new(source, status))
    }

    /// Sources that came back offline so far in this cycle.
    pub fn offline_count(&self) -> usize {
        self.offline
    }

    /// Sources not yet emitted.
    pub fn remaining(&self) -> usize {
        self.slots.len()
    }
}

impl Drop for PendingCycle {
    /// Counts the cycle whether or not every record was consumed. Fetches
    /// of unconsumed slots still finish and update the registry.
    fn drop(&mut self) {
        Metrics::cycle_completed(self.offline);
    }
}

/// Fetch one source under its lock and report on `tx`.
async fn fetch_source(
    entry: Arc<SourceEntry>,
    token: Arc<str>,
    limit: Duration,
    tx: oneshot::Sender<FetchOutcome>,
) {
    let outcome = fetch_locked(&entry, &token, limit).await;
    Metrics::fetch_completed(entry.id().as_str(), outcome.label());
    // Receiver gone means the viewer left mid-cycle; the registry is already updated
    let _ = tx.send(outcome);
}

async fn fetch_locked(entry: &SourceEntry, token: &str, limit: Duration) -> FetchOutcome {
    let mut state = entry.lock().await;
    let Some(link) = state.link_mut() else {
        return FetchOutcome::Offline;
    };

    let started = Instant::now();
    let result = tokio::time::timeout(limit, link.fetch(token)).await;
    let elapsed = started.elapsed();

    let error = match result {
        Ok(Ok(status)) => {
            Metrics::fetch_latency(entry.id().as_str(), elapsed);
            debug!(
                source = %entry.id(),
                bytes = status.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Fetched status"
            );
            state.record_status(status.clone());
            return FetchOutcome::Status(status);
        }
        Ok(Err(e)) => e.to_string(),
        // A late reply would pair with the next trigger; the link is dropped
        Err(_) => format!("no reply within {}ms", limit.as_millis()),
    };

    warn!(source = %entry.id(), %error, "Fetch failed, marking source offline");
    let link = state.take_offline();
    Metrics::source_online(entry.id().as_str(), false);
    drop(state);

    if let Some(link) = link {
        link.close().await;
    }
    FetchOutcome::Failed(error)
}
