//! Source registry.
//!
//! One `SourceEntry` per configured exporter. The set of entries and their
//! order are fixed at construction, so enumerating them needs no lock. The
//! mutable part of each entry (link, online flag, last status) lives behind
//! that entry's own `tokio::sync::Mutex`; there is no registry-wide lock.
//!
//! The entry lock is also the per-connection request queue: a fetch holds it
//! for the whole trigger/reply exchange, so concurrent cycles never
//! interleave on one connection.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mstat_core::{MachineSpec, SourceId};
use mstat_source::SourceLink;
use mstat_telemetry::Metrics;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::{HubError, HubResult};

// ============================================================================
// SourceState
// ============================================================================

/// Mutable state of one source. Only reachable through `SourceEntry::lock`.
#[derive(Default)]
pub struct SourceState {
    link: Option<Box<dyn SourceLink>>,
    online: bool,
    status: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl SourceState {
    /// Online means a link is installed and has not failed since.
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Last status text received from the source, if any.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Link to fetch through, only while online.
    pub fn link_mut(&mut self) -> Option<&mut (dyn SourceLink + 'static)> {
        if self.online {
            self.link.as_deref_mut()
        } else {
            None
        }
    }

    /// Install a fresh link and go online. Returns the replaced link.
    pub fn install(&mut self, link: Box<dyn SourceLink>) -> Option<Box<dyn SourceLink>> {
        self.online = true;
        self.link.replace(link)
    }

    /// Go offline. Returns the dropped link so the caller can close it
    /// outside the lock.
    pub fn take_offline(&mut self) -> Option<Box<dyn SourceLink>> {
        self.online = false;
        self.link.take()
    }

    /// Record a successful reply.
    pub fn record_status(&mut self, status: String) {
        self.status = Some(status);
        self.updated_at = Some(Utc::now());
    }
}

// ============================================================================
// SourceEntry
// ============================================================================

/// A configured source: immutable identity plus lock-guarded state.
pub struct SourceEntry {
    id: SourceId,
    alias: String,
    state: Mutex<SourceState>,
}

impl SourceEntry {
    fn new(spec: MachineSpec) -> Self {
        Self {
            id: spec.id,
            alias: spec.alias,
            state: Mutex::new(SourceState::default()),
        }
    }

    pub fn id(&self) -> &SourceId {
        &self.id
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Acquire this source's lock. Waits behind any in-flight fetch.
    pub async fn lock(&self) -> MutexGuard<'_, SourceState> {
        self.state.lock().await
    }

    /// Acquire the lock only if nobody holds it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, SourceState>> {
        self.state.try_lock().ok()
    }

    /// Take the source offline and close its link, if any.
    pub async fn go_offline(&self) {
        let link = {
            let mut state = self.lock().await;
            let was_online = state.is_online();
            let link = state.take_offline();
            if was_online {
                Metrics::source_online(self.id.as_str(), false);
                info!(source = %self.id, "Source marked offline");
            }
            link
        };
        if let Some(link) = link {
            link.close().await;
        }
    }

    /// Install a link and bring the source online, closing any link it replaces.
    pub async fn go_online(&self, link: Box<dyn SourceLink>) {
        let replaced = {
            let mut state = self.lock().await;
            let replaced = state.install(link);
            Metrics::source_online(self.id.as_str(), true);
            info!(source = %self.id, "Source marked online");
            replaced
        };
        if let Some(old) = replaced {
            debug!(source = %self.id, "Closing replaced link");
            old.close().await;
        }
    }

    /// Consistent view of this source, read under its lock.
    pub async fn snapshot(&self) -> SourceSnapshot {
        let state = self.lock().await;
        SourceSnapshot {
            id: self.id.clone(),
            alias: self.alias.clone(),
            online: state.online,
            status: state.status.clone(),
            updated_at: state.updated_at,
        }
    }
}

/// Point-in-time view of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSnapshot {
    pub id: SourceId,
    pub alias: String,
    pub online: bool,
    /// Last status received (kept across outages).
    pub status: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// SourceRegistry
// ============================================================================

/// Fixed, ordered set of sources.
pub struct SourceRegistry {
    entries: Vec<Arc<SourceEntry>>,
    index: HashMap<SourceId, usize>,
}

impl SourceRegistry {
    /// Build the registry. Order of `machines` is the cycle output order.
    pub fn new(machines: Vec<MachineSpec>) -> HubResult<Self> {
        if machines.is_empty() {
            return Err(HubError::NoSources);
        }

        let mut entries = Vec::with_capacity(machines.len());
        let mut index = HashMap::with_capacity(machines.len());
        for spec in machines {
            if index.contains_key(&spec.id) {
                return Err(HubError::DuplicateSource(spec.id));
            }
            index.insert(spec.id.clone(), entries.len());
            Metrics::source_online(spec.id.as_str(), false);
            entries.push(Arc::new(SourceEntry::new(spec)));
        }

        Ok(Self { entries, index })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in configured order.
    pub fn entries(&self) -> &[Arc<SourceEntry>] {
        &self.entries
    }

    /// Source identities in configured order.
    pub fn ids(&self) -> impl Iterator<Item = &SourceId> {
        self.entries.iter().map(|e| e.id())
    }

    pub fn entry(&self, id: &SourceId) -> HubResult<&Arc<SourceEntry>> {
        self.index
            .get(id)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| HubError::UnknownSource(id.clone()))
    }

    /// Read one source's state.
    pub async fn get(&self, id: &SourceId) -> HubResult<SourceSnapshot> {
        Ok(self.entry(id)?.snapshot().await)
    }

    /// Install a new link for `id` and mark it online.
    pub async fn set_online(&self, id: &SourceId, link: Box<dyn SourceLink>) -> HubResult<()> {
        self.entry(id)?.go_online(link).await;
        Ok(())
    }

    /// Drop `id`'s link and mark it offline.
    pub async fn set_offline(&self, id: &SourceId) -> HubResult<()> {
        self.entry(id)?.go_offline().await;
        Ok(())
    }

    /// Snapshot of every source, in configured order.
    ///
    /// Each entry is read under its own lock; the result is not a single
    /// atomic view of the whole registry.
    pub async fn snapshot(&self) -> Vec<SourceSnapshot> {
        let mut out = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            out.push(entry.snapshot().await);
        }
        out
    }

    /// Number of sources currently offline.
    pub async fn offline_count(&self) -> usize {
        let mut count = 0;
        for entry in &self.entries {
            if !entry.lock().await.is_online() {
                count += 1;
            }
        }
        count
    }
}
