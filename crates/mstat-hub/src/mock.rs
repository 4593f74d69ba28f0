//! In-memory sources for testing the hub without sockets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mstat_core::{BoxFuture, SourceId};
use mstat_source::{SourceConnector, SourceError, SourceLink, SourceResult};
use parking_lot::Mutex;

/// How a mock source answers.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Reply with `text` after `delay`.
    Reply { text: String, delay: Duration },
    /// Fail the fetch as if the exporter closed the connection.
    Fail,
    /// Never reply.
    Hang,
    /// Refuse connection attempts.
    Refuse,
}

/// Shared, observable state of one mock source.
#[derive(Debug)]
pub struct MockSource {
    behavior: Mutex<MockBehavior>,
    dials: AtomicUsize,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockSource {
    pub fn new(behavior: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            dials: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(MockBehavior::Reply {
            text: text.to_string(),
            delay: Duration::ZERO,
        })
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Connection attempts made against this source.
    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// Fetches started against this source.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> SourceResult<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let behavior = self.behavior.lock().clone();
        let result = match behavior {
            MockBehavior::Reply { text, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(text)
            }
            MockBehavior::Fail | MockBehavior::Refuse => Err(SourceError::ConnectionClosed {
                code: 1006,
                reason: "mock failure".to_string(),
            }),
            MockBehavior::Hang => std::future::pending().await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Link to a `MockSource`.
pub struct MockLink {
    source: Arc<MockSource>,
}

impl MockLink {
    pub fn new(source: Arc<MockSource>) -> Self {
        Self { source }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(MockSource::replying(text))
    }
}

impl SourceLink for MockLink {
    fn fetch<'a>(&'a mut self, _token: &'a str) -> BoxFuture<'a, SourceResult<String>> {
        Box::pin(self.source.answer())
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}

/// Connector over a fixed set of mock sources.
#[derive(Default)]
pub struct MockConnector {
    sources: HashMap<SourceId, Arc<MockSource>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source; returns its handle for inspection.
    pub fn add(&mut self, id: &SourceId, behavior: MockBehavior) -> Arc<MockSource> {
        let source = MockSource::new(behavior);
        self.sources.insert(id.clone(), source.clone());
        source
    }
}

impl SourceConnector for MockConnector {
    fn connect<'a>(
        &'a self,
        source: &'a SourceId,
    ) -> BoxFuture<'a, SourceResult<Box<dyn SourceLink>>> {
        Box::pin(async move {
            let mock = self
                .sources
                .get(source)
                .ok_or_else(|| SourceError::ConnectionFailed(format!("{source}: unknown")))?;
            mock.dials.fetch_add(1, Ordering::SeqCst);

            if matches!(*mock.behavior.lock(), MockBehavior::Refuse) {
                return Err(SourceError::ConnectionFailed(format!("{source}: refused")));
            }
            Ok(Box::new(MockLink::new(mock.clone())) as Box<dyn SourceLink>)
        })
    }
}
