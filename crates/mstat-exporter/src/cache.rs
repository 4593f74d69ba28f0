//! Latest status output.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// One cached status text and when it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedStatus {
    pub text: String,
    /// `None` until the first successful refresh.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Most recent status, shared between the refresher and request handlers.
#[derive(Debug, Default)]
pub struct StatusCache {
    inner: RwLock<Option<CachedStatus>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current text; empty before the first refresh.
    pub fn text(&self) -> String {
        self.inner
            .read()
            .as_ref()
            .map(|s| s.text.clone())
            .unwrap_or_default()
    }

    pub fn current(&self) -> CachedStatus {
        self.inner.read().clone().unwrap_or(CachedStatus {
            text: String::new(),
            updated_at: None,
        })
    }

    /// Replace the cached text.
    pub fn update(&self, text: impl Into<String>) {
        *self.inner.write() = Some(CachedStatus {
            text: text.into(),
            updated_at: Some(Utc::now()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_before_first_update() {
        let cache = StatusCache::new();
        assert_eq!(cache.text(), "");
        assert_eq!(cache.current().updated_at, None);
    }

    #[test]
    fn test_update_replaces_text() {
        let cache = StatusCache::new();
        cache.update("gpu0 12%");
        cache.update("gpu0 40%");
        assert_eq!(cache.text(), "gpu0 40%");
        assert!(cache.current().updated_at.is_some());
    }
}
