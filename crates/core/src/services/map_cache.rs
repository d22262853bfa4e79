//! Short-lived cache for the public map feed.
//!
//! Entries are keyed by the normalized bounding box and dropped wholesale on
//! any write that could change what the map shows.

use std::{sync::Arc, time::Duration};

use moka::future::Cache;

use super::visibility::ReportView;

const MAX_ENTRIES: u64 = 512;

/// Cached map feed pages.
#[derive(Clone)]
pub struct MapFeedCache {
    inner: Option<Cache<String, Arc<Vec<ReportView>>>>,
}

impl MapFeedCache {
    /// Create a cache whose entries live for `ttl`. A zero TTL disables caching.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let inner = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build()
        });
        Self { inner }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Vec<ReportView>>> {
        match &self.inner {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    pub async fn insert(&self, key: String, views: Arc<Vec<ReportView>>) {
        if let Some(cache) = &self.inner {
            cache.insert(key, views).await;
        }
    }

    /// Drop every cached page.
    pub fn invalidate(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_invalidate() {
        let cache = MapFeedCache::new(Duration::from_secs(60));
        assert!(cache.get("k").await.is_none());

        cache.insert("k".into(), Arc::new(vec![])).await;
        assert!(cache.get("k").await.is_some());

        cache.invalidate();
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_disables() {
        let cache = MapFeedCache::new(Duration::ZERO);
        cache.insert("k".into(), Arc::new(vec![])).await;
        assert!(cache.get("k").await.is_none());
    }
}
