//! TTL cache for per-user transaction views
//!
//! Uses the `cached` crate's `TimedCache`. Entries are dropped explicitly when
//! a transfer involving the user is accepted or settled. Each user also has a
//! generation counter that invalidation bumps: a reader snapshots it before
//! going to the store and `put` discards the fill if it moved, so a listing
//! read before an invalidation is never written back after it.

use std::collections::HashMap;
use std::sync::Arc;

use cached::{Cached, TimedCache};
use tokio::sync::Mutex;

use super::types::TransactionView;

/// Default TTL in seconds
pub const TTL_SECONDS: u64 = 5;

struct Entries {
    views: TimedCache<i64, Arc<Vec<TransactionView>>>,
    generations: HashMap<i64, u64>,
}

impl Entries {
    fn generation(&self, user_id: i64) -> u64 {
        self.generations.get(&user_id).copied().unwrap_or(0)
    }
}

/// Cached transaction listings keyed by user id
pub struct TransactionViewCache {
    inner: Option<Mutex<Entries>>,
}

impl TransactionViewCache {
    /// `ttl_secs == 0` disables caching
    pub fn new(ttl_secs: u64) -> Self {
        let inner = (ttl_secs > 0).then(|| {
            Mutex::new(Entries {
                views: TimedCache::with_lifespan(ttl_secs),
                generations: HashMap::new(),
            })
        });
        Self { inner }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub async fn get(&self, user_id: i64) -> Option<Arc<Vec<TransactionView>>> {
        let inner = self.inner.as_ref()?;
        let mut entries = inner.lock().await;
        entries.views.cache_get(&user_id).cloned()
    }

    /// Snapshot to pass back to `put` after reading from the store
    pub async fn generation(&self, user_id: i64) -> u64 {
        match &self.inner {
            Some(inner) => inner.lock().await.generation(user_id),
            None => 0,
        }
    }

    /// Store `views` unless the user was invalidated since `generation`
    pub async fn put(&self, user_id: i64, generation: u64, views: Arc<Vec<TransactionView>>) {
        if let Some(inner) = &self.inner {
            let mut entries = inner.lock().await;
            if entries.generation(user_id) != generation {
                tracing::debug!(user_id, "[cache] Skipped fill read before invalidation");
                return;
            }
            entries.views.cache_set(user_id, views);
        }
    }

    /// Drop cached listings of every given user
    pub async fn invalidate(&self, user_ids: &[i64]) {
        if let Some(inner) = &self.inner {
            let mut entries = inner.lock().await;
            for id in user_ids {
                entries.views.cache_remove(id);
                *entries.generations.entry(*id).or_insert(0) += 1;
            }
            tracing::debug!(users = ?user_ids, "[cache] Invalidated transaction views");
        }
    }
}

impl Default for TransactionViewCache {
    fn default() -> Self {
        Self::new(TTL_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_invalidate() {
        let cache = TransactionViewCache::new(60);
        assert!(cache.get(1).await.is_none());

        cache.put(1, cache.generation(1).await, Arc::new(Vec::new())).await;
        cache.put(2, cache.generation(2).await, Arc::new(Vec::new())).await;
        assert!(cache.get(1).await.is_some());

        cache.invalidate(&[1]).await;
        assert!(cache.get(1).await.is_none());
        assert!(cache.get(2).await.is_some());
    }

    #[tokio::test]
    async fn test_fill_from_before_invalidation_is_dropped() {
        let cache = TransactionViewCache::new(60);
        let before = cache.generation(1).await;

        cache.invalidate(&[1]).await;
        cache.put(1, before, Arc::new(Vec::new())).await;
        assert!(cache.get(1).await.is_none());

        // Other users keep their own generation
        cache.put(2, cache.generation(2).await, Arc::new(Vec::new())).await;
        assert!(cache.get(2).await.is_some());

        let after = cache.generation(1).await;
        assert_ne!(before, after);
        cache.put(1, after, Arc::new(Vec::new())).await;
        assert!(cache.get(1).await.is_some());
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits() {
        let cache = TransactionViewCache::new(0);
        cache.put(1, cache.generation(1).await, Arc::new(Vec::new())).await;
        assert!(cache.get(1).await.is_none());
    }
}
