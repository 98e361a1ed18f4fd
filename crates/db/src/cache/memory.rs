//! In-process [`Cache`] backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{Cache, CacheError};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// A `HashMap` behind a `tokio` read-write lock with per-entry expiry.
///
/// Expired entries are dropped lazily on read or by [`purge_expired`].
///
/// [`purge_expired`]: MemoryCache::purge_expired
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_and_delete() {
        let cache = MemoryCache::new();
        cache
            .set("k1", "v1".into(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("k1").await.unwrap().as_deref(), Some("v1"));
        assert_eq!(cache.get("missing").await.unwrap(), None);

        cache
            .del(&["k1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire() {
        let cache = MemoryCache::new();
        cache
            .set("short", "a".into(), Duration::from_secs(5))
            .await
            .unwrap();
        cache
            .set("long", "b".into(), Duration::from_secs(50))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("b"));
        // The expired entry was removed by the read above.
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired_entries() {
        let cache = MemoryCache::new();
        for (key, secs) in [("a", 1), ("b", 2), ("c", 100)] {
            cache
                .set(key, key.to_string(), Duration::from_secs(secs))
                .await
                .unwrap();
        }

        tokio::time::advance(Duration::from_secs(3)).await;

        assert_eq!(cache.purge_expired().await, 2);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn set_overwrites_previous_value() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("k", "old".into(), ttl).await.unwrap();
        cache.set("k", "new".into(), ttl).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));
    }
}
