//! Cache-aside reads and invalidating writes.
//!
//! [`CacheAside::query_row`] serves a row from the cache, or on a miss runs
//! the caller's fill against the database and caches what it returned. A
//! fill reporting [`ModelError::NotFound`] caches a short-lived placeholder
//! so repeated lookups of absent keys do not reach the database.
//!
//! [`CacheAside::exec`] runs a write and then deletes the affected keys.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Cache, CacheConf, CacheError, CacheStats, Invalidate};
use crate::error::ModelError;

/// Stored in place of a row the database reported as absent.
const NOT_FOUND_PLACEHOLDER: &str = "*";

/// Background attempts made after a failed invalidation.
const DEL_RETRY_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubled for each further attempt.
const DEL_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

type Gate = Arc<tokio::sync::Mutex<()>>;

enum Lookup<T> {
    Hit(T),
    Placeholder,
    Miss,
}

/// Cache-aside wrapper around a [`Cache`] backend.
///
/// Concurrent cold lookups of one key are serialized on a per-key gate, so
/// only the first runs its fill; the rest find the value it cached. No lock
/// is held between a write and its invalidation.
pub struct CacheAside<C> {
    cache: Arc<C>,
    conf: CacheConf,
    flights: Arc<Mutex<HashMap<String, Gate>>>,
    stats: Arc<CacheStats>,
}

impl<C> Clone for CacheAside<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            conf: self.conf.clone(),
            flights: Arc::clone(&self.flights),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<C: Cache> CacheAside<C> {
    pub fn new(cache: Arc<C>, conf: CacheConf) -> Self {
        Self {
            cache,
            conf,
            flights: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Return the row cached under `key`, filling the cache from `fill` on
    /// a miss.
    ///
    /// `fill` must return [`ModelError::NotFound`] for an absent row. Any
    /// other fill error is returned as is and nothing is cached. A failing
    /// cache read is returned as [`ModelError::Cache`] without consulting
    /// the database.
    pub async fn query_row<T, F, Fut>(&self, key: &str, fill: F) -> Result<T, ModelError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        self.stats.incr_total();
        match self.lookup::<T>(key).await? {
            Lookup::Hit(row) => {
                self.stats.incr_hit();
                return Ok(row);
            }
            Lookup::Placeholder => {
                self.stats.incr_hit();
                return Err(ModelError::NotFound);
            }
            Lookup::Miss => {}
        }

        let gate = self.gate(key);
        let result = {
            let _guard = gate.lock().await;
            self.fill_locked(key, fill).await
        };
        self.release(key, gate);
        result
    }

    /// Run `write`, then invalidate `keys`.
    ///
    /// The keys are left alone when the write fails. When the write
    /// succeeds but invalidation fails, the error is returned and a
    /// background retry is scheduled; the write is not undone.
    pub async fn exec<R, Fut>(&self, write: Fut, keys: &[String]) -> Result<R, ModelError>
    where
        Fut: Future<Output = Result<R, ModelError>>,
    {
        let result = write.await?;
        self.del(keys).await?;
        Ok(result)
    }

    /// Delete `keys` from the cache, scheduling retries on failure.
    pub async fn del(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.cache.del(keys).await {
            tracing::error!(keys = ?keys, error = %e, "Cache invalidation failed, scheduling retry");
            self.spawn_del_retry(keys.to_vec());
            return Err(e);
        }
        Ok(())
    }

    async fn fill_locked<T, F, Fut>(&self, key: &str, fill: F) -> Result<T, ModelError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        // Another caller may have filled the key while we waited on the gate.
        match self.lookup::<T>(key).await? {
            Lookup::Hit(row) => {
                self.stats.incr_hit();
                return Ok(row);
            }
            Lookup::Placeholder => {
                self.stats.incr_hit();
                return Err(ModelError::NotFound);
            }
            Lookup::Miss => self.stats.incr_miss(),
        }

        match fill().await {
            Ok(row) => {
                let raw = serde_json::to_string(&row).map_err(CacheError::from)?;
                self.store(key, raw, self.conf.expiry).await;
                Ok(row)
            }
            Err(ModelError::NotFound) => {
                self.store(
                    key,
                    NOT_FOUND_PLACEHOLDER.to_string(),
                    self.conf.not_found_expiry,
                )
                .await;
                Err(ModelError::NotFound)
            }
            Err(e) => {
                self.stats.incr_backend_fail();
                Err(e)
            }
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Result<Lookup<T>, ModelError> {
        let Some(raw) = self.cache.get(key).await? else {
            return Ok(Lookup::Miss);
        };
        if raw == NOT_FOUND_PLACEHOLDER {
            return Ok(Lookup::Placeholder);
        }
        match serde_json::from_str(&raw) {
            Ok(row) => Ok(Lookup::Hit(row)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                self.cache.del(&[key.to_string()]).await?;
                Ok(Lookup::Miss)
            }
        }
    }

    /// Populate `key`. The value handed to the caller is already correct, so
    /// a failure here is logged rather than returned.
    async fn store(&self, key: &str, raw: String, ttl: Duration) {
        if let Err(e) = self.cache.set(key, raw, self.jittered(ttl)).await {
            tracing::warn!(key, error = %e, "Failed to populate cache");
        }
    }

    fn jittered(&self, ttl: Duration) -> Duration {
        let jitter = self.conf.jitter_fraction();
        if jitter <= 0.0 {
            return ttl;
        }
        let factor = rand::rng().random_range(1.0 - jitter..=1.0 + jitter);
        ttl.mul_f64(factor)
    }

    fn gate(&self, key: &str) -> Gate {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(flights.entry(key.to_string()).or_default())
    }

    fn release(&self, key: &str, gate: Gate) {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        // Two holders (the map and `gate`) means nobody else is waiting.
        let idle = flights
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &gate) && Arc::strong_count(&gate) == 2);
        if idle {
            flights.remove(key);
        }
    }

    fn spawn_del_retry(&self, keys: Vec<String>) {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            for attempt in 1..=DEL_RETRY_ATTEMPTS {
                tokio::time::sleep(DEL_RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
                match cache.del(&keys).await {
                    Ok(()) => {
                        tracing::info!(keys = ?keys, attempt, "Cache invalidation retry succeeded");
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(keys = ?keys, attempt, error = %e, "Cache invalidation retry failed");
                    }
                }
            }
            tracing::error!(keys = ?keys, "Giving up on cache invalidation");
        });
    }
}

#[async_trait]
impl<C: Cache> Invalidate for CacheAside<C> {
    async fn invalidate(&self, keys: &[String]) -> Result<(), CacheError> {
        self.del(keys).await
    }
}
