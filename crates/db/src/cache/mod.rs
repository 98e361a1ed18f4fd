//! Cache backend abstraction and the cache-aside primitive built on it.
//!
//! - [`Cache`] is the key-value capability (`get`/`set`/`del`) a backend
//!   must provide. [`MemoryCache`] is the in-process implementation.
//! - [`CacheAside`] fills the cache from the database on a miss and
//!   invalidates keys after writes.
//! - [`Invalidate`] lets a transaction repeat invalidations after commit.
//! - [`CacheConf`] carries entry lifetimes, loaded from the environment.

use std::time::Duration;

use async_trait::async_trait;

mod aside;
mod memory;
mod stats;

pub use aside::CacheAside;
pub use memory::MemoryCache;
pub use stats::CacheStats;

/// Errors raised by a cache backend or while (de)serializing cached rows.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Key-value capability consumed by [`CacheAside`].
#[async_trait]
pub trait Cache: Send + Sync + 'static {
    /// Fetch the raw value stored under `key`, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Remove every key in `keys`. Missing keys are not an error.
    async fn del(&self, keys: &[String]) -> Result<(), CacheError>;
}

/// Key invalidation a [`Session`](crate::Session) runs again once its
/// transaction has committed.
#[async_trait]
pub trait Invalidate: Send + Sync {
    async fn invalidate(&self, keys: &[String]) -> Result<(), CacheError>;
}

/// Default lifetime of a cached row.
const DEFAULT_EXPIRY_SECS: u64 = 7 * 24 * 3600;

/// Default lifetime of a cached not-found placeholder.
const DEFAULT_NOT_FOUND_EXPIRY_SECS: u64 = 60;

/// Default +/- fraction applied to every lifetime.
const DEFAULT_JITTER: f64 = 0.05;

/// Upper bound on the jitter fraction, keeping every lifetime positive.
const MAX_JITTER: f64 = 0.99;

/// Entry lifetimes for [`CacheAside`].
#[derive(Debug, Clone)]
pub struct CacheConf {
    /// Lifetime of a cached row.
    pub expiry: Duration,
    /// Lifetime of a not-found placeholder.
    pub not_found_expiry: Duration,
    /// Fraction in `[0, 1)` by which each lifetime is randomly stretched or
    /// shrunk so entries written together do not expire together.
    pub jitter: f64,
}

impl Default for CacheConf {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(DEFAULT_EXPIRY_SECS),
            not_found_expiry: Duration::from_secs(DEFAULT_NOT_FOUND_EXPIRY_SECS),
            jitter: DEFAULT_JITTER,
        }
    }
}

impl CacheConf {
    /// Load cache lifetimes from environment variables with defaults.
    ///
    /// | Env Var                       | Default  |
    /// |-------------------------------|----------|
    /// | `CACHE_EXPIRY_SECS`           | `604800` |
    /// | `CACHE_NOT_FOUND_EXPIRY_SECS` | `60`     |
    /// | `CACHE_EXPIRY_JITTER`         | `0.05`   |
    pub fn from_env() -> Self {
        let expiry_secs: u64 = std::env::var("CACHE_EXPIRY_SECS")
            .unwrap_or_else(|_| DEFAULT_EXPIRY_SECS.to_string())
            .parse()
            .expect("CACHE_EXPIRY_SECS must be a valid u64");

        let not_found_expiry_secs: u64 = std::env::var("CACHE_NOT_FOUND_EXPIRY_SECS")
            .unwrap_or_else(|_| DEFAULT_NOT_FOUND_EXPIRY_SECS.to_string())
            .parse()
            .expect("CACHE_NOT_FOUND_EXPIRY_SECS must be a valid u64");

        let jitter: f64 = std::env::var("CACHE_EXPIRY_JITTER")
            .unwrap_or_else(|_| DEFAULT_JITTER.to_string())
            .parse()
            .ok()
            .filter(|jitter: &f64| jitter.is_finite())
            .expect("CACHE_EXPIRY_JITTER must be a finite f64");

        Self {
            expiry: Duration::from_secs(expiry_secs),
            not_found_expiry: Duration::from_secs(not_found_expiry_secs),
            jitter: jitter.clamp(0.0, MAX_JITTER),
        }
    }

    /// `jitter` limited to `[0, MAX_JITTER]`; non-finite values disable it.
    pub(crate) fn jitter_fraction(&self) -> f64 {
        if self.jitter.is_finite() {
            self.jitter.clamp(0.0, MAX_JITTER)
        } else {
            0.0
        }
    }
}
