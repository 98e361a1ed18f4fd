use std::sync::atomic::{AtomicU64, Ordering};

/// Lookup counters for one [`CacheAside`](super::CacheAside).
#[derive(Debug, Default)]
pub struct CacheStats {
    total: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    backend_fails: AtomicU64,
}

impl CacheStats {
    pub(crate) fn incr_total(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_backend_fail(&self) {
        self.backend_fails.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn backend_fails(&self) -> u64 {
        self.backend_fails.load(Ordering::Relaxed)
    }

    /// Fraction of lookups answered from the cache, `0.0` before any lookup.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.hits() as f64 / total as f64
    }
}
