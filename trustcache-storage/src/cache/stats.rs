//! Store counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters of one store.
#[derive(Debug, Default)]
pub(crate) struct StoreCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub reloads: AtomicU64,
    pub stale_fallbacks: AtomicU64,
    pub evictions: AtomicU64,
    pub load_failures: AtomicU64,
}

impl StoreCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entry_count: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
            stale_fallbacks: self.stale_fallbacks.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            entry_count: entry_count as u64,
        }
    }
}

/// Snapshot of store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads answered from a matching entry.
    pub hits: u64,
    /// Reads that found no entry and loaded the resource.
    pub misses: u64,
    /// Successful reloads of a changed resource.
    pub reloads: u64,
    /// Reads that returned the previous entry after a transient reload failure.
    pub stale_fallbacks: u64,
    /// Entries dropped because the resource vanished, became invalid, or
    /// was invalidated.
    pub evictions: u64,
    /// Failed load attempts of any kind.
    pub load_failures: u64,
    /// Entries currently cached.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.reloads + self.stale_fallbacks;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
