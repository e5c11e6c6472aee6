//! Counters for the decision cache.
//!
//! # Examples
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//!
//! use ordergate_authn::{ExpiringCache, Identity};
//!
//! let cache = ExpiringCache::new(Duration::from_secs(60), 10);
//! cache.store("basic:abc", Arc::new(Identity::new("alice")));
//! let _ = cache.load("basic:abc");
//! let _ = cache.load("basic:xyz");
//!
//! let snapshot = cache.metrics();
//! assert_eq!(snapshot.hits, 1);
//! assert_eq!(snapshot.misses, 1);
//! assert!((snapshot.hit_rate() - 0.5).abs() < f64::EPSILON);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by [`ExpiringCache`](crate::ExpiringCache).
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    revocations: AtomicU64,
}

impl CacheMetrics {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insertion(&self, evicted: usize, expired: usize) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
        self.record_evictions(evicted);
        self.record_expirations(expired);
    }

    pub(crate) fn record_evictions(&self, count: usize) {
        if count > 0 {
            self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_expirations(&self, count: usize) {
        if count > 0 {
            self.expirations.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_revocation(&self) {
        self.revocations.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters, combined with the cache's
    /// current size.
    #[must_use]
    pub fn snapshot(&self, entries: usize, capacity: usize) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            revocations: self.revocations.load(Ordering::Relaxed),
            entries: entries as u64,
            capacity: capacity as u64,
        }
    }
}

/// Snapshot of cache metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, bon::Builder)]
pub struct CacheMetricsSnapshot {
    /// Lookups answered from the cache.
    #[builder(default)]
    pub hits: u64,
    /// Lookups that found nothing usable, including expired entries.
    #[builder(default)]
    pub misses: u64,
    /// Entries written.
    #[builder(default)]
    pub insertions: u64,
    /// Entries dropped to make room (FIFO).
    #[builder(default)]
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed.
    #[builder(default)]
    pub expirations: u64,
    /// Entries removed by an explicit revoke.
    #[builder(default)]
    pub revocations: u64,
    /// Entries held when the snapshot was taken.
    #[builder(default)]
    pub entries: u64,
    /// Maximum number of entries.
    #[builder(default)]
    pub capacity: u64,
}

impl CacheMetricsSnapshot {
    /// Total lookups.
    #[must_use]
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups served from the cache (0.0 to 1.0).
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }

    /// Fill percentage (0.0 to 100.0).
    #[must_use]
    pub fn fill_pct(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.entries as f64 / self.capacity as f64 * 100.0
    }
}
