//! Expiring, insertion-ordered cache of authentication decisions.
//!
//! Maps a credential key to the [`Identity`] it last resolved to. Two rules
//! govern what survives:
//!
//! - **Absolute TTL.** An entry expires `ttl` after it was stored. Reads never
//!   extend its life, and an expired entry is never returned, whether or not
//!   it has been physically removed yet.
//! - **FIFO eviction.** When the cache is full, the entry stored earliest is
//!   evicted, no matter how often it has been read.
//!
//! # Layout
//!
//! A single [`parking_lot::Mutex`] guards a `HashMap` of entries and a
//! `BTreeMap` from insertion sequence number to key. Overwriting a key gives
//! it a fresh sequence number, so the front of the `BTreeMap` is always the
//! oldest surviving insertion. Because every entry shares one TTL, expired
//! entries always form a prefix of that order, which keeps both eviction and
//! sweeping proportional to the work actually done.
//!
//! Identities are stored as `Arc<Identity>`; readers get a clone of the `Arc`
//! taken under the lock and therefore always observe a complete value.
//!
//! # Background sweep
//!
//! Lazy expiry in [`load`](ExpiringCache::load) plus eviction on
//! [`store`](ExpiringCache::store) already bounds memory by capacity. A
//! periodic sweep started with [`with_sweep_interval`](ExpiringCache::with_sweep_interval)
//! additionally returns memory held by expired entries that are never read
//! again. The task holds only a weak reference and stops on
//! [`shutdown`](ExpiringCache::shutdown) or when the cache is dropped.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    config::CacheConfig,
    header::credential_fingerprint,
    identity::Identity,
    metrics::{CacheMetrics, CacheMetricsSnapshot},
};

/// Builds the cache key for `credential` presented under `scheme`.
///
/// The scheme is lowercased, so `Basic` and `basic` share entries while a
/// Basic payload and a Bearer token can never collide.
#[must_use]
pub fn scoped_key(scheme: &str, credential: &str) -> String {
    format!("{}:{credential}", scheme.to_ascii_lowercase())
}

struct Entry {
    identity: Arc<Identity>,
    inserted_at: Instant,
    seq: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Entry>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
    /// Bumped by every delete and clear.
    revision: u64,
}

impl CacheState {
    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    /// Pops entries from the front of the insertion order while they are expired.
    fn purge_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let mut purged = 0;
        while let Some(entry) = self.order.first_key_value() {
            let (&seq, key) = entry;
            let expired = self
                .entries
                .get(key)
                .is_none_or(|entry| now.saturating_duration_since(entry.inserted_at) >= ttl);
            if !expired {
                break;
            }
            if let Some(key) = self.order.remove(&seq) {
                self.entries.remove(&key);
                purged += 1;
            }
        }
        purged
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    /// Inserts at the back of the order; returns `(evicted, expired)` counts.
    fn insert(
        &mut self,
        key: String,
        identity: Arc<Identity>,
        now: Instant,
        ttl: Duration,
        capacity: usize,
    ) -> (usize, usize) {
        self.remove(&key);
        let expired = self.purge_expired(now, ttl);

        let mut evicted = 0;
        while self.entries.len() >= capacity {
            match self.evict_oldest() {
                Some(oldest) => {
                    evicted += 1;
                    tracing::debug!(credential = %credential_fingerprint(&oldest), "Evicted oldest cache entry");
                },
                None => break,
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(key, Entry { identity, inserted_at: now, seq });
        (evicted, expired)
    }
}

/// Bounded FIFO cache with absolute per-entry TTL.
///
/// Shared between strategies as `Arc<ExpiringCache>`. All operations take
/// the internal lock for a bounded amount of work and never await while
/// holding it.
pub struct ExpiringCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    capacity: usize,
    metrics: CacheMetrics,
    shutdown: CancellationToken,
}

impl ExpiringCache {
    /// Creates a cache whose entries live for `ttl` and which holds at most
    /// `capacity` entries. A zero capacity is raised to one.
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
            capacity: capacity.max(1),
            metrics: CacheMetrics::default(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Creates a shared cache from configuration, starting the background
    /// sweep if one is configured.
    ///
    /// Must be called inside a Tokio runtime when `sweep_interval` is non-zero.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Arc<Self> {
        let cache = Arc::new(Self::new(config.ttl, config.max_entries));
        if config.sweep_interval.is_zero() {
            cache
        } else {
            cache.with_sweep_interval(config.sweep_interval)
        }
    }

    /// Starts a background task that purges expired entries every `interval`.
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn with_sweep_interval(self: Arc<Self>, interval: Duration) -> Arc<Self> {
        let weak = Arc::downgrade(&self);
        let shutdown = self.shutdown.clone();
        tokio::spawn(sweep_loop(weak, shutdown, interval));
        self
    }

    /// Returns the identity cached under `key`, or `None` if the key is
    /// absent or its entry has expired.
    ///
    /// An expired entry found here is removed.
    #[must_use]
    pub fn load(&self, key: &str) -> Option<Arc<Identity>> {
        let mut state = self.state.lock();
        let now = Instant::now();

        match state.entries.get(key) {
            None => {
                self.metrics.record_miss();
                return None;
            },
            Some(entry) if now.saturating_duration_since(entry.inserted_at) < self.ttl => {
                self.metrics.record_hit();
                return Some(Arc::clone(&entry.identity));
            },
            Some(_) => {},
        }

        state.remove(key);
        self.metrics.record_miss();
        self.metrics.record_expirations(1);
        tracing::debug!(credential = %credential_fingerprint(key), "Expired cache entry removed on read");
        None
    }

    /// Stores `identity` under `key`, replacing any previous entry.
    ///
    /// The entry's TTL starts now and it moves to the back of the eviction
    /// order. If the cache is full, the oldest entry is evicted first.
    pub fn store(&self, key: impl Into<String>, identity: Arc<Identity>) {
        let mut state = self.state.lock();
        // Read under the lock so sequence order and timestamp order agree.
        let now = Instant::now();
        let (evicted, expired) = state.insert(key.into(), identity, now, self.ttl, self.capacity);
        self.metrics.record_insertion(evicted, expired);
    }

    /// Current deletion revision.
    ///
    /// Snapshot it before starting a verification and pass it to
    /// [`store_unless_revoked`](Self::store_unless_revoked) afterwards.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.state.lock().revision
    }

    /// Like [`store`](Self::store), but skips the write if any delete or
    /// clear happened since `revision` was taken.
    ///
    /// This keeps a verification that was already in flight when a
    /// credential was revoked from re-populating the cache. Returns `true`
    /// if the entry was written.
    pub fn store_unless_revoked(
        &self,
        key: impl Into<String>,
        identity: Arc<Identity>,
        revision: u64,
    ) -> bool {
        let mut state = self.state.lock();
        if state.revision != revision {
            return false;
        }
        let now = Instant::now();
        let (evicted, expired) = state.insert(key.into(), identity, now, self.ttl, self.capacity);
        self.metrics.record_insertion(evicted, expired);
        true
    }

    /// Removes the entry for `key`. Returns `true` if one was present.
    ///
    /// Deleting an absent key is not an error.
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        state.revision += 1;
        let removed = state.remove(key).is_some();
        if removed {
            self.metrics.record_revocation();
        }
        removed
    }

    /// Drops the entry for `key` because the credential behind it is no
    /// longer valid. Returns `true` if one was present.
    ///
    /// Unlike [`delete`](Self::delete) this is not a revocation: the
    /// revision is left alone, so in-flight verifications of other
    /// credentials still get cached.
    pub fn expire(&self, key: &str) -> bool {
        let removed = self.state.lock().remove(key).is_some();
        if removed {
            self.metrics.record_expirations(1);
        }
        removed
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.state.lock();
        let now = Instant::now();
        let purged = state.purge_expired(now, self.ttl);
        drop(state);
        self.metrics.record_expirations(purged);
        purged
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.revision += 1;
        state.entries.clear();
        state.order.clear();
    }

    /// Number of entries physically held, including expired entries not yet reclaimed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns `true` if no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lifetime of every entry.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Hit, miss and eviction counters plus the current size.
    #[must_use]
    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot(self.len(), self.capacity)
    }

    /// Stops the background sweep task, if one is running.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for ExpiringCache {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for ExpiringCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish()
    }
}

async fn sweep_loop(cache: Weak<ExpiringCache>, shutdown: CancellationToken, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::debug!("Cache sweep task stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        let Some(cache) = cache.upgrade() else {
            return;
        };
        let purged = cache.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, remaining = cache.len(), "Swept expired cache entries");
        }
    }
}
