//! Key/value cache with per-entry expiration.
//!
//! Expiry is tracked in a min-heap of deadlines. Reads check the deadline of
//! the entry they touch, so an expired value is never returned regardless of
//! when the sweep last ran. The sweep ([`TtlCache::purge_expired`], or the
//! background task from [`TtlCache::spawn_sweeper`]) only reclaims memory.
//!
//! Every write also purges due deadlines, so a cache without a sweeper
//! still sheds expired entries as it is used.
//!
//! Overwriting or deleting a key leaves its old heap deadline behind; each
//! deadline carries the generation of the entry it was scheduled for and is
//! ignored if the entry has since been replaced. The heap is compacted once
//! stale deadlines outnumber live entries.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use rampart_core::{CacheSettings, DEFAULT_CACHE_TTL};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::stats::CacheStats;

/// Stale deadlines tolerated beyond twice the live entry count.
const COMPACT_SLACK: usize = 64;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    generation: u64,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Deadline {
    at: Instant,
    generation: u64,
    key: String,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    expiry: BinaryHeap<Reverse<Deadline>>,
    next_generation: u64,
    epoch: u64,
    stats: CacheStats,
}

impl<V> CacheState<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            expiry: BinaryHeap::new(),
            next_generation: 0,
            epoch: 0,
            stats: CacheStats::default(),
        }
    }

    /// Pop every deadline at or before `now`, removing entries still on it.
    fn purge(&mut self, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some(Reverse(deadline)) = self.expiry.peek() {
            if deadline.at > now {
                break;
            }
            let Some(Reverse(deadline)) = self.expiry.pop() else {
                break;
            };
            let current = self
                .entries
                .get(&deadline.key)
                .is_some_and(|entry| entry.generation == deadline.generation);
            if current {
                self.entries.remove(&deadline.key);
                evicted += 1;
            }
        }
        self.stats.expirations += evicted as u64;
        evicted
    }

    /// Rebuild the heap without stale deadlines once they dominate it.
    fn compact(&mut self) {
        if self.expiry.len() <= self.entries.len() * 2 + COMPACT_SLACK {
            return;
        }
        let entries = &self.entries;
        self.expiry.retain(|Reverse(deadline)| {
            entries
                .get(&deadline.key)
                .is_some_and(|entry| entry.generation == deadline.generation)
        });
    }

    fn insert(&mut self, key: String, value: V, expires_at: Instant) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.expiry.push(Reverse(Deadline {
            at: expires_at,
            generation,
            key: key.clone(),
        }));
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at,
                generation,
            },
        );
        self.compact();
    }

    /// Drop `key` if its deadline has passed. Returns true if it was dropped.
    fn expire_if_due(&mut self, key: &str, now: Instant) -> bool {
        let due = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.expires_at <= now);
        if due {
            self.entries.remove(key);
            self.stats.expirations += 1;
        }
        due
    }
}

/// In-memory cache with time-based eviction.
///
/// Cloning is cheap and clones share the same store. There is no capacity
/// limit; entries leave only by expiry, `delete`, `invalidate_pattern` or
/// `clear`.
///
/// # Example
///
/// ```ignore
/// let cache = TtlCache::new(Duration::from_secs(300));
/// cache.set_with_ttl("GET /suppliers", suppliers, Duration::from_secs(60));
///
/// if let Some(cached) = cache.get("GET /suppliers") {
///     return Ok(cached);
/// }
/// ```
pub struct TtlCache<V> {
    state: Arc<Mutex<CacheState<V>>>,
    default_ttl: Duration,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            default_ttl: self.default_ttl,
        }
    }
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl<V> TtlCache<V> {
    /// Create an empty cache whose `set` uses `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::new())),
            default_ttl,
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.default_ttl())
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // The cache has no failure modes; a panic while holding the lock leaves
    // the maps consistent, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `value` under `key` for the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store `value` under `key` for `ttl`.
    ///
    /// An existing entry is replaced outright: its value and its remaining
    /// lifetime are both discarded.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let mut state = self.lock();
        state.purge(now);
        tracing::trace!(key = %key, ttl_ms = ttl.as_millis() as u64, "Cache entry set");
        state.insert(key, value, now + ttl);
    }

    /// Current invalidation epoch.
    ///
    /// The epoch advances on every `delete`, `invalidate_pattern` and
    /// `clear`. Pair it with [`set_if_current`](Self::set_if_current) to
    /// store a value computed from a read that started before an
    /// invalidation.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Store `value` only if no invalidation happened since `epoch` was
    /// read. Returns true if the value was stored.
    pub fn set_if_current(
        &self,
        key: impl Into<String>,
        value: V,
        ttl: Duration,
        epoch: u64,
    ) -> bool {
        let key = key.into();
        let now = Instant::now();
        let mut state = self.lock();
        state.purge(now);
        if state.epoch != epoch {
            tracing::debug!(key = %key, "Dropped value read before invalidation");
            return false;
        }
        state.insert(key, value, now + ttl);
        true
    }

    /// True if `key` holds an entry that has not expired.
    pub fn has(&self, key: &str) -> bool {
        let mut state = self.lock();
        !state.expire_if_due(key, Instant::now()) && state.entries.contains_key(key)
    }

    /// Remove `key`. Returns true if an entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.lock();
        state.epoch += 1;
        let removed = state.entries.remove(key).is_some();
        if removed {
            state.stats.invalidations += 1;
            state.compact();
        }
        removed
    }

    /// Remove every key containing `pattern`. Returns the number removed.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut state = self.lock();
        state.epoch += 1;
        let before = state.entries.len();
        state.entries.retain(|key, _| !key.contains(pattern));
        let removed = before - state.entries.len();
        state.stats.invalidations += removed as u64;
        if removed > 0 {
            state.compact();
            tracing::debug!(pattern, removed, "Invalidated cache entries");
        }
        removed
    }

    /// Remove all entries and all scheduled deadlines.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.entries.clear();
        state.expiry.clear();
    }

    /// Number of live entries. Expired entries are purged first.
    pub fn len(&self) -> usize {
        let mut state = self.lock();
        state.purge(Instant::now());
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict every entry whose deadline has passed. Returns the number evicted.
    pub fn purge_expired(&self) -> usize {
        self.lock().purge(Instant::now())
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entry_count: state.entries.len() as u64,
            ..state.stats.clone()
        }
    }
}

impl<V: Clone> TtlCache<V> {
    /// Return the value for `key`, or `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut state = self.lock();
        if state.expire_if_due(key, Instant::now()) {
            state.stats.misses += 1;
            return None;
        }
        let value = state.entries.get(key).map(|entry| entry.value.clone());
        if value.is_some() {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }
        value
    }
}

impl<V: Send + 'static> TtlCache<V> {
    /// Start a background task that purges expired entries every `interval`.
    ///
    /// The task stops when the returned handle is shut down or dropped, or
    /// when every clone of the cache has been dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperHandle {
        let state = Arc::downgrade(&self.state);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(sweep_loop(state, interval, shutdown_rx));
        SweeperHandle {
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }
}

async fn sweep_loop<V>(
    state: Weak<Mutex<CacheState<V>>>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::debug!(interval_ms = interval.as_millis() as u64, "Cache sweeper started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let Some(state) = state.upgrade() else {
                    break;
                };
                let evicted = state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .purge(Instant::now());
                if evicted > 0 {
                    tracing::debug!(evicted, "Swept expired cache entries");
                }
            }
        }
    }

    tracing::debug!("Cache sweeper stopped");
}

/// Handle to a background sweeper. Dropping it stops the sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
