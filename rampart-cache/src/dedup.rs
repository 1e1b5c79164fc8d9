//! In-flight request coalescing.
//!
//! At most one operation runs per key at any instant. Callers arriving while
//! it is unsettled receive a clone of the same [`SharedOutcome`] and observe
//! the identical value or error.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, Shared, WeakShared};
use futures_util::FutureExt;

/// Shared handle to the eventual result of a coalesced operation.
pub type SharedOutcome<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct PendingOperation<T, E> {
    id: u64,
    // Weak so that an operation nobody awaits any more is dropped, and its
    // registration with it.
    outcome: WeakShared<BoxFuture<'static, Result<T, E>>>,
}

type PendingMap<T, E> = DashMap<String, PendingOperation<T, E>>;

/// Removes one registration when its operation settles or is dropped.
struct Deregister<T, E> {
    pending: Arc<PendingMap<T, E>>,
    key: String,
    id: u64,
}

impl<T, E> Drop for Deregister<T, E> {
    fn drop(&mut self) {
        // The key may have been cancelled and re-registered meanwhile; only
        // remove our own registration.
        let id = self.id;
        self.pending.remove_if(&self.key, |_, op| op.id == id);
    }
}

/// Coalesces concurrent identical operations by key.
///
/// Cloning is cheap and clones share the same registry.
pub struct RequestDeduplicator<T, E> {
    pending: Arc<PendingMap<T, E>>,
    next_id: Arc<AtomicU64>,
}

impl<T, E> Clone for RequestDeduplicator<T, E> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<T, E> Default for RequestDeduplicator<T, E> {
    fn default() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<T, E> std::fmt::Debug for RequestDeduplicator<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDeduplicator")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<T, E> RequestDeduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight operation for `key`, or start one with `operation`.
    ///
    /// Lookup and registration happen before this function returns, so two
    /// calls issued back to back always share one operation. `operation` is
    /// invoked at most once and only to build its future; it must not call
    /// back into this deduplicator.
    ///
    /// The registration is removed when the operation settles, successfully
    /// or not, or when every handle to it has been dropped.
    pub fn execute<F, Fut>(&self, key: impl Into<String>, operation: F) -> SharedOutcome<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        match self.pending.entry(key.into()) {
            Entry::Occupied(mut entry) => {
                if let Some(outcome) = entry.get().outcome.upgrade() {
                    tracing::debug!(key = %entry.key(), "Joined in-flight operation");
                    return outcome;
                }
                let (id, outcome) = self.start(entry.key().clone(), operation);
                if let Some(weak) = outcome.downgrade() {
                    entry.insert(PendingOperation { id, outcome: weak });
                } else {
                    entry.remove();
                }
                outcome
            }
            Entry::Vacant(entry) => {
                let (id, outcome) = self.start(entry.key().clone(), operation);
                if let Some(weak) = outcome.downgrade() {
                    entry.insert(PendingOperation { id, outcome: weak });
                }
                outcome
            }
        }
    }

    fn start<F, Fut>(&self, key: String, operation: F) -> (u64, SharedOutcome<T, E>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        // Build the future before the guard: if `operation` panics, the guard
        // must not run while the caller still holds this key's shard lock.
        let fut = operation();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, id, "Starting operation");
        let guard = Deregister {
            pending: Arc::clone(&self.pending),
            key,
            id,
        };
        let outcome = async move {
            let result = fut.await;
            drop(guard);
            result
        }
        .boxed()
        .shared();
        (id, outcome)
    }

    /// Forget the in-flight operation for `key` without aborting it.
    ///
    /// Handles obtained before the call still resolve; the next `execute`
    /// for `key` starts a fresh operation. Returns true if a registration
    /// was removed.
    pub fn cancel(&self, key: &str) -> bool {
        self.pending.remove(key).is_some()
    }

    /// Forget every in-flight operation whose key contains `pattern`,
    /// without aborting any. Returns the number forgotten.
    pub fn cancel_matching(&self, pattern: &str) -> usize {
        let before = self.pending.len();
        self.pending.retain(|key, _| !key.contains(pattern));
        before.saturating_sub(self.pending.len())
    }

    /// Forget every in-flight operation without aborting any.
    pub fn clear(&self) {
        self.pending.clear();
    }

    /// Number of keys with a registered in-flight operation.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }
}
