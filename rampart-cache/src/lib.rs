//! In-memory request state for Rampart clients.
//!
//! Two structures live here, both owned by the client that constructs them
//! (there is no process-wide instance):
//!
//! - [`TtlCache`]: response cache with per-entry expiration. Reads check the
//!   entry's deadline, and an optional sweeper task reclaims expired entries.
//! - [`RequestDeduplicator`]: coalesces concurrent operations sharing a key
//!   into a single execution whose outcome every caller observes.
//!
//! # Example
//!
//! ```ignore
//! let cache: TtlCache<Value> = TtlCache::from_settings(&config.cache);
//! let _sweeper = cache.spawn_sweeper(config.cache.sweep_interval());
//!
//! let dedup = RequestDeduplicator::new();
//! let (a, b) = tokio::join!(
//!     dedup.execute("GET /suppliers", || fetch_suppliers()),
//!     dedup.execute("GET /suppliers", || fetch_suppliers()),
//! );
//! // fetch_suppliers ran once; a and b hold the same result.
//! ```

pub mod dedup;
pub mod stats;
pub mod ttl;

pub use dedup::{RequestDeduplicator, SharedOutcome};
pub use stats::CacheStats;
pub use ttl::{SweeperHandle, TtlCache};
