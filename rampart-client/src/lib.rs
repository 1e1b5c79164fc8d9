//! Rampart Client - Request Resilience
//!
//! Wraps a caller-supplied [`Transport`] with the behavior a client needs to
//! stay responsive against a flaky API:
//!
//! - [`retry_with_backoff`] re-runs transient failures with exponential
//!   backoff under a [`RetryPolicy`](rampart_core::RetryPolicy).
//! - [`RequestOrchestrator`] serves reads from a TTL cache and coalesces
//!   concurrent identical reads into one transport call.
//! - [`OptimisticUpdate`] applies local changes immediately and rolls them
//!   back if the remote call fails.
//!
//! # Example
//!
//! ```ignore
//! let config = RampartConfig::from_path(Path::new("rampart.toml"))?;
//! init_tracing(&config.logging)?;
//!
//! let client = RequestOrchestrator::from_config(Arc::new(my_transport), &config);
//! let _sweeper = client.spawn_sweeper(config.cache.sweep_interval());
//!
//! let suppliers: Vec<Supplier> = client.fetch_json(ApiRequest::get("/suppliers")).await?;
//! ```

pub mod optimistic;
pub mod orchestrator;
pub mod retry;
pub mod telemetry;
pub mod transport;

pub use optimistic::{OptimisticOutcome, OptimisticStatus, OptimisticUpdate, PendingUpdate};
pub use orchestrator::RequestOrchestrator;
pub use retry::{retry_with_backoff, retry_with_backoff_if};
pub use telemetry::{init_tracing, TelemetryError};
pub use transport::{
    ApiRequest, ApiResponse, Method, RequestOptions, Transport, CACHE_BUSTER_PARAM,
};
