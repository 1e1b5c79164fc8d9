//! Read and write paths over a caller-supplied [`Transport`].
//!
//! Reads go cache → in-flight registry → retried transport call, and the
//! response is cached before the in-flight registration is released, so a
//! caller arriving after settlement sees the cached value. Writes skip the
//! cache and the registry, and invalidate cached reads of the resource they
//! touched once they succeed.
//!
//! Invalidation also detaches matching in-flight reads. Their callers still
//! receive the response, but a read that started before an invalidation is
//! never written to the cache.

use std::sync::Arc;
use std::time::Duration;

use rampart_cache::{RequestDeduplicator, SweeperHandle, TtlCache};
use rampart_core::{RampartConfig, RetryPolicy, TransportError};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::retry::retry_with_backoff;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Owns the cache, the in-flight registry and the retry policies for one
/// client. Cloning is not provided; share it behind an `Arc`.
pub struct RequestOrchestrator {
    transport: Arc<dyn Transport>,
    cache: TtlCache<Value>,
    dedup: RequestDeduplicator<Value, TransportError>,
    read_policy: RetryPolicy,
    write_policy: RetryPolicy,
    cache_ttl: Duration,
}

impl std::fmt::Debug for RequestOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOrchestrator")
            .field("cache", &self.cache)
            .field("dedup", &self.dedup)
            .field("read_policy", &self.read_policy)
            .field("write_policy", &self.write_policy)
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

impl RequestOrchestrator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let cache = TtlCache::default();
        let cache_ttl = cache.default_ttl();
        Self {
            transport,
            cache,
            dedup: RequestDeduplicator::new(),
            read_policy: RetryPolicy::standard(),
            write_policy: RetryPolicy::standard(),
            cache_ttl,
        }
    }

    /// Build from validated configuration. Reads and writes share the
    /// configured retry policy until overridden.
    pub fn from_config(transport: Arc<dyn Transport>, config: &RampartConfig) -> Self {
        let policy = config.retry.policy();
        Self {
            transport,
            cache: TtlCache::from_settings(&config.cache),
            dedup: RequestDeduplicator::new(),
            read_policy: policy.clone(),
            write_policy: policy,
            cache_ttl: config.cache.default_ttl(),
        }
    }

    pub fn with_read_policy(mut self, policy: RetryPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    pub fn with_write_policy(mut self, policy: RetryPolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn cache(&self) -> &TtlCache<Value> {
        &self.cache
    }

    pub fn dedup(&self) -> &RequestDeduplicator<Value, TransportError> {
        &self.dedup
    }

    /// Serve a read from cache, joining or starting the in-flight request on
    /// a miss.
    ///
    /// Requests that bypass the cache (`force_refresh` or the `_t` query
    /// parameter) neither read nor populate cached state and are never
    /// coalesced.
    pub async fn fetch(&self, request: ApiRequest) -> Result<Value, TransportError> {
        if request.bypasses_cache() {
            tracing::debug!(endpoint = %request.endpoint, "Cache bypassed");
            return send_with_retry(self.transport.as_ref(), &request, &self.read_policy).await;
        }

        let key = request.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(cached);
        }

        let transport = Arc::clone(&self.transport);
        let cache = self.cache.clone();
        let policy = self.read_policy.clone();
        let ttl = self.cache_ttl;
        let epoch = self.cache.epoch();
        let cache_key = key.clone();
        self.dedup
            .execute(key, move || async move {
                let body = send_with_retry(transport.as_ref(), &request, &policy).await?;
                cache.set_if_current(cache_key, body.clone(), ttl, epoch);
                Ok::<_, TransportError>(body)
            })
            .await
    }

    /// [`fetch`](Self::fetch) and decode the body.
    pub async fn fetch_json<D: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<D, TransportError> {
        let body = self.fetch(request).await?;
        serde_json::from_value(body).map_err(|e| TransportError::invalid_response(e.to_string()))
    }

    /// Send a write under the write policy, then drop cached reads of the
    /// request's resource.
    pub async fn mutate(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let body = send_with_retry(self.transport.as_ref(), &request, &self.write_policy).await?;
        let removed = self.invalidate(request.resource());
        tracing::debug!(
            method = %request.method,
            resource = %request.resource(),
            removed,
            "Invalidated cached reads after write"
        );
        Ok(body)
    }

    /// Remove every cached read whose key contains `pattern`, and detach
    /// matching in-flight reads so later fetches start fresh. Returns the
    /// number of cached reads removed.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let removed = self.cache.invalidate_pattern(pattern);
        let detached = self.dedup.cancel_matching(pattern);
        if detached > 0 {
            tracing::debug!(pattern, detached, "Detached in-flight reads");
        }
        removed
    }

    /// Start the cache's background sweeper.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperHandle {
        self.cache.spawn_sweeper(interval)
    }
}

async fn send_with_retry(
    transport: &dyn Transport,
    request: &ApiRequest,
    policy: &RetryPolicy,
) -> Result<Value, TransportError> {
    retry_with_backoff(
        move || async move {
            transport
                .send(request)
                .await
                .and_then(ApiResponse::into_result)
        },
        policy,
    )
    .await
}
