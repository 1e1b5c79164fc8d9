//! Rampart Test Utilities
//!
//! Shared test infrastructure for the Rampart workspace:
//! - A scripted mock transport
//! - Proptest generators for policies, keys and records
//! - Fixtures for common scenarios
//! - Assertions on error classification

pub use rampart_client::{ApiRequest, ApiResponse, Method, Transport};
pub use rampart_core::{
    ErrorKind, LineItem, LineItemInput, PurchaseOrder, PurchaseOrderInput, RetryPolicy,
    TransportError,
};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

type Reply = Result<ApiResponse, TransportError>;

/// Transport that replays a queue of canned replies.
///
/// Each `send` pops the next reply. Once the queue is empty the fallback
/// reply is repeated, or a network error is returned if none was set.
/// Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<(Reply, Option<Duration>)>>,
    fallback: Option<Reply>,
    latency: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer 200 with `body`.
    pub fn always_ok(body: Value) -> Self {
        Self::new().with_fallback(Ok(ApiResponse::ok(body)))
    }

    /// Queue a 200 response.
    pub fn then_ok(self, body: Value) -> Self {
        self.then(Ok(ApiResponse::ok(body)))
    }

    /// Queue a response with an arbitrary status.
    pub fn then_status(self, status: u16, body: Value) -> Self {
        self.then(Ok(ApiResponse::new(status, body)))
    }

    /// Queue a failure to obtain any response.
    pub fn then_network_error(self, reason: &str) -> Self {
        self.then(Err(TransportError::network(reason)))
    }

    /// Queue a 200 response delivered after `delay` instead of the
    /// transport-wide latency.
    pub fn then_ok_after(self, body: Value, delay: Duration) -> Self {
        lock(&self.script).push_back((Ok(ApiResponse::ok(body)), Some(delay)));
        self
    }

    pub fn then(self, reply: Reply) -> Self {
        lock(&self.script).push_back((reply, None));
        self
    }

    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Delay every reply. Under a paused tokio clock the delay elapses only
    /// when time is advanced.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.requests).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());

        let next = lock(&self.script).pop_front();
        let delay = next
            .as_ref()
            .and_then(|(_, delay)| *delay)
            .unwrap_or(self.latency);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match next {
            Some((reply, _)) => reply,
            None => match &self.fallback {
                Some(reply) => reply.clone(),
                None => Err(TransportError::network("script exhausted")),
            },
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Rampart types.

    use super::*;
    use proptest::prelude::*;

    /// Policy with millisecond-scale delays and a multiplier in [1, 4).
    pub fn arb_retry_policy() -> impl Strategy<Value = RetryPolicy> {
        (0u32..6, 1u64..100, 100u64..2000, 1.0f64..4.0).prop_map(
            |(max_retries, initial_ms, max_ms, multiplier)| {
                RetryPolicy::new(
                    max_retries,
                    Duration::from_millis(initial_ms),
                    Duration::from_millis(max_ms),
                )
                .with_backoff_multiplier(multiplier)
            },
        )
    }

    pub fn arb_method() -> impl Strategy<Value = Method> {
        prop_oneof![
            Just(Method::Get),
            Just(Method::Post),
            Just(Method::Put),
            Just(Method::Patch),
            Just(Method::Delete),
        ]
    }

    pub fn arb_endpoint() -> impl Strategy<Value = String> {
        "/(purchase-orders|suppliers|line-items)(/[0-9]{1,4})?"
    }

    /// GET request with up to four query parameters, none of them `_t`.
    pub fn arb_get_request() -> impl Strategy<Value = ApiRequest> {
        (
            arb_endpoint(),
            prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 0..4),
        )
            .prop_map(|(endpoint, query)| {
                query
                    .into_iter()
                    .fold(ApiRequest::get(endpoint), |request, (k, v)| {
                        request.with_query(k, v)
                    })
            })
    }

    pub fn arb_transport_error() -> impl Strategy<Value = TransportError> {
        prop_oneof![
            "[a-z ]{1,20}".prop_map(TransportError::network),
            (400u16..600, "[a-z ]{0,20}")
                .prop_map(|(status, message)| TransportError::status(status, message)),
            "[a-z ]{1,20}".prop_map(TransportError::invalid_response),
        ]
    }

    /// Valid input: non-negative amounts, tax rate up to 28%.
    pub fn arb_line_item_input() -> impl Strategy<Value = LineItemInput> {
        ("[A-Za-z ]{1,20}", 0u32..1000, 0u32..100_000, 0u32..=28).prop_map(
            |(description, quantity, cents, rate)| {
                let unit_price = cents as f64 / 100.0;
                LineItemInput::new(description, quantity as f64, unit_price, rate as f64)
            },
        )
    }

    pub fn arb_purchase_order_input() -> impl Strategy<Value = PurchaseOrderInput> {
        (
            "[A-Z][a-z]{2,12}",
            prop::option::of("[a-z ]{0,40}"),
            prop::collection::vec(arb_line_item_input(), 0..8),
        )
            .prop_filter_map("line items must validate", |(supplier, notes, inputs)| {
                let items = inputs
                    .into_iter()
                    .map(LineItem::optimistic)
                    .collect::<Result<Vec<_>, _>>()
                    .ok()?;
                Some(PurchaseOrderInput {
                    supplier,
                    notes,
                    items,
                })
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use serde_json::json;

    /// Short delays so retry tests finish quickly on a paused clock.
    pub fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_retries,
            Duration::from_millis(10),
            Duration::from_millis(100),
        )
    }

    /// 100 units at 50.00 with 18% tax: tax 900, total 5900.
    pub fn cement_line_item() -> LineItemInput {
        LineItemInput::new("Cement (50kg bag)", 100.0, 50.0, 18.0)
    }

    pub fn steel_line_item() -> LineItemInput {
        LineItemInput::new("TMT steel bar 12mm", 20.0, 640.0, 18.0)
    }

    pub fn purchase_order_input() -> PurchaseOrderInput {
        PurchaseOrderInput {
            supplier: "Acme Building Supplies".to_string(),
            notes: Some("Deliver to site B".to_string()),
            items: [cement_line_item(), steel_line_item()]
                .into_iter()
                .map(|input| LineItem::optimistic(input).expect("fixture line items are valid"))
                .collect(),
        }
    }

    pub fn suppliers_body() -> Value {
        json!([
            { "id": "sup_1", "name": "Acme Building Supplies" },
            { "id": "sup_2", "name": "Northern Timber" },
        ])
    }

    /// Server echo of a confirmed purchase order.
    pub fn confirmed_order_body(id: &str) -> Value {
        json!({ "id": id, "supplier": "Acme Building Supplies", "status": "confirmed" })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on error classification.

    use super::*;
    use rampart_core::Retryable;

    #[track_caller]
    pub fn assert_transient(err: &TransportError) {
        assert_eq!(err.kind(), ErrorKind::Transient, "Expected transient error, got: {:?}", err);
        assert!(err.is_retryable());
    }

    #[track_caller]
    pub fn assert_terminal(err: &TransportError) {
        assert_eq!(err.kind(), ErrorKind::Terminal, "Expected terminal error, got: {:?}", err);
        assert!(!err.is_retryable());
    }

    /// Assert that a result failed with the given HTTP status.
    #[track_caller]
    pub fn assert_status<T: std::fmt::Debug>(result: &Result<T, TransportError>, expected: u16) {
        match result {
            Err(TransportError::Status { status, .. }) => {
                assert_eq!(*status, expected, "Wrong status code");
            }
            other => panic!("Expected status {} error, got: {:?}", expected, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let transport = ScriptedTransport::new()
            .then_status(503, json!({"message": "busy"}))
            .with_fallback(Ok(ApiResponse::ok(json!("ok"))));

        let request = ApiRequest::get("/suppliers");
        assert_eq!(transport.send(&request).await.unwrap().status, 503);
        assert_eq!(transport.send(&request).await.unwrap().body, json!("ok"));
        assert_eq!(transport.send(&request).await.unwrap().body, json!("ok"));
        assert_eq!(transport.call_count(), 3);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_network_error() {
        let transport = ScriptedTransport::new();
        let err = transport.send(&ApiRequest::get("/x")).await.unwrap_err();
        assertions::assert_transient(&err);
    }
}
