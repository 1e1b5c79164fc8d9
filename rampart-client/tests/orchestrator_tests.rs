//! End-to-end read and write flows through the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use rampart_client::{ApiRequest, ApiResponse, RequestOrchestrator};
use rampart_core::TransportError;
use rampart_test_utils::assertions::{assert_status, assert_terminal};
use rampart_test_utils::fixtures::{fast_policy, suppliers_body};
use rampart_test_utils::ScriptedTransport;
use serde_json::json;

fn client(transport: &Arc<ScriptedTransport>) -> RequestOrchestrator {
    RequestOrchestrator::new(transport.clone())
        .with_read_policy(fast_policy(3))
        .with_write_policy(fast_policy(2))
}

#[tokio::test(start_paused = true)]
async fn fetch_populates_cache() {
    let transport = Arc::new(ScriptedTransport::new().then_ok(suppliers_body()));
    let client = client(&transport);

    let first = client.fetch(ApiRequest::get("/suppliers")).await.unwrap();
    let second = client.fetch(ApiRequest::get("/suppliers")).await.unwrap();

    assert_eq!(first, suppliers_body());
    assert_eq!(second, suppliers_body());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_fetches_share_one_call() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .then_ok(suppliers_body())
            .with_latency(Duration::from_millis(100)),
    );
    let client = client(&transport);

    let (a, b, c) = tokio::join!(
        client.fetch(ApiRequest::get("/suppliers")),
        client.fetch(ApiRequest::get("/suppliers")),
        client.fetch(ApiRequest::get("/suppliers")),
    );

    assert_eq!(transport.call_count(), 1);
    assert_eq!(a.unwrap(), suppliers_body());
    assert_eq!(b.unwrap(), suppliers_body());
    assert_eq!(c.unwrap(), suppliers_body());
    assert_eq!(client.dedup().pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_fetches_share_one_failure() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .then_status(404, json!({"message": "no such supplier"}))
            .with_latency(Duration::from_millis(100)),
    );
    let client = client(&transport);

    let (a, b) = tokio::join!(
        client.fetch(ApiRequest::get("/suppliers/9")),
        client.fetch(ApiRequest::get("/suppliers/9")),
    );

    assert_eq!(transport.call_count(), 1);
    assert_eq!(a, b);
    assert_status(&a, 404);
    assert!(!client.cache().has("GET /suppliers/9"));
}

#[tokio::test(start_paused = true)]
async fn different_queries_are_not_coalesced() {
    let transport = Arc::new(
        ScriptedTransport::always_ok(json!([])).with_latency(Duration::from_millis(50)),
    );
    let client = client(&transport);

    let (a, b) = tokio::join!(
        client.fetch(ApiRequest::get("/purchase-orders").with_query("page", 1)),
        client.fetch(ApiRequest::get("/purchase-orders").with_query("page", 2)),
    );

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn server_errors_are_retried_until_success() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .then_status(503, json!({"message": "unavailable"}))
            .then_network_error("connection reset")
            .then_ok(suppliers_body()),
    );
    let client = client(&transport);

    let body = client.fetch(ApiRequest::get("/suppliers")).await.unwrap();

    assert_eq!(body, suppliers_body());
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn client_errors_fail_without_retry() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .then_status(422, json!({"message": "supplier is required"}))
            .then_ok(suppliers_body()),
    );
    let client = client(&transport);

    let result = client.fetch(ApiRequest::get("/suppliers")).await;

    assert_eq!(
        result,
        Err(TransportError::status(422, "supplier is required"))
    );
    assert_terminal(result.as_ref().unwrap_err());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_last_error() {
    let transport = Arc::new(ScriptedTransport::new().with_fallback(Err(
        TransportError::network("connection refused"),
    )));
    let client = client(&transport);

    let result = client.fetch(ApiRequest::get("/suppliers")).await;

    assert_eq!(result, Err(TransportError::network("connection refused")));
    assert_eq!(transport.call_count(), 4);
    assert!(client.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_is_not_cached() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .then_status(404, json!({"message": "missing"}))
            .then_ok(suppliers_body()),
    );
    let client = client(&transport);

    assert!(client.fetch(ApiRequest::get("/suppliers")).await.is_err());
    assert_eq!(
        client.fetch(ApiRequest::get("/suppliers")).await,
        Ok(suppliers_body())
    );
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn force_refresh_bypasses_cache_without_overwriting() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .then_ok(json!({"version": 1}))
            .then_ok(json!({"version": 2})),
    );
    let client = client(&transport);

    let cached = client.fetch(ApiRequest::get("/suppliers")).await.unwrap();
    let fresh = client
        .fetch(ApiRequest::get("/suppliers").force_refresh())
        .await
        .unwrap();
    let again = client.fetch(ApiRequest::get("/suppliers")).await.unwrap();

    assert_eq!(cached["version"], 1);
    assert_eq!(fresh["version"], 2);
    assert_eq!(again["version"], 1);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn cache_buster_param_bypasses_cache() {
    let transport = Arc::new(ScriptedTransport::always_ok(suppliers_body()));
    let client = client(&transport);

    client.fetch(ApiRequest::get("/suppliers")).await.unwrap();
    client
        .fetch(ApiRequest::get("/suppliers").with_query("_t", 1_700_000_000_000u64))
        .await
        .unwrap();

    assert_eq!(transport.call_count(), 2);
    assert_eq!(client.cache().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn mutate_invalidates_resource_reads() {
    let transport = Arc::new(ScriptedTransport::always_ok(json!({"ok": true})));
    let client = client(&transport);

    client
        .fetch(ApiRequest::get("/purchase-orders").with_query("page", 1))
        .await
        .unwrap();
    client.fetch(ApiRequest::get("/purchase-orders/17")).await.unwrap();
    client.fetch(ApiRequest::get("/suppliers")).await.unwrap();
    assert_eq!(client.cache().len(), 3);

    client
        .mutate(ApiRequest::patch("/purchase-orders/17", json!({"notes": "rush"})))
        .await
        .unwrap();

    assert_eq!(client.cache().len(), 1);
    assert!(client.cache().has("GET /suppliers"));
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn failed_mutate_keeps_cache_and_retries_under_write_policy() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .then_ok(json!([]))
            .with_fallback(Ok(ApiResponse::new(500, json!({"message": "db down"})))),
    );
    let client = client(&transport);

    client.fetch(ApiRequest::get("/purchase-orders")).await.unwrap();
    let result = client
        .mutate(ApiRequest::post("/purchase-orders", json!({"supplier": "Acme"})))
        .await;

    assert_status(&result, 500);
    assert_eq!(transport.call_count(), 1 + 3);
    assert!(client.cache().has("GET /purchase-orders"));
}

#[tokio::test(start_paused = true)]
async fn mutations_are_never_coalesced() {
    let transport = Arc::new(
        ScriptedTransport::always_ok(json!({"ok": true})).with_latency(Duration::from_millis(50)),
    );
    let client = client(&transport);
    let body = json!({"supplier": "Acme"});

    let (a, b) = tokio::join!(
        client.mutate(ApiRequest::post("/purchase-orders", body.clone())),
        client.mutate(ApiRequest::post("/purchase-orders", body.clone())),
    );

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn cached_reads_expire() {
    let transport = Arc::new(ScriptedTransport::always_ok(suppliers_body()));
    let client = client(&transport).with_cache_ttl(Duration::from_millis(1000));

    client.fetch(ApiRequest::get("/suppliers")).await.unwrap();
    tokio::time::advance(Duration::from_millis(999)).await;
    client.fetch(ApiRequest::get("/suppliers")).await.unwrap();
    assert_eq!(transport.call_count(), 1);

    tokio::time::advance(Duration::from_millis(2)).await;
    client.fetch(ApiRequest::get("/suppliers")).await.unwrap();
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn read_in_flight_during_write_is_not_cached() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .then_ok_after(json!({"version": "old"}), Duration::from_millis(100))
            .then_ok_after(json!({"ok": true}), Duration::from_millis(20))
            .then_ok(json!({"version": "new"})),
    );
    let client = client(&transport);

    let early_read = client.fetch(ApiRequest::get("/purchase-orders"));
    let write = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        client
            .mutate(ApiRequest::post("/purchase-orders", json!({"supplier": "Acme"})))
            .await
    };
    let late_read = async {
        tokio::time::sleep(Duration::from_millis(40)).await;
        client.fetch(ApiRequest::get("/purchase-orders")).await
    };
    let (early, written, late) = tokio::join!(early_read, write, late_read);

    // The early caller still receives its own response.
    assert_eq!(early.unwrap()["version"], "old");
    assert!(written.is_ok());
    // The late read did not join the detached request.
    assert_eq!(late.unwrap()["version"], "new");
    assert_eq!(transport.call_count(), 3);

    let cached = client.fetch(ApiRequest::get("/purchase-orders")).await.unwrap();
    assert_eq!(cached["version"], "new");
    assert_eq!(transport.call_count(), 3);
}
