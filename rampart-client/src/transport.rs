//! Transport abstraction and request descriptors.
//!
//! Rampart never talks to the network itself. Callers supply a [`Transport`]
//! that turns an [`ApiRequest`] into an [`ApiResponse`], and impose any
//! timeout there.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use rampart_core::TransportError;
use serde_json::Value;

/// Query parameter whose presence marks a request as cache-busting.
pub const CACHE_BUSTER_PARAM: &str = "_t";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request flags consumed by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Skip the cache and the in-flight registry entirely.
    pub force_refresh: bool,
}

/// A request to the remote API.
///
/// Query parameters are kept sorted so that the same logical request always
/// yields the same cache key.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub options: RequestOptions,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: BTreeMap::new(),
            body: None,
            options: RequestOptions::default(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, endpoint).with_body(body)
    }

    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, endpoint).with_body(body)
    }

    pub fn patch(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, endpoint).with_body(body)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Delete, endpoint)
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(name.into(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn force_refresh(mut self) -> Self {
        self.options.force_refresh = true;
        self
    }

    /// True if this request must not read, join, or populate cached state.
    pub fn bypasses_cache(&self) -> bool {
        self.options.force_refresh || self.query.contains_key(CACHE_BUSTER_PARAM)
    }

    /// `METHOD endpoint?k1=v1&k2=v2`, parameters percent-encoded and in
    /// sorted order.
    pub fn cache_key(&self) -> String {
        let mut key = format!("{} {}", self.method, self.endpoint);
        let mut params = self
            .query
            .iter()
            .filter(|(name, _)| name.as_str() != CACHE_BUSTER_PARAM)
            .peekable();
        if params.peek().is_some() {
            key.push('?');
            let joined: Vec<String> = params
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            key.push_str(&joined.join("&"));
        }
        key
    }

    /// Leading path segment, e.g. `/purchase-orders` for
    /// `/purchase-orders/17/items`.
    pub fn resource(&self) -> &str {
        let path = self.endpoint.split('?').next().unwrap_or_default();
        match path.get(1..).and_then(|rest| rest.find('/')) {
            Some(idx) => &path[..idx + 1],
            None => path,
        }
    }
}

/// A response from the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body for 2xx responses, a [`TransportError::Status`] otherwise.
    ///
    /// The error message is the body's `message` field when present.
    pub fn into_result(self) -> Result<Value, TransportError> {
        if self.is_success() {
            return Ok(self.body);
        }
        let message = match &self.body {
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| self.body.to_string()),
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        Err(TransportError::status(self.status, message))
    }
}

/// Asynchronous request function supplied by the caller.
///
/// `Err` means no response was obtained (connection refused, DNS, timeout).
/// Non-2xx responses are returned as `Ok` and classified by the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_sorts_params() {
        let a = ApiRequest::get("/purchase-orders")
            .with_query("status", "open")
            .with_query("page", 2);
        let b = ApiRequest::get("/purchase-orders")
            .with_query("page", 2)
            .with_query("status", "open");
        assert_eq!(a.cache_key(), "GET /purchase-orders?page=2&status=open");
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_cache_key_without_params() {
        assert_eq!(ApiRequest::get("/suppliers").cache_key(), "GET /suppliers");
    }

    #[test]
    fn test_cache_buster_bypasses_and_is_not_keyed() {
        let request =
            ApiRequest::get("/suppliers").with_query(CACHE_BUSTER_PARAM, 1_700_000_000u64);
        assert!(request.bypasses_cache());
        assert_eq!(request.cache_key(), "GET /suppliers");
    }

    #[test]
    fn test_cache_key_escapes_separators_in_params() {
        let smuggled = ApiRequest::get("/purchase-orders").with_query("a", "1&b=2");
        let split = ApiRequest::get("/purchase-orders")
            .with_query("a", 1)
            .with_query("b", 2);
        assert_ne!(smuggled.cache_key(), split.cache_key());
        assert_eq!(smuggled.cache_key(), "GET /purchase-orders?a=1%26b%3D2");
        assert_eq!(split.cache_key(), "GET /purchase-orders?a=1&b=2");

        let odd_name = ApiRequest::get("/suppliers").with_query("q=x", "y");
        assert_eq!(odd_name.cache_key(), "GET /suppliers?q%3Dx=y");
    }

    #[test]
    fn test_force_refresh_bypasses() {
        assert!(!ApiRequest::get("/suppliers").bypasses_cache());
        assert!(ApiRequest::get("/suppliers").force_refresh().bypasses_cache());
    }

    #[test]
    fn test_resource_is_leading_segment() {
        assert_eq!(ApiRequest::get("/purchase-orders/17/items").resource(), "/purchase-orders");
        assert_eq!(ApiRequest::get("/purchase-orders").resource(), "/purchase-orders");
        assert_eq!(ApiRequest::get("/").resource(), "/");
    }

    #[test]
    fn test_response_status_becomes_error() {
        let ok = ApiResponse::ok(json!({"id": 1}));
        assert_eq!(ok.into_result(), Ok(json!({"id": 1})));

        let err = ApiResponse::new(422, json!({"message": "quantity must be positive"}))
            .into_result()
            .unwrap_err();
        assert_eq!(err, TransportError::status(422, "quantity must be positive"));

        let err = ApiResponse::new(502, Value::Null).into_result().unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 502, .. }));
    }
}
