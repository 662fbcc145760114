//! Per-call request surface

use crate::stream::StreamSink;
use crate::transport::ResponseShape;
use std::collections::HashMap;
use std::time::Duration;

/// One logical API request
///
/// Per-call values override the executor's configured defaults; anything
/// left unset falls back to the configuration supplied at construction.
///
/// # Examples
///
/// ```ignore
/// let request = ApiRequest::post("/query")
///     .body(r#"{"q": "all users"}"#)
///     .query_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug)]
pub struct ApiRequest {
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Query parameters
    pub query: HashMap<String, String>,
    /// Per-call headers, merged over the configured defaults
    pub headers: HashMap<String, String>,
    /// Optional UTF-8 body
    pub body: Option<String>,
    /// Per-call secret, overriding the configured default
    pub secret: Option<String>,
    /// Per-call server-side query deadline (`X-Query-Timeout`)
    pub query_timeout: Option<Duration>,
    /// Per-call client-side request deadline
    pub deadline: Option<Duration>,
    /// Response body delivery
    pub shape: ResponseShape,
    /// Stream sink; required iff `shape` is streamed
    pub sink: Option<StreamSink>,
}

impl ApiRequest {
    /// Create a request with the given method and path
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: None,
            secret: None,
            query_timeout: None,
            deadline: None,
            shape: ResponseShape::Buffered,
            sink: None,
        }
    }

    /// GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    /// POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new("POST", path)
    }

    /// Add a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a per-call header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the request body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Override the configured secret for this call
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Override the configured query deadline for this call
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Override the configured request deadline for this call
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Request streamed body delivery through `sink`
    pub fn streamed(mut self, sink: StreamSink) -> Self {
        self.shape = ResponseShape::Streamed;
        self.sink = Some(sink);
        self
    }
}
