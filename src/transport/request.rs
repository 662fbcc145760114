//! Logical request and response types shared by all transports

use crate::stream::StreamSink;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

/// Body placeholder returned for streamed responses
pub const STREAM_SENTINEL: &str = "[stream]";

/// URL scheme of a remote endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain HTTP
    Http,
    /// HTTP over TLS
    #[default]
    Https,
}

impl Scheme {
    /// Scheme as it appears in a URL
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Default port for this scheme (443 secure, 80 otherwise)
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    /// Whether this scheme uses TLS
    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Https)
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            _ => Err(Error::Config(format!(
                "invalid scheme '{}': expected http or https",
                s
            ))),
        }
    }
}

/// Scheme + host + port triple identifying a remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    /// URL scheme
    pub scheme: Scheme,
    /// Remote host
    pub host: String,
    /// Remote port
    pub port: u16,
}

impl Origin {
    /// Create an origin with an explicit port
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// `host:port` authority component
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Value for the `Host` header (port omitted when it is the default)
    pub fn host_header(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            self.authority()
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// How the response body should be delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseShape {
    /// Fully read and decode the body before resolving
    #[default]
    Buffered,
    /// Deliver the body incrementally through the stream sink
    Streamed,
}

/// A logical request handed to a transport adapter
///
/// Headers are a plain string map, so duplicate keys are impossible and
/// absent values are simply never inserted.
#[derive(Debug)]
pub struct HttpRequest {
    /// HTTP method
    pub method: String,
    /// Remote endpoint
    pub origin: Origin,
    /// Request path (leading slash expected)
    pub path: String,
    /// Query parameters, URL-encoded at transmission time
    pub query: HashMap<String, String>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Optional UTF-8 body
    pub body: Option<String>,
    /// Optional per-request deadline
    pub deadline: Option<Duration>,
    /// Requested response body delivery
    pub shape: ResponseShape,
    /// Stream sink; required iff `shape` is `Streamed`
    pub sink: Option<StreamSink>,
}

impl HttpRequest {
    /// Path plus URL-encoded query string (origin-form request target)
    ///
    /// Query keys are emitted in sorted order for a deterministic wire form.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }

        let mut pairs: Vec<_> = self.query.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            serializer.append_pair(key, value);
        }
        format!("{}?{}", self.path, serializer.finish())
    }

    /// Reject a streamed request that has no sink attached
    ///
    /// Runs before any network I/O on every execution path.
    pub fn validate(&self) -> Result<()> {
        if self.shape == ResponseShape::Streamed && self.sink.is_none() {
            return Err(Error::InvalidArgument(
                "streamed response shape requires a stream sink".into(),
            ));
        }
        Ok(())
    }
}

/// Response body: full text, or a sentinel when delivered via the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Fully buffered, decoded body text
    Text(String),
    /// Body was handed to the stream sink
    Streamed,
}

/// A structured response from a transport adapter
#[derive(Debug)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers (last value wins on duplicates)
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: ResponseBody,
}

impl HttpResponse {
    /// Body text, or the `"[stream]"` sentinel for streamed bodies
    pub fn body_text(&self) -> &str {
        match &self.body {
            ResponseBody::Text(text) => text,
            ResponseBody::Streamed => STREAM_SENTINEL,
        }
    }

    /// Deserialize a buffered body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.body {
            ResponseBody::Text(text) => Ok(serde_json::from_str(text)?),
            ResponseBody::Streamed => Err(Error::InvalidArgument(
                "response body was delivered via the stream sink".into(),
            )),
        }
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the status code indicates an error (4xx/5xx)
    pub fn is_error_status(&self) -> bool {
        self.status >= 400
    }
}

/// Collect an `http::HeaderMap` into a plain string map
pub(crate) fn headers_to_map(headers: &http::HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(headers.len());
    for (name, value) in headers {
        map.insert(
            name.as_str().to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }
    map
}
