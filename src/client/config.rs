//! Client configuration
//!
//! Every recognized field and its default lives here, validated once at
//! construction. Use `ClientConfig::builder()` for fluent configuration.

use crate::transport::{Origin, RequestFn, Scheme, TlsConfig};
use std::collections::HashMap;
use std::time::Duration;

/// Which transport adapter the executor drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportMode {
    /// One request per call over HTTP/1, optional keep-alive pool
    #[default]
    Buffered,
    /// One persistent HTTP/2 session per origin, multiplexed streams
    Multiplexed,
}

/// Client configuration
///
/// # Defaults
///
/// - `scheme`: https
/// - `port`: 443 when the scheme is secure, 80 otherwise
/// - `keep_alive`: disabled
/// - `streaming`: disabled
/// - `transport`: [`TransportMode::Buffered`]
/// - `secret`, `query_timeout`, `request_timeout`: unset
#[derive(Clone)]
pub struct ClientConfig {
    /// URL scheme of the endpoint
    pub scheme: Scheme,
    /// Endpoint host
    pub host: String,
    /// Endpoint port (resolved from the scheme when not given)
    pub port: u16,
    /// Default authentication secret (`Authorization: Bearer <secret>`)
    pub secret: Option<String>,
    /// Default server-side query deadline (`X-Query-Timeout` header)
    pub query_timeout: Option<Duration>,
    /// Default client-side request deadline
    pub request_timeout: Option<Duration>,
    /// Reuse connections across buffered calls
    pub keep_alive: bool,
    /// Enable the streamed response shape
    pub streaming: bool,
    /// Transport adapter selection
    pub transport: TransportMode,
    /// Default headers applied to every request
    pub headers: HashMap<String, String>,
    /// TLS configuration for https endpoints (built lazily when omitted)
    pub tls: Option<TlsConfig>,
    /// Override for the buffered adapter's underlying request function
    pub request_fn: Option<RequestFn>,
}

impl ClientConfig {
    /// Create a builder for the given endpoint host
    pub fn builder(host: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            scheme: Scheme::default(),
            host: host.into(),
            port: None,
            secret: None,
            query_timeout: None,
            request_timeout: None,
            keep_alive: false,
            streaming: false,
            transport: TransportMode::default(),
            headers: HashMap::new(),
            tls: None,
            request_fn: None,
        }
    }

    /// The origin this client talks to
    pub fn origin(&self) -> Origin {
        Origin::new(self.scheme, self.host.clone(), self.port)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("query_timeout", &self.query_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("keep_alive", &self.keep_alive)
            .field("streaming", &self.streaming)
            .field("transport", &self.transport)
            .field("headers", &self.headers)
            .finish()
    }
}

/// Builder for [`ClientConfig`]
///
/// # Examples
///
/// ```ignore
/// let config = ClientConfig::builder("db.example.com")
///     .secret("s3cr3t")
///     .query_timeout(Duration::from_secs(5))
///     .keep_alive(true)
///     .build();
/// ```
pub struct ClientConfigBuilder {
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    secret: Option<String>,
    query_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    keep_alive: bool,
    streaming: bool,
    transport: TransportMode,
    headers: HashMap<String, String>,
    tls: Option<TlsConfig>,
    request_fn: Option<RequestFn>,
}

impl ClientConfigBuilder {
    /// Set the URL scheme (default: https)
    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Set an explicit port (default: 443 https / 80 http)
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the default authentication secret
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Set the default server-side query deadline
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Set the default client-side request deadline
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Enable connection reuse across buffered calls (default: off)
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Enable the streamed response shape (default: off)
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Select the transport adapter (default: buffered)
    pub fn transport(mut self, transport: TransportMode) -> Self {
        self.transport = transport;
        self
    }

    /// Add a default header applied to every request
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the TLS configuration for https endpoints
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Replace the buffered adapter's underlying request function
    pub fn request_fn(mut self, request_fn: RequestFn) -> Self {
        self.request_fn = Some(request_fn);
        self
    }

    /// Build the configuration, resolving defaults
    pub fn build(self) -> ClientConfig {
        let port = self.port.unwrap_or_else(|| self.scheme.default_port());
        ClientConfig {
            scheme: self.scheme,
            host: self.host,
            port,
            secret: self.secret,
            query_timeout: self.query_timeout,
            request_timeout: self.request_timeout,
            keep_alive: self.keep_alive,
            streaming: self.streaming,
            transport: self.transport,
            headers: self.headers,
            tls: self.tls,
            request_fn: self.request_fn,
        }
    }
}
