//! Error types for the transport layer
//!
//! The taxonomy callers dispatch on is small: [`Error::Timeout`],
//! [`Error::StreamsNotSupported`], [`Error::InvalidArgument`], and everything
//! else, which keeps its original identity (network, protocol, decode).
//! Recoverable conditions inside an adapter (broken session, broken pooled
//! connection) only evict the cached resource; the failing call still
//! surfaces its error — there is no silent retry in this layer.

use std::time::Duration;

/// Transport layer errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configured deadline elapsed before the request completed.
    ///
    /// Only produced when a deadline was actually configured for the call.
    /// An abort without a configured deadline propagates as its original
    /// error, never as `Timeout`.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The adapter cannot deliver a streamed response body
    #[error("streaming response bodies are not supported: {0}")]
    StreamsNotSupported(String),

    /// The request was malformed; detected before any network I/O
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Network or protocol failure reported by the underlying transport
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP-level failure (connection, framing, stream reset)
    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    /// Request or URI construction failed
    #[error("invalid http message: {0}")]
    HttpMessage(#[from] http::Error),

    /// I/O error (connect, read, write)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Response body is not valid UTF-8
    #[error("invalid utf-8 in response body: {0}")]
    Decode(String),

    /// JSON deserialization of a response body failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The peer closed the connection unexpectedly
    #[error("connection closed unexpectedly")]
    ConnectionClosed,
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error is the timeout variant
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}
