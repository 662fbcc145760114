//! # tidewire
//!
//! HTTP transport layer for the Tide database client. This crate turns a
//! logical request (method, path, query, headers, body, deadline, response
//! shape) into bytes on the wire and the response back into a structured
//! result or a stream of text chunks.
//!
//! Two interchangeable transports implement the same [`HttpTransport`]
//! contract:
//!
//! * [`BufferedTransport`] — one request per call over HTTP/1, with an
//!   optional keep-alive connection pool keyed by origin.
//! * [`MultiplexedTransport`] — one long-lived HTTP/2 session per origin,
//!   many concurrent request streams per session.
//!
//! [`RequestExecutor`] is the entry point callers use: it merges default and
//! per-call headers, formats the authorization and protocol headers, tracks
//! the last-seen transaction time (watermark), validates the request shape,
//! and delegates to the transport chosen at construction.
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> tidewire::Result<()> {
//! use tidewire::{ApiRequest, ClientConfig, RequestExecutor};
//!
//! let config = ClientConfig::builder("db.example.com")
//!     .secret("s3cr3t")
//!     .build();
//! let executor = RequestExecutor::new(config)?;
//!
//! let response = executor.execute(ApiRequest::get("/ping")).await?;
//! assert_eq!(response.status, 200);
//! # Ok(())
//! # }
//! ```
//!
//! Streamed responses deliver their body incrementally through a
//! [`ChunkStream`] instead of buffering it:
//!
//! ```no_run
//! # async fn example(executor: tidewire::RequestExecutor) -> tidewire::Result<()> {
//! use futures::StreamExt;
//! use tidewire::{ApiRequest, StreamSink};
//!
//! let (sink, mut chunks) = StreamSink::channel(32);
//! executor.execute(ApiRequest::get("/feed").streamed(sink)).await?;
//!
//! while let Some(chunk) = chunks.next().await {
//!     println!("chunk: {}", chunk?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod metrics;
pub mod stream;
pub mod transport;

pub use client::{ApiRequest, ClientConfig, ClientConfigBuilder, RequestExecutor, TransportMode};
pub use error::{Error, Result};
pub use stream::{ChunkStream, RecvBody, StreamEvent, StreamSink};
pub use transport::{
    BufferedOptions, BufferedTransport, HttpRequest, HttpResponse, HttpTransport,
    MultiplexedOptions, MultiplexedTransport, Origin, ResponseBody, ResponseShape, Scheme,
};
