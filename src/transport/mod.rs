//! Transport adapters
//!
//! This module handles:
//! * The [`HttpTransport`] contract both adapters implement
//! * Buffered HTTP/1 execution with an optional keep-alive pool
//! * Multiplexed HTTP/2 execution with one session per origin
//! * Deadline arming and transport-appropriate cancellation
//! * TLS configuration shared by both adapters

mod buffered;
mod multiplexed;
mod registry;
mod request;
mod tls;

pub use buffered::{BufferedOptions, BufferedTransport, RequestFn, RequestFuture};
pub use multiplexed::{MultiplexedOptions, MultiplexedTransport};
pub use registry::SessionRegistry;
pub use request::{
    HttpRequest, HttpResponse, Origin, ResponseBody, ResponseShape, Scheme, STREAM_SENTINEL,
};
pub use tls::{TlsConfig, TlsConfigBuilder};

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// The capability both transport variants implement
///
/// `execute` performs the network I/O for one logical request and fails
/// with a typed [`Error`] on network failure, protocol failure, or
/// cancellation. Implementations must honor the per-request deadline, the
/// buffered response shape, and the streamed shape (status and headers
/// resolve before body data arrives; the body goes through the sink).
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute one logical request
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Run `fut` under an optional deadline
///
/// When a deadline is configured, expiry cancels exactly this future (the
/// in-flight call it drives) and reports [`Error::Timeout`]. Without a
/// deadline no timer is armed, so an abort produced elsewhere keeps its
/// original identity instead of being misreported as a timeout. The timer
/// is dropped with the future on every completion path.
pub(crate) async fn with_deadline<T, F>(deadline: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(d) => match tokio::time::timeout(d, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(d)),
        },
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_deadline_fires_as_timeout() {
        let result: Result<()> = with_deadline(Some(Duration::from_millis(20)), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_no_deadline_keeps_original_error() {
        let result: Result<()> =
            with_deadline(None, async { Err(Error::Transport("aborted".into())) }).await;
        match result {
            Err(Error::Transport(msg)) => assert_eq!(msg, "aborted"),
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fast_completion_beats_deadline() {
        let result = with_deadline(Some(Duration::from_secs(5)), async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
