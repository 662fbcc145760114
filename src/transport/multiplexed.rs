//! Multiplexed transport: one HTTP/2 session per origin
//!
//! Sessions are opened lazily on first use and shared by every concurrent
//! request to the same origin. A connection driver task runs each session;
//! when it ends — protocol error, peer GOAWAY, clean shutdown — it evicts
//! its own registry entry, so the next request opens a fresh session. A
//! per-request deadline resets only its own stream; the session stays
//! usable for siblings.

use crate::metrics::labels;
use crate::stream::RecvBody;
use crate::transport::registry::SessionRegistry;
use crate::transport::request::{
    headers_to_map, HttpRequest, HttpResponse, Origin, ResponseBody, ResponseShape,
};
use crate::transport::tls::{server_name, TlsConfig};
use crate::transport::{with_deadline, HttpTransport};
use crate::{Error, Result};
use bytes::Bytes;
use http::{HeaderName, HeaderValue, Request, Uri};
use http_body_util::Full;
use hyper::client::conn::http2;
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tracing::Instrument;

type H2Sender = http2::SendRequest<Full<Bytes>>;

/// Construction options for [`MultiplexedTransport`]
#[derive(Default)]
pub struct MultiplexedOptions {
    /// Enable the streamed response shape (default: off)
    pub streaming: bool,
    /// TLS configuration, required for https origins (negotiates ALPN `h2`)
    pub tls: Option<TlsConfig>,
}

/// HTTP/2 transport adapter
pub struct MultiplexedTransport {
    registry: Arc<SessionRegistry<H2Sender>>,
    streaming: bool,
    tls: Option<TlsConfig>,
}

impl MultiplexedTransport {
    /// Create a multiplexed transport with an empty session registry
    pub fn new(options: MultiplexedOptions) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            streaming: options.streaming,
            tls: options.tls,
        }
    }

    /// Number of live sessions in the registry
    pub async fn session_count(&self) -> usize {
        self.registry.len().await
    }

    /// Id of the session currently bound to `origin`, if any
    pub async fn session_id(&self, origin: &Origin) -> Option<u64> {
        self.registry.session_id(&origin.to_string()).await
    }

    /// Open a new session to `origin` and spawn its connection driver
    ///
    /// The driver owns the connection for its whole life; when it ends it
    /// evicts exactly this session (generation `id`) from the registry.
    async fn open_session(&self, origin: &Origin, id: u64) -> Result<H2Sender> {
        tracing::debug!("opening http2 session to {}", origin);
        let stream = TcpStream::connect((origin.host.as_str(), origin.port)).await?;

        let registry = Arc::clone(&self.registry);
        let key = origin.to_string();

        let sender = if origin.scheme.is_secure() {
            let tls = self.tls.as_ref().ok_or_else(|| {
                Error::Config("https origin requires a TLS configuration".into())
            })?;
            let sni = server_name(&origin.host)?;
            let tls_stream = tls.connector(&[b"h2"]).connect(sni, stream).await?;
            let (sender, conn) =
                http2::handshake(TokioExecutor::new(), TokioIo::new(tls_stream)).await?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!("http2 session for {} ended: {}", key, e);
                }
                registry.evict(&key, id).await;
            });
            sender
        } else {
            let (sender, conn) =
                http2::handshake(TokioExecutor::new(), TokioIo::new(stream)).await?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!("http2 session for {} ended: {}", key, e);
                }
                registry.evict(&key, id).await;
            });
            sender
        };

        crate::metrics::counters::session_opened();
        Ok(sender)
    }
}

#[async_trait::async_trait]
impl HttpTransport for MultiplexedTransport {
    async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        request.validate()?;
        if request.shape == ResponseShape::Streamed && !self.streaming {
            return Err(Error::StreamsNotSupported(
                "adapter built without streaming; enable it in the client configuration".into(),
            ));
        }

        let method = request.method.clone();
        let path = request.path.clone();
        let sink = request.sink.take();
        let shape = request.shape;
        let deadline = request.deadline;
        let origin_key = request.origin.to_string();
        let wire_request = build_stream_request(&request)?;

        crate::metrics::counters::request_started(labels::TRANSPORT_MULTIPLEXED);
        let started = Instant::now();

        // Records which session generation this request used, so the error
        // path below evicts exactly that one. Zero = none resolved yet.
        let session_used = std::sync::atomic::AtomicU64::new(0);

        let work = async {
            let (session_id, mut sender) = self
                .registry
                .resolve_with(&origin_key, |id| self.open_session(&request.origin, id))
                .await?;
            session_used.store(session_id, std::sync::atomic::Ordering::Relaxed);

            sender.ready().await?;
            let response = sender.send_request(wire_request).await?;
            let status = response.status().as_u16();
            let headers = headers_to_map(response.headers());
            let body = RecvBody::Incoming(response.into_body());

            let body = if shape == ResponseShape::Streamed && status < 400 {
                if let Some(sink) = sink {
                    tokio::spawn(body.relay(sink));
                }
                ResponseBody::Streamed
            } else {
                ResponseBody::Text(body.collect_text().await?)
            };

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        };

        // A fired deadline drops the in-flight future, which resets only
        // this request's stream; the session stays registered. Any other
        // failure evicts the session so the next request starts fresh.
        let result = with_deadline(deadline, work)
            .instrument(
                tracing::debug_span!("multiplexed_execute", method = %method, path = %path),
            )
            .await;

        let outcome = match &result {
            Ok(_) => labels::OUTCOME_SUCCESS,
            Err(Error::Timeout(_)) => labels::OUTCOME_TIMEOUT,
            Err(_) => {
                let session_id = session_used.load(std::sync::atomic::Ordering::Relaxed);
                if session_id != 0 {
                    self.registry.evict(&origin_key, session_id).await;
                }
                labels::OUTCOME_ERROR
            }
        };
        crate::metrics::counters::request_completed(labels::TRANSPORT_MULTIPLEXED, outcome);
        crate::metrics::histograms::request_duration(
            labels::TRANSPORT_MULTIPLEXED,
            started.elapsed().as_millis() as u64,
        );

        result
    }
}

/// Build the wire-level request for a new stream on a session
///
/// The absolute-form URI supplies the `:scheme`/`:authority`/`:path`
/// pseudo-headers; caller headers are merged on top.
fn build_stream_request(request: &HttpRequest) -> Result<Request<Full<Bytes>>> {
    let uri: Uri = format!(
        "{}://{}{}",
        request.origin.scheme,
        request.origin.authority(),
        request.path_and_query()
    )
    .parse()
    .map_err(|e| Error::InvalidArgument(format!("invalid request URL: {}", e)))?;

    let mut builder = Request::builder().method(request.method.as_str()).uri(uri);

    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidArgument(format!("invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidArgument(format!("invalid header value: {}", e)))?;
        builder = builder.header(name, value);
    }

    let body = Bytes::from(request.body.clone().unwrap_or_default());
    Ok(builder.body(Full::new(body))?)
}
