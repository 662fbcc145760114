//! Buffered transport: one request per call over HTTP/1
//!
//! The underlying request function is resolved once at construction —
//! a caller-supplied override if one was given, otherwise the built-in
//! hyper HTTP/1 dispatcher — and never re-selected per call. With
//! keep-alive enabled the dispatcher maintains a pool of persistent
//! connections keyed by origin, shared by every call through this adapter
//! instance.

use crate::metrics::labels;
use crate::stream::RecvBody;
use crate::transport::request::{
    headers_to_map, HttpRequest, HttpResponse, ResponseBody, ResponseShape,
};
use crate::transport::tls::{server_name, TlsConfig};
use crate::transport::{with_deadline, HttpTransport};
use crate::{Error, Result};
use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::HOST;
use http::{HeaderName, HeaderValue, Request, Uri};
use http_body_util::Full;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::Instrument;

/// Future returned by a request function
pub type RequestFuture = BoxFuture<'static, Result<http::Response<RecvBody>>>;

/// The underlying request function the adapter drives
///
/// Overriding it replaces all network I/O, which is how tests observe
/// exactly what reaches the wire (and count calls) without a server.
pub type RequestFn = Arc<dyn Fn(Request<Full<Bytes>>) -> RequestFuture + Send + Sync>;

/// Construction options for [`BufferedTransport`]
#[derive(Default)]
pub struct BufferedOptions {
    /// Reuse connections across calls (default: off, one connection per call)
    pub keep_alive: bool,
    /// Enable the streamed response shape (default: off)
    pub streaming: bool,
    /// TLS configuration, required for https origins
    pub tls: Option<TlsConfig>,
    /// Replace the built-in hyper dispatcher
    pub request_fn: Option<RequestFn>,
}

/// HTTP/1 transport adapter
pub struct BufferedTransport {
    request_fn: RequestFn,
    streaming: bool,
}

impl BufferedTransport {
    /// Create a buffered transport
    ///
    /// The request function is selected here, once: the override from
    /// `options` if present, otherwise the hyper dispatcher.
    pub fn new(options: BufferedOptions) -> Self {
        let request_fn = match options.request_fn {
            Some(f) => f,
            None => {
                let dispatcher = Arc::new(Http1Dispatcher {
                    keep_alive: options.keep_alive,
                    tls: options.tls,
                    pool: Mutex::new(HashMap::new()),
                });
                Arc::new(move |req| {
                    let dispatcher = dispatcher.clone();
                    Box::pin(async move { dispatcher.dispatch(req).await }) as RequestFuture
                })
            }
        };

        Self {
            request_fn,
            streaming: options.streaming,
        }
    }
}

#[async_trait::async_trait]
impl HttpTransport for BufferedTransport {
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
        let wire_request = build_wire_request(&request)?;

        crate::metrics::counters::request_started(labels::TRANSPORT_BUFFERED);
        let started = Instant::now();

        let work = async {
            let response = (self.request_fn)(wire_request).await?;
            let status = response.status().as_u16();
            let headers = headers_to_map(response.headers());
            let body = response.into_body();

            let body = if shape == ResponseShape::Streamed && status < 400 {
                // Headers resolve now; the body is delivered out-of-band.
                // Validation guarantees the sink is present.
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

        let result = with_deadline(deadline, work)
            .instrument(tracing::debug_span!("buffered_execute", method = %method, path = %path))
            .await;

        let outcome = match &result {
            Ok(_) => labels::OUTCOME_SUCCESS,
            Err(Error::Timeout(_)) => labels::OUTCOME_TIMEOUT,
            Err(_) => labels::OUTCOME_ERROR,
        };
        crate::metrics::counters::request_completed(labels::TRANSPORT_BUFFERED, outcome);
        crate::metrics::histograms::request_duration(
            labels::TRANSPORT_BUFFERED,
            started.elapsed().as_millis() as u64,
        );

        result
    }
}

/// Build the wire-level request with an absolute URI
///
/// The dispatcher needs scheme/host/port to connect and rewrites the URI to
/// origin-form before transmission.
fn build_wire_request(request: &HttpRequest) -> Result<Request<Full<Bytes>>> {
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

    let host = HeaderValue::from_str(&request.origin.host_header())
        .map_err(|e| Error::InvalidArgument(format!("invalid host header: {}", e)))?;
    builder = builder.header(HOST, host);

    let body = Bytes::from(request.body.clone().unwrap_or_default());
    Ok(builder.body(Full::new(body))?)
}

/// Built-in HTTP/1 dispatcher with an optional keep-alive pool
struct Http1Dispatcher {
    keep_alive: bool,
    tls: Option<TlsConfig>,
    /// Persistent connections keyed by origin, shared across calls.
    /// A connection is bound to the server it was opened against, so a
    /// request to one origin must never check out another origin's sender.
    pool: Mutex<HashMap<String, http1::SendRequest<Full<Bytes>>>>,
}

impl Http1Dispatcher {
    async fn dispatch(&self, mut req: Request<Full<Bytes>>) -> Result<http::Response<RecvBody>> {
        let uri = req.uri().clone();
        let secure = uri.scheme_str() == Some("https");
        let host = uri
            .host()
            .ok_or_else(|| Error::InvalidArgument("request URL has no host".into()))?
            .to_string();
        let port = uri
            .port_u16()
            .unwrap_or(if secure { 443 } else { 80 });
        let origin_key = format!(
            "{}://{}:{}",
            if secure { "https" } else { "http" },
            host,
            port
        );

        // Origin servers expect origin-form request targets
        let target: Uri = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .parse()
            .map_err(|e| Error::InvalidArgument(format!("invalid request target: {}", e)))?;
        *req.uri_mut() = target;

        let mut sender = match self.checkout(&origin_key).await {
            Some(sender) => {
                crate::metrics::counters::connection_reused();
                sender
            }
            None => self.connect(secure, &host, port).await?,
        };

        // Waits until the previous response body on this connection has
        // been fully consumed
        sender.ready().await?;
        let response = sender.send_request(req).await?;

        if self.keep_alive {
            self.pool.lock().await.insert(origin_key, sender);
        }

        Ok(response.map(RecvBody::Incoming))
    }

    /// Take a live pooled sender for this origin, if any
    async fn checkout(&self, origin_key: &str) -> Option<http1::SendRequest<Full<Bytes>>> {
        if !self.keep_alive {
            return None;
        }
        let sender = self.pool.lock().await.remove(origin_key)?;
        if sender.is_closed() {
            tracing::debug!("pooled connection for {} was closed, reconnecting", origin_key);
            return None;
        }
        Some(sender)
    }

    async fn connect(
        &self,
        secure: bool,
        host: &str,
        port: u16,
    ) -> Result<http1::SendRequest<Full<Bytes>>> {
        tracing::debug!("opening http1 connection to {}:{}", host, port);
        let stream = TcpStream::connect((host, port)).await?;

        if secure {
            let tls = self.tls.as_ref().ok_or_else(|| {
                Error::Config("https origin requires a TLS configuration".into())
            })?;
            let sni = server_name(host)?;
            let tls_stream = tls.connector(&[b"http/1.1"]).connect(sni, stream).await?;
            let (sender, conn) = http1::handshake(TokioIo::new(tls_stream)).await?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!("http1 tls connection ended: {}", e);
                }
            });
            Ok(sender)
        } else {
            let (sender, conn) = http1::handshake(TokioIo::new(stream)).await?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!("http1 connection ended: {}", e);
                }
            });
            Ok(sender)
        }
    }
}
