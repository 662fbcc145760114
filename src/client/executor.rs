//! Request executor
//!
//! The component callers use. It enriches each request with the configured
//! and per-call headers, formats the protocol headers (authorization, API
//! version, driver identity, watermark, query deadline), validates the
//! response shape, and delegates to the one transport adapter chosen at
//! construction. The watermark never reaches the adapter layer — it is
//! purely a header value supplied here.

use super::config::{ClientConfig, TransportMode};
use super::headers;
use super::request::ApiRequest;
use crate::transport::{
    BufferedOptions, BufferedTransport, HttpRequest, HttpResponse, HttpTransport,
    MultiplexedOptions, MultiplexedTransport, ResponseShape, TlsConfig,
};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::Instrument;

/// Executes logical requests against one transport adapter
pub struct RequestExecutor {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    /// Latest transaction time observed from any response; 0 = never set.
    /// Monotone for the lifetime of this executor.
    last_txn: AtomicU64,
}

impl RequestExecutor {
    /// Create an executor, building the transport selected in `config`
    pub fn new(config: ClientConfig) -> Result<Self> {
        let tls = resolve_tls(&config)?;
        let transport: Arc<dyn HttpTransport> = match config.transport {
            TransportMode::Buffered => Arc::new(BufferedTransport::new(BufferedOptions {
                keep_alive: config.keep_alive,
                streaming: config.streaming,
                tls,
                request_fn: config.request_fn.clone(),
            })),
            TransportMode::Multiplexed => Arc::new(MultiplexedTransport::new(MultiplexedOptions {
                streaming: config.streaming,
                tls,
            })),
        };

        Ok(Self {
            config,
            transport,
            last_txn: AtomicU64::new(0),
        })
    }

    /// Create an executor around an externally constructed transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            transport,
            last_txn: AtomicU64::new(0),
        }
    }

    /// Latest transaction time observed, if any response has carried one
    pub fn watermark(&self) -> Option<u64> {
        match self.last_txn.load(Ordering::Acquire) {
            0 => None,
            t => Some(t),
        }
    }

    /// Advance the watermark; values not greater than the current one are
    /// ignored, so the watermark never decreases
    pub fn advance_watermark(&self, txn_time: u64) {
        self.last_txn.fetch_max(txn_time, Ordering::AcqRel);
    }

    /// Execute one logical request
    ///
    /// Fails with [`Error::InvalidArgument`] before any network I/O when a
    /// streamed shape carries no sink.
    pub async fn execute(&self, request: ApiRequest) -> Result<HttpResponse> {
        if request.shape == ResponseShape::Streamed && request.sink.is_none() {
            return Err(Error::InvalidArgument(
                "streamed response shape requires a stream sink".into(),
            ));
        }

        let span = tracing::debug_span!(
            "execute",
            method = %request.method,
            path = %request.path
        );

        async {
            let headers = self.build_headers(&request);
            let wire_request = HttpRequest {
                method: request.method,
                origin: self.config.origin(),
                path: request.path,
                query: request.query,
                headers,
                body: request.body,
                deadline: request.deadline.or(self.config.request_timeout),
                shape: request.shape,
                sink: request.sink,
            };

            let response = self.transport.execute(wire_request).await?;

            // The response's transaction time, when present, advances the
            // causal watermark for subsequent requests
            if let Some(txn) = response
                .header(headers::TXN_TIME)
                .and_then(|v| v.parse::<u64>().ok())
            {
                self.advance_watermark(txn);
            }

            Ok(response)
        }
        .instrument(span)
        .await
    }

    /// Merge configured and per-call headers, then apply protocol headers
    ///
    /// Headers with no resolved value are never inserted, so nothing null
    /// ever reaches the wire.
    fn build_headers(&self, request: &ApiRequest) -> HashMap<String, String> {
        let mut merged = self.config.headers.clone();
        for (name, value) in &request.headers {
            merged.insert(name.clone(), value.clone());
        }

        let secret = request.secret.as_ref().or(self.config.secret.as_ref());
        if let Some(secret) = secret {
            merged.insert(headers::AUTHORIZATION.into(), format!("Bearer {}", secret));
        }

        merged.insert(
            headers::API_VERSION.into(),
            headers::API_VERSION_VALUE.into(),
        );
        merged.insert(headers::DRIVER.into(), headers::DRIVER_VALUE.into());

        if let Some(txn) = self.watermark() {
            merged.insert(headers::LAST_SEEN_TXN.into(), txn.to_string());
        }

        let query_timeout = request.query_timeout.or(self.config.query_timeout);
        if let Some(timeout) = query_timeout {
            merged.insert(
                headers::QUERY_TIMEOUT.into(),
                timeout.as_millis().to_string(),
            );
        }

        merged
    }
}

fn resolve_tls(config: &ClientConfig) -> Result<Option<TlsConfig>> {
    match (&config.tls, config.scheme.is_secure()) {
        (Some(tls), _) => Ok(Some(tls.clone())),
        (None, true) => Ok(Some(TlsConfig::builder().build()?)),
        (None, false) => Ok(None),
    }
}
