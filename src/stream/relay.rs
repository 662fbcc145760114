//! Normalizing transport bodies onto the stream contract
//!
//! Transports hand back a response body in one of three styles:
//!
//! * pull-based — `hyper::body::Incoming`, read frame by frame
//! * push-based — an mpsc channel of byte chunks (override request
//!   functions use this to simulate chunked delivery)
//! * pre-buffered — a single `Bytes` value
//!
//! [`RecvBody`] erases the difference: both the buffered path
//! ([`RecvBody::collect_text`]) and the streamed path ([`RecvBody::relay`])
//! see the same chunk sequence. Decode and read failures on the streamed
//! path surface through the sink's error terminal, never by panicking or
//! by escaping the transport's `execute`.

use super::decode::Utf8StreamDecoder;
use super::StreamSink;
use crate::metrics::labels;
use crate::{Error, Result};
use bytes::Bytes;
use http_body_util::BodyExt;
use tokio::sync::mpsc;

/// A response body in any of the styles a transport can produce
///
/// Override request functions return one of these from their responses;
/// the built-in dispatchers produce the `Incoming` variant.
pub enum RecvBody {
    /// Pull-based hyper body, read frame by frame
    Incoming(hyper::body::Incoming),
    /// Pre-buffered body (consumed on first read)
    Full(Option<Bytes>),
    /// Push-based channel of byte chunks
    Channel(mpsc::Receiver<Result<Bytes>>),
}

impl RecvBody {
    /// Wrap a pre-buffered body
    pub fn full(bytes: Bytes) -> Self {
        RecvBody::Full(Some(bytes))
    }

    /// Read the next binary chunk, or `None` at end of body
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        match self {
            RecvBody::Incoming(body) => loop {
                match body.frame().await {
                    Some(Ok(frame)) => {
                        // Trailer frames carry no body data
                        if let Ok(data) = frame.into_data() {
                            return Ok(Some(data));
                        }
                    }
                    Some(Err(e)) => return Err(Error::Http(e)),
                    None => return Ok(None),
                }
            },
            RecvBody::Full(bytes) => Ok(bytes.take()),
            RecvBody::Channel(rx) => match rx.recv().await {
                Some(Ok(chunk)) => Ok(Some(chunk)),
                Some(Err(e)) => Err(e),
                None => Ok(None),
            },
        }
    }

    /// Fully read and decode the body as UTF-8 text
    pub(crate) async fn collect_text(mut self) -> Result<String> {
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();

        while let Some(chunk) = self.next_chunk().await? {
            out.push_str(&decoder.decode(&chunk)?);
        }
        decoder.finish()?;

        Ok(out)
    }

    /// Relay the body chunk by chunk into the sink
    ///
    /// Delivers zero or more data events followed by exactly one terminal.
    /// A consumer that drops its end stops the relay early without a
    /// terminal (nobody is listening).
    pub(crate) async fn relay(mut self, mut sink: StreamSink) {
        let mut decoder = Utf8StreamDecoder::new();

        loop {
            match self.next_chunk().await {
                Ok(Some(chunk)) => {
                    let text = match decoder.decode(&chunk) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::debug!("stream decode failed: {}", e);
                            crate::metrics::counters::stream_completed(labels::OUTCOME_ERROR);
                            sink.error(e).await;
                            return;
                        }
                    };
                    if !text.is_empty() && !sink.data(text).await {
                        tracing::debug!("stream consumer dropped, stopping relay");
                        return;
                    }
                }
                Ok(None) => {
                    if let Err(e) = decoder.finish() {
                        crate::metrics::counters::stream_completed(labels::OUTCOME_ERROR);
                        sink.error(e).await;
                    } else {
                        crate::metrics::counters::stream_completed(labels::OUTCOME_SUCCESS);
                        sink.end().await;
                    }
                    return;
                }
                Err(e) => {
                    tracing::debug!("stream read failed: {}", e);
                    crate::metrics::counters::stream_completed(labels::OUTCOME_ERROR);
                    sink.error(e).await;
                    return;
                }
            }
        }
    }
}
