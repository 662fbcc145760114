//! Stream sink and consumer halves of the chunk delivery contract
//!
//! A streamed response body is delivered as a sequence of tagged events over
//! an mpsc channel: zero or more [`StreamEvent::Data`] chunks followed by
//! exactly one terminal event. The terminal-once rule is enforced by
//! construction — [`StreamSink::end`] and [`StreamSink::error`] consume the
//! sink, so no further event can be produced afterwards.

use crate::{Error, Result};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// A single event on a streamed response body
#[derive(Debug)]
pub enum StreamEvent {
    /// A decoded chunk of body text
    Data(String),
    /// The body completed cleanly
    End,
    /// The body failed mid-stream
    Error(Error),
}

/// Producer half of a streamed response body
///
/// Handed to the executor with a streamed request; the transport adapter
/// feeds it decoded chunks and exactly one terminal event.
#[derive(Debug)]
pub struct StreamSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl StreamSink {
    /// Create a connected sink/consumer pair
    ///
    /// `capacity` bounds the number of undelivered chunks; a slow consumer
    /// backpressures the transport instead of buffering unbounded data.
    pub fn channel(capacity: usize) -> (StreamSink, ChunkStream) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            StreamSink { tx },
            ChunkStream {
                rx,
                terminated: false,
            },
        )
    }

    /// Deliver one decoded chunk of body text
    ///
    /// Delivery failure means the consumer dropped its end; the chunk is
    /// discarded and streaming should stop.
    pub async fn data(&mut self, chunk: String) -> bool {
        self.tx.send(StreamEvent::Data(chunk)).await.is_ok()
    }

    /// Terminate the stream cleanly. Consumes the sink.
    pub async fn end(self) {
        let _ = self.tx.send(StreamEvent::End).await;
    }

    /// Terminate the stream with an error. Consumes the sink.
    pub async fn error(self, err: Error) {
        let _ = self.tx.send(StreamEvent::Error(err)).await;
    }
}

/// Consumer half of a streamed response body
///
/// Yields `Ok(chunk)` for each data event, `Err(e)` for an error terminal,
/// and ends after the first terminal event. A sink dropped without a
/// terminal (for example when an error-status response was buffered
/// instead of streamed) ends the stream without an item.
pub struct ChunkStream {
    rx: mpsc::Receiver<StreamEvent>,
    terminated: bool,
}

impl ChunkStream {
    /// Collect all remaining chunks into one string
    ///
    /// Convenience for callers that opted into streaming but want the full
    /// body anyway (tests, small responses).
    pub async fn collect_text(mut self) -> Result<String> {
        use futures::StreamExt;

        let mut out = String::new();
        while let Some(chunk) = self.next().await {
            out.push_str(&chunk?);
        }
        Ok(out)
    }
}

impl Stream for ChunkStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }

        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(StreamEvent::Data(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(StreamEvent::End)) | Poll::Ready(None) => {
                self.terminated = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(StreamEvent::Error(err))) => {
                self.terminated = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("terminated", &self.terminated)
            .finish()
    }
}
