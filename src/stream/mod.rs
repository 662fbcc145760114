//! Incremental response-body delivery
//!
//! This module handles:
//! * The stream consumer contract: zero or more data chunks followed by
//!   exactly one terminal event (`End` or `Error`), never both
//! * Streaming-safe UTF-8 decoding of binary chunks
//! * Normalizing the different body styles a transport can hand back
//!   (pull-based frames, push-based channels, pre-buffered bytes)

mod chunk;
mod decode;
mod relay;

pub use chunk::{ChunkStream, StreamEvent, StreamSink};
pub use decode::Utf8StreamDecoder;
pub use relay::RecvBody;
