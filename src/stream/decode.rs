//! Streaming-safe UTF-8 decoding
//!
//! Response bodies arrive as binary chunks whose boundaries do not respect
//! character boundaries. The decoder holds back an incomplete trailing
//! multi-byte sequence until the next chunk supplies the rest, so a
//! character split across chunks decodes exactly once.

use crate::{Error, Result};
use bytes::BytesMut;

/// Incremental UTF-8 decoder for chunked response bodies
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    /// Undecoded bytes carried over from previous chunks
    pending: BytesMut,
}

impl Utf8StreamDecoder {
    /// Create a decoder with no carried-over state
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next binary chunk, returning the decodable prefix
    ///
    /// An incomplete multi-byte sequence at the end of the chunk is retained
    /// for the next call. A byte sequence that can never become valid UTF-8
    /// is an error.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<String> {
        self.pending.extend_from_slice(chunk);

        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) => {
                if e.error_len().is_some() {
                    return Err(Error::Decode(format!(
                        "invalid utf-8 sequence at byte {}",
                        e.valid_up_to()
                    )));
                }
                e.valid_up_to()
            }
        };

        let decoded = self.pending.split_to(valid_up_to);
        String::from_utf8(decoded.to_vec())
            .map_err(|e| Error::Decode(format!("invalid utf-8 sequence: {}", e)))
    }

    /// Finish decoding; fails if a partial sequence was left dangling
    pub fn finish(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(Error::Decode(
                "response body ended inside a multi-byte utf-8 sequence".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut dec = Utf8StreamDecoder::new();
        assert_eq!(dec.decode(b"hello").unwrap(), "hello");
        assert!(dec.finish().is_ok());
    }

    #[test]
    fn test_two_byte_char_split_across_chunks() {
        // "né" with the 2-byte 'é' (0xC3 0xA9) split between chunks
        let mut dec = Utf8StreamDecoder::new();
        assert_eq!(dec.decode(&[b'n', 0xC3]).unwrap(), "n");
        assert_eq!(dec.decode(&[0xA9]).unwrap(), "é");
        assert!(dec.finish().is_ok());
    }

    #[test]
    fn test_four_byte_char_split_three_ways() {
        // U+1F600 (😀) is 0xF0 0x9F 0x98 0x80
        let mut dec = Utf8StreamDecoder::new();
        assert_eq!(dec.decode(&[0xF0]).unwrap(), "");
        assert_eq!(dec.decode(&[0x9F, 0x98]).unwrap(), "");
        assert_eq!(dec.decode(&[0x80]).unwrap(), "😀");
        assert!(dec.finish().is_ok());
    }

    #[test]
    fn test_invalid_sequence_is_error() {
        // 0xFF can never start a valid UTF-8 sequence
        let mut dec = Utf8StreamDecoder::new();
        let err = dec.decode(&[b'a', 0xFF, b'b']).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_truncated_tail_fails_finish() {
        let mut dec = Utf8StreamDecoder::new();
        assert_eq!(dec.decode(&[b'x', 0xC3]).unwrap(), "x");
        assert!(dec.finish().is_err());
    }

    #[test]
    fn test_empty_chunk() {
        let mut dec = Utf8StreamDecoder::new();
        assert_eq!(dec.decode(&[]).unwrap(), "");
        assert!(dec.finish().is_ok());
    }
}
