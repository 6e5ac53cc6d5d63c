//! Tokio codec for newline-framed firmware lines.
//!
//! # Overview
//!
//! `LineCodec` implements:
//! - [`Decoder`]: splits a byte stream on `\n` into trimmed text lines
//! - [`Encoder<OutboundFrame>`]: writes requests with their terminator
//!
//! ```text
//! Serial bytes -> Decoder -> String line -> InboundLine::parse
//! OutboundFrame -> Encoder -> Serial bytes
//! ```
//!
//! # Permissive Decoding
//!
//! Serial lines pick up noise on connect and on cable glitches. Decoding
//! never fails on content:
//! - invalid UTF-8 sequences are dropped from the line and logged
//! - empty lines (after trimming) are skipped
//! - lines longer than the maximum are discarded up to the next `\n`
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use tokio_util::codec::Decoder;
//! use vendbridge_protocol::LineCodec;
//!
//! let mut codec = LineCodec::new();
//! let mut buffer = BytesMut::from(&b"SYSTEM:Ready\r\nCARDUID:04A1"[..]);
//!
//! assert_eq!(codec.decode(&mut buffer).unwrap().as_deref(), Some("SYSTEM:Ready"));
//! assert_eq!(codec.decode(&mut buffer).unwrap(), None);
//! ```

use std::cmp;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::{OutboundFrame, ProtocolError};
use vendbridge_core::constants::{LINE_TERMINATOR, MAX_LINE_LENGTH};

/// Newline codec with lossy UTF-8 handling and a line length cap.
#[derive(Debug)]
pub struct LineCodec {
    /// Longest accepted line, terminator excluded.
    max_length: usize,

    /// Index in the buffer up to which no terminator was found.
    next_index: usize,

    /// Dropping bytes of an over-long line until its terminator.
    discarding: bool,

    /// Count of lines dropped for being too long.
    discarded: u64,
}

impl LineCodec {
    /// Create a codec with the default maximum line length (1 KiB).
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom maximum line length.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
            discarded: 0,
        }
    }

    /// Number of over-long lines dropped so far.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Turn raw line bytes into trimmed text, dropping invalid UTF-8.
    ///
    /// Returns `None` for lines that are empty after trimming.
    fn decode_text(raw: &[u8]) -> Option<String> {
        let mut text = String::with_capacity(raw.len());
        let mut invalid = 0usize;

        for chunk in raw.utf8_chunks() {
            text.push_str(chunk.valid());
            invalid += chunk.invalid().len();
        }

        if invalid > 0 {
            warn!(
                invalid_bytes = invalid,
                raw = ?raw,
                "Dropped invalid UTF-8 from serial line"
            );
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        loop {
            // One byte past the limit is enough to tell an over-long line apart.
            let read_to = cmp::min(self.max_length.saturating_add(1), src.len());
            let newline = src[self.next_index..read_to]
                .iter()
                .position(|b| *b == LINE_TERMINATOR);

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    src.advance(offset + self.next_index + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    src.advance(read_to);
                    self.next_index = 0;
                    if src.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = offset + self.next_index;
                    self.next_index = 0;
                    let line = src.split_to(end + 1);
                    if let Some(text) = Self::decode_text(&line[..end]) {
                        return Ok(Some(text));
                    }
                }
                (false, None) if src.len() > self.max_length => {
                    warn!(
                        max_length = self.max_length,
                        "Discarding over-long serial line"
                    );
                    self.discarding = true;
                    self.discarded += 1;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if self.discarding || src.is_empty() {
            src.clear();
            self.next_index = 0;
            return Ok(None);
        }
        let rest = src.split();
        self.next_index = 0;
        Ok(Self::decode_text(&rest))
    }
}

impl Encoder<OutboundFrame> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: OutboundFrame, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let wire = item.to_wire();
        dst.reserve(wire.len());
        dst.extend_from_slice(wire.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendbridge_core::ProductType;

    fn drain(codec: &mut LineCodec, buffer: &mut BytesMut) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = codec.decode(buffer).unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_decode_single_line() {
        let mut codec = LineCodec::new();
        let mut buffer = BytesMut::from(&b"CARDUID:04A1B2C3\n"[..]);

        assert_eq!(drain(&mut codec, &mut buffer), vec!["CARDUID:04A1B2C3"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decode_across_chunks() {
        let mut codec = LineCodec::new();
        let mut buffer = BytesMut::from(&b"CARD"[..]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b"UID:0011");
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b"2233\r\nSYSTEM:Ready\n");
        assert_eq!(
            drain(&mut codec, &mut buffer),
            vec!["CARDUID:00112233", "SYSTEM:Ready"]
        );
    }

    #[test]
    fn test_skips_blank_lines() {
        let mut codec = LineCodec::new();
        let mut buffer = BytesMut::from(&b"\n\r\n   \nSYSTEM:Boot\n"[..]);

        assert_eq!(drain(&mut codec, &mut buffer), vec!["SYSTEM:Boot"]);
    }

    #[test]
    fn test_drops_invalid_utf8() {
        let mut codec = LineCodec::new();
        let mut buffer = BytesMut::from(&b"CARDUID:\xff04\xfeA1\n"[..]);

        assert_eq!(drain(&mut codec, &mut buffer), vec!["CARDUID:04A1"]);
    }

    #[test]
    fn test_line_of_pure_garbage_is_skipped() {
        let mut codec = LineCodec::new();
        let mut buffer = BytesMut::from(&b"\xff\xfe\xfd\nSYSTEM:Ok\n"[..]);

        assert_eq!(drain(&mut codec, &mut buffer), vec!["SYSTEM:Ok"]);
    }

    #[test]
    fn test_discards_over_long_line_then_recovers() {
        let mut codec = LineCodec::with_max_length(8);
        let mut buffer = BytesMut::from(&b"0123456789ABCDEF"[..]);

        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
        assert_eq!(codec.discarded(), 1);

        buffer.extend_from_slice(b"GHIJ\nSYSTEM:1\n");
        assert_eq!(drain(&mut codec, &mut buffer), vec!["SYSTEM:1"]);
        assert_eq!(codec.discarded(), 1);
    }

    #[test]
    fn test_line_at_max_length_is_kept() {
        let mut codec = LineCodec::with_max_length(8);
        let mut buffer = BytesMut::from(&b"ABCDEFGH\n"[..]);

        assert_eq!(drain(&mut codec, &mut buffer), vec!["ABCDEFGH"]);
        assert_eq!(codec.discarded(), 0);
    }

    #[test]
    fn test_decode_eof_flushes_partial_line() {
        let mut codec = LineCodec::new();
        let mut buffer = BytesMut::from(&b"SYSTEM:A\nERROR:tail"[..]);

        assert_eq!(
            codec.decode_eof(&mut buffer).unwrap().as_deref(),
            Some("SYSTEM:A")
        );
        assert_eq!(
            codec.decode_eof(&mut buffer).unwrap().as_deref(),
            Some("ERROR:tail")
        );
        assert_eq!(codec.decode_eof(&mut buffer).unwrap(), None);
    }

    #[test]
    fn test_encode_dispense() {
        let mut codec = LineCodec::new();
        let mut buffer = BytesMut::new();

        codec
            .encode(OutboundFrame::Dispense(ProductType::Pad), &mut buffer)
            .unwrap();
        assert_eq!(&buffer[..], b"DISPENSE:pad\n");
    }
}
