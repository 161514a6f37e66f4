//! Stream Framing for FIX Connections
//!
//! ## Purpose
//!
//! Splits a byte stream into complete raw messages. The framer only locates
//! message boundaries; integrity is checked by the parser.
//!
//! ## Architecture Role
//!
//! ```text
//! Socket reads → [Framer: BytesMut] → raw message (Bytes) → MessageParser
//!      ↓                ↓                       ↓
//!  Partial reads   Boundary search       One message per call
//! ```
//!
//! ## Boundary Rules
//!
//! - A message starts with `8=`. Bytes before it are dropped with a warning.
//! - Its length is the BeginString and BodyLength fields, then exactly
//!   BodyLength bytes, then the 7-byte `10=NNN<SOH>` field.
//! - An incomplete message stays buffered until more bytes arrive. It is
//!   only an error when the stream ends ([`Framer::finish`]).

use crate::error::{FramingError, FramingResult};
use crate::validation::checksum::CHECKSUM_FIELD_LEN;
use bytes::{Bytes, BytesMut};
use fix_types::SOH;
use tracing::warn;

/// Upper bound on a declared BodyLength
pub const DEFAULT_MAX_BODY_LENGTH: usize = 1 << 20;

#[derive(Debug)]
pub struct Framer {
    buffer: BytesMut,
    max_body_length: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    pub fn new() -> Self {
        Self::with_max_body_length(DEFAULT_MAX_BODY_LENGTH)
    }

    pub fn with_max_body_length(max_body_length: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_body_length,
        }
    }

    /// Append bytes read from the connection.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes held but not yet returned as a message.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn find_start(&self) -> Option<usize> {
        let buf = &self.buffer[..];
        (0..buf.len().saturating_sub(1))
            .find(|&i| buf[i] == b'8' && buf[i + 1] == b'=' && (i == 0 || buf[i - 1] == SOH))
    }

    /// Next complete raw message, if one is buffered.
    ///
    /// A malformed BodyLength drops the offending BeginString so the next
    /// call resynchronizes on the following `8=`.
    pub fn next_message(&mut self) -> FramingResult<Option<Bytes>> {
        let Some(start) = self.find_start() else {
            // keep a trailing '8' that may start the next message
            let keep = usize::from(self.buffer.last() == Some(&b'8'));
            let garbage = self.buffer.len() - keep;
            if garbage > 0 {
                warn!(bytes = garbage, "Discarding bytes outside any FIX message");
                let _ = self.buffer.split_to(garbage);
            }
            return Ok(None);
        };
        if start > 0 {
            warn!(bytes = start, "Discarding bytes before BeginString");
            let _ = self.buffer.split_to(start);
        }

        let buf = &self.buffer[..];
        let Some(begin_end) = buf.iter().position(|b| *b == SOH) else {
            return Ok(None);
        };
        let length_tag = begin_end + 1;
        if buf.len() < length_tag + 2 {
            return Ok(None);
        }
        if &buf[length_tag..length_tag + 2] != b"9=" {
            let _ = self.buffer.split_to(2);
            return Err(FramingError::MissingBodyLength);
        }
        let digits_start = length_tag + 2;
        let Some(digits_len) = buf[digits_start..].iter().position(|b| *b == SOH) else {
            if buf.len() - digits_start > 20 {
                let value = String::from_utf8_lossy(&buf[digits_start..]).into_owned();
                let _ = self.buffer.split_to(2);
                return Err(FramingError::InvalidBodyLength { value });
            }
            return Ok(None);
        };
        let digits = &buf[digits_start..digits_start + digits_len];
        let body_length = std::str::from_utf8(digits)
            .ok()
            .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|d| d.parse::<usize>().ok())
            .filter(|len| *len <= self.max_body_length);
        let Some(body_length) = body_length else {
            let value = String::from_utf8_lossy(digits).into_owned();
            let _ = self.buffer.split_to(2);
            return Err(FramingError::InvalidBodyLength { value });
        };

        let Some(total) = (digits_start + digits_len + 1)
            .checked_add(body_length)
            .and_then(|n| n.checked_add(CHECKSUM_FIELD_LEN))
        else {
            let value = String::from_utf8_lossy(digits).into_owned();
            let _ = self.buffer.split_to(2);
            return Err(FramingError::InvalidBodyLength { value });
        };
        if self.buffer.len() < total {
            return Ok(None);
        }
        Ok(Some(self.buffer.split_to(total).freeze()))
    }

    /// Signal end of stream. Fails if a partial message is still buffered.
    pub fn finish(self) -> FramingResult<()> {
        let leftover = self.buffer.len();
        if leftover > 0 && self.find_start().is_some() {
            return Err(FramingError::PrematureEnd { buffered: leftover });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEARTBEAT: &[u8] = b"8=FIX.4.2\x019=20\x0135=0\x0149=A\x0156=B\x0134=1\x0110=123\x01";

    #[test]
    fn test_split_reads() {
        let mut framer = Framer::new();
        let (a, b) = HEARTBEAT.split_at(17);
        framer.extend(a);
        assert_eq!(framer.next_message().unwrap(), None);
        framer.extend(b);
        framer.extend(HEARTBEAT);
        assert_eq!(framer.next_message().unwrap().as_deref(), Some(HEARTBEAT));
        assert_eq!(framer.next_message().unwrap().as_deref(), Some(HEARTBEAT));
        assert_eq!(framer.next_message().unwrap(), None);
        framer.finish().unwrap();
    }

    #[test]
    fn test_leading_garbage_is_dropped() {
        let mut framer = Framer::new();
        framer.extend(b"noise\x01");
        framer.extend(HEARTBEAT);
        assert_eq!(framer.next_message().unwrap().as_deref(), Some(HEARTBEAT));
    }

    #[test]
    fn test_bad_body_length_resynchronizes() {
        let mut framer = Framer::new();
        framer.extend(b"8=FIX.4.2\x019=zz\x0135=0\x01");
        framer.extend(HEARTBEAT);
        assert!(matches!(
            framer.next_message(),
            Err(FramingError::InvalidBodyLength { .. })
        ));
        assert_eq!(framer.next_message().unwrap().as_deref(), Some(HEARTBEAT));
    }

    #[test]
    fn test_premature_end() {
        let mut framer = Framer::new();
        framer.extend(&HEARTBEAT[..30]);
        assert_eq!(framer.next_message().unwrap(), None);
        assert_eq!(
            framer.finish(),
            Err(FramingError::PrematureEnd { buffered: 30 })
        );
    }
}
