//! Framing errors for FIX wire processing
//!
//! A framing error means the bytes are not a well-formed FIX message: the
//! checksum or body length does not match, the leading fields are missing or
//! the stream ended mid-message. Such input is never attributed to a sequence
//! number. Callers log it, drop the bytes and keep the connection.
//!
//! Content problems inside a well-framed message are reported separately as
//! [`fix_types::StructuralError`] (attached to the parsed message) and
//! [`crate::validation::MessageRejection`] (from the validator).

use fix_types::Tag;
use thiserror::Error;

/// Invalid message: the bytes do not frame a FIX message
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Nothing to parse
    #[error("Empty message")]
    Empty,

    /// The message does not start with `8=`
    #[error("Message does not start with BeginString (8=)")]
    MissingBeginString,

    /// The second field is not `9=`
    #[error("BodyLength (9) must be the second field")]
    MissingBodyLength,

    /// The BodyLength value is not a non-negative integer
    #[error("Invalid BodyLength value '{value}'")]
    InvalidBodyLength { value: String },

    /// BodyLength disagrees with the span between tag 9 and tag 10
    #[error("BodyLength mismatch: declared {declared}, actual {actual} (check charset byte counting)")]
    BodyLengthMismatch { declared: usize, actual: usize },

    /// No `10=` field terminates the message
    #[error("Message has no CheckSum (10) field")]
    MissingChecksum,

    /// The CheckSum value is not three digits
    #[error("Invalid CheckSum value '{value}': expected 3 digits")]
    InvalidChecksumField { value: String },

    /// Checksum disagrees with the bytes before tag 10
    #[error("CheckSum mismatch: declared {declared:03}, calculated {calculated:03} (cause: {likely_cause})")]
    ChecksumMismatch {
        declared: u8,
        calculated: u8,
        likely_cause: &'static str,
    },

    /// A field could not be tokenized
    #[error("Garbled field at byte {offset}: {reason}")]
    Garbled { offset: usize, reason: &'static str },

    /// A raw data field is shorter than its declared length
    #[error("Data field {tag} at byte {offset} truncated: declared {declared} bytes, {available} available")]
    TruncatedData {
        tag: Tag,
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// The stream ended inside a message
    #[error("Premature end of stream: {buffered} bytes of an incomplete message")]
    PrematureEnd { buffered: usize },

    /// A message being serialized has no MsgType
    #[error("Cannot serialize message without MsgType (35)")]
    MissingMsgType,
}

impl FramingError {
    /// Create a ChecksumMismatch with a best guess at the cause
    pub fn checksum_mismatch(declared: u8, calculated: u8) -> Self {
        let likely_cause = if declared == 0 {
            "message created without checksum calculation"
        } else {
            "data corruption during transmission"
        };
        Self::ChecksumMismatch {
            declared,
            calculated,
            likely_cause,
        }
    }

    pub fn garbled(offset: usize, reason: &'static str) -> Self {
        Self::Garbled { offset, reason }
    }
}

/// Result type for wire operations
pub type FramingResult<T> = std::result::Result<T, FramingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_display() {
        let err = FramingError::checksum_mismatch(39, 40);
        assert_eq!(
            err.to_string(),
            "CheckSum mismatch: declared 039, calculated 040 (cause: data corruption during transmission)"
        );
    }
}
