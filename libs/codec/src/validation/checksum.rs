//! CheckSum and BodyLength integrity
//!
//! CheckSum (10) is the byte sum of everything before the `10=` field,
//! modulo 256, written as three zero-padded digits. BodyLength (9) counts the
//! bytes after the SOH that ends the BodyLength field up to and including
//! the SOH before `10=`.

use crate::error::{FramingError, FramingResult};
use fix_types::SOH;

/// Length of the `10=NNN<SOH>` trailer field.
pub const CHECKSUM_FIELD_LEN: usize = 7;

/// Sum of `data` modulo 256
pub fn calculate_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Three-digit wire form of a checksum
pub fn format_checksum(checksum: u8) -> [u8; 3] {
    [
        b'0' + checksum / 100,
        b'0' + (checksum / 10) % 10,
        b'0' + checksum % 10,
    ]
}

/// Parse the three-digit checksum text
pub fn parse_checksum(value: &[u8]) -> FramingResult<u8> {
    let invalid = || FramingError::InvalidChecksumField {
        value: String::from_utf8_lossy(value).into_owned(),
    };
    if value.len() != 3 || !value.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    let n = value
        .iter()
        .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'));
    u8::try_from(n).map_err(|_| invalid())
}

/// Offsets inside a raw message needed for integrity checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// First byte after BodyLength's SOH
    pub body_start: usize,
    /// Declared BodyLength
    pub body_length: usize,
    /// Offset of the `10=` field
    pub checksum_start: usize,
}

fn read_uint(raw: &[u8], start: usize) -> Option<(usize, usize)> {
    let end = start + raw[start..].iter().position(|b| *b == SOH)?;
    let digits = &raw[start..end];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let value = std::str::from_utf8(digits).ok()?.parse().ok()?;
    Some((value, end + 1))
}

/// Locate BeginString, BodyLength and the checksum field.
///
/// The checksum field is the last `<SOH>10=` in the message, so raw data
/// fields containing `10=` do not confuse the search.
pub fn locate_frame(raw: &[u8]) -> FramingResult<Frame> {
    if raw.is_empty() {
        return Err(FramingError::Empty);
    }
    if !raw.starts_with(b"8=") {
        return Err(FramingError::MissingBeginString);
    }
    let begin_end = raw
        .iter()
        .position(|b| *b == SOH)
        .ok_or_else(|| FramingError::garbled(0, "BeginString not terminated"))?;
    let length_start = begin_end + 1;
    if !raw[length_start..].starts_with(b"9=") {
        return Err(FramingError::MissingBodyLength);
    }
    let (body_length, body_start) = read_uint(raw, length_start + 2).ok_or_else(|| {
        let rest = &raw[length_start + 2..];
        let end = rest.iter().position(|b| *b == SOH).unwrap_or(rest.len());
        FramingError::InvalidBodyLength {
            value: String::from_utf8_lossy(&rest[..end]).into_owned(),
        }
    })?;

    let checksum_start = raw
        .windows(4)
        .rposition(|w| w == b"\x0110=")
        .map(|p| p + 1)
        .filter(|p| *p >= body_start)
        .ok_or(FramingError::MissingChecksum)?;

    Ok(Frame {
        body_start,
        body_length,
        checksum_start,
    })
}

/// Verify BodyLength and CheckSum of a complete raw message.
pub fn verify_integrity(raw: &[u8]) -> FramingResult<Frame> {
    let frame = locate_frame(raw)?;
    let actual = frame.checksum_start - frame.body_start;
    if actual != frame.body_length {
        return Err(FramingError::BodyLengthMismatch {
            declared: frame.body_length,
            actual,
        });
    }

    let value_start = frame.checksum_start + 3;
    let value_end = raw[value_start..]
        .iter()
        .position(|b| *b == SOH)
        .map(|p| value_start + p)
        .ok_or_else(|| FramingError::garbled(frame.checksum_start, "CheckSum not terminated"))?;
    if value_end + 1 != raw.len() {
        return Err(FramingError::garbled(value_end + 1, "bytes after CheckSum"));
    }
    let declared = parse_checksum(&raw[value_start..value_end])?;
    let calculated = calculate_checksum(&raw[..frame.checksum_start]);
    if declared != calculated {
        return Err(FramingError::checksum_mismatch(declared, calculated));
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IOI: &[u8] = b"8=FIX.4.4\x019=76\x0135=6\x0123=IDENTIFIER\x0128=N\x0155=MSFT\x0154=1\x01711=2\x01311=DELL\x01318=USD\x01311=IBM\x01318=CAD\x0110=039\x01";

    #[test]
    fn test_known_message_integrity() {
        let frame = verify_integrity(IOI).unwrap();
        assert_eq!(frame.body_length, 76);
        assert_eq!(&IOI[frame.checksum_start..], b"10=039\x01");
    }

    #[test]
    fn test_checksum_formatting() {
        assert_eq!(&format_checksum(0), b"000");
        assert_eq!(&format_checksum(39), b"039");
        assert_eq!(&format_checksum(255), b"255");
        assert_eq!(parse_checksum(b"255").unwrap(), 255);
        assert!(parse_checksum(b"256").is_err());
        assert!(parse_checksum(b"39").is_err());
    }

    #[test]
    fn test_corrupted_byte_is_detected() {
        let mut raw = IOI.to_vec();
        raw[30] = b'X';
        assert!(matches!(
            verify_integrity(&raw),
            Err(FramingError::ChecksumMismatch { declared: 39, .. })
        ));
    }

    #[test]
    fn test_wrong_body_length_is_detected() {
        let raw = String::from_utf8_lossy(IOI).replace("9=76", "9=75");
        assert_eq!(
            verify_integrity(raw.as_bytes()),
            Err(FramingError::BodyLengthMismatch { declared: 75, actual: 76 })
        );
    }

    #[test]
    fn test_leading_fields_required() {
        assert_eq!(verify_integrity(b""), Err(FramingError::Empty));
        assert_eq!(verify_integrity(b"9=5\x01"), Err(FramingError::MissingBeginString));
        assert_eq!(
            verify_integrity(b"8=FIX.4.4\x0135=0\x01"),
            Err(FramingError::MissingBodyLength)
        );
        assert!(matches!(
            verify_integrity(b"8=FIX.4.4\x019=x\x0135=0\x0110=000\x01"),
            Err(FramingError::InvalidBodyLength { .. })
        ));
    }
}
