//! # Field Codec
//!
//! Encodes and decodes scalar FIX values to and from their wire text.
//!
//! ## Rules
//!
//! - Integers: optional `-` followed by ASCII digits. `+`, spaces and empty
//!   text are rejected.
//! - Decimals: same sign rule, digits with at most one `.`, no exponent. The
//!   scale is kept exactly as written (`10.3000` has scale 4).
//! - Booleans: exactly `Y` or `N`.
//! - Timestamps: `YYYYMMDD-HH:MM:SS[.fff|.ffffff|.fffffffff]`, times
//!   `HH:MM:SS[...]`, dates `YYYYMMDD`. The number of fractional digits on
//!   decode becomes the value's [`TimestampPrecision`].
//! - Raw data is opaque bytes; its length is a byte count.
//!
//! Every [`FieldValue`] satisfies `decode(encode(v)) == v`.

use crate::errors::{ConversionError, ValueKind};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

/// A value that has a FIX wire representation
pub trait FieldValue: Sized {
    const KIND: ValueKind;

    /// Append the wire text of the value to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Decode wire text.
    fn decode(raw: &[u8]) -> Result<Self, ConversionError>;

    fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

fn as_str(raw: &[u8], kind: ValueKind) -> Result<&str, ConversionError> {
    std::str::from_utf8(raw).map_err(|_| ConversionError::new(kind, raw))
}

fn all_digits(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(u8::is_ascii_digit)
}

fn strip_sign(raw: &[u8]) -> &[u8] {
    match raw.first() {
        Some(b'-') => &raw[1..],
        _ => raw,
    }
}

impl FieldValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }

    fn decode(raw: &[u8]) -> Result<Self, ConversionError> {
        as_str(raw, Self::KIND).map(str::to_owned)
    }
}

impl FieldValue for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn encode(&self, out: &mut Vec<u8>) {
        let _ = write!(out, "{self}");
    }

    fn decode(raw: &[u8]) -> Result<Self, ConversionError> {
        if !all_digits(strip_sign(raw)) {
            return Err(ConversionError::new(Self::KIND, raw));
        }
        as_str(raw, Self::KIND)?
            .parse()
            .map_err(|_| ConversionError::new(Self::KIND, raw))
    }
}

impl FieldValue for u64 {
    const KIND: ValueKind = ValueKind::UInt;

    fn encode(&self, out: &mut Vec<u8>) {
        let _ = write!(out, "{self}");
    }

    fn decode(raw: &[u8]) -> Result<Self, ConversionError> {
        if !all_digits(raw) {
            return Err(ConversionError::new(Self::KIND, raw));
        }
        as_str(raw, Self::KIND)?
            .parse()
            .map_err(|_| ConversionError::new(Self::KIND, raw))
    }
}

impl FieldValue for Decimal {
    const KIND: ValueKind = ValueKind::Decimal;

    fn encode(&self, out: &mut Vec<u8>) {
        let _ = write!(out, "{self}");
    }

    fn decode(raw: &[u8]) -> Result<Self, ConversionError> {
        let unsigned = strip_sign(raw);
        let (int_part, frac_part) = match unsigned.iter().position(|&b| b == b'.') {
            Some(dot) => (&unsigned[..dot], Some(&unsigned[dot + 1..])),
            None => (unsigned, None),
        };
        let int_ok = int_part.is_empty() || all_digits(int_part);
        let frac_ok = frac_part.map_or(true, |f| f.is_empty() || all_digits(f));
        let has_digit = !int_part.is_empty() || frac_part.map_or(false, |f| !f.is_empty());
        if !(int_ok && frac_ok && has_digit) {
            return Err(ConversionError::new(Self::KIND, raw));
        }

        let text = as_str(raw, Self::KIND)?;
        // ".5" and "5." are legal FIX floats; rust_decimal wants digits on both sides.
        let mut normalized = String::with_capacity(text.len() + 1);
        if let Some(rest) = text.strip_prefix('-') {
            normalized.push('-');
            push_decimal_digits(&mut normalized, rest);
        } else {
            push_decimal_digits(&mut normalized, text);
        }
        Decimal::from_str(&normalized).map_err(|_| ConversionError::new(Self::KIND, raw))
    }
}

fn push_decimal_digits(out: &mut String, unsigned: &str) {
    if unsigned.starts_with('.') {
        out.push('0');
    }
    out.push_str(unsigned.strip_suffix('.').unwrap_or(unsigned));
}

impl FieldValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(if *self { b'Y' } else { b'N' });
    }

    fn decode(raw: &[u8]) -> Result<Self, ConversionError> {
        match raw {
            b"Y" => Ok(true),
            b"N" => Ok(false),
            _ => Err(ConversionError::new(Self::KIND, raw)),
        }
    }
}

impl FieldValue for char {
    const KIND: ValueKind = ValueKind::Char;

    fn encode(&self, out: &mut Vec<u8>) {
        let mut buf = [0u8; 4];
        out.extend_from_slice(self.encode_utf8(&mut buf).as_bytes());
    }

    fn decode(raw: &[u8]) -> Result<Self, ConversionError> {
        let text = as_str(raw, Self::KIND)?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(ConversionError::new(Self::KIND, raw)),
        }
    }
}

impl FieldValue for Vec<u8> {
    const KIND: ValueKind = ValueKind::Data;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn decode(raw: &[u8]) -> Result<Self, ConversionError> {
        Ok(raw.to_vec())
    }
}

/// Space-separated tokens (MultipleStringValue / MultipleCharValue)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MultipleValue(pub Vec<String>);

impl MultipleValue {
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FieldValue for MultipleValue {
    const KIND: ValueKind = ValueKind::MultipleValue;

    fn encode(&self, out: &mut Vec<u8>) {
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(b' ');
            }
            out.extend_from_slice(token.as_bytes());
        }
    }

    fn decode(raw: &[u8]) -> Result<Self, ConversionError> {
        let text = as_str(raw, Self::KIND)?;
        let tokens: Vec<String> = text.split(' ').map(str::to_owned).collect();
        if tokens.iter().any(String::is_empty) {
            return Err(ConversionError::new(Self::KIND, raw));
        }
        Ok(Self(tokens))
    }
}

// ---------------------------------------------------------------------------
// Date and time
// ---------------------------------------------------------------------------

/// Sub-second precision carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPrecision {
    Seconds,
    #[default]
    Millis,
    Micros,
    Nanos,
}

impl TimestampPrecision {
    pub fn digits(self) -> u16 {
        match self {
            TimestampPrecision::Seconds => 0,
            TimestampPrecision::Millis => 3,
            TimestampPrecision::Micros => 6,
            TimestampPrecision::Nanos => 9,
        }
    }

    pub fn from_digits(digits: usize) -> Option<Self> {
        match digits {
            0 => Some(TimestampPrecision::Seconds),
            3 => Some(TimestampPrecision::Millis),
            6 => Some(TimestampPrecision::Micros),
            9 => Some(TimestampPrecision::Nanos),
            _ => None,
        }
    }

    /// `Millis` when `include_millis`, otherwise `Seconds`.
    pub fn from_millis_flag(include_millis: bool) -> Self {
        if include_millis {
            TimestampPrecision::Millis
        } else {
            TimestampPrecision::Seconds
        }
    }
}

fn write_fraction(out: &mut Vec<u8>, nanos: u32, precision: TimestampPrecision) {
    // Leap seconds are represented with nanos >= 1e9.
    let nanos = nanos % 1_000_000_000;
    let _ = match precision {
        TimestampPrecision::Seconds => Ok(()),
        TimestampPrecision::Millis => write!(out, ".{:03}", nanos / 1_000_000),
        TimestampPrecision::Micros => write!(out, ".{:06}", nanos / 1_000),
        TimestampPrecision::Nanos => write!(out, ".{:09}", nanos),
    };
}

/// Split `main[.fraction]` and decode the fraction into nanoseconds.
fn split_fraction(
    raw: &[u8],
    main_len: usize,
    kind: ValueKind,
) -> Result<(&str, u32, TimestampPrecision), ConversionError> {
    let err = || ConversionError::new(kind, raw);
    let text = as_str(raw, kind)?;
    if text.len() < main_len {
        return Err(err());
    }
    let (main, rest) = text.split_at(main_len);
    if rest.is_empty() {
        return Ok((main, 0, TimestampPrecision::Seconds));
    }
    let fraction = rest.strip_prefix('.').ok_or_else(err)?;
    let precision = TimestampPrecision::from_digits(fraction.len()).ok_or_else(err)?;
    if !all_digits(fraction.as_bytes()) {
        return Err(err());
    }
    let value: u32 = fraction.parse().map_err(|_| err())?;
    let nanos = value * 10u32.pow(9 - u32::from(precision.digits()));
    Ok((main, nanos, precision))
}

/// UTCTimestamp with the precision it is written with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtcTimestamp {
    value: DateTime<Utc>,
    precision: TimestampPrecision,
}

impl UtcTimestamp {
    /// Truncates `value` to `precision` so that encoding is lossless.
    pub fn new(value: DateTime<Utc>, precision: TimestampPrecision) -> Self {
        Self {
            value: value.trunc_subsecs(precision.digits()),
            precision,
        }
    }

    /// Encode with or without milliseconds.
    pub fn with_millis(value: DateTime<Utc>, include_millis: bool) -> Self {
        Self::new(value, TimestampPrecision::from_millis_flag(include_millis))
    }

    pub fn now(precision: TimestampPrecision) -> Self {
        Self::new(Utc::now(), precision)
    }

    pub fn value(&self) -> DateTime<Utc> {
        self.value
    }

    pub fn precision(&self) -> TimestampPrecision {
        self.precision
    }
}

impl FieldValue for UtcTimestamp {
    const KIND: ValueKind = ValueKind::UtcTimestamp;

    fn encode(&self, out: &mut Vec<u8>) {
        let _ = write!(out, "{}", self.value.format("%Y%m%d-%H:%M:%S"));
        write_fraction(out, self.value.nanosecond(), self.precision);
    }

    fn decode(raw: &[u8]) -> Result<Self, ConversionError> {
        let (main, nanos, precision) = split_fraction(raw, 17, Self::KIND)?;
        let err = || ConversionError::new(Self::KIND, raw);
        let naive = NaiveDateTime::parse_from_str(main, "%Y%m%d-%H:%M:%S").map_err(|_| err())?;
        let naive = naive.with_nanosecond(nanos).ok_or_else(err)?;
        Ok(Self {
            value: Utc.from_utc_datetime(&naive),
            precision,
        })
    }
}

/// UTCTimeOnly with the precision it is written with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtcTimeOnly {
    value: NaiveTime,
    precision: TimestampPrecision,
}

impl UtcTimeOnly {
    pub fn new(value: NaiveTime, precision: TimestampPrecision) -> Self {
        Self {
            value: value.trunc_subsecs(precision.digits()),
            precision,
        }
    }

    pub fn value(&self) -> NaiveTime {
        self.value
    }

    pub fn precision(&self) -> TimestampPrecision {
        self.precision
    }
}

impl FieldValue for UtcTimeOnly {
    const KIND: ValueKind = ValueKind::UtcTimeOnly;

    fn encode(&self, out: &mut Vec<u8>) {
        let _ = write!(out, "{}", self.value.format("%H:%M:%S"));
        write_fraction(out, self.value.nanosecond(), self.precision);
    }

    fn decode(raw: &[u8]) -> Result<Self, ConversionError> {
        let (main, nanos, precision) = split_fraction(raw, 8, Self::KIND)?;
        let err = || ConversionError::new(Self::KIND, raw);
        let time = NaiveTime::parse_from_str(main, "%H:%M:%S").map_err(|_| err())?;
        let time = time.with_nanosecond(nanos).ok_or_else(err)?;
        Ok(Self {
            value: time,
            precision,
        })
    }
}

/// UTCDateOnly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtcDateOnly(pub NaiveDate);

impl FieldValue for UtcDateOnly {
    const KIND: ValueKind = ValueKind::UtcDateOnly;

    fn encode(&self, out: &mut Vec<u8>) {
        let _ = write!(out, "{}", self.0.format("%Y%m%d"));
    }

    fn decode(raw: &[u8]) -> Result<Self, ConversionError> {
        let text = as_str(raw, Self::KIND)?;
        if text.len() != 8 || !all_digits(raw) {
            return Err(ConversionError::new(Self::KIND, raw));
        }
        NaiveDate::parse_from_str(text, "%Y%m%d")
            .map(UtcDateOnly)
            .map_err(|_| ConversionError::new(Self::KIND, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn roundtrip<V: FieldValue + PartialEq + std::fmt::Debug>(value: V) {
        let wire = value.to_wire();
        assert_eq!(V::decode(&wire).unwrap(), value);
    }

    #[test]
    fn test_decimal_preserves_scale() {
        let value = Decimal::decode(b"10.3000").unwrap();
        assert_eq!(value.scale(), 4);
        assert_eq!(value, dec!(10.3000));
        assert_eq!(value.to_wire(), b"10.3000");
    }

    #[test]
    fn test_decimal_lenient_forms() {
        assert_eq!(Decimal::decode(b".5").unwrap(), dec!(0.5));
        assert_eq!(Decimal::decode(b"-.25").unwrap(), dec!(-0.25));
        assert_eq!(Decimal::decode(b"7.").unwrap(), dec!(7));
    }

    #[test]
    fn test_decimal_rejects_malformed_text() {
        for bad in [&b""[..], b"-", b".", b"1e5", b"1.2.3", b"+1", b" 1", b"abc"] {
            let err = Decimal::decode(bad).unwrap_err();
            assert_eq!(err.kind, ValueKind::Decimal);
        }
    }

    #[test]
    fn test_int_rejects_malformed_text() {
        assert_eq!(i64::decode(b"-42").unwrap(), -42);
        for bad in [&b""[..], b"+5", b"4 2", b"12a", b"1.0", b"-"] {
            assert!(i64::decode(bad).is_err(), "accepted {bad:?}");
        }
        assert!(u64::decode(b"-1").is_err());
        assert!(i64::decode(b"99999999999999999999").is_err());
    }

    #[test]
    fn test_bool_is_case_sensitive() {
        assert!(bool::decode(b"Y").unwrap());
        assert!(!bool::decode(b"N").unwrap());
        assert!(bool::decode(b"y").is_err());
        assert!(bool::decode(b"true").is_err());
    }

    #[test]
    fn test_char_requires_single_character() {
        assert_eq!(char::decode(b"D").unwrap(), 'D');
        assert!(char::decode(b"").is_err());
        assert!(char::decode(b"DD").is_err());
    }

    #[test]
    fn test_timestamp_with_and_without_millis() {
        let with_ms = UtcTimestamp::decode(b"20260114-10:11:12.345").unwrap();
        assert_eq!(with_ms.precision(), TimestampPrecision::Millis);
        assert_eq!(with_ms.value().timestamp_subsec_millis(), 345);
        assert_eq!(with_ms.to_wire(), b"20260114-10:11:12.345");

        let without = UtcTimestamp::decode(b"20260114-10:11:12").unwrap();
        assert_eq!(without.precision(), TimestampPrecision::Seconds);
        assert_eq!(without.to_wire(), b"20260114-10:11:12");
    }

    #[test]
    fn test_timestamp_millis_flag_controls_encoding() {
        let at = Utc.with_ymd_and_hms(2026, 1, 14, 10, 11, 12).unwrap()
            + chrono::Duration::milliseconds(7);
        assert_eq!(UtcTimestamp::with_millis(at, true).to_wire(), b"20260114-10:11:12.007");
        assert_eq!(UtcTimestamp::with_millis(at, false).to_wire(), b"20260114-10:11:12");
    }

    #[test]
    fn test_timestamp_rejects_odd_fraction() {
        assert!(UtcTimestamp::decode(b"20260114-10:11:12.34").is_err());
        assert!(UtcTimestamp::decode(b"20260114-10:11:12,345").is_err());
        assert!(UtcTimestamp::decode(b"20261314-10:11:12").is_err());
    }

    #[test]
    fn test_time_and_date_only() {
        let time = UtcTimeOnly::decode(b"23:59:58.123456").unwrap();
        assert_eq!(time.precision(), TimestampPrecision::Micros);
        roundtrip(time);

        let date = UtcDateOnly::decode(b"20260229").unwrap_err();
        assert_eq!(date.kind, ValueKind::UtcDateOnly);
        let date = UtcDateOnly::decode(b"20280229").unwrap();
        assert_eq!(date.0.day(), 29);
    }

    #[test]
    fn test_multiple_value() {
        let value = MultipleValue::decode(b"A B C").unwrap();
        assert_eq!(value.tokens().collect::<Vec<_>>(), ["A", "B", "C"]);
        roundtrip(value);
        assert!(MultipleValue::decode(b"A  B").is_err());
    }

    #[test]
    fn test_raw_data_is_opaque() {
        let data = b"8=FIX.4.4\x019=5\x01".to_vec();
        roundtrip(data);
    }

    proptest! {
        #[test]
        fn prop_int_roundtrip(v in any::<i64>()) {
            prop_assert_eq!(i64::decode(&v.to_wire()).unwrap(), v);
        }

        #[test]
        fn prop_decimal_roundtrip_keeps_scale(mantissa in -1_000_000_000_000i64..1_000_000_000_000i64, scale in 0u32..12) {
            let value = Decimal::new(mantissa, scale);
            let decoded = Decimal::decode(&value.to_wire()).unwrap();
            prop_assert_eq!(decoded, value);
            prop_assert_eq!(decoded.scale(), value.scale());
        }

        #[test]
        fn prop_timestamp_roundtrip(secs in 0i64..4_102_444_800i64, nanos in 0u32..1_000_000_000u32, digits in prop::sample::select(vec![0usize, 3, 6, 9])) {
            let precision = TimestampPrecision::from_digits(digits).unwrap();
            let at = Utc.timestamp_opt(secs, nanos).unwrap();
            let value = UtcTimestamp::new(at, precision);
            prop_assert_eq!(UtcTimestamp::decode(&value.to_wire()).unwrap(), value);
        }
    }
}
