//! A single tag=value pair

use crate::errors::{ConversionError, FieldError};
use crate::tags::Tag;
use crate::value::FieldValue;
use std::fmt;

/// One FIX field. The value is kept in wire form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    tag: Tag,
    value: Vec<u8>,
}

impl Field {
    pub fn new(tag: Tag, value: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Build a field from a typed value.
    pub fn from_value<V: FieldValue>(tag: Tag, value: &V) -> Self {
        Self {
            tag,
            value: value.to_wire(),
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The value as text, lossy for non-UTF-8 data fields.
    pub fn value_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    pub fn decode<V: FieldValue>(&self) -> Result<V, FieldError> {
        V::decode(&self.value).map_err(|e: ConversionError| FieldError::conversion(self.tag, e))
    }

    /// Bytes this field occupies on the wire, `tag=value<SOH>`.
    pub fn wire_len(&self) -> usize {
        let mut digits = 1;
        let mut tag = self.tag / 10;
        while tag > 0 {
            digits += 1;
            tag /= 10;
        }
        digits + 1 + self.value.len() + 1
    }

    /// Append `tag=value<SOH>` to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        use std::io::Write;
        let _ = write!(out, "{}=", self.tag);
        out.extend_from_slice(&self.value);
        out.push(crate::SOH);
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.tag, self.value_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_len_matches_written_bytes() {
        for field in [Field::new(8, "FIX.4.4"), Field::new(10, "039"), Field::new(12345, "")] {
            let mut out = Vec::new();
            field.write_to(&mut out);
            assert_eq!(out.len(), field.wire_len());
            assert_eq!(out.last(), Some(&crate::SOH));
        }
    }

    #[test]
    fn test_decode_attaches_tag_to_error() {
        let field = Field::new(34, "abc");
        let err = field.decode::<u64>().unwrap_err();
        assert_eq!(err.tag(), 34);
        assert!(matches!(err, FieldError::Conversion { .. }));
    }
}
