//! Field definitions

use fix_types::{
    tags, ConversionError, FieldValue, MultipleValue, Tag, UtcDateOnly, UtcTimeOnly, UtcTimestamp,
    ValueKind,
};
use std::collections::BTreeSet;

/// FIX data types, grouped by the codec kind that decodes them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Char,
    Boolean,
    Int,
    Length,
    NumInGroup,
    SeqNum,
    TagNum,
    DayOfMonth,
    Float,
    Qty,
    Price,
    PriceOffset,
    Amt,
    Percentage,
    Data,
    XmlData,
    MultipleStringValue,
    MultipleCharValue,
    Currency,
    Exchange,
    Country,
    Language,
    LocalMktDate,
    MonthYear,
    UtcTimestamp,
    UtcDateOnly,
    UtcTimeOnly,
}

impl FieldType {
    /// Codec kind used to check the wire format.
    pub fn value_kind(self) -> ValueKind {
        match self {
            FieldType::Char => ValueKind::Char,
            FieldType::Boolean => ValueKind::Bool,
            FieldType::Int => ValueKind::Int,
            FieldType::Length
            | FieldType::NumInGroup
            | FieldType::SeqNum
            | FieldType::TagNum
            | FieldType::DayOfMonth => ValueKind::UInt,
            FieldType::Float
            | FieldType::Qty
            | FieldType::Price
            | FieldType::PriceOffset
            | FieldType::Amt
            | FieldType::Percentage => ValueKind::Decimal,
            FieldType::Data | FieldType::XmlData => ValueKind::Data,
            FieldType::MultipleStringValue | FieldType::MultipleCharValue => {
                ValueKind::MultipleValue
            }
            FieldType::UtcTimestamp => ValueKind::UtcTimestamp,
            FieldType::UtcDateOnly | FieldType::LocalMktDate => ValueKind::UtcDateOnly,
            FieldType::UtcTimeOnly => ValueKind::UtcTimeOnly,
            FieldType::String
            | FieldType::Currency
            | FieldType::Exchange
            | FieldType::Country
            | FieldType::Language
            | FieldType::MonthYear => ValueKind::String,
        }
    }

    pub fn is_multiple_value(self) -> bool {
        matches!(
            self,
            FieldType::MultipleStringValue | FieldType::MultipleCharValue
        )
    }

    pub fn is_data(self) -> bool {
        matches!(self, FieldType::Data | FieldType::XmlData)
    }

    /// Check that `raw` is valid wire text for this type.
    pub fn check_format(self, raw: &[u8]) -> Result<(), ConversionError> {
        match self.value_kind() {
            ValueKind::String => String::decode(raw).map(drop),
            ValueKind::Char => char::decode(raw).map(drop),
            ValueKind::Bool => bool::decode(raw).map(drop),
            ValueKind::Int => i64::decode(raw).map(drop),
            ValueKind::UInt => u64::decode(raw).map(drop),
            ValueKind::Decimal => rust_decimal::Decimal::decode(raw).map(drop),
            ValueKind::Data => Ok(()),
            ValueKind::MultipleValue => MultipleValue::decode(raw).map(drop),
            ValueKind::UtcTimestamp => UtcTimestamp::decode(raw).map(drop),
            ValueKind::UtcDateOnly => UtcDateOnly::decode(raw).map(drop),
            ValueKind::UtcTimeOnly => UtcTimeOnly::decode(raw).map(drop),
        }
    }
}

/// A field known to a dictionary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub tag: Tag,
    pub name: String,
    pub field_type: FieldType,
    /// Legal values; empty when the field is not enumerated
    pub values: BTreeSet<String>,
    /// Accept values outside [`Self::values`]
    pub allow_other_values: bool,
    /// For Length fields, the data field whose byte count this field holds
    pub length_of: Option<Tag>,
}

impl FieldDef {
    pub fn new(tag: Tag, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            tag,
            name: name.into(),
            field_type,
            values: BTreeSet::new(),
            allow_other_values: false,
            length_of: None,
        }
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn allow_other_values(mut self) -> Self {
        self.allow_other_values = true;
        self
    }

    /// Mark this Length field as the byte count of `data_tag`.
    pub fn length_of(mut self, data_tag: Tag) -> Self {
        self.length_of = Some(data_tag);
        self
    }

    pub fn is_enumerated(&self) -> bool {
        !self.values.is_empty()
    }

    /// Whether `raw` is a legal value. Multiple-value fields check every
    /// space-separated token.
    pub fn is_legal_value(&self, raw: &[u8]) -> bool {
        if !self.is_enumerated() || self.allow_other_values {
            return true;
        }
        let Ok(text) = std::str::from_utf8(raw) else {
            return false;
        };
        if self.field_type.is_multiple_value() {
            text.split(' ').all(|token| self.values.contains(token))
        } else {
            self.values.contains(text)
        }
    }

    pub fn is_user_defined(&self) -> bool {
        tags::is_user_defined(self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_value_tokens_checked_individually() {
        let def = FieldDef::new(18, "ExecInst", FieldType::MultipleCharValue)
            .with_values(["1", "2", "G"]);
        assert!(def.is_legal_value(b"1 G"));
        assert!(!def.is_legal_value(b"1 X"));
        assert!(!def.is_legal_value(b"1G"));
    }

    #[test]
    fn test_allow_other_values() {
        let strict = FieldDef::new(54, "Side", FieldType::Char).with_values(["1", "2"]);
        assert!(!strict.is_legal_value(b"Z"));
        let open = strict.clone().allow_other_values();
        assert!(open.is_legal_value(b"Z"));
    }

    #[test]
    fn test_format_by_type() {
        assert!(FieldType::Price.check_format(b"10.3000").is_ok());
        assert!(FieldType::Price.check_format(b"ten").is_err());
        assert!(FieldType::SeqNum.check_format(b"-1").is_err());
        assert!(FieldType::LocalMktDate.check_format(b"20260114").is_ok());
        assert!(FieldType::Data.check_format(b"\x01\x02").is_ok());
    }
}
