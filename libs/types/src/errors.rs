//! Error types for field access, value conversion and message structure
//!
//! Conversion errors are produced by the field codec without knowledge of the
//! tag; [`FieldError`] attaches the tag once a field map accessor knows it.
//! Structural errors are recorded on a parsed [`crate::Message`] rather than
//! returned, so sequencing can still use a broken message's header.

use crate::tags::Tag;
use std::fmt;
use thiserror::Error;

/// Scalar kinds understood by the field codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Int,
    UInt,
    Decimal,
    Bool,
    Char,
    Data,
    MultipleValue,
    UtcTimestamp,
    UtcDateOnly,
    UtcTimeOnly,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Int => "integer",
            ValueKind::UInt => "unsigned integer",
            ValueKind::Decimal => "decimal",
            ValueKind::Bool => "boolean",
            ValueKind::Char => "char",
            ValueKind::Data => "data",
            ValueKind::MultipleValue => "multiple value string",
            ValueKind::UtcTimestamp => "UTC timestamp",
            ValueKind::UtcDateOnly => "UTC date",
            ValueKind::UtcTimeOnly => "UTC time",
        };
        f.write_str(name)
    }
}

/// Wire text that could not be decoded as the requested kind
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot convert '{text}' to {kind}")]
pub struct ConversionError {
    pub kind: ValueKind,
    pub text: String,
}

impl ConversionError {
    pub fn new(kind: ValueKind, raw: &[u8]) -> Self {
        Self {
            kind,
            text: String::from_utf8_lossy(raw).into_owned(),
        }
    }
}

/// Field lookup and typed access failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The tag is not set in the field map
    #[error("field not found: tag {tag}")]
    NotFound { tag: Tag },

    /// The tag is set but its text is not a valid value of the requested kind
    #[error("incorrect data format for tag {tag}: {source}")]
    Conversion {
        tag: Tag,
        #[source]
        source: ConversionError,
    },

    /// A repeating group instance is missing its delimiter field
    #[error("group {count_tag} instance does not contain delimiter tag {delimiter}")]
    MissingDelimiter { count_tag: Tag, delimiter: Tag },
}

impl FieldError {
    pub fn conversion(tag: Tag, source: ConversionError) -> Self {
        Self::Conversion { tag, source }
    }

    /// The tag the error refers to.
    pub fn tag(&self) -> Tag {
        match self {
            FieldError::NotFound { tag } | FieldError::Conversion { tag, .. } => *tag,
            FieldError::MissingDelimiter { delimiter, .. } => *delimiter,
        }
    }
}

/// Structural problems found while parsing a message
///
/// Each variant carries the offending tag so callers can build a targeted
/// Reject. The message they are attached to is still usable for sequencing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructuralError {
    /// A field appeared in the wrong section, e.g. a header tag inside the body
    #[error("tag {tag} specified out of required order")]
    TagOutOfOrder { tag: Tag },

    /// A tag appeared more than once directly in the same field map
    #[error("tag {tag} appears more than once")]
    DuplicateTag { tag: Tag },

    /// The count field disagrees with the number of parsed instances
    #[error("incorrect NumInGroup count for repeating group {count_tag}: declared {declared}, found {actual}")]
    IncorrectNumInGroupCount {
        count_tag: Tag,
        declared: usize,
        actual: usize,
    },

    /// A group instance did not start with the group's delimiter
    #[error("repeating group {count_tag} instance starts with tag {found}, expected delimiter {delimiter}")]
    GroupDelimiterMismatch {
        count_tag: Tag,
        delimiter: Tag,
        found: Tag,
    },

    /// A group member appeared before a member declared ahead of it
    #[error("repeating group fields out of order: tag {tag} in group {count_tag}")]
    GroupFieldOutOfOrder { count_tag: Tag, tag: Tag },

    /// The count field of a repeating group is not a non-negative integer
    #[error("invalid NumInGroup value for tag {tag}")]
    InvalidNumInGroup { tag: Tag },

    /// A field was present with an empty value
    #[error("tag {tag} specified without a value")]
    EmptyValue { tag: Tag },
}

impl StructuralError {
    pub fn tag(&self) -> Tag {
        match self {
            StructuralError::TagOutOfOrder { tag }
            | StructuralError::DuplicateTag { tag }
            | StructuralError::GroupFieldOutOfOrder { tag, .. }
            | StructuralError::InvalidNumInGroup { tag }
            | StructuralError::EmptyValue { tag } => *tag,
            StructuralError::IncorrectNumInGroupCount { count_tag, .. } => *count_tag,
            StructuralError::GroupDelimiterMismatch { found, .. } => *found,
        }
    }
}
