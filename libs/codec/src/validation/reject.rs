//! Session-level rejection reasons

use fix_types::{StructuralError, Tag};
use std::fmt;
use thiserror::Error;

/// SessionRejectReason (373) values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionRejectReason {
    InvalidTagNumber,
    RequiredTagMissing,
    TagNotDefinedForThisMessageType,
    UndefinedTag,
    TagSpecifiedWithoutAValue,
    ValueIsIncorrect,
    IncorrectDataFormatForValue,
    DecryptionProblem,
    SignatureProblem,
    CompIdProblem,
    SendingTimeAccuracyProblem,
    InvalidMsgType,
    XmlValidationError,
    TagAppearsMoreThanOnce,
    TagSpecifiedOutOfRequiredOrder,
    RepeatingGroupFieldsOutOfOrder,
    IncorrectNumInGroupCount,
    NonDataValueIncludesFieldDelimiter,
    InvalidOrUnsupportedApplicationVersion,
    Other,
}

impl SessionRejectReason {
    pub fn code(self) -> i64 {
        match self {
            SessionRejectReason::InvalidTagNumber => 0,
            SessionRejectReason::RequiredTagMissing => 1,
            SessionRejectReason::TagNotDefinedForThisMessageType => 2,
            SessionRejectReason::UndefinedTag => 3,
            SessionRejectReason::TagSpecifiedWithoutAValue => 4,
            SessionRejectReason::ValueIsIncorrect => 5,
            SessionRejectReason::IncorrectDataFormatForValue => 6,
            SessionRejectReason::DecryptionProblem => 7,
            SessionRejectReason::SignatureProblem => 8,
            SessionRejectReason::CompIdProblem => 9,
            SessionRejectReason::SendingTimeAccuracyProblem => 10,
            SessionRejectReason::InvalidMsgType => 11,
            SessionRejectReason::XmlValidationError => 12,
            SessionRejectReason::TagAppearsMoreThanOnce => 13,
            SessionRejectReason::TagSpecifiedOutOfRequiredOrder => 14,
            SessionRejectReason::RepeatingGroupFieldsOutOfOrder => 15,
            SessionRejectReason::IncorrectNumInGroupCount => 16,
            SessionRejectReason::NonDataValueIncludesFieldDelimiter => 17,
            SessionRejectReason::InvalidOrUnsupportedApplicationVersion => 18,
            SessionRejectReason::Other => 99,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            SessionRejectReason::InvalidTagNumber => "Invalid tag number",
            SessionRejectReason::RequiredTagMissing => "Required tag missing",
            SessionRejectReason::TagNotDefinedForThisMessageType => "Tag not defined for this message type",
            SessionRejectReason::UndefinedTag => "Undefined tag",
            SessionRejectReason::TagSpecifiedWithoutAValue => "Tag specified without a value",
            SessionRejectReason::ValueIsIncorrect => "Value is incorrect (out of range) for this tag",
            SessionRejectReason::IncorrectDataFormatForValue => "Incorrect data format for value",
            SessionRejectReason::DecryptionProblem => "Decryption problem",
            SessionRejectReason::SignatureProblem => "Signature problem",
            SessionRejectReason::CompIdProblem => "CompID problem",
            SessionRejectReason::SendingTimeAccuracyProblem => "SendingTime accuracy problem",
            SessionRejectReason::InvalidMsgType => "Invalid MsgType",
            SessionRejectReason::XmlValidationError => "XML validation error",
            SessionRejectReason::TagAppearsMoreThanOnce => "Tag appears more than once",
            SessionRejectReason::TagSpecifiedOutOfRequiredOrder => "Tag specified out of required order",
            SessionRejectReason::RepeatingGroupFieldsOutOfOrder => "Repeating group fields out of order",
            SessionRejectReason::IncorrectNumInGroupCount => "Incorrect NumInGroup count for repeating group",
            SessionRejectReason::NonDataValueIncludesFieldDelimiter => "Non-data value includes field delimiter",
            SessionRejectReason::InvalidOrUnsupportedApplicationVersion => "Invalid or unsupported application version",
            SessionRejectReason::Other => "Other",
        }
    }
}

impl fmt::Display for SessionRejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// A content failure carrying the reason and offending tag
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{text}")]
pub struct MessageRejection {
    pub reason: SessionRejectReason,
    pub tag: Option<Tag>,
    pub text: String,
}

impl MessageRejection {
    pub fn new(reason: SessionRejectReason, tag: Option<Tag>) -> Self {
        let text = match tag {
            Some(tag) => format!("{}, field={tag}", reason.text()),
            None => reason.text().to_string(),
        };
        Self { reason, tag, text }
    }

    pub fn for_tag(reason: SessionRejectReason, tag: Tag) -> Self {
        Self::new(reason, Some(tag))
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Rejection for a structural parse error, regardless of policy.
    pub fn from_structural(error: &StructuralError) -> Self {
        let reason = match error {
            StructuralError::TagOutOfOrder { .. } => SessionRejectReason::TagSpecifiedOutOfRequiredOrder,
            StructuralError::DuplicateTag { .. } => SessionRejectReason::TagAppearsMoreThanOnce,
            StructuralError::IncorrectNumInGroupCount { .. } => SessionRejectReason::IncorrectNumInGroupCount,
            StructuralError::GroupDelimiterMismatch { .. } | StructuralError::GroupFieldOutOfOrder { .. } => {
                SessionRejectReason::RepeatingGroupFieldsOutOfOrder
            }
            StructuralError::InvalidNumInGroup { .. } => SessionRejectReason::IncorrectDataFormatForValue,
            StructuralError::EmptyValue { .. } => SessionRejectReason::TagSpecifiedWithoutAValue,
        };
        Self::for_tag(reason, error.tag()).with_text(error.to_string())
    }
}

/// Validator outcome other than success
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// BeginString does not match the session dictionary
    #[error("Unsupported BeginString: expected {expected}, got {actual:?}")]
    UnsupportedVersion {
        expected: String,
        actual: Option<String>,
    },

    #[error(transparent)]
    Rejected(#[from] MessageRejection),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(SessionRejectReason::RequiredTagMissing.code(), 1);
        assert_eq!(SessionRejectReason::RepeatingGroupFieldsOutOfOrder.code(), 15);
        assert_eq!(SessionRejectReason::IncorrectNumInGroupCount.code(), 16);
        assert_eq!(SessionRejectReason::Other.code(), 99);
    }

    #[test]
    fn test_rejection_text() {
        let rejection = MessageRejection::for_tag(SessionRejectReason::RequiredTagMissing, 11);
        assert_eq!(rejection.to_string(), "Required tag missing, field=11");
    }

    #[test]
    fn test_structural_mapping_keeps_tag() {
        let rejection = MessageRejection::from_structural(&StructuralError::GroupFieldOutOfOrder {
            count_tag: 453,
            tag: 447,
        });
        assert_eq!(rejection.reason, SessionRejectReason::RepeatingGroupFieldsOutOfOrder);
        assert_eq!(rejection.tag, Some(447));
    }
}
