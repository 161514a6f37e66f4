//! # Data Dictionary
//!
//! ## Purpose
//!
//! In-memory schema for one FIX version: field definitions with types and
//! enumerations, header and trailer layout, and per-message body layout with
//! nested repeating groups. The parser uses it to detect groups and raw data
//! fields; the validator checks messages against it.
//!
//! Dictionaries are assembled with [`DictionaryBuilder`] and handed to a
//! [`DictionaryRegistry`] once at startup. Loading schema files is left to
//! the embedding application.
//!
//! ## Architecture
//!
//! ```text
//! DictionaryBuilder → DataDictionary ─┐
//!                                     ├→ DictionaryRegistry (Arc, by BeginString / ApplVerID)
//! DictionaryBuilder → DataDictionary ─┘            ↓
//!                                      MessageParser, Validator, Session
//! ```

mod builder;
mod field;
mod message;
mod registry;

pub use builder::DictionaryBuilder;
pub use field::{FieldDef, FieldType};
pub use message::{FieldSet, GroupDef, MessageCategory, MessageDef};
pub use registry::DictionaryRegistry;

use fix_types::{tags, Tag};
use std::collections::HashMap;
use thiserror::Error;

/// Dictionary construction and lookup failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DictionaryError {
    #[error("No dictionary registered for BeginString '{begin_string}'")]
    UnknownVersion { begin_string: String },

    #[error("No application dictionary registered for ApplVerID '{appl_ver_id}'")]
    UnknownApplVerId { appl_ver_id: String },

    #[error("Message type '{msg_type}' is not defined in {begin_string}")]
    UnknownMsgType {
        begin_string: String,
        msg_type: String,
    },

    #[error("Tag {tag} used in {context} has no field definition")]
    UndefinedField { tag: Tag, context: String },

    #[error("Invalid group {count_tag} in {context}: {reason}")]
    InvalidGroup {
        count_tag: Tag,
        context: String,
        reason: &'static str,
    },

    #[error("Length field {length_tag} points at {data_tag}, which is not a data field")]
    InvalidDataPair { length_tag: Tag, data_tag: Tag },

    #[error("Dictionary key '{key}' registered twice")]
    DuplicateDictionary { key: String },
}

/// Schema for one FIX version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDictionary {
    pub(crate) begin_string: String,
    pub(crate) appl_ver_id: Option<String>,
    pub(crate) fields: HashMap<Tag, FieldDef>,
    pub(crate) header: FieldSet,
    pub(crate) trailer: FieldSet,
    pub(crate) messages: HashMap<String, MessageDef>,
    pub(crate) data_pairs: HashMap<Tag, Tag>,
}

impl DataDictionary {
    pub fn begin_string(&self) -> &str {
        &self.begin_string
    }

    pub fn appl_ver_id(&self) -> Option<&str> {
        self.appl_ver_id.as_deref()
    }

    pub fn field(&self, tag: Tag) -> Option<&FieldDef> {
        self.fields.get(&tag)
    }

    pub fn is_field(&self, tag: Tag) -> bool {
        self.fields.contains_key(&tag)
    }

    pub fn field_type(&self, tag: Tag) -> Option<FieldType> {
        self.field(tag).map(|f| f.field_type)
    }

    pub fn header(&self) -> &FieldSet {
        &self.header
    }

    pub fn trailer(&self) -> &FieldSet {
        &self.trailer
    }

    /// Header membership. Falls back to the standard header when the
    /// dictionary declares no header.
    pub fn is_header_field(&self, tag: Tag) -> bool {
        if self.header.members().is_empty() {
            tags::is_header_tag(tag)
        } else {
            self.header.contains(tag)
        }
    }

    pub fn is_trailer_field(&self, tag: Tag) -> bool {
        if self.trailer.members().is_empty() {
            tags::is_trailer_tag(tag)
        } else {
            self.trailer.contains(tag)
        }
    }

    /// Whether any message types are defined. Transport-only dictionaries
    /// built without messages skip MsgType checks.
    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }

    pub fn is_msg_type(&self, msg_type: &str) -> bool {
        self.messages.contains_key(msg_type)
    }

    /// Body layout of `msg_type`.
    pub fn message(&self, msg_type: &str) -> Result<&MessageDef, DictionaryError> {
        self.messages
            .get(msg_type)
            .ok_or_else(|| DictionaryError::UnknownMsgType {
                begin_string: self.begin_string.clone(),
                msg_type: msg_type.to_string(),
            })
    }

    pub fn messages(&self) -> impl Iterator<Item = &MessageDef> {
        self.messages.values()
    }

    /// Group definition for `count_tag` in the body of `msg_type`.
    pub fn body_group(&self, msg_type: &str, count_tag: Tag) -> Option<&GroupDef> {
        self.messages.get(msg_type)?.fields.group(count_tag)
    }

    /// Data field paired with `length_tag`.
    pub fn data_tag_for(&self, length_tag: Tag) -> Option<Tag> {
        self.data_pairs
            .get(&length_tag)
            .copied()
            .or_else(|| tags::standard_data_tag(length_tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups() {
        let dd = DictionaryBuilder::new("FIX.4.4")
            .standard_header_trailer()
            .session_messages()
            .build()
            .unwrap();
        assert!(dd.is_header_field(tags::MSG_SEQ_NUM));
        assert!(dd.is_trailer_field(tags::CHECK_SUM));
        assert!(!dd.is_header_field(tags::TEXT));
        assert!(dd.is_msg_type("A"));
        assert_eq!(dd.field_type(tags::HEART_BT_INT), Some(FieldType::Int));
        assert_eq!(dd.data_tag_for(tags::RAW_DATA_LENGTH), Some(tags::RAW_DATA));
        assert!(matches!(
            dd.message("ZZ"),
            Err(DictionaryError::UnknownMsgType { .. })
        ));
    }

    #[test]
    fn test_empty_dictionary_uses_standard_sections() {
        let dd = DictionaryBuilder::new("FIX.4.2").build().unwrap();
        assert!(dd.is_header_field(tags::SENDING_TIME));
        assert!(dd.is_trailer_field(tags::SIGNATURE));
        assert!(!dd.has_messages());
    }
}
