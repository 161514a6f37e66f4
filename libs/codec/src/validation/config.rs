//! # Validation Configuration Module
//!
//! Policy switches for the dictionary validator, deserializable from session
//! settings so they can be tuned per counterparty.

use crate::parser::ParseOptions;
use serde::{Deserialize, Serialize};

/// Validator policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Reject header, body or trailer fields found outside their section
    pub check_fields_out_of_order: bool,
    /// Reject fields present with an empty value
    pub check_fields_have_values: bool,
    /// Apply definition and membership checks to tags >= 5000
    pub check_user_defined_fields: bool,
    /// Accept tags the dictionary does not define for the message
    pub allow_unknown_message_fields: bool,
    /// Reject repeating group members out of declared order
    pub check_unordered_group_fields: bool,
    /// Reject enumerated fields holding values outside their legal set
    pub check_enum_values: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            check_fields_out_of_order: true,
            check_fields_have_values: true,
            check_user_defined_fields: true,
            allow_unknown_message_fields: false,
            check_unordered_group_fields: true,
            check_enum_values: true,
        }
    }
}

impl ValidationOptions {
    /// Parser options consistent with this policy.
    pub fn parse_options(&self, validate_length_and_checksum: bool) -> ParseOptions {
        ParseOptions {
            validate_length_and_checksum,
            check_unordered_group_fields: self.check_unordered_group_fields,
        }
    }
}
