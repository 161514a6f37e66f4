//! # Message Validation
//!
//! ## Purpose
//!
//! Integrity and content checks for parsed FIX messages:
//!
//! - [`checksum`]: BodyLength and CheckSum arithmetic used by the parser and
//!   serializer
//! - [`validator`]: dictionary conformance, reported as a
//!   [`MessageRejection`] carrying a SessionRejectReason
//! - [`config`]: the policy switches that relax individual checks
//!
//! ## Architecture
//!
//! ```text
//! raw bytes → verify_integrity → MessageParser → Message → Validator → Ok / MessageRejection
//!                  ↓                                           ↓
//!            FramingError                          ValidationOptions policy
//! ```

pub mod checksum;
pub mod config;
pub mod reject;
pub mod validator;

pub use checksum::{calculate_checksum, format_checksum, verify_integrity};
pub use config::ValidationOptions;
pub use reject::{MessageRejection, SessionRejectReason, ValidationError};
pub use validator::Validator;
