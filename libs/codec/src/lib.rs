//! # FIX Codec - Wire Format, Dictionaries and Validation
//!
//! ## Purpose
//!
//! The "Rules" layer between the pure data model in `fix-types` and the
//! session engine. It turns bytes into [`Message`](fix_types::Message)
//! values and back, and decides whether a message conforms to its
//! dictionary.
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → libs/session
//!     ↑           ↓            ↓
//!  Field model  Parse/encode  Sequencing
//!  Message      Dictionaries  Resend, Reject
//!  Groups       Validator     Logon/Logout
//! ```
//!
//! ## What This Crate Contains
//! - [`Framer`]: extracts complete messages from a byte stream
//! - [`MessageParser`]: raw message to structured message, groups and data
//!   fields included, recording structural errors on the result
//! - [`encode`]: structured message to wire bytes with computed BodyLength
//!   and CheckSum
//! - [`DataDictionary`] and [`DictionaryRegistry`]: per-version schemas
//! - [`Validator`]: dictionary checks producing SessionRejectReason codes
//!
//! ## What This Crate Does NOT Contain
//! - Sockets or connection handling
//! - Sequence numbers, message stores or session state
//! - Schema file loading (dictionaries are built programmatically)
//!
//! ## Error Model
//!
//! Framing failures (bad BodyLength, CheckSum, truncation) are returned as
//! [`FramingError`]; no message exists. Structural failures (ordering,
//! duplicates, group counts) still produce a best-effort message with the
//! errors attached, so the session can reject it by sequence number.

pub mod builder;
pub mod dictionary;
pub mod error;
pub mod framing;
pub mod parser;
pub mod validation;

pub use builder::{encode, encode_and_stamp, encode_into};
pub use dictionary::{
    DataDictionary, DictionaryBuilder, DictionaryError, DictionaryRegistry, FieldDef, FieldSet,
    FieldType, GroupDef, MessageCategory, MessageDef,
};
pub use error::{FramingError, FramingResult};
pub use framing::Framer;
pub use parser::{MessageParser, ParseOptions};
pub use validation::{MessageRejection, SessionRejectReason, ValidationError, ValidationOptions, Validator};
