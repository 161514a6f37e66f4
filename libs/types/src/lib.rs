//! # FIX Types Library
//!
//! Field codec and message data model shared by the wire codec, the
//! validator and the session layer.
//!
//! ## Design Philosophy
//!
//! - **Wire-form storage**: field values are kept as the bytes that travel on
//!   the wire and decoded on access, so a parsed message re-serializes to the
//!   identical byte sequence
//! - **No precision loss**: decimals use `rust_decimal` and keep the scale
//!   they were written with; timestamps keep their sub-second precision
//! - **Typed failures**: every conversion error names the kind it expected,
//!   and field accessors attach the tag
//! - **Owned trees**: groups are owned by their parent map, so `clone()` is a
//!   deep copy
//!
//! ## Quick Start
//!
//! ```rust
//! use fix_types::{tags, FieldMap, Group, Message};
//! use rust_decimal::Decimal;
//! use std::str::FromStr;
//!
//! let mut order = Message::with_type("FIX.4.4", tags::msg_type::NEW_ORDER_SINGLE);
//! order.header_mut().set_str(tags::SENDER_COMP_ID, "BANZAI");
//! order.body_mut().set_str(55, "MSFT");
//! order.body_mut().set_decimal(44, Decimal::from_str("10.3000").unwrap());
//!
//! let mut party = FieldMap::new();
//! party.set_str(448, "AAA");
//! order.body_mut().add_group_instance(453, 448, party).unwrap();
//!
//! assert_eq!(order.body().get_decimal(44).unwrap().scale(), 4);
//! assert_eq!(order.body().group_count(453), 1);
//! ```
//!
//! ## Integration Points
//!
//! - **fix-codec**: parses raw bytes into [`Message`] and serializes it back,
//!   validating against a dictionary
//! - **fix-session**: reads header fields for sequencing and builds
//!   administrative messages

pub mod errors;
pub mod field;
pub mod field_map;
pub mod group;
pub mod message;
pub mod session_id;
pub mod tags;
pub mod value;

pub use errors::{ConversionError, FieldError, StructuralError, ValueKind};
pub use field::Field;
pub use field_map::{Entry, FieldMap, FieldOrder};
pub use group::Group;
pub use message::Message;
pub use session_id::SessionId;
pub use tags::Tag;
pub use value::{
    FieldValue, MultipleValue, TimestampPrecision, UtcDateOnly, UtcTimeOnly, UtcTimestamp,
};

/// Field separator byte.
pub const SOH: u8 = 0x01;
