//! # Message
//!
//! Header, body and trailer [`FieldMap`]s plus the structural errors the
//! parser ran into, in wire order.
//!
//! A message with a parse error is still inspectable: the session layer reads
//! MsgSeqNum and MsgType from it to make sequencing and disconnect decisions
//! before deciding how to reject it.
//!
//! The header always serializes BeginString, BodyLength and MsgType first and
//! the trailer always ends with CheckSum. Computing BodyLength and CheckSum is
//! the serializer's job; `Display` renders the fields exactly as set.

use crate::errors::{FieldError, StructuralError};
use crate::field::Field;
use crate::field_map::{FieldMap, FieldOrder};
use crate::tags::{self, msg_type, Tag};
use crate::value::UtcTimestamp;
use std::fmt;

/// Header routing pairs swapped when replying: `(ours, theirs)`.
const ROUTE_PAIRS: &[(Tag, Tag)] = &[
    (tags::SENDER_COMP_ID, tags::TARGET_COMP_ID),
    (tags::SENDER_SUB_ID, tags::TARGET_SUB_ID),
    (tags::SENDER_LOCATION_ID, tags::TARGET_LOCATION_ID),
    (tags::ON_BEHALF_OF_COMP_ID, tags::DELIVER_TO_COMP_ID),
    (tags::ON_BEHALF_OF_SUB_ID, tags::DELIVER_TO_SUB_ID),
    (tags::ON_BEHALF_OF_LOCATION_ID, tags::DELIVER_TO_LOCATION_ID),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: FieldMap,
    body: FieldMap,
    trailer: FieldMap,
    parse_errors: Vec<StructuralError>,
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl Message {
    pub fn new() -> Self {
        Self {
            header: FieldMap::with_order(FieldOrder::new(tags::HEADER_ORDER)),
            body: FieldMap::new(),
            trailer: FieldMap::with_order(FieldOrder::new(tags::TRAILER_ORDER)),
            parse_errors: Vec::new(),
        }
    }

    /// Empty message with BeginString and MsgType set.
    pub fn with_type(begin_string: &str, msg_type: &str) -> Self {
        let mut message = Self::new();
        message.header.set_str(tags::BEGIN_STRING, begin_string);
        message.header.set_str(tags::MSG_TYPE, msg_type);
        message
    }

    pub fn header(&self) -> &FieldMap {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut FieldMap {
        &mut self.header
    }

    pub fn body(&self) -> &FieldMap {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut FieldMap {
        &mut self.body
    }

    pub fn trailer(&self) -> &FieldMap {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut FieldMap {
        &mut self.trailer
    }

    /// Set a field in the section its tag belongs to.
    pub fn set_field(&mut self, field: Field) {
        self.section_mut(field.tag()).set_field(field);
    }

    /// Look a field up in the section its tag belongs to.
    pub fn get_field(&self, tag: Tag) -> Result<&Field, FieldError> {
        self.section(tag).get_field(tag)
    }

    pub fn remove_field(&mut self, tag: Tag) -> bool {
        self.section_mut(tag).remove_field(tag)
    }

    pub fn is_set(&self, tag: Tag) -> bool {
        self.section(tag).is_set(tag)
    }

    fn section(&self, tag: Tag) -> &FieldMap {
        if tags::is_header_tag(tag) {
            &self.header
        } else if tags::is_trailer_tag(tag) {
            &self.trailer
        } else {
            &self.body
        }
    }

    fn section_mut(&mut self, tag: Tag) -> &mut FieldMap {
        if tags::is_header_tag(tag) {
            &mut self.header
        } else if tags::is_trailer_tag(tag) {
            &mut self.trailer
        } else {
            &mut self.body
        }
    }

    /// Clear all three sections and the parse errors.
    pub fn clear(&mut self) {
        self.header.clear();
        self.body.clear();
        self.trailer.clear();
        self.parse_errors.clear();
    }

    // -- parse errors -------------------------------------------------------

    /// The first structural error, in wire order.
    pub fn parse_error(&self) -> Option<&StructuralError> {
        self.parse_errors.first()
    }

    /// Every structural error the parser recorded, in wire order.
    pub fn parse_errors(&self) -> &[StructuralError] {
        &self.parse_errors
    }

    pub fn record_parse_error(&mut self, error: StructuralError) {
        self.parse_errors.push(error);
    }

    pub fn take_parse_errors(&mut self) -> Vec<StructuralError> {
        std::mem::take(&mut self.parse_errors)
    }

    // -- header accessors ---------------------------------------------------

    pub fn begin_string(&self) -> Result<&str, FieldError> {
        self.header.get_str(tags::BEGIN_STRING)
    }

    pub fn msg_type(&self) -> Result<&str, FieldError> {
        self.header.get_str(tags::MSG_TYPE)
    }

    pub fn seq_num(&self) -> Result<u64, FieldError> {
        self.header.get_uint(tags::MSG_SEQ_NUM)
    }

    pub fn sending_time(&self) -> Result<UtcTimestamp, FieldError> {
        self.header.get_utc_timestamp(tags::SENDING_TIME)
    }

    /// Whether MsgType is a session-level type. False when MsgType is missing.
    pub fn is_admin(&self) -> bool {
        self.msg_type().map_or(false, msg_type::is_admin)
    }

    pub fn is_app(&self) -> bool {
        self.msg_type().map_or(false, |t| !msg_type::is_admin(t))
    }

    /// PossDupFlag=Y. A malformed flag counts as not set.
    pub fn poss_dup(&self) -> bool {
        self.header.get_bool(tags::POSS_DUP_FLAG).unwrap_or(false)
    }

    /// Fill this message's routing header as a reply to `incoming`.
    ///
    /// BeginString is copied; Sender/Target CompID, SubID and LocationID and
    /// the OnBehalfOf/DeliverTo pairs are swapped. Absent counterparts are
    /// removed so no stale routing survives.
    pub fn reverse_route(&mut self, incoming: &FieldMap) {
        if let Ok(begin_string) = incoming.get_field(tags::BEGIN_STRING) {
            self.header.set_field(begin_string.clone());
        }
        for &(ours, theirs) in ROUTE_PAIRS {
            for (to, from) in [(ours, theirs), (theirs, ours)] {
                match incoming.get_bytes(from) {
                    Ok(value) if !value.is_empty() => self.header.set_field(Field::new(to, value)),
                    _ => {
                        self.header.remove_field(to);
                    }
                }
            }
        }
    }

    /// Append header, body and trailer fields as currently set.
    pub fn write_fields(&self, out: &mut Vec<u8>) {
        self.header.write_to(out);
        self.body.write_to(out);
        self.trailer.write_to(out);
    }
}

/// Wire form with `|` in place of SOH
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = Vec::new();
        self.write_fields(&mut out);
        for byte in out.iter_mut() {
            if *byte == crate::SOH {
                *byte = b'|';
            }
        }
        f.write_str(&String::from_utf8_lossy(&out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Group;

    fn order() -> Message {
        let mut message = Message::with_type("FIX.4.4", msg_type::NEW_ORDER_SINGLE);
        message.header_mut().set_str(tags::SENDER_COMP_ID, "BANZAI");
        message.header_mut().set_str(tags::TARGET_COMP_ID, "EXEC");
        message.header_mut().set_uint(tags::MSG_SEQ_NUM, 7);
        message.body_mut().set_str(11, "ORD-1");
        message.body_mut().set_str(55, "MSFT");
        message
    }

    #[test]
    fn test_set_field_routes_by_section() {
        let mut message = Message::new();
        message.set_field(Field::new(tags::MSG_SEQ_NUM, "3"));
        message.set_field(Field::new(55, "IBM"));
        message.set_field(Field::new(tags::CHECK_SUM, "000"));
        assert!(message.header().is_set(tags::MSG_SEQ_NUM));
        assert!(message.body().is_set(55));
        assert!(message.trailer().is_set(tags::CHECK_SUM));
        assert_eq!(message.seq_num().unwrap(), 3);
    }

    #[test]
    fn test_header_leads_with_canonical_tags() {
        let mut message = Message::new();
        message.header_mut().set_str(tags::SENDER_COMP_ID, "A");
        message.header_mut().set_str(tags::MSG_TYPE, "0");
        message.header_mut().set_str(tags::BEGIN_STRING, "FIX.4.2");
        assert_eq!(message.to_string(), "8=FIX.4.2|35=0|49=A|");
    }

    #[test]
    fn test_clone_is_independent() {
        let mut message = order();
        let mut parties = Group::new(453, 448);
        let mut party = FieldMap::new();
        party.set_str(448, "AAA");
        parties.add(party).unwrap();
        message.body_mut().set_group(parties);

        let mut copy = message.clone();
        assert_eq!(copy.to_string(), message.to_string());

        copy.body_mut()
            .get_group_mut(453)
            .unwrap()
            .get_mut(0)
            .unwrap()
            .set_str(448, "BBB");
        copy.body_mut().set_str(55, "IBM");

        assert_eq!(message.body().get_str(55).unwrap(), "MSFT");
        let party = message.body().get_group(453).unwrap().get(0).unwrap();
        assert_eq!(party.get_str(448).unwrap(), "AAA");
    }

    #[test]
    fn test_reverse_route() {
        let incoming = order();
        let mut reply = Message::with_type("FIX.4.2", msg_type::EXECUTION_REPORT);
        reply.header_mut().set_str(tags::DELIVER_TO_COMP_ID, "STALE");
        reply.reverse_route(incoming.header());

        assert_eq!(reply.begin_string().unwrap(), "FIX.4.4");
        assert_eq!(reply.header().get_str(tags::SENDER_COMP_ID).unwrap(), "EXEC");
        assert_eq!(reply.header().get_str(tags::TARGET_COMP_ID).unwrap(), "BANZAI");
        assert!(!reply.header().is_set(tags::DELIVER_TO_COMP_ID));
    }

    #[test]
    fn test_parse_errors_kept_in_order() {
        let mut message = Message::new();
        message.record_parse_error(StructuralError::TagOutOfOrder { tag: 34 });
        message.record_parse_error(StructuralError::DuplicateTag { tag: 55 });
        assert_eq!(message.parse_error(), Some(&StructuralError::TagOutOfOrder { tag: 34 }));
        assert_eq!(message.parse_errors().len(), 2);

        let taken = message.take_parse_errors();
        assert_eq!(taken[1], StructuralError::DuplicateTag { tag: 55 });
        assert!(message.parse_error().is_none());
    }

    #[test]
    fn test_admin_classification() {
        assert!(!order().is_admin());
        assert!(Message::with_type("FIX.4.4", msg_type::HEARTBEAT).is_admin());
        assert!(!Message::new().is_admin());
        assert!(!Message::new().is_app());
    }
}
