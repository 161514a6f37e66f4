//! # Dictionary Validator
//!
//! Checks a parsed [`Message`] against its transport and application
//! dictionaries. The first failure wins and comes back as a
//! [`MessageRejection`] carrying the SessionRejectReason and offending tag,
//! ready to be turned into a session Reject.
//!
//! Check order:
//!
//! 1. BeginString matches the transport dictionary (skipped for body-only
//!    validation)
//! 2. MsgType present and defined
//! 3. Structural errors recorded by the parser: the first one policy does
//!    not tolerate
//! 4. Every field: has a value, is defined, belongs where it appears, has a
//!    well-formed value, holds a legal enumerated value
//! 5. Required fields of header, body, trailer and each group instance

use super::config::ValidationOptions;
use super::reject::{MessageRejection, SessionRejectReason, ValidationError};
use crate::dictionary::{DataDictionary, FieldSet};
use fix_types::{tags, Entry, Field, FieldMap, Message, StructuralError, Tag};
use tracing::debug;

type Rejected<T = ()> = Result<T, MessageRejection>;

#[derive(Debug, Clone, Default)]
pub struct Validator {
    options: ValidationOptions,
}

impl Validator {
    pub fn new(options: ValidationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Validate `message`. With `body_only`, header and trailer are not
    /// checked and the BeginString is not compared.
    pub fn validate(
        &self,
        message: &Message,
        transport: &DataDictionary,
        application: &DataDictionary,
        body_only: bool,
    ) -> Result<(), ValidationError> {
        if !body_only {
            self.check_version(message, transport)?;
        }
        let msg_type = check_msg_type(message, application)?;

        for error in message.parse_errors() {
            if let Some(rejection) = self.structural_rejection(error) {
                debug!(msg_type, %error, "Structural error rejected");
                return Err(rejection.into());
            }
        }

        let body_layout = application.message(msg_type).ok().map(|def| &def.fields);
        if !body_only {
            self.check_map(message.header(), transport, layout(transport.header()))?;
            self.check_map(message.trailer(), transport, layout(transport.trailer()))?;
        }
        self.check_map(message.body(), application, body_layout)?;

        if !body_only {
            check_required(message.header(), transport.header())?;
        }
        if let Some(layout) = body_layout {
            check_required(message.body(), layout)?;
        }
        if !body_only {
            check_required(message.trailer(), transport.trailer())?;
        }
        Ok(())
    }

    fn check_version(&self, message: &Message, transport: &DataDictionary) -> Result<(), ValidationError> {
        match message.begin_string() {
            Ok(begin_string) if begin_string == transport.begin_string() => Ok(()),
            other => Err(ValidationError::UnsupportedVersion {
                expected: transport.begin_string().to_string(),
                actual: other.ok().map(str::to_owned),
            }),
        }
    }

    /// Rejection for a parser-recorded error, or `None` when policy
    /// tolerates it.
    fn structural_rejection(&self, error: &StructuralError) -> Option<MessageRejection> {
        let tolerated = match error {
            StructuralError::TagOutOfOrder { .. } => !self.options.check_fields_out_of_order,
            StructuralError::GroupFieldOutOfOrder { .. } => !self.options.check_unordered_group_fields,
            StructuralError::EmptyValue { .. } => !self.options.check_fields_have_values,
            _ => false,
        };
        (!tolerated).then(|| MessageRejection::from_structural(error))
    }

    fn check_map(&self, map: &FieldMap, dictionary: &DataDictionary, layout: Option<&FieldSet>) -> Rejected {
        for entry in map.iter() {
            match entry {
                Entry::Field(field) => self.check_field(field, dictionary, layout)?,
                Entry::Group(group) => {
                    let count_tag = group.count_tag();
                    if self.check_definition(count_tag, dictionary, layout)? {
                        let nested = layout.and_then(|l| l.group(count_tag)).map(|g| &g.fields);
                        for instance in group.instances() {
                            self.check_map(instance, dictionary, nested)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Definition and membership of `tag`. `Ok(false)` means the tag is
    /// exempt from further checks.
    fn check_definition(&self, tag: Tag, dictionary: &DataDictionary, layout: Option<&FieldSet>) -> Rejected<bool> {
        let options = &self.options;
        if tags::is_user_defined(tag) && !options.check_user_defined_fields {
            return Ok(false);
        }
        if !dictionary.is_field(tag) {
            if options.allow_unknown_message_fields {
                return Ok(false);
            }
            return Err(MessageRejection::for_tag(SessionRejectReason::InvalidTagNumber, tag));
        }
        if let Some(layout) = layout {
            if !layout.contains(tag) && !options.allow_unknown_message_fields {
                return Err(MessageRejection::for_tag(
                    SessionRejectReason::TagNotDefinedForThisMessageType,
                    tag,
                ));
            }
        }
        Ok(true)
    }

    fn check_field(&self, field: &Field, dictionary: &DataDictionary, layout: Option<&FieldSet>) -> Rejected {
        let tag = field.tag();
        if field.value().is_empty() {
            if self.options.check_fields_have_values {
                return Err(MessageRejection::for_tag(SessionRejectReason::TagSpecifiedWithoutAValue, tag));
            }
            return Ok(());
        }
        if !self.check_definition(tag, dictionary, layout)? {
            return Ok(());
        }
        let Some(def) = dictionary.field(tag) else {
            return Ok(());
        };
        if let Err(error) = def.field_type.check_format(field.value()) {
            return Err(
                MessageRejection::for_tag(SessionRejectReason::IncorrectDataFormatForValue, tag)
                    .with_text(format!("Incorrect data format for value, field={tag}: {error}")),
            );
        }
        if self.options.check_enum_values && !def.is_legal_value(field.value()) {
            return Err(MessageRejection::for_tag(SessionRejectReason::ValueIsIncorrect, tag));
        }
        Ok(())
    }
}

fn layout(set: &FieldSet) -> Option<&FieldSet> {
    (!set.members().is_empty()).then_some(set)
}

fn check_msg_type<'m>(message: &'m Message, application: &DataDictionary) -> Result<&'m str, ValidationError> {
    let msg_type = message
        .msg_type()
        .map_err(|_| MessageRejection::for_tag(SessionRejectReason::RequiredTagMissing, tags::MSG_TYPE))?;
    if application.has_messages() && !application.is_msg_type(msg_type) {
        return Err(MessageRejection::for_tag(SessionRejectReason::InvalidMsgType, tags::MSG_TYPE).into());
    }
    Ok(msg_type)
}

/// First missing required tag in declared order, descending into every
/// present group instance.
fn check_required(map: &FieldMap, layout: &FieldSet) -> Rejected {
    if let Some(tag) = layout.required().iter().copied().find(|tag| !map.is_set(*tag)) {
        return Err(MessageRejection::for_tag(SessionRejectReason::RequiredTagMissing, tag));
    }
    for def in layout.groups() {
        if let Ok(group) = map.get_group(def.count_tag) {
            for instance in group.instances() {
                check_required(instance, &def.fields)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{DictionaryBuilder, FieldDef, FieldType, GroupDef, MessageCategory, MessageDef};
    use crate::parser::{MessageParser, ParseOptions};
    use crate::builder::encode;
    use fix_types::tags::msg_type;
    use std::sync::Arc;

    fn dictionary() -> DataDictionary {
        DictionaryBuilder::new("FIX.4.4")
            .standard_header_trailer()
            .session_messages()
            .field(FieldDef::new(11, "ClOrdID", FieldType::String))
            .field(FieldDef::new(55, "Symbol", FieldType::String))
            .field(FieldDef::new(54, "Side", FieldType::Char).with_values(["1", "2"]))
            .field(FieldDef::new(38, "OrderQty", FieldType::Qty))
            .field(FieldDef::new(453, "NoPartyIDs", FieldType::NumInGroup))
            .field(FieldDef::new(448, "PartyID", FieldType::String))
            .field(FieldDef::new(447, "PartyIDSource", FieldType::Char))
            .field(FieldDef::new(452, "PartyRole", FieldType::Int))
            .message(
                MessageDef::new(msg_type::NEW_ORDER_SINGLE, "NewOrderSingle", MessageCategory::App)
                    .field(11, true)
                    .group(GroupDef::new(453, 448).field(447, false).field(452, true), false)
                    .field(55, true)
                    .field(54, true)
                    .field(38, false),
            )
            .build()
            .unwrap()
    }

    fn order() -> Message {
        let mut message = Message::with_type("FIX.4.4", msg_type::NEW_ORDER_SINGLE);
        let header = message.header_mut();
        header.set_str(tags::SENDER_COMP_ID, "A");
        header.set_str(tags::TARGET_COMP_ID, "B");
        header.set_uint(tags::MSG_SEQ_NUM, 2);
        header.set_str(tags::SENDING_TIME, "20240102-03:04:05.678");
        let body = message.body_mut();
        body.set_str(11, "ORD1");
        body.set_str(55, "IBM");
        body.set_str(54, "1");
        body.set_str(38, "100");
        message
    }

    fn parse(message: &Message, dd: &Arc<DataDictionary>) -> Message {
        let raw = encode(message).unwrap();
        MessageParser::new(ParseOptions::default())
            .with_dictionary(dd.clone())
            .parse(&raw)
            .unwrap()
    }

    fn rejection(result: Result<(), ValidationError>) -> MessageRejection {
        match result {
            Err(ValidationError::Rejected(rejection)) => rejection,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_order() {
        let dd = Arc::new(dictionary());
        let message = parse(&order(), &dd);
        Validator::default().validate(&message, &dd, &dd, false).unwrap();
    }

    #[test]
    fn test_missing_required_field() {
        let dd = Arc::new(dictionary());
        let mut message = order();
        message.body_mut().remove_field(55);
        let message = parse(&message, &dd);
        let rejection = rejection(Validator::default().validate(&message, &dd, &dd, false));
        assert_eq!(rejection.reason, SessionRejectReason::RequiredTagMissing);
        assert_eq!(rejection.tag, Some(55));
    }

    #[test]
    fn test_illegal_enum_value() {
        let dd = Arc::new(dictionary());
        let mut message = order();
        message.body_mut().set_str(54, "9");
        let message = parse(&message, &dd);
        let rejection = rejection(Validator::default().validate(&message, &dd, &dd, false));
        assert_eq!(rejection.reason, SessionRejectReason::ValueIsIncorrect);

        let lenient = Validator::new(ValidationOptions {
            check_enum_values: false,
            ..ValidationOptions::default()
        });
        lenient.validate(&message, &dd, &dd, false).unwrap();
    }

    #[test]
    fn test_bad_format() {
        let dd = Arc::new(dictionary());
        let mut message = order();
        message.body_mut().set_str(38, "ten");
        let message = parse(&message, &dd);
        let rejection = rejection(Validator::default().validate(&message, &dd, &dd, false));
        assert_eq!(rejection.reason, SessionRejectReason::IncorrectDataFormatForValue);
        assert_eq!(rejection.tag, Some(38));
    }

    #[test]
    fn test_tag_not_in_message() {
        let dd = Arc::new(dictionary());
        let mut message = order();
        message.body_mut().set_str(tags::TEXT, "hello");
        let message = parse(&message, &dd);
        let rejection = rejection(Validator::default().validate(&message, &dd, &dd, false));
        assert_eq!(rejection.reason, SessionRejectReason::TagNotDefinedForThisMessageType);
        assert_eq!(rejection.tag, Some(tags::TEXT));
    }

    #[test]
    fn test_undefined_and_user_defined_tags() {
        let dd = Arc::new(dictionary());
        let mut message = order();
        message.body_mut().set_str(4999, "x");
        let parsed = parse(&message, &dd);
        let rejection = rejection(Validator::default().validate(&parsed, &dd, &dd, false));
        assert_eq!(rejection.reason, SessionRejectReason::InvalidTagNumber);

        let mut message = order();
        message.body_mut().set_str(5001, "x");
        let parsed = parse(&message, &dd);
        let relaxed = Validator::new(ValidationOptions {
            check_user_defined_fields: false,
            ..ValidationOptions::default()
        });
        relaxed.validate(&parsed, &dd, &dd, false).unwrap();
    }

    #[test]
    fn test_required_group_member() {
        let dd = Arc::new(dictionary());
        let mut message = order();
        let mut party = FieldMap::new();
        party.set_str(448, "BROKER");
        party.set_str(447, "D");
        message
            .body_mut()
            .add_group_instance(453, 448, party)
            .unwrap();
        let parsed = parse(&message, &dd);
        let rejection = rejection(Validator::default().validate(&parsed, &dd, &dd, false));
        assert_eq!(rejection.reason, SessionRejectReason::RequiredTagMissing);
        assert_eq!(rejection.tag, Some(452));
    }

    #[test]
    fn test_unknown_msg_type() {
        let dd = Arc::new(dictionary());
        let mut message = order();
        message.header_mut().set_str(tags::MSG_TYPE, "ZZ");
        let parsed = parse(&message, &dd);
        let rejection = rejection(Validator::default().validate(&parsed, &dd, &dd, false));
        assert_eq!(rejection.reason, SessionRejectReason::InvalidMsgType);
        assert_eq!(rejection.tag, Some(tags::MSG_TYPE));
    }

    #[test]
    fn test_version_mismatch_unless_body_only() {
        let dd = Arc::new(dictionary());
        let mut message = order();
        message.header_mut().set_str(tags::BEGIN_STRING, "FIX.4.2");
        let parsed = parse(&message, &dd);
        assert!(matches!(
            Validator::default().validate(&parsed, &dd, &dd, false),
            Err(ValidationError::UnsupportedVersion { .. })
        ));
        Validator::default().validate(&parsed, &dd, &dd, true).unwrap();
    }

    #[test]
    fn test_header_tag_in_body_is_out_of_order() {
        let dd = Arc::new(dictionary());
        let raw = b"8=FIX.4.4\x019=59\x0135=D\x0149=A\x0156=B\x0134=2\x0111=ORD1\x0152=20240102-03:04:05\x0155=X\x0154=1\x01";
        let mut raw = raw.to_vec();
        let sum = crate::validation::checksum::calculate_checksum(&raw);
        raw.extend_from_slice(b"10=");
        raw.extend_from_slice(&crate::validation::checksum::format_checksum(sum));
        raw.push(fix_types::SOH);
        let parser = MessageParser::new(ParseOptions {
            validate_length_and_checksum: false,
            ..ParseOptions::default()
        })
        .with_dictionary(dd.clone());
        let parsed = parser.parse(&raw).unwrap();
        let rejection = rejection(Validator::default().validate(&parsed, &dd, &dd, false));
        assert_eq!(rejection.reason, SessionRejectReason::TagSpecifiedOutOfRequiredOrder);
        assert_eq!(rejection.tag, Some(tags::SENDING_TIME));

        let relaxed = Validator::new(ValidationOptions {
            check_fields_out_of_order: false,
            ..ValidationOptions::default()
        });
        relaxed.validate(&parsed, &dd, &dd, false).unwrap();
    }

    #[test]
    fn test_tolerated_error_does_not_hide_group_count() {
        let dd = Arc::new(dictionary());
        let raw = "8=FIX.4.4|9=0|35=D|49=A|56=B|34=2|11=ORD1|52=20240102-03:04:05|\
                   453=3|448=P1|452=1|448=P2|452=1|55=X|54=1|10=000|"
            .replace('|', "\x01");
        let parser = MessageParser::new(ParseOptions {
            validate_length_and_checksum: false,
            ..ParseOptions::default()
        })
        .with_dictionary(dd.clone());
        let parsed = parser.parse(raw.as_bytes()).unwrap();
        assert_eq!(parsed.parse_errors().len(), 2);

        let relaxed = Validator::new(ValidationOptions {
            check_fields_out_of_order: false,
            ..ValidationOptions::default()
        });
        let rejection = rejection(relaxed.validate(&parsed, &dd, &dd, false));
        assert_eq!(rejection.reason, SessionRejectReason::IncorrectNumInGroupCount);
        assert_eq!(rejection.tag, Some(453));
    }
}
