//! # FIX Message Parser
//!
//! ## Purpose
//!
//! Turns one complete raw message into a [`Message`]. Framing problems
//! (checksum, body length, garbled fields) fail the parse with a
//! [`FramingError`]. Structural problems (a field in the wrong section, a
//! malformed repeating group, a repeated tag) are recorded on the returned
//! message, which stays usable so the session can still read MsgSeqNum.
//!
//! ## Algorithm
//!
//! 1. Verify BodyLength and CheckSum against the raw span (optional).
//! 2. Tokenize `tag=value<SOH>` pairs. A Length field paired with a data
//!    field makes the tokenizer read exactly that many bytes for the data
//!    value, so embedded SOH bytes stay literal.
//! 3. Classify fields: header tags, then body, then trailer. A header tag
//!    after the header, or a body tag after the trailer started, is
//!    [`StructuralError::TagOutOfOrder`]; the field is still stored in the
//!    section it belongs to.
//! 4. Count fields known to the dictionary start repeating groups. Group
//!    parsing continues while fields are group members; a repeated
//!    delimiter starts the next instance.
//!
//! Without a dictionary no groups are detected and any repeated tag is
//! [`StructuralError::DuplicateTag`] (the first value is kept).

use crate::dictionary::{DataDictionary, GroupDef};
use crate::error::{FramingError, FramingResult};
use crate::validation::checksum;
use fix_types::{tags, Field, FieldMap, Group, Message, StructuralError, Tag, SOH};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Parser behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Verify BodyLength and CheckSum before parsing
    pub validate_length_and_checksum: bool,
    /// Record group members that appear before a member declared ahead of
    /// them
    pub check_unordered_group_fields: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            validate_length_and_checksum: true,
            check_unordered_group_fields: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RawField<'a> {
    tag: Tag,
    value: &'a [u8],
}

impl RawField<'_> {
    fn to_field(self) -> Field {
        Field::new(self.tag, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Body,
    Trailer,
}

fn note(errors: &mut Vec<StructuralError>, error: StructuralError) {
    debug!(tag = error.tag(), error = %error, "Structural error while parsing");
    errors.push(error);
}

fn parse_usize(value: &[u8]) -> Option<usize> {
    if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(value).ok()?.parse().ok()
}

/// Dictionary-aware message parser
#[derive(Debug, Clone, Default)]
pub struct MessageParser {
    options: ParseOptions,
    transport: Option<Arc<DataDictionary>>,
    application: Option<Arc<DataDictionary>>,
}

impl MessageParser {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            transport: None,
            application: None,
        }
    }

    /// Use one dictionary for header, trailer and body.
    pub fn with_dictionary(self, dictionary: Arc<DataDictionary>) -> Self {
        self.with_dictionaries(Arc::clone(&dictionary), dictionary)
    }

    /// Header and trailer from `transport`, body from `application`.
    pub fn with_dictionaries(
        mut self,
        transport: Arc<DataDictionary>,
        application: Arc<DataDictionary>,
    ) -> Self {
        self.transport = Some(transport);
        self.application = Some(application);
        self
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn transport_dictionary(&self) -> Option<&Arc<DataDictionary>> {
        self.transport.as_ref()
    }

    pub fn application_dictionary(&self) -> Option<&Arc<DataDictionary>> {
        self.application.as_ref()
    }

    fn data_tag_for(&self, length_tag: Tag) -> Option<Tag> {
        self.application
            .as_ref()
            .and_then(|dd| dd.data_tag_for(length_tag))
            .or_else(|| self.transport.as_ref().and_then(|dd| dd.data_tag_for(length_tag)))
            .or_else(|| tags::standard_data_tag(length_tag))
    }

    fn is_header(&self, tag: Tag) -> bool {
        match &self.transport {
            Some(dd) => dd.is_header_field(tag),
            None => tags::is_header_tag(tag),
        }
    }

    fn is_trailer(&self, tag: Tag) -> bool {
        match &self.transport {
            Some(dd) => dd.is_trailer_field(tag),
            None => tags::is_trailer_tag(tag),
        }
    }

    fn tokenize<'a>(&self, raw: &'a [u8]) -> FramingResult<Vec<RawField<'a>>> {
        let mut fields = Vec::with_capacity(32);
        let mut pos = 0;
        let mut pending_data: Option<(Tag, usize)> = None;

        while pos < raw.len() {
            let eq = raw[pos..]
                .iter()
                .position(|b| *b == b'=')
                .map(|p| pos + p)
                .ok_or_else(|| FramingError::garbled(pos, "missing '=' after tag"))?;
            let tag = parse_usize(&raw[pos..eq])
                .and_then(|t| Tag::try_from(t).ok())
                .filter(|t| *t > 0)
                .ok_or_else(|| FramingError::garbled(pos, "invalid tag number"))?;
            let value_start = eq + 1;

            let value_end = match pending_data.take().filter(|(data_tag, _)| *data_tag == tag) {
                Some((_, declared)) => {
                    let truncated = || FramingError::TruncatedData {
                        tag,
                        offset: value_start,
                        declared,
                        available: raw.len().saturating_sub(value_start + 1),
                    };
                    let end = value_start.checked_add(declared).ok_or_else(truncated)?;
                    if end >= raw.len() {
                        return Err(truncated());
                    }
                    if raw[end] != SOH {
                        return Err(FramingError::garbled(end, "data field longer than its declared length"));
                    }
                    end
                }
                None => raw[value_start..]
                    .iter()
                    .position(|b| *b == SOH)
                    .map(|p| value_start + p)
                    .ok_or_else(|| FramingError::garbled(pos, "field not terminated by SOH"))?,
            };

            let value = &raw[value_start..value_end];
            if let Some(data_tag) = self.data_tag_for(tag) {
                if let Some(declared) = parse_usize(value) {
                    pending_data = Some((data_tag, declared));
                }
            }
            fields.push(RawField { tag, value });
            pos = value_end + 1;
        }
        Ok(fields)
    }

    /// Parse one complete raw message.
    pub fn parse(&self, raw: &[u8]) -> FramingResult<Message> {
        if raw.is_empty() {
            return Err(FramingError::Empty);
        }
        if self.options.validate_length_and_checksum {
            checksum::verify_integrity(raw)?;
        }
        let fields = self.tokenize(raw)?;
        match fields.first() {
            Some(f) if f.tag == tags::BEGIN_STRING => {}
            _ => return Err(FramingError::MissingBeginString),
        }
        match fields.get(1) {
            Some(f) if f.tag == tags::BODY_LENGTH => {}
            _ => return Err(FramingError::MissingBodyLength),
        }

        let mut message = Message::new();
        let mut errors = Vec::new();
        if let Some(third) = fields.get(2).filter(|f| f.tag != tags::MSG_TYPE) {
            note(&mut errors, StructuralError::TagOutOfOrder { tag: third.tag });
        }

        let mut msg_type: Option<String> = None;
        let mut section = Section::Header;
        let mut cursor = 0;
        while cursor < fields.len() {
            let field = fields[cursor];
            cursor += 1;
            if field.value.is_empty() {
                note(&mut errors, StructuralError::EmptyValue { tag: field.tag });
            }

            if self.is_header(field.tag) {
                if section != Section::Header {
                    note(&mut errors, StructuralError::TagOutOfOrder { tag: field.tag });
                }
                if field.tag == tags::MSG_TYPE && msg_type.is_none() {
                    msg_type = Some(String::from_utf8_lossy(field.value).into_owned());
                }
                let group_def = self
                    .transport
                    .as_ref()
                    .and_then(|dd| dd.header().group(field.tag));
                self.store(
                    message.header_mut(),
                    &fields,
                    &mut cursor,
                    field,
                    group_def,
                    &mut errors,
                );
            } else if self.is_trailer(field.tag) {
                section = Section::Trailer;
                self.store(message.trailer_mut(), &fields, &mut cursor, field, None, &mut errors);
            } else {
                if section == Section::Trailer {
                    note(&mut errors, StructuralError::TagOutOfOrder { tag: field.tag });
                } else {
                    section = Section::Body;
                }
                let group_def = match (&self.application, &msg_type) {
                    (Some(dd), Some(msg_type)) => dd.body_group(msg_type, field.tag),
                    _ => None,
                };
                self.store(
                    message.body_mut(),
                    &fields,
                    &mut cursor,
                    field,
                    group_def,
                    &mut errors,
                );
            }
        }

        for error in errors {
            message.record_parse_error(error);
        }
        Ok(message)
    }

    /// Store a field, or parse a group when `group_def` is set.
    fn store(
        &self,
        map: &mut FieldMap,
        fields: &[RawField<'_>],
        cursor: &mut usize,
        field: RawField<'_>,
        group_def: Option<&GroupDef>,
        errors: &mut Vec<StructuralError>,
    ) {
        if map.is_set(field.tag) {
            note(errors, StructuralError::DuplicateTag { tag: field.tag });
            return;
        }
        match group_def {
            Some(def) => {
                let group = self.parse_group(fields, cursor, field, def, errors);
                map.set_group(group);
            }
            None => map.set_field(field.to_field()),
        }
    }

    fn parse_group(
        &self,
        fields: &[RawField<'_>],
        cursor: &mut usize,
        count: RawField<'_>,
        def: &GroupDef,
        errors: &mut Vec<StructuralError>,
    ) -> Group {
        let mut group = Group::with_member_order(def.count_tag, def.delimiter, def.fields.members());
        if let Some((parent, _)) = def.path.rsplit_once('/') {
            group = group.with_parent(parent);
        }
        let Some(declared) = parse_usize(count.value) else {
            note(errors, StructuralError::InvalidNumInGroup { tag: count.tag });
            return group;
        };
        group.set_declared_count(declared);
        if declared == 0 {
            // Members after an empty group belong to the enclosing map.
            let actual = self.count_instances(fields, *cursor, def);
            if actual > 0 {
                note(
                    errors,
                    StructuralError::IncorrectNumInGroupCount {
                        count_tag: def.count_tag,
                        declared,
                        actual,
                    },
                );
            }
            return group;
        }

        let mut current: Option<FieldMap> = None;
        let mut highest_position = 0;
        while let Some(&field) = fields.get(*cursor) {
            let Some(position) = def.fields.position(field.tag) else {
                break;
            };

            if field.tag == def.delimiter {
                if let Some(instance) = current.take() {
                    self.push_instance(&mut group, instance, errors);
                }
                let mut instance = group.new_instance();
                instance.set_field(field.to_field());
                current = Some(instance);
                highest_position = position;
                *cursor += 1;
                continue;
            }

            let Some(instance) = current.as_mut() else {
                note(
                    errors,
                    StructuralError::GroupDelimiterMismatch {
                        count_tag: def.count_tag,
                        delimiter: def.delimiter,
                        found: field.tag,
                    },
                );
                break;
            };
            if instance.is_set(field.tag) {
                note(
                    errors,
                    StructuralError::GroupDelimiterMismatch {
                        count_tag: def.count_tag,
                        delimiter: def.delimiter,
                        found: field.tag,
                    },
                );
                break;
            }
            if position < highest_position {
                if self.options.check_unordered_group_fields {
                    note(
                        errors,
                        StructuralError::GroupFieldOutOfOrder {
                            count_tag: def.count_tag,
                            tag: field.tag,
                        },
                    );
                }
            } else {
                highest_position = position;
            }
            if field.value.is_empty() {
                note(errors, StructuralError::EmptyValue { tag: field.tag });
            }

            *cursor += 1;
            match def.fields.group(field.tag) {
                Some(nested) => {
                    let nested = self.parse_group(fields, cursor, field, nested, errors);
                    instance.set_group(nested);
                }
                None => instance.set_field(field.to_field()),
            }
        }
        if let Some(instance) = current.take() {
            self.push_instance(&mut group, instance, errors);
        }

        if group.len() != declared {
            note(
                errors,
                StructuralError::IncorrectNumInGroupCount {
                    count_tag: def.count_tag,
                    declared,
                    actual: group.len(),
                },
            );
        }
        group
    }

    /// Delimiters among the group members starting at `cursor`.
    fn count_instances(&self, fields: &[RawField<'_>], cursor: usize, def: &GroupDef) -> usize {
        fields[cursor.min(fields.len())..]
            .iter()
            .take_while(|field| def.fields.position(field.tag).is_some())
            .filter(|field| field.tag == def.delimiter)
            .count()
    }

    fn push_instance(&self, group: &mut Group, instance: FieldMap, errors: &mut Vec<StructuralError>) {
        let count_tag = group.count_tag();
        let delimiter = group.delimiter();
        if group.add(instance).is_err() {
            note(
                errors,
                StructuralError::GroupDelimiterMismatch {
                    count_tag,
                    delimiter,
                    found: delimiter,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{DictionaryBuilder, FieldDef, FieldType, MessageCategory, MessageDef};

    fn wire(text: &str) -> Vec<u8> {
        text.replace('|', "\x01").into_bytes()
    }

    fn unchecked() -> MessageParser {
        MessageParser::new(ParseOptions {
            validate_length_and_checksum: false,
            ..ParseOptions::default()
        })
    }

    fn parties_dictionary() -> Arc<DataDictionary> {
        Arc::new(
            DictionaryBuilder::new("FIX.4.4")
                .standard_header_trailer()
                .field(FieldDef::new(11, "ClOrdID", FieldType::String))
                .field(FieldDef::new(453, "NoPartyIDs", FieldType::NumInGroup))
                .field(FieldDef::new(448, "PartyID", FieldType::String))
                .field(FieldDef::new(447, "PartyIDSource", FieldType::Char))
                .field(FieldDef::new(452, "PartyRole", FieldType::Int))
                .message(
                    MessageDef::new("D", "NewOrderSingle", MessageCategory::App)
                        .field(11, true)
                        .group(
                            crate::dictionary::GroupDef::new(453, 448)
                                .field(447, false)
                                .field(452, false),
                            false,
                        ),
                )
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_header_tag_in_body_is_out_of_order() {
        let message = unchecked()
            .parse(&wire("8=FIX.4.4|9=0|35=D|11=A|34=5|10=000|"))
            .unwrap();
        assert_eq!(message.parse_error(), Some(&StructuralError::TagOutOfOrder { tag: 34 }));
        // still readable for sequencing
        assert_eq!(message.seq_num().unwrap(), 5);
    }

    #[test]
    fn test_msg_type_must_be_third() {
        let message = unchecked()
            .parse(&wire("8=FIX.4.4|9=0|49=A|35=0|10=000|"))
            .unwrap();
        assert_eq!(message.parse_error(), Some(&StructuralError::TagOutOfOrder { tag: 49 }));
    }

    #[test]
    fn test_missing_leading_fields_is_framing_error() {
        assert_eq!(
            unchecked().parse(&wire("35=0|8=FIX.4.4|10=000|")),
            Err(FramingError::MissingBeginString)
        );
        assert_eq!(
            unchecked().parse(&wire("8=FIX.4.4|35=0|10=000|")),
            Err(FramingError::MissingBodyLength)
        );
    }

    #[test]
    fn test_raw_data_keeps_embedded_soh() {
        let message = unchecked()
            .parse(&wire("8=FIX.4.4|9=0|35=B|95=7|96=ab|cd|e|10=000|"))
            .unwrap();
        assert_eq!(message.parse_error(), None);
        assert_eq!(message.body().get_bytes(96).unwrap(), b"ab\x01cd\x01e");
    }

    #[test]
    fn test_short_raw_data_is_framing_error() {
        let err = unchecked()
            .parse(&wire("8=FIX.4.4|9=0|35=B|95=40|96=ab|10=000|"))
            .unwrap_err();
        assert!(matches!(err, FramingError::TruncatedData { tag: 96, declared: 40, .. }));
    }

    #[test]
    fn test_huge_raw_data_length_is_framing_error() {
        let err = unchecked()
            .parse(&wire("8=FIX.4.4|9=0|35=B|95=18446744073709551615|96=ab|10=000|"))
            .unwrap_err();
        assert!(matches!(err, FramingError::TruncatedData { tag: 96, .. }));
    }

    #[test]
    fn test_duplicate_without_dictionary() {
        let message = unchecked()
            .parse(&wire("8=FIX.4.4|9=0|35=D|448=A|448=B|10=000|"))
            .unwrap();
        assert_eq!(message.parse_error(), Some(&StructuralError::DuplicateTag { tag: 448 }));
        assert_eq!(message.body().get_str(448).unwrap(), "A");
    }

    #[test]
    fn test_group_count_mismatch() {
        let parser = unchecked().with_dictionary(parties_dictionary());
        let message = parser
            .parse(&wire("8=FIX.4.4|9=0|35=D|11=X|453=3|448=A|448=B|10=000|"))
            .unwrap();
        assert_eq!(
            message.parse_error(),
            Some(&StructuralError::IncorrectNumInGroupCount { count_tag: 453, declared: 3, actual: 2 })
        );
        assert_eq!(message.body().get_group(453).unwrap().declared_count(), Some(3));
    }

    #[test]
    fn test_empty_group_leaves_members_to_body() {
        let parser = unchecked().with_dictionary(parties_dictionary());
        let message = parser
            .parse(&wire("8=FIX.4.4|9=0|35=D|11=X|453=0|448=A|10=000|"))
            .unwrap();
        assert_eq!(
            message.parse_error(),
            Some(&StructuralError::IncorrectNumInGroupCount { count_tag: 453, declared: 0, actual: 1 })
        );
        assert!(message.body().get_group(453).unwrap().is_empty());
        assert_eq!(message.body().get_str(448).unwrap(), "A");
    }

    #[test]
    fn test_every_structural_error_is_kept() {
        let parser = unchecked().with_dictionary(parties_dictionary());
        let message = parser
            .parse(&wire("8=FIX.4.4|9=0|35=D|11=X|34=2|453=3|448=A|448=B|10=000|"))
            .unwrap();
        assert_eq!(
            message.parse_errors(),
            [
                StructuralError::TagOutOfOrder { tag: 34 },
                StructuralError::IncorrectNumInGroupCount { count_tag: 453, declared: 3, actual: 2 },
            ]
        );
    }

    #[test]
    fn test_group_must_start_with_delimiter() {
        let parser = unchecked().with_dictionary(parties_dictionary());
        let message = parser
            .parse(&wire("8=FIX.4.4|9=0|35=D|11=X|453=1|447=D|448=A|10=000|"))
            .unwrap();
        assert_eq!(
            message.parse_error(),
            Some(&StructuralError::GroupDelimiterMismatch { count_tag: 453, delimiter: 448, found: 447 })
        );
    }

    #[test]
    fn test_unordered_group_fields_respect_option() {
        let raw = wire("8=FIX.4.4|9=0|35=D|11=X|453=1|448=A|452=3|447=D|10=000|");
        let strict = unchecked().with_dictionary(parties_dictionary());
        assert_eq!(
            strict.parse(&raw).unwrap().parse_error(),
            Some(&StructuralError::GroupFieldOutOfOrder { count_tag: 453, tag: 447 })
        );

        let lenient = MessageParser::new(ParseOptions {
            validate_length_and_checksum: false,
            check_unordered_group_fields: false,
        })
        .with_dictionary(parties_dictionary());
        let message = lenient.parse(&raw).unwrap();
        assert_eq!(message.parse_error(), None);
        assert_eq!(message.body().get_group(453).unwrap().len(), 1);
    }

    #[test]
    fn test_garbled_tag() {
        let err = unchecked().parse(&wire("8=FIX.4.4|9=0|3x=0|10=000|")).unwrap_err();
        assert!(matches!(err, FramingError::Garbled { .. }));
    }
}
