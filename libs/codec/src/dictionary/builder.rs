//! Dictionary assembly

use super::{DataDictionary, DictionaryError, FieldDef, FieldSet, FieldType, GroupDef, MessageCategory, MessageDef};
use fix_types::tags::{self, msg_type};
use fix_types::Tag;
use std::collections::HashMap;

/// Builds a [`DataDictionary`] and checks that it is self-consistent
///
/// ```rust
/// use fix_codec::dictionary::{DictionaryBuilder, FieldDef, FieldType, GroupDef, MessageCategory, MessageDef};
///
/// let dd = DictionaryBuilder::new("FIX.4.4")
///     .standard_header_trailer()
///     .field(FieldDef::new(55, "Symbol", FieldType::String))
///     .field(FieldDef::new(453, "NoPartyIDs", FieldType::NumInGroup))
///     .field(FieldDef::new(448, "PartyID", FieldType::String))
///     .message(
///         MessageDef::new("D", "NewOrderSingle", MessageCategory::App)
///             .field(55, true)
///             .group(GroupDef::new(453, 448), false),
///     )
///     .build()
///     .unwrap();
/// assert!(dd.is_msg_type("D"));
/// ```
#[derive(Debug, Clone)]
pub struct DictionaryBuilder {
    begin_string: String,
    appl_ver_id: Option<String>,
    fields: HashMap<Tag, FieldDef>,
    header: FieldSet,
    trailer: FieldSet,
    messages: HashMap<String, MessageDef>,
}

impl DictionaryBuilder {
    pub fn new(begin_string: impl Into<String>) -> Self {
        Self {
            begin_string: begin_string.into(),
            appl_ver_id: None,
            fields: HashMap::new(),
            header: FieldSet::new(),
            trailer: FieldSet::new(),
            messages: HashMap::new(),
        }
    }

    /// ApplVerID (1128) served by this dictionary, for FIXT.1.1 application
    /// dictionaries.
    pub fn appl_ver_id(mut self, appl_ver_id: impl Into<String>) -> Self {
        self.appl_ver_id = Some(appl_ver_id.into());
        self
    }

    /// Define or redefine a field.
    pub fn field(mut self, def: FieldDef) -> Self {
        self.fields.insert(def.tag, def);
        self
    }

    pub fn header_field(mut self, tag: Tag, required: bool) -> Self {
        self.header.add_field(tag, required);
        self
    }

    pub fn header_group(mut self, group: GroupDef, required: bool) -> Self {
        self.header.add_group(group, required);
        self
    }

    pub fn trailer_field(mut self, tag: Tag, required: bool) -> Self {
        self.trailer.add_field(tag, required);
        self
    }

    pub fn message(mut self, def: MessageDef) -> Self {
        self.messages.insert(def.msg_type.clone(), def);
        self
    }

    fn define(self, tag: Tag, name: &str, field_type: FieldType) -> Self {
        self.field(FieldDef::new(tag, name, field_type))
    }

    /// Standard header and trailer with their field definitions.
    pub fn standard_header_trailer(self) -> Self {
        use FieldType::*;
        let hops = GroupDef::new(tags::NO_HOPS, tags::HOP_COMP_ID)
            .field(tags::HOP_SENDING_TIME, false)
            .field(tags::HOP_REF_ID, false);

        let mut builder = self
            .define(tags::BEGIN_STRING, "BeginString", String)
            .define(tags::BODY_LENGTH, "BodyLength", Length)
            .define(tags::MSG_TYPE, "MsgType", String)
            .define(tags::SENDER_COMP_ID, "SenderCompID", String)
            .define(tags::TARGET_COMP_ID, "TargetCompID", String)
            .define(tags::ON_BEHALF_OF_COMP_ID, "OnBehalfOfCompID", String)
            .define(tags::DELIVER_TO_COMP_ID, "DeliverToCompID", String)
            .field(FieldDef::new(tags::SECURE_DATA_LEN, "SecureDataLen", Length).length_of(tags::SECURE_DATA))
            .define(tags::SECURE_DATA, "SecureData", Data)
            .define(tags::MSG_SEQ_NUM, "MsgSeqNum", SeqNum)
            .define(tags::SENDER_SUB_ID, "SenderSubID", String)
            .define(tags::SENDER_LOCATION_ID, "SenderLocationID", String)
            .define(tags::TARGET_SUB_ID, "TargetSubID", String)
            .define(tags::TARGET_LOCATION_ID, "TargetLocationID", String)
            .define(tags::ON_BEHALF_OF_SUB_ID, "OnBehalfOfSubID", String)
            .define(tags::ON_BEHALF_OF_LOCATION_ID, "OnBehalfOfLocationID", String)
            .define(tags::DELIVER_TO_SUB_ID, "DeliverToSubID", String)
            .define(tags::DELIVER_TO_LOCATION_ID, "DeliverToLocationID", String)
            .define(tags::POSS_DUP_FLAG, "PossDupFlag", Boolean)
            .define(tags::POSS_RESEND, "PossResend", Boolean)
            .define(tags::SENDING_TIME, "SendingTime", UtcTimestamp)
            .define(tags::ORIG_SENDING_TIME, "OrigSendingTime", UtcTimestamp)
            .field(FieldDef::new(tags::XML_DATA_LEN, "XmlDataLen", Length).length_of(tags::XML_DATA))
            .define(tags::XML_DATA, "XmlData", XmlData)
            .define(tags::MESSAGE_ENCODING, "MessageEncoding", String)
            .define(tags::LAST_MSG_SEQ_NUM_PROCESSED, "LastMsgSeqNumProcessed", SeqNum)
            .define(tags::NO_HOPS, "NoHops", NumInGroup)
            .define(tags::HOP_COMP_ID, "HopCompID", String)
            .define(tags::HOP_SENDING_TIME, "HopSendingTime", UtcTimestamp)
            .define(tags::HOP_REF_ID, "HopRefID", SeqNum)
            .define(tags::APPL_VER_ID, "ApplVerID", String)
            .define(tags::CSTM_APPL_VER_ID, "CstmApplVerID", String)
            .define(tags::APPL_EXT_ID, "ApplExtID", Int)
            .field(FieldDef::new(tags::SIGNATURE_LENGTH, "SignatureLength", Length).length_of(tags::SIGNATURE))
            .define(tags::SIGNATURE, "Signature", Data)
            .define(tags::CHECK_SUM, "CheckSum", String);

        const REQUIRED: &[Tag] = &[
            tags::BEGIN_STRING,
            tags::BODY_LENGTH,
            tags::MSG_TYPE,
            tags::SENDER_COMP_ID,
            tags::TARGET_COMP_ID,
            tags::MSG_SEQ_NUM,
            tags::SENDING_TIME,
        ];
        for &tag in tags::STANDARD_HEADER {
            if tag == tags::NO_HOPS {
                builder.header.add_group(hops.clone(), false);
            } else if ![tags::HOP_COMP_ID, tags::HOP_SENDING_TIME, tags::HOP_REF_ID].contains(&tag) {
                builder.header.add_field(tag, REQUIRED.contains(&tag));
            }
        }
        builder
            .trailer_field(tags::SIGNATURE_LENGTH, false)
            .trailer_field(tags::SIGNATURE, false)
            .trailer_field(tags::CHECK_SUM, true)
    }

    /// Session-level messages and the fields they use.
    pub fn session_messages(self) -> Self {
        use FieldType::*;
        use MessageCategory::Admin;
        let fixt = self.begin_string.starts_with("FIXT");

        let builder = self
            .define(tags::BEGIN_SEQ_NO, "BeginSeqNo", SeqNum)
            .define(tags::END_SEQ_NO, "EndSeqNo", SeqNum)
            .define(tags::NEW_SEQ_NO, "NewSeqNo", SeqNum)
            .define(tags::GAP_FILL_FLAG, "GapFillFlag", Boolean)
            .define(tags::TEST_REQ_ID, "TestReqID", String)
            .define(tags::HEART_BT_INT, "HeartBtInt", Int)
            .field(
                FieldDef::new(tags::ENCRYPT_METHOD, "EncryptMethod", Int)
                    .with_values(["0", "1", "2", "3", "4", "5", "6"]),
            )
            .define(tags::RESET_SEQ_NUM_FLAG, "ResetSeqNumFlag", Boolean)
            .define(tags::REF_SEQ_NUM, "RefSeqNum", SeqNum)
            .define(tags::REF_TAG_ID, "RefTagID", Int)
            .define(tags::REF_MSG_TYPE, "RefMsgType", String)
            .field(FieldDef::new(tags::SESSION_REJECT_REASON, "SessionRejectReason", Int).allow_other_values())
            .define(tags::TEXT, "Text", String)
            .field(FieldDef::new(tags::ENCODED_TEXT_LEN, "EncodedTextLen", Length).length_of(tags::ENCODED_TEXT))
            .define(tags::ENCODED_TEXT, "EncodedText", Data)
            .field(FieldDef::new(tags::RAW_DATA_LENGTH, "RawDataLength", Length).length_of(tags::RAW_DATA))
            .define(tags::RAW_DATA, "RawData", Data)
            .define(tags::USERNAME, "Username", String)
            .define(tags::PASSWORD, "Password", String)
            .define(tags::DEFAULT_APPL_VER_ID, "DefaultApplVerID", String);

        let mut logon = MessageDef::new(msg_type::LOGON, "Logon", Admin)
            .field(tags::ENCRYPT_METHOD, true)
            .field(tags::HEART_BT_INT, true)
            .field(tags::RAW_DATA_LENGTH, false)
            .field(tags::RAW_DATA, false)
            .field(tags::RESET_SEQ_NUM_FLAG, false)
            .field(tags::USERNAME, false)
            .field(tags::PASSWORD, false);
        if fixt {
            logon = logon.field(tags::DEFAULT_APPL_VER_ID, true);
        }

        builder
            .message(MessageDef::new(msg_type::HEARTBEAT, "Heartbeat", Admin).field(tags::TEST_REQ_ID, false))
            .message(MessageDef::new(msg_type::TEST_REQUEST, "TestRequest", Admin).field(tags::TEST_REQ_ID, true))
            .message(
                MessageDef::new(msg_type::RESEND_REQUEST, "ResendRequest", Admin)
                    .field(tags::BEGIN_SEQ_NO, true)
                    .field(tags::END_SEQ_NO, true),
            )
            .message(
                MessageDef::new(msg_type::REJECT, "Reject", Admin)
                    .field(tags::REF_SEQ_NUM, true)
                    .field(tags::REF_TAG_ID, false)
                    .field(tags::REF_MSG_TYPE, false)
                    .field(tags::SESSION_REJECT_REASON, false)
                    .field(tags::TEXT, false)
                    .field(tags::ENCODED_TEXT_LEN, false)
                    .field(tags::ENCODED_TEXT, false),
            )
            .message(
                MessageDef::new(msg_type::SEQUENCE_RESET, "SequenceReset", Admin)
                    .field(tags::GAP_FILL_FLAG, false)
                    .field(tags::NEW_SEQ_NO, true),
            )
            .message(
                MessageDef::new(msg_type::LOGOUT, "Logout", Admin)
                    .field(tags::TEXT, false)
                    .field(tags::ENCODED_TEXT_LEN, false)
                    .field(tags::ENCODED_TEXT, false),
            )
            .message(logon)
    }

    /// Check references and finalize group paths.
    pub fn build(self) -> Result<DataDictionary, DictionaryError> {
        let Self {
            begin_string,
            appl_ver_id,
            fields,
            header,
            trailer,
            mut messages,
        } = self;

        check_field_set(&fields, &header, "header")?;
        check_field_set(&fields, &trailer, "trailer")?;
        for def in messages.values_mut() {
            check_field_set(&fields, &def.fields, &format!("message {}", def.msg_type))?;
            def.qualify_groups();
        }

        let mut data_pairs = HashMap::new();
        for def in fields.values() {
            if let Some(data_tag) = def.length_of {
                let is_data = fields
                    .get(&data_tag)
                    .map_or(false, |d| d.field_type.is_data());
                if !is_data {
                    return Err(DictionaryError::InvalidDataPair {
                        length_tag: def.tag,
                        data_tag,
                    });
                }
                data_pairs.insert(def.tag, data_tag);
            }
        }

        Ok(DataDictionary {
            begin_string,
            appl_ver_id,
            fields,
            header,
            trailer,
            messages,
            data_pairs,
        })
    }
}

fn check_field_set(
    fields: &HashMap<Tag, FieldDef>,
    set: &FieldSet,
    context: &str,
) -> Result<(), DictionaryError> {
    for &tag in set.members() {
        if !fields.contains_key(&tag) {
            return Err(DictionaryError::UndefinedField {
                tag,
                context: context.to_string(),
            });
        }
    }
    for group in set.groups() {
        let count_type = fields.get(&group.count_tag).map(|f| f.field_type);
        if count_type != Some(FieldType::NumInGroup) {
            return Err(DictionaryError::InvalidGroup {
                count_tag: group.count_tag,
                context: context.to_string(),
                reason: "count field must be of type NumInGroup",
            });
        }
        if group.fields.members().first() != Some(&group.delimiter) {
            return Err(DictionaryError::InvalidGroup {
                count_tag: group.count_tag,
                context: context.to_string(),
                reason: "delimiter must be the first member",
            });
        }
        check_field_set(fields, &group.fields, &format!("{context} group {}", group.count_tag))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_member_is_reported() {
        let err = DictionaryBuilder::new("FIX.4.4")
            .message(MessageDef::new("D", "NewOrderSingle", MessageCategory::App).field(55, true))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DictionaryError::UndefinedField {
                tag: 55,
                context: "message D".into()
            }
        );
    }

    #[test]
    fn test_group_count_must_be_num_in_group() {
        let err = DictionaryBuilder::new("FIX.4.4")
            .field(FieldDef::new(453, "NoPartyIDs", FieldType::Int))
            .field(FieldDef::new(448, "PartyID", FieldType::String))
            .message(MessageDef::new("D", "NewOrderSingle", MessageCategory::App).group(GroupDef::new(453, 448), false))
            .build()
            .unwrap_err();
        assert!(matches!(err, DictionaryError::InvalidGroup { count_tag: 453, .. }));
    }

    #[test]
    fn test_length_must_point_at_data() {
        let err = DictionaryBuilder::new("FIX.4.4")
            .field(FieldDef::new(95, "RawDataLength", FieldType::Length).length_of(96))
            .field(FieldDef::new(96, "RawData", FieldType::String))
            .build()
            .unwrap_err();
        assert_eq!(err, DictionaryError::InvalidDataPair { length_tag: 95, data_tag: 96 });
    }

    #[test]
    fn test_standard_header_requirements() {
        let dd = DictionaryBuilder::new("FIX.4.4")
            .standard_header_trailer()
            .build()
            .unwrap();
        assert!(dd.header().is_required(tags::SENDING_TIME));
        assert!(!dd.header().is_required(tags::POSS_DUP_FLAG));
        assert!(dd.header().group(tags::NO_HOPS).is_some());
        assert_eq!(dd.trailer().required(), &[tags::CHECK_SUM]);
    }

    #[test]
    fn test_fixt_logon_requires_default_appl_ver_id() {
        let dd = DictionaryBuilder::new("FIXT.1.1")
            .standard_header_trailer()
            .session_messages()
            .build()
            .unwrap();
        let logon = dd.message(msg_type::LOGON).unwrap();
        assert!(logon.fields.is_required(tags::DEFAULT_APPL_VER_ID));
    }
}
