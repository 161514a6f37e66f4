//! FIX tag numbers, message types and BeginString values used by the engine.
//!
//! Only the tags the session layer, the parser and the validator need by name
//! are listed; application dictionaries define the rest.

/// A FIX tag number.
pub type Tag = u32;

// ---------------------------------------------------------------------------
// Standard header
// ---------------------------------------------------------------------------

pub const BEGIN_STRING: Tag = 8;
pub const BODY_LENGTH: Tag = 9;
pub const MSG_TYPE: Tag = 35;
pub const SENDER_COMP_ID: Tag = 49;
pub const TARGET_COMP_ID: Tag = 56;
pub const ON_BEHALF_OF_COMP_ID: Tag = 115;
pub const DELIVER_TO_COMP_ID: Tag = 128;
pub const SECURE_DATA_LEN: Tag = 90;
pub const SECURE_DATA: Tag = 91;
pub const MSG_SEQ_NUM: Tag = 34;
pub const SENDER_SUB_ID: Tag = 50;
pub const SENDER_LOCATION_ID: Tag = 142;
pub const TARGET_SUB_ID: Tag = 57;
pub const TARGET_LOCATION_ID: Tag = 143;
pub const ON_BEHALF_OF_SUB_ID: Tag = 116;
pub const ON_BEHALF_OF_LOCATION_ID: Tag = 144;
pub const DELIVER_TO_SUB_ID: Tag = 129;
pub const DELIVER_TO_LOCATION_ID: Tag = 145;
pub const POSS_DUP_FLAG: Tag = 43;
pub const POSS_RESEND: Tag = 97;
pub const SENDING_TIME: Tag = 52;
pub const ORIG_SENDING_TIME: Tag = 122;
pub const XML_DATA_LEN: Tag = 212;
pub const XML_DATA: Tag = 213;
pub const MESSAGE_ENCODING: Tag = 347;
pub const LAST_MSG_SEQ_NUM_PROCESSED: Tag = 369;
pub const NO_HOPS: Tag = 627;
pub const HOP_COMP_ID: Tag = 628;
pub const HOP_SENDING_TIME: Tag = 629;
pub const HOP_REF_ID: Tag = 630;
pub const APPL_VER_ID: Tag = 1128;
pub const CSTM_APPL_VER_ID: Tag = 1129;
pub const APPL_EXT_ID: Tag = 1156;

// ---------------------------------------------------------------------------
// Standard trailer
// ---------------------------------------------------------------------------

pub const SIGNATURE_LENGTH: Tag = 93;
pub const SIGNATURE: Tag = 89;
pub const CHECK_SUM: Tag = 10;

// ---------------------------------------------------------------------------
// Session-level body fields
// ---------------------------------------------------------------------------

pub const BEGIN_SEQ_NO: Tag = 7;
pub const END_SEQ_NO: Tag = 16;
pub const NEW_SEQ_NO: Tag = 36;
pub const GAP_FILL_FLAG: Tag = 123;
pub const TEST_REQ_ID: Tag = 112;
pub const HEART_BT_INT: Tag = 108;
pub const ENCRYPT_METHOD: Tag = 98;
pub const RESET_SEQ_NUM_FLAG: Tag = 141;
pub const REF_SEQ_NUM: Tag = 45;
pub const REF_TAG_ID: Tag = 371;
pub const REF_MSG_TYPE: Tag = 372;
pub const SESSION_REJECT_REASON: Tag = 373;
pub const BUSINESS_REJECT_REF_ID: Tag = 379;
pub const BUSINESS_REJECT_REASON: Tag = 380;
pub const TEXT: Tag = 58;
pub const RAW_DATA_LENGTH: Tag = 95;
pub const RAW_DATA: Tag = 96;
pub const DEFAULT_APPL_VER_ID: Tag = 1137;
pub const USERNAME: Tag = 553;
pub const PASSWORD: Tag = 554;

// Encoded text pairs.
pub const ENCODED_ISSUER_LEN: Tag = 348;
pub const ENCODED_ISSUER: Tag = 349;
pub const ENCODED_SECURITY_DESC_LEN: Tag = 350;
pub const ENCODED_SECURITY_DESC: Tag = 351;
pub const ENCODED_LIST_EXEC_INST_LEN: Tag = 352;
pub const ENCODED_LIST_EXEC_INST: Tag = 353;
pub const ENCODED_TEXT_LEN: Tag = 354;
pub const ENCODED_TEXT: Tag = 355;

/// First tag number reserved for user-defined fields.
pub const USER_DEFINED_MIN: Tag = 5000;

/// Header tags of the standard FIX 4.x / FIXT.1.1 header.
pub const STANDARD_HEADER: &[Tag] = &[
    BEGIN_STRING,
    BODY_LENGTH,
    MSG_TYPE,
    SENDER_COMP_ID,
    TARGET_COMP_ID,
    ON_BEHALF_OF_COMP_ID,
    DELIVER_TO_COMP_ID,
    SECURE_DATA_LEN,
    SECURE_DATA,
    MSG_SEQ_NUM,
    SENDER_SUB_ID,
    SENDER_LOCATION_ID,
    TARGET_SUB_ID,
    TARGET_LOCATION_ID,
    ON_BEHALF_OF_SUB_ID,
    ON_BEHALF_OF_LOCATION_ID,
    DELIVER_TO_SUB_ID,
    DELIVER_TO_LOCATION_ID,
    POSS_DUP_FLAG,
    POSS_RESEND,
    SENDING_TIME,
    ORIG_SENDING_TIME,
    XML_DATA_LEN,
    XML_DATA,
    MESSAGE_ENCODING,
    LAST_MSG_SEQ_NUM_PROCESSED,
    NO_HOPS,
    HOP_COMP_ID,
    HOP_SENDING_TIME,
    HOP_REF_ID,
    APPL_VER_ID,
    CSTM_APPL_VER_ID,
    APPL_EXT_ID,
];

/// Trailer tags of the standard trailer.
pub const STANDARD_TRAILER: &[Tag] = &[SIGNATURE_LENGTH, SIGNATURE, CHECK_SUM];

/// Canonical leading order of the header.
pub const HEADER_ORDER: &[Tag] = &[BEGIN_STRING, BODY_LENGTH, MSG_TYPE];

/// Canonical order of the trailer; CheckSum is always last.
pub const TRAILER_ORDER: &[Tag] = &[SIGNATURE_LENGTH, SIGNATURE, CHECK_SUM];

/// Length/data pairs known without a dictionary: `(length tag, data tag)`.
pub const STANDARD_DATA_PAIRS: &[(Tag, Tag)] = &[
    (SECURE_DATA_LEN, SECURE_DATA),
    (RAW_DATA_LENGTH, RAW_DATA),
    (SIGNATURE_LENGTH, SIGNATURE),
    (XML_DATA_LEN, XML_DATA),
    (ENCODED_ISSUER_LEN, ENCODED_ISSUER),
    (ENCODED_SECURITY_DESC_LEN, ENCODED_SECURITY_DESC),
    (ENCODED_LIST_EXEC_INST_LEN, ENCODED_LIST_EXEC_INST),
    (ENCODED_TEXT_LEN, ENCODED_TEXT),
];

/// Whether `tag` belongs to the standard header.
#[inline]
pub fn is_header_tag(tag: Tag) -> bool {
    STANDARD_HEADER.contains(&tag)
}

/// Whether `tag` belongs to the standard trailer.
#[inline]
pub fn is_trailer_tag(tag: Tag) -> bool {
    STANDARD_TRAILER.contains(&tag)
}

/// Data tag paired with `length_tag` in [`STANDARD_DATA_PAIRS`].
pub fn standard_data_tag(length_tag: Tag) -> Option<Tag> {
    STANDARD_DATA_PAIRS
        .iter()
        .find(|(len, _)| *len == length_tag)
        .map(|(_, data)| *data)
}

/// Whether `tag` is in the user-defined range.
#[inline]
pub fn is_user_defined(tag: Tag) -> bool {
    tag >= USER_DEFINED_MIN
}

/// MsgType (tag 35) values.
pub mod msg_type {
    pub const HEARTBEAT: &str = "0";
    pub const TEST_REQUEST: &str = "1";
    pub const RESEND_REQUEST: &str = "2";
    pub const REJECT: &str = "3";
    pub const SEQUENCE_RESET: &str = "4";
    pub const LOGOUT: &str = "5";
    pub const INDICATION_OF_INTEREST: &str = "6";
    pub const EXECUTION_REPORT: &str = "8";
    pub const LOGON: &str = "A";
    pub const NEW_ORDER_SINGLE: &str = "D";
    pub const BUSINESS_MESSAGE_REJECT: &str = "j";

    /// Session-level message types.
    pub const ADMIN: &[&str] = &[HEARTBEAT, TEST_REQUEST, RESEND_REQUEST, REJECT, SEQUENCE_RESET, LOGOUT, LOGON];

    /// Whether `msg_type` is a session-level (administrative) message.
    #[inline]
    pub fn is_admin(msg_type: &str) -> bool {
        ADMIN.contains(&msg_type)
    }
}

/// BeginString (tag 8) values.
pub mod begin_string {
    pub const FIX40: &str = "FIX.4.0";
    pub const FIX41: &str = "FIX.4.1";
    pub const FIX42: &str = "FIX.4.2";
    pub const FIX43: &str = "FIX.4.3";
    pub const FIX44: &str = "FIX.4.4";
    pub const FIXT11: &str = "FIXT.1.1";

    pub const SUPPORTED: &[&str] = &[FIX40, FIX41, FIX42, FIX43, FIX44, FIXT11];

    /// Whether the version carries RefMsgType / SessionRejectReason on Reject
    /// and supports BusinessMessageReject (FIX.4.2 and later, FIXT).
    pub fn at_least_fix42(begin_string: &str) -> bool {
        !matches!(begin_string, FIX40 | FIX41)
    }
}
