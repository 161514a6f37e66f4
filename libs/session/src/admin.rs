//! Administrative message builders
//!
//! Bodies only; the session stamps the routing header, MsgSeqNum and
//! SendingTime when it sends them.

use fix_codec::MessageRejection;
use fix_types::tags::{self, begin_string, msg_type};
use fix_types::Message;

/// BusinessRejectReason (380) values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessRejectReason {
    Other,
    UnknownId,
    UnknownSecurity,
    UnsupportedMessageType,
    ApplicationNotAvailable,
    ConditionallyRequiredFieldMissing,
    NotAuthorized,
}

impl BusinessRejectReason {
    pub fn code(self) -> i64 {
        match self {
            BusinessRejectReason::Other => 0,
            BusinessRejectReason::UnknownId => 1,
            BusinessRejectReason::UnknownSecurity => 2,
            BusinessRejectReason::UnsupportedMessageType => 3,
            BusinessRejectReason::ApplicationNotAvailable => 4,
            BusinessRejectReason::ConditionallyRequiredFieldMissing => 5,
            BusinessRejectReason::NotAuthorized => 6,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            BusinessRejectReason::Other => "Other",
            BusinessRejectReason::UnknownId => "Unknown ID",
            BusinessRejectReason::UnknownSecurity => "Unknown Security",
            BusinessRejectReason::UnsupportedMessageType => "Unsupported Message Type",
            BusinessRejectReason::ApplicationNotAvailable => "Application not available",
            BusinessRejectReason::ConditionallyRequiredFieldMissing => "Conditionally required field missing",
            BusinessRejectReason::NotAuthorized => "Not authorized",
        }
    }
}

pub fn heartbeat(begin_string: &str, test_req_id: Option<&str>) -> Message {
    let mut message = Message::with_type(begin_string, msg_type::HEARTBEAT);
    if let Some(id) = test_req_id {
        message.body_mut().set_str(tags::TEST_REQ_ID, id);
    }
    message
}

pub fn test_request(begin_string: &str, test_req_id: &str) -> Message {
    let mut message = Message::with_type(begin_string, msg_type::TEST_REQUEST);
    message.body_mut().set_str(tags::TEST_REQ_ID, test_req_id);
    message
}

pub fn resend_request(begin_string: &str, begin: u64, end: u64) -> Message {
    let mut message = Message::with_type(begin_string, msg_type::RESEND_REQUEST);
    message.body_mut().set_uint(tags::BEGIN_SEQ_NO, begin);
    message.body_mut().set_uint(tags::END_SEQ_NO, end);
    message
}

pub fn sequence_reset(begin_string: &str, new_seq_no: u64, gap_fill: bool) -> Message {
    let mut message = Message::with_type(begin_string, msg_type::SEQUENCE_RESET);
    if gap_fill {
        message.body_mut().set_bool(tags::GAP_FILL_FLAG, true);
    }
    message.body_mut().set_uint(tags::NEW_SEQ_NO, new_seq_no);
    message
}

pub fn logout(begin_string: &str, text: Option<&str>) -> Message {
    let mut message = Message::with_type(begin_string, msg_type::LOGOUT);
    if let Some(text) = text {
        message.body_mut().set_str(tags::TEXT, text);
    }
    message
}

pub fn logon(
    begin_string: &str,
    heartbeat_interval: u64,
    reset_seq_num: bool,
    default_appl_ver_id: Option<&str>,
) -> Message {
    let mut message = Message::with_type(begin_string, msg_type::LOGON);
    let body = message.body_mut();
    body.set_int(tags::ENCRYPT_METHOD, 0);
    body.set_uint(tags::HEART_BT_INT, heartbeat_interval);
    if reset_seq_num {
        body.set_bool(tags::RESET_SEQ_NUM_FLAG, true);
    }
    if let Some(id) = default_appl_ver_id {
        body.set_str(tags::DEFAULT_APPL_VER_ID, id);
    }
    message
}

/// Session-level Reject of `refused`.
///
/// Before FIX.4.2 there is no RefTagID, RefMsgType or SessionRejectReason,
/// so only the text describes the problem.
pub fn reject(begin_string: &str, refused: &Message, rejection: &MessageRejection) -> Message {
    let mut message = Message::with_type(begin_string, msg_type::REJECT);
    let extended = begin_string::at_least_fix42(begin_string);
    let body = message.body_mut();
    if let Ok(seq_num) = refused.seq_num() {
        body.set_uint(tags::REF_SEQ_NUM, seq_num);
    }
    if extended {
        if let Some(tag) = rejection.tag {
            body.set_uint(tags::REF_TAG_ID, u64::from(tag));
        }
        if let Ok(ref_type) = refused.msg_type() {
            body.set_str(tags::REF_MSG_TYPE, ref_type);
        }
        body.set_int(tags::SESSION_REJECT_REASON, rejection.reason.code());
    }
    body.set_str(tags::TEXT, &rejection.text);
    message
}

pub fn business_reject(
    begin_string: &str,
    refused: &Message,
    reason: BusinessRejectReason,
    text: Option<&str>,
) -> Message {
    let mut message = Message::with_type(begin_string, msg_type::BUSINESS_MESSAGE_REJECT);
    let body = message.body_mut();
    if let Ok(seq_num) = refused.seq_num() {
        body.set_uint(tags::REF_SEQ_NUM, seq_num);
    }
    if let Ok(ref_type) = refused.msg_type() {
        body.set_str(tags::REF_MSG_TYPE, ref_type);
    }
    body.set_int(tags::BUSINESS_REJECT_REASON, reason.code());
    body.set_str(tags::TEXT, text.unwrap_or(reason.text()));
    message
}
