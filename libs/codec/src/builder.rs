//! # Message Serializer
//!
//! Writes a [`Message`] in wire form with freshly computed BodyLength and
//! CheckSum. Any BodyLength or CheckSum already set on the message is
//! ignored.
//!
//! Layout: `8=<BeginString>` `9=<len>` header (MsgType first) body trailer
//! `10=<sum>`, where `<len>` counts the bytes from after the BodyLength SOH
//! to before `10=` and `<sum>` is the byte sum of everything before `10=`
//! modulo 256.

use crate::error::{FramingError, FramingResult};
use crate::validation::checksum::{calculate_checksum, format_checksum};
use fix_types::{tags, Field, Message, Tag, SOH};
use std::io::Write;

const HEADER_SKIP: &[Tag] = &[tags::BEGIN_STRING, tags::BODY_LENGTH];
const TRAILER_SKIP: &[Tag] = &[tags::CHECK_SUM];

/// Serialize `message`.
pub fn encode(message: &Message) -> FramingResult<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    encode_into(message, &mut out)?;
    Ok(out)
}

/// Serialize `message`, appending to `out`.
pub fn encode_into(message: &Message, out: &mut Vec<u8>) -> FramingResult<()> {
    let begin_string = message
        .header()
        .get_bytes(tags::BEGIN_STRING)
        .map_err(|_| FramingError::MissingBeginString)?;
    if !message.header().is_set(tags::MSG_TYPE) {
        return Err(FramingError::MissingMsgType);
    }

    let mut body = Vec::with_capacity(192);
    message.header().write_filtered(&mut body, HEADER_SKIP);
    message.body().write_to(&mut body);
    message.trailer().write_filtered(&mut body, TRAILER_SKIP);

    let start = out.len();
    out.extend_from_slice(b"8=");
    out.extend_from_slice(begin_string);
    out.push(SOH);
    let _ = write!(out, "9={}", body.len());
    out.push(SOH);
    out.extend_from_slice(&body);

    let checksum = calculate_checksum(&out[start..]);
    out.extend_from_slice(b"10=");
    out.extend_from_slice(&format_checksum(checksum));
    out.push(SOH);
    Ok(())
}

/// Serialize `message` and write the computed BodyLength and CheckSum back
/// into it, so its `Display` matches what went on the wire.
pub fn encode_and_stamp(message: &mut Message) -> FramingResult<Vec<u8>> {
    let raw = encode(message)?;
    let frame = crate::validation::checksum::locate_frame(&raw)?;
    message
        .header_mut()
        .set_uint(tags::BODY_LENGTH, frame.body_length as u64);
    let value = &raw[frame.checksum_start + 3..frame.checksum_start + 6];
    message
        .trailer_mut()
        .set_field(Field::new(tags::CHECK_SUM, value));
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::checksum::verify_integrity;
    use fix_types::tags::msg_type;

    fn heartbeat() -> Message {
        let mut message = Message::with_type("FIX.4.2", msg_type::HEARTBEAT);
        message.header_mut().set_str(tags::SENDER_COMP_ID, "A");
        message.header_mut().set_str(tags::TARGET_COMP_ID, "B");
        message.header_mut().set_uint(tags::MSG_SEQ_NUM, 1);
        message
    }

    #[test]
    fn test_encode_computes_length_and_checksum() {
        let raw = encode(&heartbeat()).unwrap();
        assert!(raw.starts_with(b"8=FIX.4.2\x019=20\x0135=0\x0149=A\x0156=B\x0134=1\x0110="));
        verify_integrity(&raw).unwrap();
    }

    #[test]
    fn test_stale_length_and_checksum_are_ignored() {
        let mut message = heartbeat();
        message.header_mut().set_uint(tags::BODY_LENGTH, 999);
        message.trailer_mut().set_str(tags::CHECK_SUM, "123");
        assert_eq!(encode(&message).unwrap(), encode(&heartbeat()).unwrap());
    }

    #[test]
    fn test_stamp_updates_message() {
        let mut message = heartbeat();
        let raw = encode_and_stamp(&mut message).unwrap();
        assert_eq!(message.header().get_uint(tags::BODY_LENGTH).unwrap(), 20);
        let mut rendered = message.to_string().into_bytes();
        for b in rendered.iter_mut() {
            if *b == b'|' {
                *b = SOH;
            }
        }
        assert_eq!(rendered, raw);
    }

    #[test]
    fn test_missing_msg_type() {
        let mut message = Message::new();
        message.header_mut().set_str(tags::BEGIN_STRING, "FIX.4.4");
        assert_eq!(encode(&message), Err(FramingError::MissingMsgType));
        assert_eq!(encode(&Message::new()), Err(FramingError::MissingBeginString));
    }
}
