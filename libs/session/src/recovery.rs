//! Gap Recovery
//!
//! Both directions of the resend protocol: deciding what to request when a
//! gap is detected, and walking stored messages to answer a counterparty's
//! ResendRequest with resends and gap fills.

use crate::state::ResendRange;
use fix_codec::validation::checksum::{calculate_checksum, format_checksum, locate_frame};
use fix_codec::{FramingError, FramingResult};
use fix_config::SessionSettings;
use fix_types::tags::{self, begin_string};
use fix_types::{Field, Tag, UtcTimestamp, SOH};
use std::io::Write;

/// EndSeqNo meaning "through the latest" before FIX.4.2
const LEGACY_OPEN_END: u64 = 999_999;

/// How outgoing ResendRequests are shaped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendRequestPolicy {
    /// Largest range per request; 0 requests the whole gap
    pub chunk_size: u64,
    /// Send the real last sequence number instead of the open-ended marker
    pub closed_interval: bool,
    pub open_end: u64,
}

impl ResendRequestPolicy {
    pub fn from_settings(settings: &SessionSettings) -> Self {
        let open_end = if begin_string::at_least_fix42(&settings.begin_string) {
            0
        } else {
            LEGACY_OPEN_END
        };
        Self {
            chunk_size: settings.resend_request_chunk_size,
            closed_interval: settings.closed_resend_interval,
            open_end,
        }
    }

    /// Range for missing messages `begin..=end`.
    pub fn request(&self, begin: u64, end: u64) -> ResendRange {
        ResendRange {
            begin,
            end,
            chunk_end: self.chunk_end(begin, end),
        }
    }

    /// Advance `range` to the chunk starting at `from`.
    pub fn next_chunk(&self, range: ResendRange, from: u64) -> ResendRange {
        ResendRange {
            chunk_end: self.chunk_end(from, range.end),
            ..range
        }
    }

    /// EndSeqNo to put on the wire for `range`.
    pub fn end_seq_no(&self, range: &ResendRange) -> u64 {
        if range.chunk_end != 0 {
            range.chunk_end
        } else if self.closed_interval {
            range.end
        } else {
            self.open_end
        }
    }

    fn chunk_end(&self, from: u64, end: u64) -> u64 {
        if self.chunk_size > 0 && end - from + 1 > self.chunk_size {
            from + self.chunk_size - 1
        } else if self.chunk_size > 0 {
            end
        } else {
            0
        }
    }
}

/// Clamp a received `BeginSeqNo..EndSeqNo` to what was actually sent.
/// EndSeqNo 0 (or the legacy 999999) means "through the latest".
pub fn clamp_request(begin: u64, end: u64, last_sent: u64) -> Option<(u64, u64)> {
    let end = if end == 0 || end == LEGACY_OPEN_END || end > last_sent {
        last_sent
    } else {
        end
    };
    let begin = begin.max(1);
    (begin <= end).then_some((begin, end))
}

/// Store fetch windows covering `begin..=end`; one window when `batch` is 0.
pub fn batches(begin: u64, end: u64, batch: u64) -> Vec<(u64, u64)> {
    if batch == 0 {
        return vec![(begin, end)];
    }
    let mut out = Vec::new();
    let mut from = begin;
    while from <= end {
        let to = end.min(from + batch - 1);
        out.push((from, to));
        from = to + 1;
    }
    out
}

/// Coalesces sequence numbers that must be gap-filled while a resend walks
/// the store.
///
/// Sequence numbers never handed to [`resend`](GapTracker::resend) count as
/// gaps, so messages missing from the store are covered too.
#[derive(Debug)]
pub struct GapTracker {
    next: u64,
    gap_start: Option<u64>,
}

impl GapTracker {
    pub fn new(begin: u64) -> Self {
        Self {
            next: begin,
            gap_start: None,
        }
    }

    /// `seq_num` is answered by a gap fill rather than resent.
    pub fn skip(&mut self, seq_num: u64) {
        if self.gap_start.is_none() {
            self.gap_start = Some(self.next.min(seq_num));
        }
        self.next = seq_num + 1;
    }

    /// `seq_num` is about to be resent. Returns the gap fill
    /// `(MsgSeqNum, NewSeqNo)` that must go out first.
    pub fn resend(&mut self, seq_num: u64) -> Option<(u64, u64)> {
        let gap = match self.gap_start.take() {
            Some(start) => Some((start, seq_num)),
            None if seq_num > self.next => Some((self.next, seq_num)),
            None => None,
        };
        self.next = seq_num + 1;
        gap
    }

    /// Gap fill closing the walk at `end`.
    pub fn finish(&mut self, end: u64) -> Option<(u64, u64)> {
        match self.gap_start.take() {
            Some(start) => Some((start, end + 1)),
            None if self.next <= end => Some((self.next, end + 1)),
            None => None,
        }
    }
}

/// Re-frame a stored message for retransmission without re-parsing its
/// body: SendingTime becomes `sending_time`, the old value moves to
/// OrigSendingTime and PossDupFlag=Y is added. Body bytes are reused as
/// stored, so repeating groups survive even without a dictionary.
pub fn reframe_for_resend(raw: &[u8], sending_time: &UtcTimestamp) -> FramingResult<Vec<u8>> {
    let frame = locate_frame(raw)?;
    let begin_end = raw
        .iter()
        .position(|b| *b == SOH)
        .ok_or_else(|| FramingError::garbled(0, "BeginString not terminated"))?;
    let begin_string = &raw[2..begin_end];
    let content = &raw[frame.body_start..frame.checksum_start];

    let mut header = Vec::with_capacity(96);
    let mut orig_sending_time = None;
    let mut pos = 0;
    while pos < content.len() {
        let offset = frame.body_start + pos;
        let eq = content[pos..]
            .iter()
            .position(|b| *b == b'=')
            .map(|p| pos + p)
            .ok_or_else(|| FramingError::garbled(offset, "field without '='"))?;
        let tag: Tag = std::str::from_utf8(&content[pos..eq])
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or_else(|| FramingError::garbled(offset, "invalid tag"))?;
        if !tags::is_header_tag(tag) {
            break;
        }
        if tags::standard_data_tag(tag).is_some() {
            return Err(FramingError::garbled(offset, "data field in header"));
        }
        let end = content[eq + 1..]
            .iter()
            .position(|b| *b == SOH)
            .map(|p| eq + 1 + p)
            .ok_or_else(|| FramingError::garbled(offset, "field not terminated"))?;
        match tag {
            tags::POSS_DUP_FLAG | tags::ORIG_SENDING_TIME => {}
            tags::SENDING_TIME => {
                orig_sending_time = Some(&content[eq + 1..end]);
                Field::from_value(tags::SENDING_TIME, sending_time).write_to(&mut header);
            }
            _ => header.extend_from_slice(&content[pos..=end]),
        }
        pos = end + 1;
    }
    let orig_sending_time =
        orig_sending_time.ok_or_else(|| FramingError::garbled(frame.body_start, "no SendingTime in header"))?;
    Field::new(tags::POSS_DUP_FLAG, "Y").write_to(&mut header);
    Field::new(tags::ORIG_SENDING_TIME, orig_sending_time).write_to(&mut header);

    let body = &content[pos..];
    let mut out = Vec::with_capacity(raw.len() + 32);
    out.extend_from_slice(b"8=");
    out.extend_from_slice(begin_string);
    out.push(SOH);
    let _ = write!(out, "9={}", header.len() + body.len());
    out.push(SOH);
    out.extend_from_slice(&header);
    out.extend_from_slice(body);
    let checksum = calculate_checksum(&out);
    out.extend_from_slice(b"10=");
    out.extend_from_slice(&format_checksum(checksum));
    out.push(SOH);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fix_codec::validation::checksum::verify_integrity;
    use fix_codec::{encode, MessageParser, ParseOptions};
    use fix_config::ConnectionType;
    use fix_types::{Message, TimestampPrecision};

    fn policy(chunk_size: u64, closed_interval: bool) -> ResendRequestPolicy {
        let mut settings = SessionSettings::new("FIX.4.4", "A", "B", ConnectionType::Acceptor);
        settings.resend_request_chunk_size = chunk_size;
        settings.closed_resend_interval = closed_interval;
        ResendRequestPolicy::from_settings(&settings)
    }

    #[test]
    fn test_request_shapes() {
        let closed = policy(0, true);
        let range = closed.request(5, 7);
        assert_eq!(closed.end_seq_no(&range), 7);

        let open = policy(0, false);
        assert_eq!(open.end_seq_no(&open.request(5, 7)), 0);

        let chunked = policy(100, false);
        let range = chunked.request(1, 250);
        assert_eq!(chunked.end_seq_no(&range), 100);
        let range = chunked.next_chunk(range, 101);
        assert_eq!(chunked.end_seq_no(&range), 200);
        let range = chunked.next_chunk(range, 201);
        assert_eq!(chunked.end_seq_no(&range), 250);
        assert_eq!(range.next_chunk_begin(250), None);
    }

    #[test]
    fn test_legacy_open_end() {
        let settings = SessionSettings::new("FIX.4.1", "A", "B", ConnectionType::Acceptor);
        let mut policy = ResendRequestPolicy::from_settings(&settings);
        policy.closed_interval = false;
        assert_eq!(policy.end_seq_no(&policy.request(3, 9)), 999_999);
    }

    #[test]
    fn test_clamp_request() {
        assert_eq!(clamp_request(3, 0, 10), Some((3, 10)));
        assert_eq!(clamp_request(3, 50, 10), Some((3, 10)));
        assert_eq!(clamp_request(3, 999_999, 10), Some((3, 10)));
        assert_eq!(clamp_request(3, 5, 10), Some((3, 5)));
        assert_eq!(clamp_request(12, 0, 10), None);
    }

    #[test]
    fn test_batches() {
        assert_eq!(batches(1, 10, 0), vec![(1, 10)]);
        assert_eq!(batches(1, 10, 4), vec![(1, 4), (5, 8), (9, 10)]);
    }

    #[test]
    fn test_gap_tracker_coalesces() {
        // 1 admin, 2 admin, 3 app, 4 missing, 5 app, 6 admin
        let mut gaps = GapTracker::new(1);
        gaps.skip(1);
        gaps.skip(2);
        assert_eq!(gaps.resend(3), Some((1, 3)));
        assert_eq!(gaps.resend(5), Some((4, 5)));
        gaps.skip(6);
        assert_eq!(gaps.finish(6), Some((6, 7)));

        let mut nothing_stored = GapTracker::new(4);
        assert_eq!(nothing_stored.finish(9), Some((4, 10)));

        let mut all_resent = GapTracker::new(1);
        assert_eq!(all_resent.resend(1), None);
        assert_eq!(all_resent.finish(1), None);
    }

    #[test]
    fn test_reframe_for_resend() {
        let mut original = Message::with_type("FIX.4.4", "D");
        original.header_mut().set_uint(tags::MSG_SEQ_NUM, 2);
        original.header_mut().set_str(tags::SENDER_COMP_ID, "A");
        original.header_mut().set_str(tags::SENDING_TIME, "20240304-09:00:00.000");
        original.header_mut().set_str(tags::TARGET_COMP_ID, "B");
        original.body_mut().set_str(55, "MSFT");
        original.body_mut().set_str(54, "1");
        let stored = encode(&original).unwrap();

        let now = UtcTimestamp::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 5, 0).unwrap(),
            TimestampPrecision::Millis,
        );
        let resent = reframe_for_resend(&stored, &now).unwrap();
        verify_integrity(&resent).unwrap();

        let message = MessageParser::new(ParseOptions::default()).parse(&resent).unwrap();
        assert!(message.poss_dup());
        assert_eq!(message.seq_num().unwrap(), 2);
        assert_eq!(
            message.header().get_str(tags::ORIG_SENDING_TIME).unwrap(),
            "20240304-09:00:00.000"
        );
        assert_eq!(message.header().get_str(tags::SENDING_TIME).unwrap(), "20240304-09:05:00.000");
        assert_eq!(message.body().get_str(55).unwrap(), "MSFT");
    }
}
