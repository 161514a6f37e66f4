//! Session State
//!
//! Handshake flags, timing and the out-of-order queue of one session. The
//! sequence counters live in the message store; everything here is lost on
//! disconnect.

use chrono::{DateTime, Utc};
use fix_types::Message;
use std::collections::BTreeMap;

/// Coarse connection phase derived from the handshake flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    /// Connected, Logon not yet exchanged both ways
    LogonInProgress,
    LoggedOn,
    /// Logout sent or received, waiting for the other side
    LogoutInProgress,
}

/// Outstanding ResendRequest
///
/// `end` is the last missing sequence number. `chunk_end` is the EndSeqNo of
/// the chunk currently requested, or 0 when a single request covers the gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendRange {
    pub begin: u64,
    pub end: u64,
    pub chunk_end: u64,
}

impl ResendRange {
    pub fn covers(&self, begin: u64, end: u64) -> bool {
        begin >= self.begin && end <= self.end
    }

    /// Sequence number from which the next chunk is needed, once `seq_num`
    /// has arrived.
    pub fn next_chunk_begin(&self, seq_num: u64) -> Option<u64> {
        (self.chunk_end != 0 && seq_num >= self.chunk_end && self.chunk_end < self.end)
            .then_some(self.chunk_end + 1)
    }
}

#[derive(Debug)]
pub(crate) struct SessionState {
    pub connected: bool,
    pub logon_sent: bool,
    pub logon_received: bool,
    pub logout_sent: bool,
    pub logout_received: bool,
    pub reset_sent: bool,
    pub reset_received: bool,
    /// `on_logon` was delivered and `on_logout` is owed
    pub logon_notified: bool,

    /// Seconds; replaced by the counterparty's HeartBtInt on an acceptor
    pub heartbeat_interval: u64,
    pub test_request_counter: u32,
    pub last_sent_time: DateTime<Utc>,
    pub last_received_time: DateTime<Utc>,
    pub logon_sent_time: Option<DateTime<Utc>>,
    pub logout_sent_time: Option<DateTime<Utc>>,

    pub resend_range: Option<ResendRange>,
    queue: BTreeMap<u64, Message>,

    /// DefaultApplVerID announced in the counterparty's Logon
    pub target_default_appl_ver_id: Option<String>,
}

impl SessionState {
    pub fn new(heartbeat_interval: u64, now: DateTime<Utc>) -> Self {
        Self {
            connected: false,
            logon_sent: false,
            logon_received: false,
            logout_sent: false,
            logout_received: false,
            reset_sent: false,
            reset_received: false,
            logon_notified: false,
            heartbeat_interval,
            test_request_counter: 0,
            last_sent_time: now,
            last_received_time: now,
            logon_sent_time: None,
            logout_sent_time: None,
            resend_range: None,
            queue: BTreeMap::new(),
            target_default_appl_ver_id: None,
        }
    }

    pub fn is_logged_on(&self) -> bool {
        self.logon_sent && self.logon_received
    }

    pub fn status(&self) -> SessionStatus {
        if !self.connected {
            SessionStatus::Disconnected
        } else if self.logout_sent || self.logout_received {
            SessionStatus::LogoutInProgress
        } else if self.is_logged_on() {
            SessionStatus::LoggedOn
        } else {
            SessionStatus::LogonInProgress
        }
    }

    /// Forget everything tied to the connection.
    pub fn clear(&mut self, heartbeat_interval: u64, now: DateTime<Utc>) {
        *self = Self::new(heartbeat_interval, now);
    }

    pub fn enqueue(&mut self, seq_num: u64, message: Message) {
        self.queue.insert(seq_num, message);
    }

    /// Remove and return queued `seq_num`, dropping anything queued below
    /// it.
    pub fn dequeue(&mut self, seq_num: u64) -> Option<Message> {
        self.drop_queued_below(seq_num);
        self.queue.remove(&seq_num)
    }

    pub fn drop_queued_below(&mut self, seq_num: u64) {
        self.queue = self.queue.split_off(&seq_num);
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn heartbeat_needed(&self, now: DateTime<Utc>) -> bool {
        elapsed_millis(self.last_sent_time, now) >= self.interval_millis(1.0)
    }

    /// Silence has outlasted `(1 + delay_multiplier)` intervals for each
    /// TestRequest already sent plus one.
    pub fn test_request_needed(&self, now: DateTime<Utc>, delay_multiplier: f64) -> bool {
        let factor = (1.0 + delay_multiplier) * f64::from(self.test_request_counter + 1);
        elapsed_millis(self.last_received_time, now) >= self.interval_millis(factor)
    }

    pub fn timed_out(&self, now: DateTime<Utc>, timeout_multiplier: f64) -> bool {
        elapsed_millis(self.last_received_time, now) >= self.interval_millis(1.0 + timeout_multiplier)
    }

    pub fn logon_timed_out(&self, now: DateTime<Utc>, timeout_secs: u64) -> bool {
        self.logon_sent
            && !self.logon_received
            && self
                .logon_sent_time
                .is_some_and(|sent| elapsed_millis(sent, now) >= timeout_secs as f64 * 1000.0)
    }

    pub fn logout_timed_out(&self, now: DateTime<Utc>, timeout_secs: u64) -> bool {
        self.logout_sent
            && self
                .logout_sent_time
                .is_some_and(|sent| elapsed_millis(sent, now) >= timeout_secs as f64 * 1000.0)
    }

    fn interval_millis(&self, factor: f64) -> f64 {
        self.heartbeat_interval as f64 * 1000.0 * factor
    }
}

fn elapsed_millis(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - since).num_milliseconds() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use fix_types::tags::msg_type;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_heartbeat_timing() {
        let mut state = SessionState::new(30, start());
        assert!(!state.heartbeat_needed(start() + Duration::seconds(29)));
        assert!(state.heartbeat_needed(start() + Duration::seconds(30)));

        assert!(!state.test_request_needed(start() + Duration::seconds(44), 0.5));
        assert!(state.test_request_needed(start() + Duration::seconds(45), 0.5));
        state.test_request_counter = 1;
        assert!(!state.test_request_needed(start() + Duration::seconds(60), 0.5));

        assert!(!state.timed_out(start() + Duration::seconds(71), 1.4));
        assert!(state.timed_out(start() + Duration::seconds(72), 1.4));
    }

    #[test]
    fn test_queue_dequeue_drops_stale() {
        let mut state = SessionState::new(30, start());
        for seq in [6, 8, 9] {
            state.enqueue(seq, Message::with_type("FIX.4.4", msg_type::HEARTBEAT));
        }
        assert!(state.dequeue(7).is_none());
        assert_eq!(state.queued(), 2);
        assert!(state.dequeue(8).is_some());
        assert_eq!(state.queued(), 1);
    }

    #[test]
    fn test_status_and_clear() {
        let mut state = SessionState::new(30, start());
        assert_eq!(state.status(), SessionStatus::Disconnected);
        state.connected = true;
        state.logon_sent = true;
        assert_eq!(state.status(), SessionStatus::LogonInProgress);
        state.logon_received = true;
        assert_eq!(state.status(), SessionStatus::LoggedOn);
        state.logout_sent = true;
        assert_eq!(state.status(), SessionStatus::LogoutInProgress);

        state.clear(20, start());
        assert_eq!(state.status(), SessionStatus::Disconnected);
        assert_eq!(state.heartbeat_interval, 20);
    }

    #[test]
    fn test_resend_range_chunks() {
        let range = ResendRange {
            begin: 1,
            end: 250,
            chunk_end: 100,
        };
        assert_eq!(range.next_chunk_begin(99), None);
        assert_eq!(range.next_chunk_begin(100), Some(101));
        assert!(range.covers(10, 200));
        assert!(!range.covers(10, 300));
    }
}
