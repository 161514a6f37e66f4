//! # Session State Machine
//!
//! One [`Session`] per counterparty. It owns the handshake state and the
//! message store, stamps and sequences outbound messages, and checks every
//! inbound message before the application sees it.
//!
//! ## Inbound flow
//!
//! 1. Schedule check (outside the window the session logs out)
//! 2. BeginString and dictionary validation; failures become a Reject, or a
//!    Logout while the session is not established
//! 3. Per-type handling, each starting with [`verify`](Session::verify):
//!    logon state, SendingTime accuracy, CompIDs, then MsgSeqNum. A number
//!    above the expected one is queued and a ResendRequest issued; a number
//!    below it ends the session unless PossDupFlag is set
//! 4. Queued messages that became contiguous are replayed in order
//!
//! ## Locking
//!
//! Every public operation takes the per-session `ReentrantMutex`, so inbound
//! processing, sends, resets and timer ticks never interleave. Application
//! callbacks run with the lock held but without a `RefCell` borrow, which
//! lets them call back into the same session.

use crate::admin::{self, BusinessRejectReason};
use crate::application::Application;
use crate::clock::{Clock, SystemClock};
use crate::error::{ApplicationError, Result, SessionError, StoreError};
use crate::recovery::{batches, clamp_request, reframe_for_resend, GapTracker, ResendRequestPolicy};
use crate::responder::Responder;
use crate::schedule::SessionSchedule;
use crate::state::{ResendRange, SessionState, SessionStatus};
use crate::store::{MemoryStoreFactory, MessageStore, MessageStoreFactory, StoreSnapshot};
use crate::timer::HeartbeatTimer;
use anyhow::anyhow;
use fix_codec::{
    encode, DataDictionary, DictionaryRegistry, FramingResult, MessageParser, MessageRejection, ParseOptions,
    SessionRejectReason, ValidationError, Validator,
};
use fix_config::SessionSettings;
use fix_types::tags::{self, begin_string, msg_type};
use fix_types::{FieldError, Message, SessionId, UtcTimestamp};
use parking_lot::ReentrantMutex;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const TEST_REQ_ID: &str = "TEST";

struct SessionInner {
    store: Box<dyn MessageStore>,
    responder: Option<Arc<dyn Responder>>,
    state: SessionState,
    timer: Option<HeartbeatTimer>,
    enabled: bool,
}

type Inner = RefCell<SessionInner>;

/// Short mutable access to the session internals. Never call back into the
/// session or the application from `f`.
fn with<R>(cx: &Inner, f: impl FnOnce(&mut SessionInner) -> R) -> R {
    f(&mut cx.borrow_mut())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// See the [module documentation](self).
pub struct Session {
    session_id: SessionId,
    settings: SessionSettings,
    schedule: SessionSchedule,
    application: Arc<dyn Application>,
    dictionaries: Option<Arc<DictionaryRegistry>>,
    validator: Validator,
    parse_options: ParseOptions,
    resend_policy: ResendRequestPolicy,
    clock: Arc<dyn Clock>,
    inner: ReentrantMutex<Inner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("status", &self.status())
            .finish()
    }
}

pub struct SessionBuilder {
    settings: SessionSettings,
    application: Arc<dyn Application>,
    store_factory: Arc<dyn MessageStoreFactory>,
    store: Option<Box<dyn MessageStore>>,
    dictionaries: Option<Arc<DictionaryRegistry>>,
    clock: Arc<dyn Clock>,
}

impl SessionBuilder {
    pub fn store_factory(mut self, factory: Arc<dyn MessageStoreFactory>) -> Self {
        self.store_factory = factory;
        self
    }

    /// Use this store instead of asking the factory.
    pub fn store(mut self, store: Box<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Dictionaries for parsing and validation. Without them messages are
    /// parsed flat and not validated.
    pub fn dictionaries(mut self, registry: Arc<DictionaryRegistry>) -> Self {
        self.dictionaries = Some(registry);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<Arc<Session>> {
        let session_id = self.settings.session_id();
        if let Some(registry) = &self.dictionaries {
            registry.transport(&self.settings.begin_string)?;
        }
        let store = match self.store {
            Some(store) => store,
            None => self.store_factory.create(&session_id)?,
        };
        let now = self.clock.now();
        let inner = SessionInner {
            store,
            responder: None,
            state: SessionState::new(self.settings.heartbeat_interval, now),
            timer: None,
            enabled: true,
        };
        let session = Session {
            schedule: SessionSchedule::new(self.settings.schedule),
            validator: Validator::new(self.settings.validation),
            parse_options: self
                .settings
                .validation
                .parse_options(self.settings.validate_length_and_checksum),
            resend_policy: ResendRequestPolicy::from_settings(&self.settings),
            session_id,
            settings: self.settings,
            application: self.application,
            dictionaries: self.dictionaries,
            clock: self.clock,
            inner: ReentrantMutex::new(RefCell::new(inner)),
        };
        session.notify(|app| app.on_create(&session.session_id));
        info!(session = %session.session_id, "Created session");
        Ok(Arc::new(session))
    }
}

impl Session {
    pub fn builder(settings: SessionSettings, application: Arc<dyn Application>) -> SessionBuilder {
        SessionBuilder {
            settings,
            application,
            store_factory: Arc::new(MemoryStoreFactory),
            store: None,
            dictionaries: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn schedule(&self) -> &SessionSchedule {
        &self.schedule
    }

    // -- status -------------------------------------------------------------

    pub fn status(&self) -> SessionStatus {
        let guard = self.inner.lock();
        with(&guard, |i| i.state.status())
    }

    pub fn is_logged_on(&self) -> bool {
        let guard = self.inner.lock();
        with(&guard, |i| i.state.is_logged_on())
    }

    pub fn is_connected(&self) -> bool {
        let guard = self.inner.lock();
        with(&guard, |i| i.responder.is_some())
    }

    pub fn is_enabled(&self) -> bool {
        let guard = self.inner.lock();
        with(&guard, |i| i.enabled)
    }

    pub fn next_sender_seq_num(&self) -> u64 {
        let guard = self.inner.lock();
        with(&guard, |i| i.store.next_sender_seq_num())
    }

    pub fn next_target_seq_num(&self) -> u64 {
        let guard = self.inner.lock();
        with(&guard, |i| i.store.next_target_seq_num())
    }

    pub fn set_next_sender_seq_num(&self, seq_num: u64) -> Result<()> {
        let guard = self.inner.lock();
        Ok(with(&guard, |i| i.store.set_next_sender_seq_num(seq_num))?)
    }

    pub fn set_next_target_seq_num(&self, seq_num: u64) -> Result<()> {
        let guard = self.inner.lock();
        Ok(with(&guard, |i| i.store.set_next_target_seq_num(seq_num))?)
    }

    /// Messages waiting for a gap to close.
    pub fn queued_messages(&self) -> usize {
        let guard = self.inner.lock();
        with(&guard, |i| i.state.queued())
    }

    pub fn resend_range(&self) -> Option<ResendRange> {
        let guard = self.inner.lock();
        with(&guard, |i| i.state.resend_range)
    }

    /// Effective HeartBtInt in seconds.
    pub fn heartbeat_interval(&self) -> u64 {
        let guard = self.inner.lock();
        with(&guard, |i| i.state.heartbeat_interval)
    }

    pub fn store_snapshot(&self) -> StoreSnapshot {
        let guard = self.inner.lock();
        with(&guard, |i| i.store.snapshot())
    }

    // -- control ------------------------------------------------------------

    /// Attach a transport. An initiator inside its window sends Logon right
    /// away.
    pub fn connect(&self, responder: Arc<dyn Responder>) -> Result<()> {
        let guard = self.inner.lock();
        let cx = &*guard;
        if with(cx, |i| i.responder.is_some()) {
            self.disconnect_locked(cx, "Replaced by a new connection")?;
        }
        let now = self.clock.now();
        let heartbeat = self.settings.heartbeat_interval;
        let address = responder.remote_address();
        with(cx, |i| {
            i.state.clear(heartbeat, now);
            i.state.connected = true;
            i.responder = Some(responder);
        });
        info!(session = %self.session_id, remote = ?address, "Connected");

        if !self.check_session_time(cx)? {
            return Ok(());
        }
        if self.settings.is_initiator() && with(cx, |i| i.enabled) {
            self.generate_logon(cx)?;
        }
        Ok(())
    }

    /// Drive heartbeats from a tokio task ticking every `resolution`.
    pub fn start_timer(self: &Arc<Self>, resolution: Duration) -> Result<()> {
        let timer = HeartbeatTimer::spawn(self, resolution)?;
        let guard = self.inner.lock();
        with(&guard, |i| {
            if let Some(old) = i.timer.replace(timer) {
                old.cancel();
            }
        });
        Ok(())
    }

    /// Allow logons again; an idle connected initiator sends one now.
    pub fn logon(&self) -> Result<()> {
        let guard = self.inner.lock();
        let cx = &*guard;
        with(cx, |i| i.enabled = true);
        let idle = with(cx, |i| i.responder.is_some() && !i.state.logon_sent);
        if idle && self.settings.is_initiator() && self.schedule.is_session_time(self.clock.now()) {
            self.generate_logon(cx)?;
        }
        Ok(())
    }

    /// Log out and stay disabled until [`logon`](Session::logon).
    pub fn logout(&self, reason: Option<&str>) -> Result<()> {
        let guard = self.inner.lock();
        let cx = &*guard;
        let (logged_on, logout_sent, connected) = with(cx, |i| {
            i.enabled = false;
            (i.state.is_logged_on(), i.state.logout_sent, i.responder.is_some())
        });
        if logged_on && !logout_sent {
            self.generate_logout(cx, reason)?;
        } else if connected && !logged_on {
            self.disconnect_locked(cx, reason.unwrap_or("Logout requested"))?;
        }
        Ok(())
    }

    pub fn disconnect(&self, reason: &str) -> Result<()> {
        let guard = self.inner.lock();
        self.disconnect_locked(&guard, reason)
    }

    /// Log out if needed, drop the connection, set both sequence numbers to
    /// 1 and clear the queue. The next connection needs a fresh Logon.
    pub fn reset(&self) -> Result<()> {
        let guard = self.inner.lock();
        let cx = &*guard;
        let (logged_on, logout_sent) = with(cx, |i| (i.state.logon_received, i.state.logout_sent));
        if logged_on && !logout_sent {
            self.generate_logout(cx, Some("Session reset"))?;
        }
        self.disconnect_locked(cx, "Session reset")?;
        let now = self.clock.now();
        let heartbeat = self.settings.heartbeat_interval;
        with(cx, |i| {
            i.state.clear(heartbeat, now);
            i.store.reset()
        })?;
        info!(session = %self.session_id, "Session reset");
        Ok(())
    }

    /// Stamp, sequence, store and transmit `message`. Returns false when
    /// `to_app` vetoed it or the transport refused it; application messages
    /// sent while not logged on are stored for a later resend.
    pub fn send(&self, message: Message) -> Result<bool> {
        let guard = self.inner.lock();
        self.send_message(&guard, message, None)
    }

    /// Process one raw inbound message. Framing errors are logged and the
    /// bytes discarded.
    pub fn next_raw(&self, raw: &[u8]) -> Result<()> {
        let guard = self.inner.lock();
        let cx = &*guard;
        match self.parse(cx, raw) {
            Ok(message) => self.process(cx, message, false),
            Err(error) => {
                warn!(session = %self.session_id, %error, "Dropping invalid message");
                if !with(cx, |i| i.state.logon_received) {
                    self.disconnect_locked(cx, "Invalid message before logon")?;
                }
                Ok(())
            }
        }
    }

    /// Process one parsed inbound message.
    pub fn next(&self, message: Message) -> Result<()> {
        let guard = self.inner.lock();
        self.process(&guard, message, false)
    }

    /// Timer work: logon and logout timeouts, heartbeats, TestRequests and
    /// the heartbeat timeout.
    pub fn next_tick(&self) -> Result<()> {
        let guard = self.inner.lock();
        let cx = &*guard;
        if !with(cx, |i| i.responder.is_some()) {
            return Ok(());
        }
        if !self.check_session_time(cx)? {
            return Ok(());
        }
        let now = self.clock.now();
        let (logon_sent, logon_received, logout_sent, enabled) = with(cx, |i| {
            (i.state.logon_sent, i.state.logon_received, i.state.logout_sent, i.enabled)
        });

        if self.settings.is_initiator() && !logon_sent {
            if enabled {
                self.generate_logon(cx)?;
            }
            return Ok(());
        }
        if !logon_received {
            if with(cx, |i| i.state.logon_timed_out(now, self.settings.logon_timeout)) {
                warn!(session = %self.session_id, "Timed out waiting for logon response");
                self.disconnect_locked(cx, "Logon timeout")?;
            }
            return Ok(());
        }
        if logout_sent {
            if with(cx, |i| i.state.logout_timed_out(now, self.settings.logout_timeout)) {
                warn!(session = %self.session_id, "Timed out waiting for logout response");
                self.disconnect_locked(cx, "Logout timeout")?;
            }
            return Ok(());
        }

        let (heartbeat, timed_out, test_request, heartbeat_due) = with(cx, |i| {
            (
                i.state.heartbeat_interval,
                i.state.timed_out(now, self.settings.heartbeat_timeout_multiplier),
                i.state.test_request_needed(now, self.settings.test_request_delay_multiplier),
                i.state.heartbeat_needed(now),
            )
        });
        if heartbeat == 0 {
            return Ok(());
        }
        if timed_out {
            warn!(session = %self.session_id, "Timed out waiting for heartbeat");
            self.disconnect_locked(cx, "Heartbeat timeout")?;
        } else if test_request {
            self.send_message(cx, admin::test_request(&self.settings.begin_string, TEST_REQ_ID), None)?;
            with(cx, |i| i.state.test_request_counter += 1);
            info!(session = %self.session_id, "Sent test request {TEST_REQ_ID}");
        } else if heartbeat_due {
            self.send_message(cx, admin::heartbeat(&self.settings.begin_string, None), None)?;
        }
        Ok(())
    }

    // -- parsing and validation ---------------------------------------------

    fn dictionaries_for(
        &self,
        cx: &Inner,
        appl_ver_id: Option<&str>,
        admin: bool,
    ) -> Option<(Arc<DataDictionary>, Arc<DataDictionary>)> {
        let registry = self.dictionaries.as_ref()?;
        if admin {
            return registry.resolve(&self.settings.begin_string, None, None).ok();
        }
        let default = with(cx, |i| i.state.target_default_appl_ver_id.clone())
            .or_else(|| self.settings.default_appl_ver_id.clone());
        registry
            .resolve(&self.settings.begin_string, appl_ver_id, default.as_deref())
            .ok()
    }

    fn parser(&self, cx: &Inner, appl_ver_id: Option<&str>, admin: bool) -> MessageParser {
        let parser = MessageParser::new(self.parse_options);
        match self.dictionaries_for(cx, appl_ver_id, admin) {
            Some((transport, application)) => parser.with_dictionaries(transport, application),
            None => parser,
        }
    }

    /// Under FIXT.1.1 the body dictionary depends on the header, so admin
    /// messages and messages carrying ApplVerID are parsed a second time.
    fn parse(&self, cx: &Inner, raw: &[u8]) -> FramingResult<Message> {
        let message = self.parser(cx, None, false).parse(raw)?;
        if self.session_id.is_fixt() {
            let admin = message.is_admin();
            let appl_ver_id = message.header().get_str(tags::APPL_VER_ID).ok().map(str::to_string);
            if admin || appl_ver_id.is_some() {
                return self.parser(cx, appl_ver_id.as_deref(), admin).parse(raw);
            }
        }
        Ok(message)
    }

    fn validate(&self, cx: &Inner, message: &Message) -> std::result::Result<(), ValidationError> {
        if !self.settings.validate_incoming_messages {
            return Ok(());
        }
        let appl_ver_id = message.header().get_str(tags::APPL_VER_ID).ok();
        match self.dictionaries_for(cx, appl_ver_id, message.is_admin()) {
            Some((transport, application)) => self.validator.validate(message, &transport, &application, false),
            None => Ok(()),
        }
    }

    // -- inbound ------------------------------------------------------------

    fn process(&self, cx: &Inner, message: Message, queued: bool) -> Result<()> {
        let Ok(msg_type) = message.msg_type().map(str::to_string) else {
            warn!(session = %self.session_id, "Dropping message without MsgType: {message}");
            return Ok(());
        };
        debug!(session = %self.session_id, msg_type = %msg_type, "Received {message}");

        if !queued && !self.check_session_time(cx)? {
            return Ok(());
        }
        if message.begin_string().ok() != Some(self.settings.begin_string.as_str()) {
            let text = format!(
                "Incorrect BeginString {}",
                message.begin_string().unwrap_or_default()
            );
            return self.logout_and_disconnect(cx, &text);
        }

        match self.validate(cx, &message) {
            Ok(()) => {}
            Err(ValidationError::UnsupportedVersion { .. }) => {
                return self.logout_and_disconnect(cx, "Incorrect BeginString");
            }
            Err(ValidationError::Rejected(rejection)) => {
                warn!(session = %self.session_id, reason = %rejection.reason, "Invalid message: {}", rejection.text);
                if self.settings.disconnect_on_error {
                    return self.disconnect_locked(cx, &rejection.text);
                }
                if msg_type == msg_type::LOGON || !with(cx, |i| i.state.logon_received) {
                    return self.logout_and_disconnect(cx, &rejection.text);
                }
                if self.settings.reject_invalid_message {
                    self.generate_reject(cx, &message, &rejection)?;
                    if !queued {
                        self.next_queued(cx)?;
                    }
                    return Ok(());
                }
            }
        }

        match msg_type.as_str() {
            msg_type::LOGON => self.next_logon(cx, message)?,
            msg_type::HEARTBEAT => self.next_heartbeat(cx, message)?,
            msg_type::TEST_REQUEST => self.next_test_request(cx, message)?,
            msg_type::SEQUENCE_RESET => self.next_sequence_reset(cx, message)?,
            msg_type::LOGOUT => self.next_logout(cx, message)?,
            msg_type::RESEND_REQUEST => self.next_resend_request(cx, message)?,
            msg_type::REJECT => self.next_reject(cx, message)?,
            _ => self.next_app(cx, message)?,
        }
        if !queued {
            self.next_queued(cx)?;
        }
        Ok(())
    }

    /// Replay queued messages that are now next in sequence.
    fn next_queued(&self, cx: &Inner) -> Result<()> {
        loop {
            let next = with(cx, |i| i.store.next_target_seq_num());
            let Some(message) = with(cx, |i| i.state.dequeue(next)) else {
                return Ok(());
            };
            debug!(session = %self.session_id, seq = next, "Processing queued message");
            match message.msg_type() {
                // handled when they arrived
                Ok(msg_type::LOGON) | Ok(msg_type::RESEND_REQUEST) => {
                    with(cx, |i| i.store.incr_next_target_seq_num())?;
                }
                _ => self.process(cx, message, true)?,
            }
        }
    }

    fn valid_logon_state(&self, cx: &Inner, msg_type: &str) -> bool {
        with(cx, |i| match msg_type {
            msg_type::LOGON => !i.state.logon_received,
            msg_type::LOGOUT => i.state.logon_sent || i.state.logon_received,
            _ => i.state.logon_received,
        })
    }

    fn is_good_time(&self, message: &Message) -> bool {
        if !self.settings.check_latency {
            return true;
        }
        match message.sending_time() {
            Ok(sent) => {
                let skew = (self.clock.now() - sent.value()).num_seconds().unsigned_abs();
                skew <= self.settings.max_latency
            }
            Err(_) => false,
        }
    }

    fn is_correct_comp_id(&self, message: &Message) -> bool {
        if !self.settings.check_comp_id {
            return true;
        }
        let header = message.header();
        header.get_str(tags::SENDER_COMP_ID).ok() == Some(self.settings.target_comp_id.as_str())
            && header.get_str(tags::TARGET_COMP_ID).ok() == Some(self.settings.sender_comp_id.as_str())
    }

    /// Session checks shared by every inbound type. Returns the MsgSeqNum
    /// when the message may be processed.
    fn verify(&self, cx: &Inner, message: &Message, check_too_high: bool, check_too_low: bool) -> Result<Option<u64>> {
        let msg_type = message.msg_type().unwrap_or_default();
        if !self.valid_logon_state(cx, msg_type) {
            error!(session = %self.session_id, "Logon state is not valid for message (MsgType={msg_type})");
            self.disconnect_locked(cx, "Invalid logon state")?;
            return Ok(None);
        }
        if !self.is_good_time(message) {
            let rejection = MessageRejection::new(SessionRejectReason::SendingTimeAccuracyProblem, None);
            self.generate_reject(cx, message, &rejection)?;
            self.generate_logout(cx, Some(&rejection.text))?;
            return Ok(None);
        }
        if !self.is_correct_comp_id(message) {
            let rejection = MessageRejection::new(SessionRejectReason::CompIdProblem, None);
            self.generate_reject(cx, message, &rejection)?;
            self.generate_logout(cx, Some(&rejection.text))?;
            return Ok(None);
        }
        let Ok(seq_num) = message.seq_num() else {
            self.logout_and_disconnect(cx, "Received message without MsgSeqNum")?;
            return Ok(None);
        };

        let expected = with(cx, |i| i.store.next_target_seq_num());
        let validate = self.settings.validate_sequence_numbers;
        if validate && check_too_high && seq_num > expected {
            self.do_target_too_high(cx, message.clone(), seq_num)?;
            return Ok(None);
        }
        if validate && check_too_low && seq_num < expected {
            self.do_target_too_low(cx, message, seq_num, expected)?;
            return Ok(None);
        }

        self.check_resend_progress(cx, seq_num)?;
        let now = self.clock.now();
        with(cx, |i| {
            i.state.last_received_time = now;
            i.state.test_request_counter = 0;
        });
        Ok(Some(seq_num))
    }

    fn do_target_too_high(&self, cx: &Inner, message: Message, seq_num: u64) -> Result<()> {
        let expected = with(cx, |i| i.store.next_target_seq_num());
        warn!(
            session = %self.session_id,
            "MsgSeqNum too high, expecting {expected} but received {seq_num}"
        );
        let outstanding = with(cx, |i| {
            i.state.enqueue(seq_num, message);
            i.state.resend_range
        });
        if let Some(range) = outstanding {
            if !self.settings.send_redundant_resend_requests && seq_num >= range.begin {
                info!(
                    session = %self.session_id,
                    "Already sent ResendRequest FROM: {} TO: {}. Not sending another.",
                    range.begin,
                    range.end
                );
                return Ok(());
            }
        }
        self.generate_resend_request(cx, expected, seq_num - 1)
    }

    fn do_target_too_low(&self, cx: &Inner, message: &Message, seq_num: u64, expected: u64) -> Result<()> {
        if !message.poss_dup() {
            let text = format!("MsgSeqNum too low, expecting {expected} but received {seq_num}");
            error!(session = %self.session_id, "{text}");
            return self.logout_and_disconnect(cx, &text);
        }
        if matches!(message.msg_type(), Ok(msg_type::SEQUENCE_RESET)) {
            return Ok(());
        }
        match message.header().get_utc_timestamp(tags::ORIG_SENDING_TIME) {
            Ok(orig) => {
                let later = message
                    .sending_time()
                    .map_or(false, |sent| orig.value() > sent.value());
                if later {
                    let rejection = MessageRejection::new(SessionRejectReason::SendingTimeAccuracyProblem, None);
                    self.generate_reject(cx, message, &rejection)?;
                    self.generate_logout(cx, Some(&rejection.text))?;
                    return Ok(());
                }
            }
            Err(FieldError::NotFound { .. }) => {
                if self.settings.requires_orig_sending_time {
                    let rejection =
                        MessageRejection::for_tag(SessionRejectReason::RequiredTagMissing, tags::ORIG_SENDING_TIME);
                    return self.generate_reject(cx, message, &rejection);
                }
            }
            Err(_) => {
                let rejection = MessageRejection::for_tag(
                    SessionRejectReason::IncorrectDataFormatForValue,
                    tags::ORIG_SENDING_TIME,
                );
                return self.generate_reject(cx, message, &rejection);
            }
        }
        debug!(session = %self.session_id, seq = seq_num, "Ignoring possible duplicate below expected {expected}");
        Ok(())
    }

    /// Clear or advance the outstanding ResendRequest once `seq_num` has
    /// been accepted.
    fn check_resend_progress(&self, cx: &Inner, seq_num: u64) -> Result<()> {
        let Some(range) = with(cx, |i| i.state.resend_range) else {
            return Ok(());
        };
        if seq_num >= range.end {
            info!(
                session = %self.session_id,
                "ResendRequest for messages FROM: {} TO: {} has been satisfied.",
                range.begin,
                range.end
            );
            with(cx, |i| i.state.resend_range = None);
        } else if let Some(from) = range.next_chunk_begin(seq_num) {
            let next = self.resend_policy.next_chunk(range, from);
            let end_seq_no = self.resend_policy.end_seq_no(&next);
            self.send_message(cx, admin::resend_request(&self.settings.begin_string, from, end_seq_no), None)?;
            info!(session = %self.session_id, "Sent ResendRequest FROM: {from} TO: {end_seq_no}");
            with(cx, |i| i.state.resend_range = Some(next));
        }
        Ok(())
    }

    fn mark_processed(&self, cx: &Inner, seq_num: u64) -> Result<()> {
        with(cx, |i| {
            if i.store.next_target_seq_num() == seq_num {
                i.store.incr_next_target_seq_num()
            } else {
                Ok(())
            }
        })?;
        Ok(())
    }

    /// Hand `message` to the application. False when the callback failed;
    /// the failure has already been answered.
    fn deliver(&self, cx: &Inner, message: &Message) -> Result<bool> {
        let result = if message.is_admin() {
            self.call_app(|app| app.from_admin(message, &self.session_id))
        } else {
            self.call_app(|app| app.from_app(message, &self.session_id))
        };
        match result {
            Ok(()) => Ok(true),
            Err(error) => {
                self.handle_app_error(cx, message, error)?;
                Ok(false)
            }
        }
    }

    fn handle_app_error(&self, cx: &Inner, message: &Message, error: ApplicationError) -> Result<()> {
        let extended = begin_string::at_least_fix42(&self.settings.begin_string);
        let app_message = message.is_app();
        match error {
            ApplicationError::UnsupportedMessageType { msg_type } => {
                warn!(session = %self.session_id, "Unsupported message type {msg_type}");
                if extended && app_message {
                    self.generate_business_reject(cx, message, BusinessRejectReason::UnsupportedMessageType, None)
                } else {
                    let rejection = MessageRejection::for_tag(SessionRejectReason::InvalidMsgType, tags::MSG_TYPE);
                    self.generate_reject(cx, message, &rejection)
                }
            }
            ApplicationError::IncorrectTagValue { tag } => {
                let rejection = MessageRejection::for_tag(SessionRejectReason::ValueIsIncorrect, tag);
                self.generate_reject(cx, message, &rejection)
            }
            ApplicationError::Field(FieldError::NotFound { tag }) => {
                if extended && app_message {
                    let text = format!("Conditionally required field missing, field={tag}");
                    self.generate_business_reject(
                        cx,
                        message,
                        BusinessRejectReason::ConditionallyRequiredFieldMissing,
                        Some(&text),
                    )
                } else {
                    let rejection = MessageRejection::for_tag(SessionRejectReason::RequiredTagMissing, tag);
                    self.generate_reject(cx, message, &rejection)
                }
            }
            ApplicationError::Field(FieldError::Conversion { tag, .. }) => {
                let rejection = MessageRejection::for_tag(SessionRejectReason::IncorrectDataFormatForValue, tag);
                self.generate_reject(cx, message, &rejection)
            }
            ApplicationError::Field(other) => {
                let rejection = MessageRejection::for_tag(SessionRejectReason::RepeatingGroupFieldsOutOfOrder, other.tag())
                    .with_text(other.to_string());
                self.generate_reject(cx, message, &rejection)
            }
            ApplicationError::RejectLogon { reason } => self.logout_and_disconnect(cx, &reason),
            ApplicationError::Other(error) => {
                error!(
                    session = %self.session_id,
                    seq = ?message.seq_num().ok(),
                    "Application failed to process message: {error:#}"
                );
                if self.settings.reject_message_on_unhandled_exception {
                    if extended && app_message {
                        self.generate_business_reject(cx, message, BusinessRejectReason::ApplicationNotAvailable, None)?;
                    } else {
                        let rejection =
                            MessageRejection::new(SessionRejectReason::Other, None).with_text(error.to_string());
                        self.generate_reject(cx, message, &rejection)?;
                    }
                }
                if self.settings.disconnect_on_error {
                    self.disconnect_locked(cx, "Application error")?;
                }
                Ok(())
            }
        }
    }

    fn next_logon(&self, cx: &Inner, message: Message) -> Result<()> {
        let acceptor = !self.settings.is_initiator();
        if acceptor {
            if !with(cx, |i| i.enabled) {
                warn!(session = %self.session_id, "Logon attempt rejected: session disabled");
                return self.logout_and_disconnect(cx, "Session is not enabled for logon");
            }
            let permitted = panic::catch_unwind(AssertUnwindSafe(|| self.application.can_logon(&self.session_id)))
                .unwrap_or(false);
            if !permitted {
                warn!(session = %self.session_id, "Logon attempt rejected by application");
                return self.logout_and_disconnect(cx, "Logon rejected");
            }
        }
        if self.settings.refresh_on_logon {
            with(cx, |i| i.store.refresh())?;
        }

        let reset_requested = message.body().get_bool(tags::RESET_SEQ_NUM_FLAG).unwrap_or(false);
        if reset_requested {
            let reset_sent = with(cx, |i| i.state.reset_sent);
            if !reset_sent {
                info!(
                    session = %self.session_id,
                    "Logon contains ResetSeqNumFlag=Y, resetting sequence numbers to 1"
                );
                with(cx, |i| i.store.reset())?;
            }
            with(cx, |i| i.state.reset_received = true);
        } else if acceptor && self.settings.reset_on_logon {
            with(cx, |i| i.store.reset())?;
        }

        if acceptor {
            match message.body().get_uint(tags::HEART_BT_INT) {
                Ok(interval) => with(cx, |i| i.state.heartbeat_interval = interval),
                Err(_) => return self.logout_and_disconnect(cx, "HeartBtInt missing from Logon"),
            }
        }
        if let Ok(id) = message.body().get_str(tags::DEFAULT_APPL_VER_ID) {
            let id = id.to_string();
            with(cx, |i| i.state.target_default_appl_ver_id = Some(id));
        }

        let Some(seq_num) = self.verify(cx, &message, false, true)? else {
            return Ok(());
        };
        with(cx, |i| i.state.logon_received = true);

        match self.call_app(|app| app.from_admin(&message, &self.session_id)) {
            Ok(()) => {}
            Err(ApplicationError::RejectLogon { reason }) => {
                warn!(session = %self.session_id, "Logon rejected: {reason}");
                return self.logout_and_disconnect(cx, &reason);
            }
            Err(error) => {
                error!(session = %self.session_id, "Application failed to process Logon: {error:#}");
                return self.logout_and_disconnect(cx, "Logon rejected");
            }
        }

        if !with(cx, |i| i.state.logon_sent) {
            let reset = with(cx, |i| i.state.reset_received);
            self.generate_logon_response(cx, reset)?;
            info!(session = %self.session_id, "Responded to Logon request");
        } else {
            info!(session = %self.session_id, "Received logon response");
        }
        with(cx, |i| {
            i.state.reset_sent = false;
            i.state.reset_received = false;
        });

        let expected = with(cx, |i| i.store.next_target_seq_num());
        if self.settings.validate_sequence_numbers && seq_num > expected && !reset_requested {
            self.do_target_too_high(cx, message, seq_num)?;
        } else {
            with(cx, |i| i.store.set_next_target_seq_num(seq_num + 1))?;
        }

        let notify = with(cx, |i| {
            let ready = i.state.is_logged_on() && !i.state.logon_notified;
            if ready {
                i.state.logon_notified = true;
            }
            ready
        });
        if notify {
            info!(session = %self.session_id, "Logon complete");
            self.notify(|app| app.on_logon(&self.session_id));
        }
        Ok(())
    }

    fn next_heartbeat(&self, cx: &Inner, message: Message) -> Result<()> {
        let Some(seq_num) = self.verify(cx, &message, true, true)? else {
            return Ok(());
        };
        self.deliver(cx, &message)?;
        self.mark_processed(cx, seq_num)
    }

    fn next_test_request(&self, cx: &Inner, message: Message) -> Result<()> {
        let Some(seq_num) = self.verify(cx, &message, true, true)? else {
            return Ok(());
        };
        if self.deliver(cx, &message)? {
            let id = message.body().get_str(tags::TEST_REQ_ID).ok();
            self.send_message(cx, admin::heartbeat(&self.settings.begin_string, id), None)?;
            debug!(session = %self.session_id, test_req_id = ?id, "Answered TestRequest");
        }
        self.mark_processed(cx, seq_num)
    }

    fn next_reject(&self, cx: &Inner, message: Message) -> Result<()> {
        let Some(seq_num) = self.verify(cx, &message, true, true)? else {
            return Ok(());
        };
        warn!(
            session = %self.session_id,
            ref_seq = ?message.body().get_uint(tags::REF_SEQ_NUM).ok(),
            "Received Reject: {}",
            message.body().get_str(tags::TEXT).unwrap_or_default()
        );
        self.deliver(cx, &message)?;
        self.mark_processed(cx, seq_num)
    }

    fn next_sequence_reset(&self, cx: &Inner, message: Message) -> Result<()> {
        let gap_fill = message.body().get_bool(tags::GAP_FILL_FLAG).unwrap_or(false);
        if self.verify(cx, &message, gap_fill, gap_fill)?.is_none() {
            return Ok(());
        }
        if !self.deliver(cx, &message)? {
            return Ok(());
        }
        let new_seq_no = match message.body().get_uint(tags::NEW_SEQ_NO) {
            Ok(value) => value,
            Err(_) => {
                let rejection = MessageRejection::for_tag(SessionRejectReason::RequiredTagMissing, tags::NEW_SEQ_NO);
                return self.generate_reject(cx, &message, &rejection);
            }
        };

        let expected = with(cx, |i| i.store.next_target_seq_num());
        if new_seq_no > expected {
            info!(session = %self.session_id, "Received SequenceReset FROM: {expected} TO: {new_seq_no}");
            with(cx, |i| {
                i.state.drop_queued_below(new_seq_no);
                i.store.set_next_target_seq_num(new_seq_no)
            })?;
            self.check_resend_progress(cx, new_seq_no - 1)?;
        } else if new_seq_no < expected {
            let rejection = MessageRejection::for_tag(SessionRejectReason::ValueIsIncorrect, tags::NEW_SEQ_NO)
                .with_text(format!(
                    "Attempt to lower sequence number, invalid value NewSeqNo({new_seq_no}) < expected {expected}"
                ));
            self.generate_reject(cx, &message, &rejection)?;
        }
        Ok(())
    }

    fn next_logout(&self, cx: &Inner, message: Message) -> Result<()> {
        let Some(seq_num) = self.verify(cx, &message, false, false)? else {
            return Ok(());
        };
        self.deliver(cx, &message)?;
        let text = message.body().get_str(tags::TEXT).unwrap_or_default().to_string();
        let logout_sent = with(cx, |i| i.state.logout_sent);
        if logout_sent {
            info!(session = %self.session_id, "Received logout response");
        } else {
            info!(session = %self.session_id, text = %text, "Received logout request");
            self.generate_logout(cx, None)?;
        }
        with(cx, |i| i.state.logout_received = true);
        self.mark_processed(cx, seq_num)?;
        if self.settings.reset_on_logout {
            with(cx, |i| i.store.reset())?;
        }
        self.disconnect_locked(cx, "Received logout")
    }

    fn next_resend_request(&self, cx: &Inner, message: Message) -> Result<()> {
        let Some(seq_num) = self.verify(cx, &message, false, false)? else {
            return Ok(());
        };
        if !self.deliver(cx, &message)? {
            return self.mark_processed(cx, seq_num);
        }
        let body = message.body();
        let (begin, end) = match (body.get_uint(tags::BEGIN_SEQ_NO), body.get_uint(tags::END_SEQ_NO)) {
            (Ok(begin), Ok(end)) => (begin, end),
            (Err(_), _) => {
                let rejection = MessageRejection::for_tag(SessionRejectReason::RequiredTagMissing, tags::BEGIN_SEQ_NO);
                return self.generate_reject(cx, &message, &rejection);
            }
            (_, Err(_)) => {
                let rejection = MessageRejection::for_tag(SessionRejectReason::RequiredTagMissing, tags::END_SEQ_NO);
                return self.generate_reject(cx, &message, &rejection);
            }
        };
        info!(session = %self.session_id, "Received ResendRequest FROM: {begin} TO: {end}");
        self.resend_messages(cx, begin, end)?;

        let expected = with(cx, |i| i.store.next_target_seq_num());
        if seq_num == expected {
            with(cx, |i| i.store.incr_next_target_seq_num())?;
        } else if seq_num > expected && self.settings.validate_sequence_numbers {
            self.do_target_too_high(cx, message, seq_num)?;
        }
        Ok(())
    }

    fn next_app(&self, cx: &Inner, message: Message) -> Result<()> {
        let Some(seq_num) = self.verify(cx, &message, true, true)? else {
            return Ok(());
        };
        self.deliver(cx, &message)?;
        self.mark_processed(cx, seq_num)
    }

    // -- resend servicing ---------------------------------------------------

    fn resend_messages(&self, cx: &Inner, begin: u64, end: u64) -> Result<()> {
        let last_sent = with(cx, |i| i.store.next_sender_seq_num()).saturating_sub(1);
        let Some((begin, end)) = clamp_request(begin, end, last_sent) else {
            warn!(
                session = %self.session_id,
                "ResendRequest FROM: {begin} TO: {end} covers nothing sent (last sent {last_sent})"
            );
            return Ok(());
        };
        if !self.settings.persist_messages {
            return self.generate_gap_fill(cx, begin, end + 1);
        }

        let mut gaps = GapTracker::new(begin);
        for (from, to) in batches(begin, end, self.settings.resend_batch_size) {
            let stored = with(cx, |i| i.store.get(from, to))?;
            for raw in stored {
                self.resend_stored(cx, &raw, &mut gaps)?;
            }
        }
        if let Some((gap_begin, new_seq_no)) = gaps.finish(end) {
            self.generate_gap_fill(cx, gap_begin, new_seq_no)?;
        }
        Ok(())
    }

    fn resend_stored(&self, cx: &Inner, raw: &[u8], gaps: &mut GapTracker) -> Result<()> {
        let mut message = match self.parse(cx, raw) {
            Ok(message) => message,
            Err(error) => {
                warn!(session = %self.session_id, %error, "Stored message unreadable, gap filling it");
                return Ok(());
            }
        };
        let (Ok(seq_num), Ok(kind)) = (message.seq_num(), message.msg_type().map(str::to_string)) else {
            warn!(session = %self.session_id, "Stored message without MsgSeqNum or MsgType, gap filling it");
            return Ok(());
        };
        if msg_type::is_admin(&kind) && kind != msg_type::REJECT {
            gaps.skip(seq_num);
            return Ok(());
        }

        if msg_type::is_admin(&kind) {
            self.notify(|app| app.to_admin(&mut message, &self.session_id));
        } else {
            let allowed =
                panic::catch_unwind(AssertUnwindSafe(|| self.application.to_app(&mut message, &self.session_id)));
            if !matches!(allowed, Ok(Ok(()))) {
                debug!(session = %self.session_id, seq = seq_num, "Resend vetoed, gap filling");
                gaps.skip(seq_num);
                return Ok(());
            }
        }

        let now = UtcTimestamp::new(self.clock.now(), self.settings.timestamp_precision);
        let resent = if message.parse_error().is_none() {
            let header = message.header_mut();
            if let Ok(orig) = header.get_field(tags::SENDING_TIME).map(|f| f.value().to_vec()) {
                header.set_field(fix_types::Field::new(tags::ORIG_SENDING_TIME, orig));
            }
            header.set_bool(tags::POSS_DUP_FLAG, true);
            header.set_utc_timestamp(tags::SENDING_TIME, now);
            encode(&message)
        } else {
            reframe_for_resend(raw, &now)
        };
        let resent = match resent {
            Ok(resent) => resent,
            Err(error) => {
                warn!(session = %self.session_id, %error, seq = seq_num, "Cannot re-frame stored message, gap filling");
                gaps.skip(seq_num);
                return Ok(());
            }
        };

        if let Some((gap_begin, new_seq_no)) = gaps.resend(seq_num) {
            self.generate_gap_fill(cx, gap_begin, new_seq_no)?;
        }
        self.transmit(cx, &resent);
        info!(session = %self.session_id, "Resending message: {seq_num}");
        Ok(())
    }

    fn generate_gap_fill(&self, cx: &Inner, begin: u64, new_seq_no: u64) -> Result<()> {
        let mut message = admin::sequence_reset(&self.settings.begin_string, new_seq_no, true);
        let header = message.header_mut();
        header.set_bool(tags::POSS_DUP_FLAG, true);
        header.set_utc_timestamp(
            tags::ORIG_SENDING_TIME,
            UtcTimestamp::new(self.clock.now(), self.settings.timestamp_precision),
        );
        self.send_message(cx, message, Some(begin))?;
        info!(session = %self.session_id, "Sent SequenceReset GapFill FROM: {begin} TO: {new_seq_no}");
        Ok(())
    }

    // -- outbound -----------------------------------------------------------

    fn generate_logon(&self, cx: &Inner) -> Result<()> {
        let appl_ver_id = self
            .session_id
            .is_fixt()
            .then(|| self.settings.default_appl_ver_id.as_deref())
            .flatten();
        let logon = admin::logon(
            &self.settings.begin_string,
            self.settings.heartbeat_interval,
            self.settings.reset_on_logon,
            appl_ver_id,
        );
        let now = self.clock.now();
        with(cx, |i| {
            i.state.logon_sent = true;
            i.state.logon_sent_time = Some(now);
        });
        self.send_message(cx, logon, None)?;
        info!(session = %self.session_id, "Initiated logon request");
        Ok(())
    }

    fn generate_logon_response(&self, cx: &Inner, reset: bool) -> Result<()> {
        let appl_ver_id = self
            .session_id
            .is_fixt()
            .then(|| self.settings.default_appl_ver_id.as_deref())
            .flatten();
        let heartbeat = with(cx, |i| i.state.heartbeat_interval);
        let logon = admin::logon(&self.settings.begin_string, heartbeat, reset, appl_ver_id);
        let now = self.clock.now();
        with(cx, |i| {
            i.state.logon_sent = true;
            i.state.logon_sent_time = Some(now);
        });
        self.send_message(cx, logon, None)?;
        Ok(())
    }

    fn generate_logout(&self, cx: &Inner, text: Option<&str>) -> Result<()> {
        self.send_message(cx, admin::logout(&self.settings.begin_string, text), None)?;
        let now = self.clock.now();
        with(cx, |i| {
            i.state.logout_sent = true;
            i.state.logout_sent_time = Some(now);
        });
        info!(session = %self.session_id, reason = text.unwrap_or_default(), "Sent logout");
        Ok(())
    }

    fn generate_resend_request(&self, cx: &Inner, begin: u64, end: u64) -> Result<()> {
        let range = self.resend_policy.request(begin, end);
        let end_seq_no = self.resend_policy.end_seq_no(&range);
        self.send_message(cx, admin::resend_request(&self.settings.begin_string, begin, end_seq_no), None)?;
        info!(session = %self.session_id, "Sent ResendRequest FROM: {begin} TO: {end_seq_no}");
        with(cx, |i| i.state.resend_range = Some(range));
        Ok(())
    }

    /// The rejected message counts as processed when it was the expected
    /// one, except Logon and SequenceReset which manage the counter
    /// themselves.
    fn generate_reject(&self, cx: &Inner, message: &Message, rejection: &MessageRejection) -> Result<()> {
        let kind = message.msg_type().unwrap_or_default();
        if kind != msg_type::LOGON && kind != msg_type::SEQUENCE_RESET {
            if let Ok(seq_num) = message.seq_num() {
                self.mark_processed(cx, seq_num)?;
            }
        }
        warn!(
            session = %self.session_id,
            seq = ?message.seq_num().ok(),
            reason = %rejection.reason,
            "Message rejected: {}",
            rejection.text
        );
        self.send_message(cx, admin::reject(&self.settings.begin_string, message, rejection), None)?;
        Ok(())
    }

    fn generate_business_reject(
        &self,
        cx: &Inner,
        message: &Message,
        reason: BusinessRejectReason,
        text: Option<&str>,
    ) -> Result<()> {
        if let Ok(seq_num) = message.seq_num() {
            self.mark_processed(cx, seq_num)?;
        }
        warn!(
            session = %self.session_id,
            seq = ?message.seq_num().ok(),
            "Message rejected: {}",
            text.unwrap_or(reason.text())
        );
        let reject = admin::business_reject(&self.settings.begin_string, message, reason, text);
        self.send_message(cx, reject, None)?;
        Ok(())
    }

    fn logout_and_disconnect(&self, cx: &Inner, text: &str) -> Result<()> {
        let (connected, logout_sent) = with(cx, |i| (i.responder.is_some(), i.state.logout_sent));
        if connected && !logout_sent {
            self.generate_logout(cx, Some(text))?;
        }
        self.disconnect_locked(cx, text)
    }

    fn stamp_header(&self, message: &mut Message, seq_num: u64) {
        let settings = &self.settings;
        let header = message.header_mut();
        header.set_str(tags::BEGIN_STRING, &settings.begin_string);
        header.set_str(tags::SENDER_COMP_ID, &settings.sender_comp_id);
        header.set_str(tags::TARGET_COMP_ID, &settings.target_comp_id);
        let optional = [
            (tags::SENDER_SUB_ID, &settings.sender_sub_id),
            (tags::SENDER_LOCATION_ID, &settings.sender_location_id),
            (tags::TARGET_SUB_ID, &settings.target_sub_id),
            (tags::TARGET_LOCATION_ID, &settings.target_location_id),
        ];
        for (tag, value) in optional {
            if let Some(value) = value {
                header.set_str(tag, value);
            }
        }
        header.set_uint(tags::MSG_SEQ_NUM, seq_num);
        header.set_utc_timestamp(
            tags::SENDING_TIME,
            UtcTimestamp::new(self.clock.now(), settings.timestamp_precision),
        );
    }

    /// `seq_override` sends under an earlier sequence number (gap fills)
    /// without storing or advancing the counter.
    fn send_message(&self, cx: &Inner, mut message: Message, seq_override: Option<u64>) -> Result<bool> {
        let kind = message.msg_type().map_err(|_| SessionError::MissingMsgType)?.to_string();
        let is_admin = msg_type::is_admin(&kind);
        let mut seq_num = seq_override.unwrap_or_else(|| with(cx, |i| i.store.next_sender_seq_num()));
        self.stamp_header(&mut message, seq_num);

        if is_admin {
            self.notify(|app| app.to_admin(&mut message, &self.session_id));
            let wants_reset = kind == msg_type::LOGON
                && seq_override.is_none()
                && message.body().get_bool(tags::RESET_SEQ_NUM_FLAG).unwrap_or(false);
            if wants_reset && with(cx, |i| !i.state.reset_sent && !i.state.reset_received) {
                with(cx, |i| {
                    i.state.reset_sent = true;
                    i.store.reset()
                })?;
                seq_num = 1;
                message.header_mut().set_uint(tags::MSG_SEQ_NUM, seq_num);
                info!(session = %self.session_id, "Sending Logon with ResetSeqNumFlag=Y");
            }
        } else {
            let allowed =
                panic::catch_unwind(AssertUnwindSafe(|| self.application.to_app(&mut message, &self.session_id)));
            match allowed {
                Ok(Ok(())) => {}
                Ok(Err(veto)) => {
                    debug!(session = %self.session_id, "{veto}");
                    return Ok(false);
                }
                Err(payload) => {
                    error!(
                        session = %self.session_id,
                        "to_app panicked, message not sent: {}",
                        panic_message(&*payload)
                    );
                    return Ok(false);
                }
            }
        }

        let raw = encode(&message)?;
        if seq_override.is_none() {
            let persist = self.settings.persist_messages;
            with(cx, |i| -> std::result::Result<(), StoreError> {
                if persist {
                    i.store.set(seq_num, &raw)?;
                }
                i.store.incr_next_sender_seq_num()
            })?;
        }

        let always = matches!(
            kind.as_str(),
            msg_type::LOGON | msg_type::LOGOUT | msg_type::RESEND_REQUEST | msg_type::SEQUENCE_RESET
        );
        if !always && !with(cx, |i| i.state.is_logged_on()) {
            debug!(session = %self.session_id, seq = seq_num, "Not logged on, message stored for resend");
            return Ok(false);
        }
        debug!(session = %self.session_id, "Sending {message}");
        Ok(self.transmit(cx, &raw))
    }

    fn transmit(&self, cx: &Inner, raw: &[u8]) -> bool {
        let Some(responder) = with(cx, |i| i.responder.clone()) else {
            debug!(session = %self.session_id, "No responder, message not transmitted");
            return false;
        };
        let sent = responder.send(raw);
        let now = self.clock.now();
        with(cx, |i| i.state.last_sent_time = now);
        if !sent {
            warn!(session = %self.session_id, "Transport refused message");
        }
        sent
    }

    // -- schedule and teardown ----------------------------------------------

    /// False when the session may not run now. Outside the window a live
    /// session is logged out; a store created in an earlier window is reset.
    fn check_session_time(&self, cx: &Inner) -> Result<bool> {
        let now = self.clock.now();
        if !self.schedule.is_session_time(now) {
            let (connected, logged_on) = with(cx, |i| (i.responder.is_some(), i.state.is_logged_on()));
            if logged_on {
                warn!(session = %self.session_id, "Session outside of active time");
                self.logout_and_disconnect(cx, "Session outside of active time")?;
            } else if connected {
                self.disconnect_locked(cx, "Session outside of active time")?;
            }
            return Ok(false);
        }
        let creation_time = with(cx, |i| i.store.creation_time());
        if !self.schedule.is_same_session(creation_time, now) {
            info!(session = %self.session_id, "New session period, resetting sequence numbers");
            let active = with(cx, |i| i.state.logon_received);
            if active {
                self.logout_and_disconnect(cx, "New session period")?;
            }
            with(cx, |i| i.store.reset())?;
            return Ok(!active);
        }
        Ok(true)
    }

    fn disconnect_locked(&self, cx: &Inner, reason: &str) -> Result<()> {
        let (responder, timer, notify) = with(cx, |i| {
            (i.responder.take(), i.timer.take(), i.state.logon_notified)
        });
        if let Some(timer) = timer {
            timer.cancel();
        }
        let Some(responder) = responder else {
            return Ok(());
        };
        info!(session = %self.session_id, reason, "Disconnecting");
        responder.disconnect();

        let now = self.clock.now();
        let heartbeat = self.settings.heartbeat_interval;
        with(cx, |i| i.state.clear(heartbeat, now));
        if self.settings.reset_on_disconnect {
            with(cx, |i| i.store.reset())?;
        }
        if notify {
            self.notify(|app| app.on_logout(&self.session_id));
        }
        Ok(())
    }

    // -- application guards -------------------------------------------------

    fn call_app(
        &self,
        f: impl FnOnce(&dyn Application) -> std::result::Result<(), ApplicationError>,
    ) -> std::result::Result<(), ApplicationError> {
        match panic::catch_unwind(AssertUnwindSafe(|| f(self.application.as_ref()))) {
            Ok(result) => result,
            Err(payload) => Err(ApplicationError::Other(anyhow!(
                "application callback panicked: {}",
                panic_message(&*payload)
            ))),
        }
    }

    fn notify(&self, f: impl FnOnce(&dyn Application)) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(self.application.as_ref()))) {
            error!(
                session = %self.session_id,
                "Application callback panicked: {}",
                panic_message(&*payload)
            );
        }
    }
}
