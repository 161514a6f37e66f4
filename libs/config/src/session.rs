//! Per-session settings
//!
//! Every knob has a serde default so a session table only needs the
//! identity fields and `connection_type`; anything else comes from the
//! `[default]` table or the defaults below. Durations are whole seconds.

use crate::schedule::ScheduleSettings;
use fix_codec::ValidationOptions;
use fix_types::{SessionId, TimestampPrecision};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Connects out and sends the first Logon
    Initiator,
    /// Accepts connections and answers Logon
    Acceptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub begin_string: String,
    pub sender_comp_id: String,
    pub target_comp_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_sub_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_location_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sub_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_location_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_qualifier: Option<String>,
    /// DefaultApplVerID (1137) sent on a FIXT.1.1 Logon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_appl_ver_id: Option<String>,

    pub connection_type: ConnectionType,

    /// HeartBtInt (108) in seconds. Initiators send it; acceptors adopt
    /// the counterparty's value.
    #[serde(default = "defaults::heartbeat_interval")]
    pub heartbeat_interval: u64,
    /// Extra silence, as a fraction of the heartbeat interval, tolerated
    /// before a TestRequest is sent
    #[serde(default = "defaults::test_request_delay_multiplier")]
    pub test_request_delay_multiplier: f64,
    /// Extra silence, as a fraction of the heartbeat interval, tolerated
    /// before the connection is declared dead
    #[serde(default = "defaults::heartbeat_timeout_multiplier")]
    pub heartbeat_timeout_multiplier: f64,
    #[serde(default = "defaults::logon_timeout")]
    pub logon_timeout: u64,
    #[serde(default = "defaults::logout_timeout")]
    pub logout_timeout: u64,

    #[serde(default)]
    pub reset_on_logon: bool,
    #[serde(default)]
    pub reset_on_logout: bool,
    #[serde(default)]
    pub reset_on_disconnect: bool,
    /// Reload store state before processing a Logon
    #[serde(default)]
    pub refresh_on_logon: bool,
    /// Keep sent messages in the store for resends. When off, resends are
    /// answered with a single gap fill.
    #[serde(default = "defaults::enabled")]
    pub persist_messages: bool,

    #[serde(default = "defaults::enabled")]
    pub check_comp_id: bool,
    #[serde(default = "defaults::enabled")]
    pub check_latency: bool,
    /// Maximum SendingTime skew in seconds when `check_latency` is set
    #[serde(default = "defaults::max_latency")]
    pub max_latency: u64,
    /// PossDup messages must carry OrigSendingTime (122)
    #[serde(default = "defaults::enabled")]
    pub requires_orig_sending_time: bool,
    #[serde(default = "defaults::enabled")]
    pub validate_sequence_numbers: bool,

    /// Largest range requested by one ResendRequest; 0 requests the whole
    /// gap at once
    #[serde(default)]
    pub resend_request_chunk_size: u64,
    /// Messages fetched from the store per batch when servicing a
    /// ResendRequest; 0 fetches the whole range at once
    #[serde(default)]
    pub resend_batch_size: u64,
    /// Send the actual last missing sequence number as EndSeqNo instead of
    /// the open-ended 0 (999999 before FIX.4.2)
    #[serde(default = "defaults::enabled")]
    pub closed_resend_interval: bool,
    /// Issue a new ResendRequest even when one already covers the gap
    #[serde(default)]
    pub send_redundant_resend_requests: bool,

    #[serde(default = "defaults::enabled")]
    pub validate_incoming_messages: bool,
    #[serde(default = "defaults::enabled")]
    pub validate_length_and_checksum: bool,
    /// Reject messages failing validation; when off they reach the
    /// application anyway
    #[serde(default = "defaults::enabled")]
    pub reject_invalid_message: bool,
    /// Answer an application fault with a Reject or BusinessMessageReject
    #[serde(default)]
    pub reject_message_on_unhandled_exception: bool,
    /// Disconnect instead of rejecting when a message cannot be processed
    #[serde(default)]
    pub disconnect_on_error: bool,

    #[serde(default)]
    pub timestamp_precision: TimestampPrecision,
    /// Active-time window; absent means the session never closes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleSettings>,
    #[serde(default)]
    pub validation: ValidationOptions,
}

mod defaults {
    pub fn heartbeat_interval() -> u64 {
        30
    }

    pub fn test_request_delay_multiplier() -> f64 {
        0.5
    }

    pub fn heartbeat_timeout_multiplier() -> f64 {
        1.4
    }

    pub fn logon_timeout() -> u64 {
        10
    }

    pub fn logout_timeout() -> u64 {
        2
    }

    pub fn max_latency() -> u64 {
        120
    }

    pub fn enabled() -> bool {
        true
    }
}

impl SessionSettings {
    /// Settings with every knob at its default.
    pub fn new(
        begin_string: impl Into<String>,
        sender_comp_id: impl Into<String>,
        target_comp_id: impl Into<String>,
        connection_type: ConnectionType,
    ) -> Self {
        Self {
            begin_string: begin_string.into(),
            sender_comp_id: sender_comp_id.into(),
            target_comp_id: target_comp_id.into(),
            sender_sub_id: None,
            sender_location_id: None,
            target_sub_id: None,
            target_location_id: None,
            session_qualifier: None,
            default_appl_ver_id: None,
            connection_type,
            heartbeat_interval: defaults::heartbeat_interval(),
            test_request_delay_multiplier: defaults::test_request_delay_multiplier(),
            heartbeat_timeout_multiplier: defaults::heartbeat_timeout_multiplier(),
            logon_timeout: defaults::logon_timeout(),
            logout_timeout: defaults::logout_timeout(),
            reset_on_logon: false,
            reset_on_logout: false,
            reset_on_disconnect: false,
            refresh_on_logon: false,
            persist_messages: true,
            check_comp_id: true,
            check_latency: true,
            max_latency: defaults::max_latency(),
            requires_orig_sending_time: true,
            validate_sequence_numbers: true,
            resend_request_chunk_size: 0,
            resend_batch_size: 0,
            closed_resend_interval: true,
            send_redundant_resend_requests: false,
            validate_incoming_messages: true,
            validate_length_and_checksum: true,
            reject_invalid_message: true,
            reject_message_on_unhandled_exception: false,
            disconnect_on_error: false,
            timestamp_precision: TimestampPrecision::default(),
            schedule: None,
            validation: ValidationOptions::default(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        let mut id = SessionId::new(
            self.begin_string.as_str(),
            self.sender_comp_id.as_str(),
            self.target_comp_id.as_str(),
        );
        if let Some(sub) = &self.sender_sub_id {
            id = id.with_sender_sub_id(sub.as_str());
        }
        if let Some(location) = &self.sender_location_id {
            id = id.with_sender_location_id(location.as_str());
        }
        if let Some(sub) = &self.target_sub_id {
            id = id.with_target_sub_id(sub.as_str());
        }
        if let Some(location) = &self.target_location_id {
            id = id.with_target_location_id(location.as_str());
        }
        if let Some(qualifier) = &self.session_qualifier {
            id = id.with_qualifier(qualifier.as_str());
        }
        id
    }

    pub fn is_initiator(&self) -> bool {
        self.connection_type == ConnectionType::Initiator
    }

    pub fn heartbeat_duration(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }

    pub fn logon_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.logon_timeout)
    }

    pub fn logout_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.logout_timeout)
    }

    pub fn max_latency_duration(&self) -> Duration {
        Duration::from_secs(self.max_latency)
    }
}
