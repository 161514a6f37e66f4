use thiserror::Error;

/// Settings rejected by [`EngineConfig::validate`](crate::EngineConfig::validate)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No sessions configured")]
    NoSessions,

    #[error("Session {session}: {field} must not be empty")]
    MissingCompId { session: String, field: &'static str },

    #[error("Session {session}: unsupported BeginString '{begin_string}'")]
    UnsupportedBeginString { session: String, begin_string: String },

    #[error("Session {session}: FIXT.1.1 sessions need default_appl_ver_id")]
    MissingApplVerId { session: String },

    #[error("Session {session}: initiators need a positive heartbeat_interval")]
    InvalidHeartbeatInterval { session: String },

    #[error("Session {session}: {key} {reason}")]
    InvalidSetting {
        session: String,
        key: &'static str,
        reason: &'static str,
    },

    #[error("Session {session}: invalid schedule: {reason}")]
    InvalidSchedule { session: String, reason: &'static str },

    #[error("Session {session} configured more than once")]
    DuplicateSession { session: String },
}
