//! Session Error Types
//!
//! [`SessionError`] covers failures of the session's own operations.
//! Application callbacks report through [`ApplicationError`], which the
//! session converts into Rejects, BusinessMessageRejects or a Logout instead
//! of propagating.

use fix_codec::{DictionaryError, FramingError};
use fix_types::{FieldError, SessionId, Tag};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Message store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Message store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Corrupt message store state: {reason}")]
    Corrupt { reason: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid outbound message: {0}")]
    Encode(#[from] FramingError),

    #[error("Outbound message has no MsgType")]
    MissingMsgType,

    #[error(transparent)]
    Dictionary(#[from] DictionaryError),

    #[error("Session {session_id} is already registered")]
    DuplicateSession { session_id: SessionId },

    #[error("Session {session_id} not found")]
    UnknownSession { session_id: SessionId },

    #[error("Heartbeat timer needs a running tokio runtime")]
    NoRuntime,
}

/// Faults raised by [`Application`](crate::Application) callbacks
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Refuse a Logon; the reason is sent as the Logout text
    #[error("Logon rejected: {reason}")]
    RejectLogon { reason: String },

    #[error("Unsupported message type {msg_type}")]
    UnsupportedMessageType { msg_type: String },

    #[error("Incorrect value for tag {tag}")]
    IncorrectTagValue { tag: Tag },

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApplicationError {
    pub fn reject_logon(reason: impl Into<String>) -> Self {
        ApplicationError::RejectLogon { reason: reason.into() }
    }
}

/// Veto returned by [`Application::to_app`](crate::Application::to_app)
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Default)]
#[error("Message vetoed by application")]
pub struct DoNotSend;
