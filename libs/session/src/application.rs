//! Application Callbacks
//!
//! Hooks through which the embedding program sees session events and
//! messages. Callbacks run on the session's thread with the session lock
//! held; they may call back into the same [`Session`](crate::Session), for
//! example to send a reply from `from_app`.

use crate::error::{ApplicationError, DoNotSend};
use fix_types::{Message, SessionId};

pub trait Application: Send + Sync {
    /// Called once when the session is built.
    fn on_create(&self, _session_id: &SessionId) {}

    /// Both Logons have been exchanged.
    fn on_logon(&self, session_id: &SessionId);

    /// A logged-on session ended.
    fn on_logout(&self, session_id: &SessionId);

    /// Last look at an outbound administrative message.
    fn to_admin(&self, _message: &mut Message, _session_id: &SessionId) {}

    /// Inbound administrative message. Returning
    /// [`ApplicationError::RejectLogon`] for a Logon refuses it.
    fn from_admin(&self, _message: &Message, _session_id: &SessionId) -> Result<(), ApplicationError> {
        Ok(())
    }

    /// Last look at an outbound application message, including resends.
    /// [`DoNotSend`] drops it without consuming a sequence number; during a
    /// resend the message is gap-filled instead.
    fn to_app(&self, _message: &mut Message, _session_id: &SessionId) -> Result<(), DoNotSend> {
        Ok(())
    }

    fn from_app(&self, message: &Message, session_id: &SessionId) -> Result<(), ApplicationError>;

    /// Whether an inbound Logon may be accepted at all.
    fn can_logon(&self, _session_id: &SessionId) -> bool {
        true
    }
}
