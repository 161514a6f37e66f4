//! Heartbeat Timer
//!
//! A tokio task that calls [`Session::next_tick`] at a fixed resolution. It
//! holds only a `Weak` reference, so it ends by itself once the session is
//! dropped; disconnect aborts it while holding the session lock.

use crate::error::{Result, SessionError};
use crate::session::Session;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

pub const DEFAULT_RESOLUTION: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct HeartbeatTimer {
    handle: JoinHandle<()>,
}

impl HeartbeatTimer {
    /// Spawn the driver on the current tokio runtime.
    pub fn spawn(session: &Arc<Session>, resolution: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let weak: Weak<Session> = Arc::downgrade(session);
        let session_id = session.session_id().clone();
        let handle = runtime.spawn(async move {
            let mut ticker = interval(resolution);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(session) = weak.upgrade() else {
                    break;
                };
                if let Err(error) = session.next_tick() {
                    warn!(session = %session_id, %error, "Timer tick failed");
                }
            }
            debug!(session = %session_id, "Heartbeat timer finished");
        });
        Ok(Self { handle })
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for HeartbeatTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
