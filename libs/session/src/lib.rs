//! # FIX Session - Protocol State Machine
//!
//! ## Purpose
//!
//! Runs the FIX session layer for one counterparty at a time: Logon and
//! Logout handshakes, MsgSeqNum bookkeeping, gap detection and recovery,
//! heartbeats and TestRequests, and the session-level Reject rules. The
//! application only sees messages that passed those checks.
//!
//! ## Architecture Role
//!
//! ```text
//! transport → Responder ─┐
//!                        ↓
//!   bytes → Session::next_raw → verify → Application::from_app
//!               ↑      │
//!      HeartbeatTimer  └→ MessageStore (sequence numbers, sent messages)
//! ```
//!
//! ## Collaborators
//! - [`Application`]: callbacks for logon, logout and every message
//! - [`Responder`]: writes wire bytes and closes the connection
//! - [`MessageStore`]: sequence counters plus sent messages for resends
//! - [`Clock`]: time source, swappable for deterministic tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fix_config::{ConnectionType, SessionSettings};
//! use fix_session::{Application, ApplicationError, Session, SessionRegistry};
//! use fix_types::{Message, SessionId};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl Application for Printer {
//!     fn on_logon(&self, id: &SessionId) {
//!         println!("{id} logged on");
//!     }
//!     fn on_logout(&self, id: &SessionId) {
//!         println!("{id} logged out");
//!     }
//!     fn from_app(&self, message: &Message, _: &SessionId) -> Result<(), ApplicationError> {
//!         println!("{message}");
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = SessionSettings::new("FIX.4.4", "BANZAI", "EXEC", ConnectionType::Initiator);
//! let session = Session::builder(settings, Arc::new(Printer)).build()?;
//! let registry = SessionRegistry::new();
//! registry.register(Arc::clone(&session))?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod application;
pub mod clock;
pub mod error;
pub mod recovery;
pub mod registry;
pub mod responder;
pub mod schedule;
pub mod session;
pub mod state;
pub mod store;
pub mod timer;

pub use admin::BusinessRejectReason;
pub use application::Application;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ApplicationError, DoNotSend, Result, SessionError, StoreError};
pub use recovery::ResendRequestPolicy;
pub use registry::SessionRegistry;
pub use responder::Responder;
pub use schedule::SessionSchedule;
pub use session::{Session, SessionBuilder};
pub use state::{ResendRange, SessionStatus};
pub use store::{MemoryStore, MemoryStoreFactory, MessageStore, MessageStoreFactory, StoreResult, StoreSnapshot};
pub use timer::{HeartbeatTimer, DEFAULT_RESOLUTION};
