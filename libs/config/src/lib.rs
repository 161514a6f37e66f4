//! # FIX Engine Configuration
//!
//! Settings for every session the engine runs, loaded once at startup.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fix_config::EngineConfig;
//! use std::path::Path;
//!
//! let config = EngineConfig::load_validated(Path::new("config/engine.toml"))?;
//! for settings in &config.sessions {
//!     println!("{} heartbeat={}s", settings.session_id(), settings.heartbeat_interval);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod engine;
pub mod error;
pub mod schedule;
pub mod session;

pub use engine::{validate_session, EngineConfig, ENV_PREFIX};
pub use error::ConfigError;
pub use schedule::ScheduleSettings;
pub use session::{ConnectionType, SessionSettings};
