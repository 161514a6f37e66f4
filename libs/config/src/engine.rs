//! Engine Configuration Module
//!
//! Loads the session list from a TOML file. Keys in the `[default]` table
//! apply to every `[[sessions]]` entry unless the entry overrides them;
//! nested tables (`schedule`, `validation`) merge key by key.
//!
//! ```toml
//! [default]
//! begin_string = "FIX.4.4"
//! connection_type = "acceptor"
//! heartbeat_interval = 30
//!
//! [[sessions]]
//! sender_comp_id = "EXEC"
//! target_comp_id = "BANZAI"
//! ```
//!
//! Environment variables with the `FIX_` prefix override values in the
//! file, using `__` between key segments: `FIX_DEFAULT__HEARTBEAT_INTERVAL=10`.

use crate::error::ConfigError;
use crate::session::SessionSettings;
use anyhow::{Context, Result};
use config_crate::{Config, ConfigBuilder, Environment, File, FileFormat, Map, Value};
use fix_types::tags::begin_string;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "FIX";

#[derive(Debug, Deserialize)]
struct RawEngineConfig {
    #[serde(default)]
    default: Map<String, Value>,
    #[serde(default)]
    sessions: Vec<Map<String, Value>>,
}

/// All configured sessions, with defaults applied
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub sessions: Vec<SessionSettings>,
}

impl EngineConfig {
    /// Load from `path` with `FIX_` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env_prefix(path, ENV_PREFIX)
    }

    /// Load from `path` with environment overrides under `prefix`.
    pub fn load_with_env_prefix(path: &Path, prefix: &str) -> Result<Self> {
        info!("Loading FIX engine config: {:?}", path);
        let builder = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::from_builder(builder)
    }

    /// Parse TOML text without environment overrides.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Self::from_builder(Config::builder().add_source(File::from_str(text, FileFormat::Toml)))
    }

    fn from_builder(builder: ConfigBuilder<config_crate::builder::DefaultState>) -> Result<Self> {
        let raw: RawEngineConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        let sessions = raw
            .sessions
            .iter()
            .enumerate()
            .map(|(index, table)| {
                merge_session(&raw.default, table)
                    .with_context(|| format!("Invalid settings for session #{index}"))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(sessions = sessions.len(), "Session settings loaded");
        Ok(Self { sessions })
    }

    /// Check every session's merged settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sessions.is_empty() {
            return Err(ConfigError::NoSessions);
        }
        let mut seen = HashSet::new();
        for settings in &self.sessions {
            validate_session(settings)?;
            let id = settings.session_id();
            if !seen.insert(id.clone()) {
                return Err(ConfigError::DuplicateSession { session: id.to_string() });
            }
        }
        Ok(())
    }

    /// Load and validate in one step.
    pub fn load_validated(path: &Path) -> Result<Self> {
        let config = Self::load(path)?;
        config.validate().context("Invalid FIX engine configuration")?;
        Ok(config)
    }
}

/// Check one session's settings.
pub fn validate_session(settings: &SessionSettings) -> Result<(), ConfigError> {
    let session = settings.session_id().to_string();
    if settings.sender_comp_id.trim().is_empty() {
        return Err(ConfigError::MissingCompId { session, field: "sender_comp_id" });
    }
    if settings.target_comp_id.trim().is_empty() {
        return Err(ConfigError::MissingCompId { session, field: "target_comp_id" });
    }
    if !begin_string::SUPPORTED.contains(&settings.begin_string.as_str()) {
        return Err(ConfigError::UnsupportedBeginString {
            session,
            begin_string: settings.begin_string.clone(),
        });
    }
    if settings.begin_string == begin_string::FIXT11 && settings.default_appl_ver_id.is_none() {
        return Err(ConfigError::MissingApplVerId { session });
    }
    if settings.is_initiator() && settings.heartbeat_interval == 0 {
        return Err(ConfigError::InvalidHeartbeatInterval { session });
    }
    if settings.test_request_delay_multiplier.is_nan() || settings.test_request_delay_multiplier <= 0.0 {
        return Err(ConfigError::InvalidSetting {
            session,
            key: "test_request_delay_multiplier",
            reason: "must be positive",
        });
    }
    if settings.heartbeat_timeout_multiplier <= settings.test_request_delay_multiplier {
        return Err(ConfigError::InvalidSetting {
            session,
            key: "heartbeat_timeout_multiplier",
            reason: "must exceed test_request_delay_multiplier",
        });
    }
    if let Some(schedule) = &settings.schedule {
        schedule
            .check()
            .map_err(|reason| ConfigError::InvalidSchedule { session, reason })?;
    }
    Ok(())
}

fn merge_session(defaults: &Map<String, Value>, table: &Map<String, Value>) -> Result<SessionSettings> {
    let mut builder = Config::builder();
    for (key, value) in flatten(defaults) {
        builder = builder.set_default(key, value)?;
    }
    for (key, value) in flatten(table) {
        builder = builder.set_override(key, value)?;
    }
    Ok(builder.build()?.try_deserialize()?)
}

/// Dotted `(path, leaf)` pairs, so nested tables merge per key.
fn flatten(table: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten_into("", table, &mut out);
    out
}

fn flatten_into(prefix: &str, table: &Map<String, Value>, out: &mut Vec<(String, Value)>) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value.clone().into_table() {
            Ok(nested) => flatten_into(&path, &nested, out),
            Err(_) => out.push((path, value.clone())),
        }
    }
}
