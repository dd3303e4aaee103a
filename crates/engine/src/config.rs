use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::{DEFAULT_MESSAGE_LOG_CAPACITY, DEFAULT_STEP_INTERVAL_SECONDS};

pub const SESSION_CONFIG_FILE: &str = "session.json";
pub const DEFAULT_TERMINAL_STATE: &str = "end";

/// How a `questStatus` condition treats a quest id absent from quest state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MissingQuestPolicy {
    /// The condition is false.
    #[default]
    Fail,
    /// The missing quest reads as `sentinel`, so `status == sentinel` holds.
    MatchUnset { sentinel: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub step_interval_seconds: f32,
    pub target_tps: u32,
    pub max_ticks_per_advance: u32,
    pub missing_quest_policy: MissingQuestPolicy,
    pub terminal_state: String,
    pub message_log_capacity: usize,
    pub enabled_mods: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            step_interval_seconds: DEFAULT_STEP_INTERVAL_SECONDS,
            target_tps: 60,
            max_ticks_per_advance: 5,
            missing_quest_policy: MissingQuestPolicy::Fail,
            terminal_state: DEFAULT_TERMINAL_STATE.to_string(),
            message_log_capacity: DEFAULT_MESSAGE_LOG_CAPACITY,
            enabled_mods: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read session config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid session config {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SessionConfig {
    /// Missing file means defaults; a present but malformed file is an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let deserializer = &mut serde_json::Deserializer::from_str(&text);
        serde_path_to_error::deserialize(deserializer).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            json_path: error.path().to_string(),
            source: error.into_inner(),
        })
    }

    pub fn is_terminal(&self, state_id: &str) -> bool {
        state_id == self.terminal_state
    }
}
