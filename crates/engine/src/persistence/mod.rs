mod atomic_io;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::sim::{PlayerState, QuestState, RemovedEntities};

use self::atomic_io::write_text_atomic;

pub const SAVE_VERSION: u32 = 1;
pub const DEFAULT_SAVE_SLOT: &str = "quicksave";

/// Keyed snapshot of everything that changes during play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveDocument {
    pub save_version: u32,
    /// Fingerprint of the content the save was made against.
    pub content_hash: String,
    pub active_map: String,
    pub player: PlayerState,
    pub quests: QuestState,
    #[serde(default)]
    pub removed_entities: RemovedEntities,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("save slot '{slot}' must be non-empty and use only letters, digits, '-' or '_'")]
    InvalidSlot { slot: String },
    #[error("no save in slot '{slot}'")]
    NotFound { slot: String },
    #[error("failed to access save {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode save: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("invalid save {location} at {json_path}: {source}")]
    Decode {
        location: String,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("save version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Where save documents live. Transport is up to the implementation.
pub trait SaveStore {
    fn write(&mut self, slot: &str, document: &SaveDocument) -> Result<(), PersistenceError>;
    fn read(&self, slot: &str) -> Result<SaveDocument, PersistenceError>;
}

/// One pretty-printed JSON file per slot, replaced atomically.
#[derive(Debug, Clone)]
pub struct FileSaveStore {
    dir: PathBuf,
}

impl FileSaveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, slot: &str) -> Result<PathBuf, PersistenceError> {
        check_slot(slot)?;
        Ok(self.dir.join(format!("{slot}.json")))
    }
}

impl SaveStore for FileSaveStore {
    fn write(&mut self, slot: &str, document: &SaveDocument) -> Result<(), PersistenceError> {
        let path = self.path_for(slot)?;
        let text = serde_json::to_string_pretty(document).map_err(PersistenceError::Encode)?;
        write_text_atomic(&path, &text).map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })?;
        info!(slot, path = %path.display(), "save_written");
        Ok(())
    }

    fn read(&self, slot: &str) -> Result<SaveDocument, PersistenceError> {
        let path = self.path_for(slot)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound {
                    slot: slot.to_string(),
                })
            }
            Err(source) => return Err(PersistenceError::Io { path, source }),
        };
        decode(&path.display().to_string(), &text)
    }
}

/// Keeps encoded documents in memory; handy for tests and previews.
#[derive(Debug, Clone, Default)]
pub struct MemorySaveStore {
    slots: BTreeMap<String, String>,
}

impl SaveStore for MemorySaveStore {
    fn write(&mut self, slot: &str, document: &SaveDocument) -> Result<(), PersistenceError> {
        check_slot(slot)?;
        let text = serde_json::to_string(document).map_err(PersistenceError::Encode)?;
        self.slots.insert(slot.to_string(), text);
        Ok(())
    }

    fn read(&self, slot: &str) -> Result<SaveDocument, PersistenceError> {
        check_slot(slot)?;
        let text = self.slots.get(slot).ok_or_else(|| PersistenceError::NotFound {
            slot: slot.to_string(),
        })?;
        decode(slot, text)
    }
}

fn check_slot(slot: &str) -> Result<(), PersistenceError> {
    let valid = !slot.is_empty()
        && slot
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidSlot {
            slot: slot.to_string(),
        })
    }
}

fn decode(location: &str, text: &str) -> Result<SaveDocument, PersistenceError> {
    let deserializer = &mut serde_json::Deserializer::from_str(text);
    let document: SaveDocument =
        serde_path_to_error::deserialize(deserializer).map_err(|error| {
            PersistenceError::Decode {
                location: location.to_string(),
                json_path: error.path().to_string(),
                source: error.into_inner(),
            }
        })?;
    if document.save_version != SAVE_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: document.save_version,
            expected: SAVE_VERSION,
        });
    }
    Ok(document)
}
