use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::dialogue::{LogicRule, ScriptBook};
use crate::sim::{
    MapSet, PlacedEntity, PlayerState, QuestState, TileRegistry, TileType, Transition,
};

use super::validate::ValidationReport;

pub const TILES_FILE: &str = "tiles.json";
pub const WORLD_FILE: &str = "world.json";
pub const MAPS_DIR: &str = "maps";
pub const ENTITIES_DIR: &str = "entities";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTileTable {
    pub unwalkable: Vec<TileType>,
}

/// Either `[[row], [row]]` or one flat row-major list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTiles {
    Rows(Vec<Vec<TileType>>),
    Flat(Vec<TileType>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub width: u32,
    pub height: u32,
    pub tiles: RawTiles,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub entities: Vec<PlacedEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAction {
    pub id: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOption {
    pub text: String,
    #[serde(default)]
    pub next_state: Option<String>,
    #[serde(default)]
    pub actions: Vec<RawAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub text: String,
    #[serde(default)]
    pub options: Vec<RawOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntityScript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub dialogue: BTreeMap<String, RawNode>,
    #[serde(default)]
    pub dialogue_logic: Vec<LogicRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWorld {
    pub active_map: String,
    #[serde(default)]
    pub player: PlayerState,
    #[serde(default)]
    pub quests: QuestState,
}

/// Everything read from disk after mod overrides, before lowering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawContent {
    pub tiles: Option<RawTileTable>,
    pub maps: BTreeMap<String, RawMap>,
    pub entities: BTreeMap<String, RawEntityScript>,
    pub world: Option<RawWorld>,
}

/// Starting state for a new session.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSeed {
    pub active_map: String,
    pub player: PlayerState,
    pub quests: QuestState,
}

/// Lowered, validated content ready for play.
#[derive(Debug, Clone)]
pub struct ContentBundle {
    pub tiles: TileRegistry,
    pub maps: MapSet,
    pub scripts: ScriptBook,
    pub world: WorldSeed,
    pub mod_ids: Vec<String>,
    /// SHA-256 over the canonical JSON of the merged content.
    pub fingerprint: String,
}

#[derive(Debug, Error)]
pub enum ContentLoadError {
    #[error("enabled mod ids must not be empty")]
    EmptyEnabledMod,
    #[error("enabled mod '{mod_id}' is listed more than once")]
    DuplicateEnabledMod { mod_id: String },
    #[error("enabled mod '{mod_id}' has no directory at {expected_dir}")]
    EnabledModMissing {
        mod_id: String,
        expected_dir: PathBuf,
    },
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no world.json found in base content or any enabled mod")]
    MissingWorld,
    #[error("failed to fingerprint content: {0}")]
    Fingerprint(#[source] serde_json::Error),
    #[error("content failed validation with {} error(s)", .0.errors.len())]
    Invalid(ValidationReport),
}
