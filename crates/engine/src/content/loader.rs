use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::actions::{Action, ActionParseError};
use crate::config::SessionConfig;
use crate::dialogue::{DialogueGraph, DialogueNode, DialogueOption, EntityScript, ScriptBook};
use crate::sim::{GridMap, MapSet, TileRegistry, TileType};
use crate::AppPaths;

use super::discovery::{discover_content_sources, list_json_files, ContentSource};
use super::hashing::content_fingerprint;
use super::types::{
    ContentBundle, ContentLoadError, RawContent, RawEntityScript, RawMap, RawTiles, WorldSeed,
    ENTITIES_DIR, MAPS_DIR, TILES_FILE, WORLD_FILE,
};
use super::validate::{validate_content, ValidationCode, ValidationReport};

/// Content plus everything the validator found. Broken pieces are left out
/// of `bundle`, so it is only safe to play when `report.is_ok()`.
#[derive(Debug, Clone)]
pub struct CheckedContent {
    pub bundle: ContentBundle,
    pub report: ValidationReport,
}

/// Loads base content and enabled mods, rejecting content with validation
/// errors. Warnings are logged.
pub fn load_content(
    app_paths: &AppPaths,
    config: &SessionConfig,
) -> Result<ContentBundle, ContentLoadError> {
    let checked = check_content(app_paths, config)?;
    for warning in &checked.report.warnings {
        warn!(
            code = ?warning.code,
            location = %warning.location,
            message = %warning.message,
            "content_warning"
        );
    }
    if !checked.report.is_ok() {
        return Err(ContentLoadError::Invalid(checked.report));
    }
    info!(
        maps = checked.bundle.maps.len(),
        scripts = checked.bundle.scripts.len(),
        mods = checked.bundle.mod_ids.len(),
        fingerprint = %checked.bundle.fingerprint,
        "content_loaded"
    );
    Ok(checked.bundle)
}

/// Loads and validates without rejecting; used by authoring tools.
pub fn check_content(
    app_paths: &AppPaths,
    config: &SessionConfig,
) -> Result<CheckedContent, ContentLoadError> {
    let sources = discover_content_sources(app_paths, &config.enabled_mods)?;
    let raw = read_sources(&sources)?;
    let mod_ids = sources.into_iter().map(|source| source.mod_id).collect();
    lower_content(&raw, mod_ids, &config.terminal_state)
}

pub fn read_sources(sources: &[ContentSource]) -> Result<RawContent, ContentLoadError> {
    let mut raw = RawContent::default();
    for source in sources {
        read_source(source, &mut raw)?;
    }
    Ok(raw)
}

fn read_source(source: &ContentSource, raw: &mut RawContent) -> Result<(), ContentLoadError> {
    let tiles_path = source.dir.join(TILES_FILE);
    if tiles_path.is_file() {
        raw.tiles = Some(read_json(&tiles_path)?);
    }
    let world_path = source.dir.join(WORLD_FILE);
    if world_path.is_file() {
        raw.world = Some(read_json(&world_path)?);
    }

    for path in list_json_files(&source.dir.join(MAPS_DIR))? {
        let map: RawMap = read_json(&path)?;
        let id = map.id.clone().unwrap_or_else(|| file_stem(&path));
        if raw.maps.insert(id.clone(), map).is_some() {
            debug!(mod_id = %source.mod_id, map = %id, "map_overridden");
        }
    }
    for path in list_json_files(&source.dir.join(ENTITIES_DIR))? {
        let script: RawEntityScript = read_json(&path)?;
        let id = script.id.clone().unwrap_or_else(|| file_stem(&path));
        if raw.entities.insert(id.clone(), script).is_some() {
            debug!(mod_id = %source.mod_id, entity = %id, "entity_script_overridden");
        }
    }
    Ok(())
}

/// Turns raw content into engine types, recording every problem instead of
/// stopping at the first.
pub fn lower_content(
    raw: &RawContent,
    mod_ids: Vec<String>,
    terminal_state: &str,
) -> Result<CheckedContent, ContentLoadError> {
    let raw_world = raw.world.as_ref().ok_or(ContentLoadError::MissingWorld)?;
    let fingerprint = content_fingerprint(raw).map_err(ContentLoadError::Fingerprint)?;
    let mut report = ValidationReport::default();

    let tiles = raw
        .tiles
        .as_ref()
        .map(|table| TileRegistry::new(table.unwalkable.iter().copied()))
        .unwrap_or_default();

    let mut maps = MapSet::new();
    for (id, raw_map) in &raw.maps {
        if let Some(map) = lower_map(id, raw_map, &mut report) {
            maps.insert(id.clone(), map);
        }
    }

    let mut scripts = ScriptBook::new();
    for (id, raw_script) in &raw.entities {
        scripts.insert(id.clone(), lower_script(id, raw_script, &mut report));
    }

    let world = WorldSeed {
        active_map: raw_world.active_map.clone(),
        player: raw_world.player.clone(),
        quests: raw_world.quests.clone(),
    };
    validate_content(&maps, &scripts, &world, terminal_state, &mut report);

    Ok(CheckedContent {
        bundle: ContentBundle {
            tiles,
            maps,
            scripts,
            world,
            mod_ids,
            fingerprint,
        },
        report,
    })
}

fn lower_map(id: &str, raw: &RawMap, report: &mut ValidationReport) -> Option<GridMap> {
    let location = format!("map {id}");
    let tiles: Vec<TileType> = match &raw.tiles {
        RawTiles::Flat(tiles) => tiles.clone(),
        RawTiles::Rows(rows) => {
            let ragged = rows.len() != raw.height as usize
                || rows.iter().any(|row| row.len() != raw.width as usize);
            if ragged {
                report.error(
                    ValidationCode::RaggedTiles,
                    location,
                    format!(
                        "tile rows must be {} rows of {} tiles",
                        raw.height, raw.width
                    ),
                );
                return None;
            }
            rows.concat()
        }
    };

    match GridMap::new(id, raw.width, raw.height, tiles) {
        Ok(map) => Some(
            map.with_transitions(raw.transitions.clone())
                .with_entities(raw.entities.clone()),
        ),
        Err(error) => {
            report.error(ValidationCode::MapShape, location, error.to_string());
            None
        }
    }
}

fn lower_script(id: &str, raw: &RawEntityScript, report: &mut ValidationReport) -> EntityScript {
    let mut nodes = BTreeMap::new();
    for (state_id, raw_node) in &raw.dialogue {
        let mut options = Vec::with_capacity(raw_node.options.len());
        for (option_index, raw_option) in raw_node.options.iter().enumerate() {
            let mut actions = Vec::with_capacity(raw_option.actions.len());
            for (action_index, raw_action) in raw_option.actions.iter().enumerate() {
                match Action::parse(&raw_action.id, &raw_action.params) {
                    Ok(action) => actions.push(action),
                    Err(error) => {
                        let code = match error {
                            ActionParseError::UnknownAction { .. } => ValidationCode::UnknownAction,
                            ActionParseError::RawCodeRejected => ValidationCode::RawCodeAction,
                            _ => ValidationCode::InvalidActionParams,
                        };
                        let location = format!(
                            "entity {id}, state {state_id}, option {option_index}, \
                             action {action_index}"
                        );
                        report.error(code, location, error.to_string());
                    }
                }
            }
            options.push(DialogueOption {
                text: raw_option.text.clone(),
                next_state: raw_option.next_state.clone(),
                actions,
            });
        }
        nodes.insert(
            state_id.clone(),
            DialogueNode {
                text: raw_node.text.clone(),
                options,
            },
        );
    }

    EntityScript {
        id: id.to_string(),
        name: raw.name.clone(),
        dialogue: DialogueGraph::new(nodes),
        logic: raw.dialogue_logic.clone(),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ContentLoadError> {
    let text = fs::read_to_string(path).map_err(|source| ContentLoadError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let deserializer = &mut serde_json::Deserializer::from_str(&text);
    serde_path_to_error::deserialize(deserializer).map_err(|error| ContentLoadError::Parse {
        path: path.to_path_buf(),
        json_path: error.path().to_string(),
        source: error.into_inner(),
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}
