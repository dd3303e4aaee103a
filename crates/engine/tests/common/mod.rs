#![allow(dead_code)]

use std::path::PathBuf;

use engine::content::{lower_content, RawContent};
use engine::{AppPaths, ContentBundle, GameWorld, SessionConfig};
use serde_json::Value;

/// Builds content from JSON objects keyed by map id and entity id.
pub fn bundle(maps: Value, entities: Value, world: Value) -> ContentBundle {
    let mut raw = RawContent::default();
    raw.tiles = Some(serde_json::from_value(serde_json::json!({ "unwalkable": [1] })).expect("tiles"));
    for (id, map) in maps.as_object().expect("maps object") {
        raw.maps
            .insert(id.clone(), serde_json::from_value(map.clone()).expect("map"));
    }
    for (id, script) in entities.as_object().expect("entities object") {
        raw.entities
            .insert(id.clone(), serde_json::from_value(script.clone()).expect("script"));
    }
    raw.world = Some(serde_json::from_value(world).expect("world"));

    let checked = lower_content(&raw, Vec::new(), "end").expect("lower content");
    assert!(checked.report.is_ok(), "{}", checked.report);
    checked.bundle
}

/// Ten ticks per movement step at the default step interval.
pub fn config() -> SessionConfig {
    SessionConfig {
        step_interval_seconds: 0.1,
        target_tps: 100,
        ..SessionConfig::default()
    }
}

pub const DT: f32 = 0.01;

pub fn world(bundle: ContentBundle) -> GameWorld {
    GameWorld::new(bundle, &config())
}

pub fn run_ticks(world: &mut GameWorld, ticks: u32) {
    for _ in 0..ticks {
        world.tick(DT);
    }
}

pub fn workspace_paths() -> AppPaths {
    AppPaths::from_root(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../.."))
}
