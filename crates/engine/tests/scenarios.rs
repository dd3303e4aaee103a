mod common;

use engine::actions::{apply_action, Action, ActionContext, SystemHint};
use engine::sim::{
    GridMap, MapSet, MessageLog, MovementController, PathFinder, PlayerState, QuestState,
    RemovedEntities, Skill, TileCoord, TileRegistry,
};
use engine::ClickOutcome;
use serde_json::json;

use common::{bundle, run_ticks, world};

fn town_with_old_man(entity: serde_json::Value) -> engine::GameWorld {
    world(bundle(
        json!({
            "town": {
                "width": 5,
                "height": 5,
                "tiles": vec![0; 25],
                "entities": [{ "id": "old_man", "x": 4, "y": 4 }]
            }
        }),
        json!({ "old_man": entity }),
        json!({
            "activeMap": "town",
            "player": { "position": { "x": 3, "y": 3 } },
            "quests": { "q1": "not_started", "q": "accepted" }
        }),
    ))
}

#[test]
fn accepting_a_quest_shows_the_terminal_node() {
    let mut world = town_with_old_man(json!({
        "dialogue": {
            "start": { "text": "Hi", "options": [{
                "text": "Accept",
                "nextState": "accepted",
                "actions": [{ "id": "changeQuestState", "params": { "questId": "q1", "newState": "accepted" } }]
            }] },
            "accepted": { "text": "Good luck", "options": [] }
        }
    }));

    let ClickOutcome::DialogueOpened(view) = world.click(TileCoord::new(4, 4)) else {
        panic!("adjacent click should open the dialogue");
    };
    assert_eq!(view.text, "Hi");
    assert_eq!(view.options, vec!["Accept".to_string()]);

    let report = world.choose_option(0).expect("choose");
    assert_eq!(world.quests().status("q1"), Some("accepted"));
    let view = report.view.expect("still open");
    assert_eq!(view.text, "Good luck");
    assert!(view.terminal);
    assert!(view.options.is_empty());
}

#[test]
fn first_satisfied_rule_wins() {
    let mut world = town_with_old_man(json!({
        "dialogue": {
            "start": { "text": "Hi", "options": [{ "text": "Bye", "nextState": "end" }] },
            "stateA": { "text": "A", "options": [] },
            "stateB": { "text": "B", "options": [] }
        },
        "dialogueLogic": [
            { "conditions": [{ "type": "questStatus", "questId": "q", "status": "accepted" }], "targetState": "stateA" },
            { "conditions": [{ "type": "questStatus", "questId": "q", "status": "accepted" }], "targetState": "stateB" }
        ]
    }));

    let ClickOutcome::DialogueOpened(view) = world.click(TileCoord::new(4, 4)) else {
        panic!("adjacent click should open the dialogue");
    };
    assert_eq!(view.state_id, "stateA");
}

fn context_parts() -> (PlayerState, QuestState, MapSet, RemovedEntities, MessageLog, Vec<SystemHint>) {
    (
        PlayerState::default(),
        QuestState::new(),
        MapSet::new(),
        RemovedEntities::new(),
        MessageLog::default(),
        Vec::new(),
    )
}

#[test]
fn gaining_xp_past_the_threshold_levels_up() {
    let (mut player, mut quests, mut maps, mut removed, mut messages, mut hints) = context_parts();
    player.skills.insert(
        "drawing".to_string(),
        Skill {
            level: 1,
            xp: 90,
            xp_to_next_level: 100,
        },
    );
    let mut ctx = ActionContext {
        player: &mut player,
        quests: &mut quests,
        maps: &mut maps,
        removed_entities: &mut removed,
        messages: &mut messages,
        hints: &mut hints,
    };
    let action = Action::GainXp {
        amounts: vec![20],
        skills: vec!["drawing".to_string()],
    };
    assert!(apply_action(&action, &mut ctx));

    let skill = player.skills["drawing"];
    assert_eq!(skill.level, 2);
    assert_eq!(skill.xp, 10);
    assert_eq!(skill.xp_to_next_level, 150);
}

#[test]
fn removing_more_than_held_fails_and_keeps_the_backpack() {
    let (mut player, mut quests, mut maps, mut removed, mut messages, mut hints) = context_parts();
    player.backpack.add("wood", 2);
    let mut ctx = ActionContext {
        player: &mut player,
        quests: &mut quests,
        maps: &mut maps,
        removed_entities: &mut removed,
        messages: &mut messages,
        hints: &mut hints,
    };
    let action = Action::RemoveItemFromBackpack {
        item: "wood".to_string(),
        quantity: 3,
    };
    assert!(!apply_action(&action, &mut ctx));
    assert_eq!(player.backpack.quantity("wood"), 2);
    assert!(!messages.is_empty());
}

#[test]
fn unreachable_goal_moves_nothing() {
    let mut tiles = vec![0u16; 25];
    for y in 0..5 {
        tiles[y * 5 + 2] = 1;
    }
    let map = GridMap::new("walled", 5, 5, tiles).expect("map");
    let registry = TileRegistry::new([1]);
    let path = PathFinder::new(&map, &registry).find_path(TileCoord::new(0, 0), TileCoord::new(4, 4));
    assert!(path.is_empty());

    let mut movement = MovementController::new(0.1);
    assert!(!movement.assign_path_from(TileCoord::new(0, 0), path));
    assert_eq!(movement.advance(1.0), None);
    assert!(!movement.is_moving());
}

#[test]
fn start_equal_goal_leaves_nothing_to_walk() {
    let map = GridMap::open("open", 3, 3).expect("map");
    let registry = TileRegistry::default();
    let path = PathFinder::new(&map, &registry).find_path(TileCoord::new(1, 1), TileCoord::new(1, 1));
    assert!(path.len() <= 1);

    let mut movement = MovementController::new(0.1);
    movement.assign_path_from(TileCoord::new(1, 1), path);
    assert_eq!(movement.remaining().len(), 0);
}

#[test]
fn interaction_gate_moves_then_fires_once() {
    let mut world = world(bundle(
        json!({
            "town": {
                "width": 8,
                "height": 3,
                "tiles": vec![0; 24],
                "entities": [{ "id": "old_man", "x": 7, "y": 1 }]
            }
        }),
        json!({
            "old_man": { "dialogue": { "start": { "text": "Hi", "options": [] } } }
        }),
        json!({ "activeMap": "town", "player": { "position": { "x": 0, "y": 1 } } }),
    ));

    let outcome = world.click(TileCoord::new(7, 1));
    let ClickOutcome::Moving { destination, pending } = outcome.clone() else {
        panic!("distant click should move, got {outcome:?}");
    };
    assert_eq!(destination, Some(TileCoord::new(6, 1)));
    assert!(pending.is_some());
    assert!(!world.is_dialogue_open());

    let mut opened = 0;
    for _ in 0..200 {
        if world.tick(common::DT).dialogue_opened.is_some() {
            opened += 1;
        }
    }
    assert_eq!(opened, 1);
    assert!(world.is_dialogue_open());
    assert_eq!(world.player().position, TileCoord::new(6, 1));
    assert!(world.pending().is_none());
}

#[test]
fn stepping_onto_a_transition_switches_exactly_once() {
    let mut world = world(bundle(
        json!({
            "town": {
                "width": 4,
                "height": 1,
                "tiles": [0, 0, 0, 0],
                "transitions": [{ "x": 3, "y": 0, "targetMap": "field", "targetX": 1, "targetY": 1 }]
            },
            "field": {
                "width": 3,
                "height": 3,
                "tiles": vec![0; 9],
                "transitions": [{ "x": 0, "y": 0, "targetMap": "town", "targetX": 0, "targetY": 0 }]
            }
        }),
        json!({}),
        json!({ "activeMap": "town", "player": { "position": { "x": 0, "y": 0 } } }),
    ));

    world.click(TileCoord::new(3, 0));
    let mut transitions = 0;
    for _ in 0..200 {
        if world.tick(common::DT).transition.is_some() {
            transitions += 1;
        }
    }
    assert_eq!(transitions, 1);
    assert_eq!(world.active_map_id(), "field");
    assert_eq!(world.player().position, TileCoord::new(1, 1));
    assert!(!world.player().movement.is_moving());
    assert!(world.click_marker().is_none());

    run_ticks(&mut world, 50);
    assert_eq!(world.active_map_id(), "field");
}
