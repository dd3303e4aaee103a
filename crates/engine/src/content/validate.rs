use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::actions::Action;
use crate::dialogue::{Condition, EntityScript, ScriptBook, START_STATE};
use crate::sim::{GridMap, MapSet};

use super::types::WorldSeed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCode {
    MapShape,
    RaggedTiles,
    EntityOutOfBounds,
    TransitionOutOfBounds,
    TransitionTargetMapMissing,
    TransitionTargetOutOfBounds,
    TransitionChain,
    EntityWithoutScript,
    MissingStart,
    NoReachableTerminal,
    DanglingOptionTarget,
    DanglingRuleTarget,
    UnreachableState,
    UnknownAction,
    RawCodeAction,
    InvalidActionParams,
    GainXpLengthMismatch,
    UnknownQuest,
    ActiveMapMissing,
    PlayerOutOfBounds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{code:?}: {message} ({location})")]
pub struct ContentValidationError {
    pub code: ValidationCode,
    pub message: String,
    /// Where in the content, e.g. `entity old_man, state start, option 0`.
    pub location: String,
}

/// Authoring-time findings. Errors block loading; warnings do not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ContentValidationError>,
    pub warnings: Vec<ContentValidationError>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(
        &mut self,
        code: ValidationCode,
        location: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.errors.push(ContentValidationError {
            code,
            message: message.into(),
            location: location.into(),
        });
    }

    pub fn warning(
        &mut self,
        code: ValidationCode,
        location: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.warnings.push(ContentValidationError {
            code,
            message: message.into(),
            location: location.into(),
        });
    }

    pub fn has_error(&self, code: ValidationCode) -> bool {
        self.errors.iter().any(|error| error.code == code)
    }

    pub fn has_warning(&self, code: ValidationCode) -> bool {
        self.warnings.iter().any(|warning| warning.code == code)
    }

    pub fn render_human_readable(&self) -> String {
        let mut out = format!(
            "content validation: {} error(s), {} warning(s)\n",
            self.errors.len(),
            self.warnings.len()
        );
        for error in &self.errors {
            out.push_str(&format!("  error   {error}\n"));
        }
        for warning in &self.warnings {
            out.push_str(&format!("  warning {warning}\n"));
        }
        out
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_human_readable())
    }
}

/// Cross-reference checks over lowered content.
pub fn validate_content(
    maps: &MapSet,
    scripts: &ScriptBook,
    world: &WorldSeed,
    terminal_state: &str,
    report: &mut ValidationReport,
) {
    for map in maps.values() {
        validate_map(map, maps, scripts, report);
    }
    for script in scripts.values() {
        validate_script(script, world, terminal_state, report);
    }
    validate_world(world, maps, report);
}

fn validate_map(map: &GridMap, maps: &MapSet, scripts: &ScriptBook, report: &mut ValidationReport) {
    for entity in map.entities() {
        let location = format!("map {}, entity {}", map.id(), entity.id);
        if !map.contains(entity.cell()) {
            report.error(
                ValidationCode::EntityOutOfBounds,
                location.clone(),
                format!("({}, {}) is outside the map", entity.x, entity.y),
            );
        }
        if !scripts.contains_key(&entity.id) {
            report.warning(
                ValidationCode::EntityWithoutScript,
                location,
                "entity has no dialogue script",
            );
        }
    }

    for transition in map.transitions() {
        let location = format!("map {}, transition ({}, {})", map.id(), transition.x, transition.y);
        if !map.contains(transition.cell()) {
            report.error(
                ValidationCode::TransitionOutOfBounds,
                location.clone(),
                "marker is outside the map",
            );
        }
        let Some(target) = maps.get(&transition.target_map) else {
            report.error(
                ValidationCode::TransitionTargetMapMissing,
                location,
                format!("target map '{}' does not exist", transition.target_map),
            );
            continue;
        };
        if !target.contains(transition.target_cell()) {
            report.error(
                ValidationCode::TransitionTargetOutOfBounds,
                location,
                format!(
                    "target ({}, {}) is outside map '{}'",
                    transition.target_x, transition.target_y, transition.target_map
                ),
            );
        } else if target.transition_at(transition.target_cell()).is_some() {
            report.warning(
                ValidationCode::TransitionChain,
                location,
                "target cell is itself a transition marker",
            );
        }
    }
}

fn validate_script(
    script: &EntityScript,
    world: &WorldSeed,
    terminal_state: &str,
    report: &mut ValidationReport,
) {
    let entity = format!("entity {}", script.id);
    if !script.dialogue.contains(START_STATE) {
        report.error(
            ValidationCode::MissingStart,
            entity.clone(),
            "dialogue has no 'start' state",
        );
    }

    for (index, rule) in script.logic.iter().enumerate() {
        let location = format!("{entity}, rule {index}");
        if !script.dialogue.contains(&rule.target_state) {
            report.error(
                ValidationCode::DanglingRuleTarget,
                location.clone(),
                format!("target state '{}' does not exist", rule.target_state),
            );
        }
        for condition in &rule.conditions {
            if let Condition::QuestStatus { quest_id, .. } = condition {
                warn_unknown_quest(quest_id, world, &location, report);
            }
        }
    }

    for (state_id, node) in script.dialogue.iter() {
        for (index, option) in node.options.iter().enumerate() {
            let location = format!("{entity}, state {state_id}, option {index}");
            if let Some(next) = option.next_state.as_deref() {
                if next != terminal_state && !script.dialogue.contains(next) {
                    report.error(
                        ValidationCode::DanglingOptionTarget,
                        location.clone(),
                        format!("next state '{next}' does not exist"),
                    );
                }
            }
            for action in &option.actions {
                match action {
                    Action::GainXp { amounts, skills } if amounts.len() != skills.len() => {
                        report.error(
                            ValidationCode::GainXpLengthMismatch,
                            location.clone(),
                            format!(
                                "gainXp has {} amount(s) but {} skill(s)",
                                amounts.len(),
                                skills.len()
                            ),
                        );
                    }
                    Action::ChangeQuestState { quest_id, .. } => {
                        warn_unknown_quest(quest_id, world, &location, report);
                    }
                    _ => {}
                }
            }
        }
    }

    if script.dialogue.contains(START_STATE) {
        check_reachability(script, terminal_state, &entity, report);
    }
}

/// Walks from `start` and every rule target. Rules can redirect any display,
/// so their targets count as entry points.
fn check_reachability(
    script: &EntityScript,
    terminal_state: &str,
    entity: &str,
    report: &mut ValidationReport,
) {
    let mut reached = BTreeSet::<&str>::new();
    let mut queue = VecDeque::<&str>::new();
    let roots = std::iter::once(START_STATE)
        .chain(script.logic.iter().map(|rule| rule.target_state.as_str()));
    for root in roots {
        if script.dialogue.contains(root) && reached.insert(root) {
            queue.push_back(root);
        }
    }

    let mut closes = false;
    while let Some(state_id) = queue.pop_front() {
        let Some(node) = script.dialogue.node(state_id) else {
            continue;
        };
        if node.is_terminal() {
            closes = true;
        }
        for option in &node.options {
            match option.next_state.as_deref() {
                None => closes = true,
                Some(next) if next == terminal_state && !script.dialogue.contains(next) => {
                    closes = true;
                }
                Some(next) => {
                    if script.dialogue.contains(next) && reached.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
    }

    if !closes {
        report.error(
            ValidationCode::NoReachableTerminal,
            entity.to_string(),
            "no terminal state or closing option is reachable from 'start'",
        );
    }
    for (state_id, _) in script.dialogue.iter() {
        if !reached.contains(state_id) {
            report.warning(
                ValidationCode::UnreachableState,
                format!("{entity}, state {state_id}"),
                "state is never shown",
            );
        }
    }
}

fn warn_unknown_quest(quest_id: &str, world: &WorldSeed, location: &str, report: &mut ValidationReport) {
    if !world.quests.contains(quest_id) {
        report.warning(
            ValidationCode::UnknownQuest,
            location.to_string(),
            format!("quest '{quest_id}' is not declared in world.json"),
        );
    }
}

fn validate_world(world: &WorldSeed, maps: &MapSet, report: &mut ValidationReport) {
    match maps.get(&world.active_map) {
        None => report.error(
            ValidationCode::ActiveMapMissing,
            "world",
            format!("active map '{}' does not exist", world.active_map),
        ),
        Some(map) if !map.contains(world.player.position) => report.error(
            ValidationCode::PlayerOutOfBounds,
            "world, player",
            format!(
                "position ({}, {}) is outside map '{}'",
                world.player.position.x,
                world.player.position.y,
                world.active_map
            ),
        ),
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::dialogue::{DialogueGraph, DialogueNode, DialogueOption, LogicRule};
    use crate::sim::{PlacedEntity, PlayerState, QuestState, TileCoord, Transition};

    fn seed(active_map: &str) -> WorldSeed {
        let mut quests = QuestState::new();
        quests.register("q1", "not_started");
        WorldSeed {
            active_map: active_map.to_string(),
            player: PlayerState {
                position: TileCoord::new(1, 1),
                ..PlayerState::default()
            },
            quests,
        }
    }

    fn node(text: &str, options: Vec<DialogueOption>) -> DialogueNode {
        DialogueNode {
            text: text.to_string(),
            options,
        }
    }

    fn goto(next: &str, actions: Vec<Action>) -> DialogueOption {
        DialogueOption {
            text: "go".to_string(),
            next_state: Some(next.to_string()),
            actions,
        }
    }

    fn book(nodes: Vec<(&str, DialogueNode)>, logic: Vec<LogicRule>) -> ScriptBook {
        let nodes = nodes
            .into_iter()
            .map(|(id, node)| (id.to_string(), node))
            .collect::<BTreeMap<_, _>>();
        let mut scripts = ScriptBook::new();
        scripts.insert(
            "npc".to_string(),
            EntityScript {
                id: "npc".to_string(),
                name: None,
                dialogue: DialogueGraph::new(nodes),
                logic,
            },
        );
        scripts
    }

    fn town() -> MapSet {
        let mut maps = MapSet::new();
        maps.insert(
            "town".to_string(),
            GridMap::open("town", 4, 4).expect("town"),
        );
        maps
    }

    fn run(maps: &MapSet, scripts: &ScriptBook, world: &WorldSeed) -> ValidationReport {
        let mut report = ValidationReport::default();
        validate_content(maps, scripts, world, "end", &mut report);
        report
    }

    #[test]
    fn well_formed_script_passes() {
        let scripts = book(
            vec![
                ("start", node("Hi", vec![goto("bye", vec![])])),
                ("bye", node("Bye", vec![])),
            ],
            Vec::new(),
        );
        let report = run(&town(), &scripts, &seed("town"));
        assert!(report.is_ok(), "{report}");
        assert!(report.warnings.is_empty(), "{report}");
    }

    #[test]
    fn missing_start_and_dangling_targets_are_errors() {
        let scripts = book(
            vec![("hello", node("Hi", vec![goto("nowhere", vec![])]))],
            vec![LogicRule {
                conditions: Vec::new(),
                target_state: "ghost".to_string(),
            }],
        );
        let report = run(&town(), &scripts, &seed("town"));
        assert!(report.has_error(ValidationCode::MissingStart));
        assert!(report.has_error(ValidationCode::DanglingOptionTarget));
        assert!(report.has_error(ValidationCode::DanglingRuleTarget));
    }

    #[test]
    fn loop_without_exit_has_no_reachable_terminal() {
        let scripts = book(
            vec![
                ("start", node("A", vec![goto("loop", vec![])])),
                ("loop", node("B", vec![goto("start", vec![])])),
                ("island", node("C", vec![])),
            ],
            Vec::new(),
        );
        let report = run(&town(), &scripts, &seed("town"));
        assert!(report.has_error(ValidationCode::NoReachableTerminal));
        assert!(report.has_warning(ValidationCode::UnreachableState));
    }

    #[test]
    fn terminal_sentinel_counts_as_closing() {
        let scripts = book(vec![("start", node("Hi", vec![goto("end", vec![])]))], Vec::new());
        let report = run(&town(), &scripts, &seed("town"));
        assert!(report.is_ok(), "{report}");
    }

    #[test]
    fn gain_xp_mismatch_and_unknown_quest_are_reported() {
        let scripts = book(
            vec![(
                "start",
                node(
                    "Hi",
                    vec![goto(
                        "end",
                        vec![
                            Action::GainXp {
                                amounts: vec![10, 20],
                                skills: vec!["drawing".to_string()],
                            },
                            Action::ChangeQuestState {
                                quest_id: "q9".to_string(),
                                new_state: "done".to_string(),
                            },
                        ],
                    )],
                ),
            )],
            Vec::new(),
        );
        let report = run(&town(), &scripts, &seed("town"));
        assert!(report.has_error(ValidationCode::GainXpLengthMismatch));
        assert!(report.has_warning(ValidationCode::UnknownQuest));
    }

    #[test]
    fn map_cross_references_are_checked() {
        let mut maps = town();
        let forest = GridMap::open("forest", 3, 3)
            .expect("forest")
            .with_transitions(vec![Transition {
                x: 0,
                y: 0,
                target_map: "town".to_string(),
                target_x: 1,
                target_y: 0,
            }]);
        maps.insert("forest".to_string(), forest);
        let town = GridMap::open("town", 4, 4)
            .expect("town")
            .with_transitions(vec![
                Transition {
                    x: 1,
                    y: 0,
                    target_map: "forest".to_string(),
                    target_x: 0,
                    target_y: 0,
                },
                Transition {
                    x: 3,
                    y: 3,
                    target_map: "cave".to_string(),
                    target_x: 0,
                    target_y: 0,
                },
            ])
            .with_entities(vec![PlacedEntity {
                id: "stranger".to_string(),
                x: 9,
                y: 9,
            }]);
        maps.insert("town".to_string(), town);

        let report = run(&maps, &ScriptBook::new(), &seed("town"));
        assert!(report.has_error(ValidationCode::TransitionTargetMapMissing));
        assert!(report.has_error(ValidationCode::EntityOutOfBounds));
        assert!(report.has_warning(ValidationCode::TransitionChain));
        assert!(report.has_warning(ValidationCode::EntityWithoutScript));
    }

    #[test]
    fn world_must_point_at_a_real_map_cell() {
        let report = run(&town(), &ScriptBook::new(), &seed("castle"));
        assert!(report.has_error(ValidationCode::ActiveMapMissing));

        let mut world = seed("town");
        world.player.position = TileCoord::new(4, 0);
        let report = run(&town(), &ScriptBook::new(), &world);
        assert!(report.has_error(ValidationCode::PlayerOutOfBounds));
    }
}
