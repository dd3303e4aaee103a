use std::collections::VecDeque;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::actions::{apply_actions, Action, ActionContext, ActionOutcome, SystemHint};
use crate::config::{MissingQuestPolicy, SessionConfig, DEFAULT_TERMINAL_STATE};
use crate::sim::{Backpack, QuestState};

use super::conditions::ConditionFacts;
use super::model::{
    Condition, EntityScript, ScriptBook, HINT_DISMISS_TEXT, START_STATE, SYSTEM_ENTITY_ID,
};

const HINT_STATE_ID: &str = "hint";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueSettings {
    pub terminal_state: String,
    pub missing_quest_policy: MissingQuestPolicy,
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self {
            terminal_state: DEFAULT_TERMINAL_STATE.to_string(),
            missing_quest_policy: MissingQuestPolicy::Fail,
        }
    }
}

impl From<&SessionConfig> for DialogueSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            terminal_state: config.terminal_state.clone(),
            missing_quest_policy: config.missing_quest_policy.clone(),
        }
    }
}

/// Hooks for tracing a conversation. Every method defaults to a no-op.
pub trait DialogueObserver {
    fn condition_checked(&mut self, _rule_index: usize, _condition: &Condition, _holds: bool) {}
    fn rule_matched(&mut self, _rule_index: usize, _target_state: &str) {}
    fn state_missing(&mut self, _requested: &str, _fallback: Option<&str>) {}
    fn action_applied(&mut self, _action: &Action, _success: bool) {}
    fn state_displayed(&mut self, _entity_id: &str, _state_id: &str) {}
    fn closed(&mut self, _entity_id: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDialogueObserver;

impl DialogueObserver for NoopDialogueObserver {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueView {
    pub entity_id: String,
    pub speaker: String,
    pub state_id: String,
    pub text: String,
    pub options: Vec<String>,
    /// No options: only closing is possible.
    pub terminal: bool,
    pub system_hint: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceReport {
    pub actions: Vec<ActionOutcome>,
    /// `None` once the conversation closed.
    pub view: Option<DialogueView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogueInputError {
    #[error("no dialogue is open")]
    NotOpen,
    #[error("option {index} does not exist ({available} available)")]
    InvalidOption { index: usize, available: usize },
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveDialogue {
    entity_id: String,
    state_id: String,
    pending_hints: VecDeque<SystemHint>,
}

/// Conversation state machine. Rules are re-run on every display, not only
/// when a conversation opens.
#[derive(Debug, Clone, Default)]
pub struct DialogueEngine {
    settings: DialogueSettings,
    active: Option<ActiveDialogue>,
}

impl DialogueEngine {
    pub fn new(settings: DialogueSettings) -> Self {
        Self {
            settings,
            active: None,
        }
    }

    pub fn settings(&self) -> &DialogueSettings {
        &self.settings
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    pub fn facts<'a>(&'a self, ctx: &'a ActionContext<'_>) -> ConditionFacts<'a> {
        ConditionFacts {
            quests: &*ctx.quests,
            backpack: &ctx.player.backpack,
            missing_quest_policy: &self.settings.missing_quest_policy,
        }
    }

    /// Picks the node to show for `requested`: first matching rule wins,
    /// a missing node falls back to `last_displayed`, then to `requested`.
    /// `None` means nothing sensible can be shown.
    pub fn resolve_state(
        &self,
        script: &EntityScript,
        requested: &str,
        last_displayed: Option<&str>,
        facts: &ConditionFacts<'_>,
        observer: &mut dyn DialogueObserver,
    ) -> Option<String> {
        let mut target = requested;
        for (rule_index, rule) in script.logic.iter().enumerate() {
            let matched = facts.rule_matches(rule, |condition, holds| {
                observer.condition_checked(rule_index, condition, holds)
            });
            if matched {
                observer.rule_matched(rule_index, &rule.target_state);
                target = &rule.target_state;
                break;
            }
        }

        if script.dialogue.contains(target) {
            return Some(target.to_string());
        }

        let fallback = last_displayed
            .filter(|state_id| script.dialogue.contains(state_id))
            .or_else(|| Some(requested).filter(|state_id| script.dialogue.contains(state_id)));
        warn!(
            entity = %script.id,
            state = target,
            fallback = fallback.unwrap_or("<close>"),
            "dialogue_state_missing"
        );
        observer.state_missing(target, fallback);
        fallback.map(ToString::to_string)
    }

    /// Opens (or re-opens) a conversation. `requested` defaults to `start`.
    pub fn open(
        &mut self,
        scripts: &ScriptBook,
        entity_id: &str,
        requested: Option<&str>,
        quests: &QuestState,
        backpack: &Backpack,
        observer: &mut dyn DialogueObserver,
    ) -> Option<DialogueView> {
        let Some(script) = scripts.get(entity_id) else {
            warn!(entity = entity_id, "dialogue_script_missing");
            return None;
        };
        let last_displayed = self
            .active
            .as_ref()
            .filter(|active| active.entity_id == entity_id)
            .map(|active| active.state_id.clone());
        let requested = requested.unwrap_or(START_STATE);

        let facts = ConditionFacts {
            quests,
            backpack,
            missing_quest_policy: &self.settings.missing_quest_policy,
        };
        let resolved =
            self.resolve_state(script, requested, last_displayed.as_deref(), &facts, observer);
        match resolved {
            Some(state_id) => {
                self.display(entity_id, state_id, VecDeque::new(), observer);
                self.view(scripts)
            }
            None => {
                self.close_with(observer);
                None
            }
        }
    }

    /// Shows hints raised outside a conversation, or queues them on the
    /// open one.
    pub fn show_hints(&mut self, hints: Vec<SystemHint>, observer: &mut dyn DialogueObserver) {
        if hints.is_empty() {
            return;
        }
        match self.active.as_mut() {
            Some(active) => active.pending_hints.extend(hints),
            None => {
                self.display(
                    SYSTEM_ENTITY_ID,
                    HINT_STATE_ID.to_string(),
                    hints.into(),
                    observer,
                );
            }
        }
    }

    pub fn view(&self, scripts: &ScriptBook) -> Option<DialogueView> {
        let active = self.active.as_ref()?;
        if let Some(hint) = active.pending_hints.front() {
            return Some(DialogueView {
                entity_id: active.entity_id.clone(),
                speaker: "System".to_string(),
                state_id: HINT_STATE_ID.to_string(),
                text: hint.message.clone(),
                options: vec![HINT_DISMISS_TEXT.to_string()],
                terminal: false,
                system_hint: true,
            });
        }
        let script = scripts.get(&active.entity_id)?;
        let node = script.dialogue.node(&active.state_id)?;
        Some(DialogueView {
            entity_id: active.entity_id.clone(),
            speaker: script.display_name().to_string(),
            state_id: active.state_id.clone(),
            text: node.text.clone(),
            options: node.options.iter().map(|option| option.text.clone()).collect(),
            terminal: node.is_terminal(),
            system_hint: false,
        })
    }

    /// Runs the option's actions in order (failures do not stop later ones),
    /// then moves to its next state. Hints raised by the actions are shown
    /// first; dismissing the last one continues at that hint's next state.
    pub fn choose(
        &mut self,
        scripts: &ScriptBook,
        option_index: usize,
        ctx: &mut ActionContext<'_>,
        observer: &mut dyn DialogueObserver,
    ) -> Result<ChoiceReport, DialogueInputError> {
        let mut active = self.active.take().ok_or(DialogueInputError::NotOpen)?;

        if let Some(hint) = active.pending_hints.front().cloned() {
            if option_index != 0 {
                self.active = Some(active);
                return Err(DialogueInputError::InvalidOption {
                    index: option_index,
                    available: 1,
                });
            }
            active.pending_hints.pop_front();
            if !active.pending_hints.is_empty() {
                self.active = Some(active);
                return Ok(ChoiceReport {
                    actions: Vec::new(),
                    view: self.view(scripts),
                });
            }
            self.active = Some(active);
            let view = self.advance_to(scripts, Some(&hint.next_state), ctx, observer);
            return Ok(ChoiceReport {
                actions: Vec::new(),
                view,
            });
        }

        let Some(option) = scripts
            .get(&active.entity_id)
            .and_then(|script| script.dialogue.node(&active.state_id))
            .and_then(|node| node.options.get(option_index))
        else {
            let available = scripts
                .get(&active.entity_id)
                .and_then(|script| script.dialogue.node(&active.state_id))
                .map_or(0, |node| node.options.len());
            self.active = Some(active);
            return Err(DialogueInputError::InvalidOption {
                index: option_index,
                available,
            });
        };

        let outcomes = apply_actions(&option.actions, ctx);
        for (action, outcome) in option.actions.iter().zip(&outcomes) {
            observer.action_applied(action, outcome.success);
        }

        let raised = std::mem::take(&mut *ctx.hints);
        active.pending_hints.extend(raised);
        let has_hints = !active.pending_hints.is_empty();
        self.active = Some(active);
        if has_hints {
            return Ok(ChoiceReport {
                actions: outcomes,
                view: self.view(scripts),
            });
        }

        let view = self.advance_to(scripts, option.next_state.as_deref(), ctx, observer);
        Ok(ChoiceReport {
            actions: outcomes,
            view,
        })
    }

    pub fn close(&mut self) -> bool {
        self.close_with(&mut NoopDialogueObserver)
    }

    pub fn close_with(&mut self, observer: &mut dyn DialogueObserver) -> bool {
        match self.active.take() {
            Some(active) => {
                debug!(entity = %active.entity_id, "dialogue_closed");
                observer.closed(&active.entity_id);
                true
            }
            None => false,
        }
    }

    fn advance_to(
        &mut self,
        scripts: &ScriptBook,
        next_state: Option<&str>,
        ctx: &ActionContext<'_>,
        observer: &mut dyn DialogueObserver,
    ) -> Option<DialogueView> {
        let next_state = match next_state {
            Some(state_id) if state_id != self.settings.terminal_state => state_id,
            _ => {
                self.close_with(observer);
                return None;
            }
        };
        let (entity_id, last_displayed) = match self.active.as_ref() {
            Some(active) => (active.entity_id.clone(), active.state_id.clone()),
            None => return None,
        };
        let Some(script) = scripts.get(&entity_id) else {
            self.close_with(observer);
            return None;
        };

        let facts = self.facts(ctx);
        let resolved = self.resolve_state(script, next_state, Some(&last_displayed), &facts, observer);
        match resolved {
            Some(state_id) => {
                self.display(&entity_id, state_id, VecDeque::new(), observer);
                self.view(scripts)
            }
            None => {
                self.close_with(observer);
                None
            }
        }
    }

    fn display(
        &mut self,
        entity_id: &str,
        state_id: String,
        pending_hints: VecDeque<SystemHint>,
        observer: &mut dyn DialogueObserver,
    ) {
        info!(entity = entity_id, state = %state_id, "dialogue_state_displayed");
        observer.state_displayed(entity_id, &state_id);
        self.active = Some(ActiveDialogue {
            entity_id: entity_id.to_string(),
            state_id,
            pending_hints,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::dialogue::model::{DialogueGraph, DialogueNode, DialogueOption, LogicRule};
    use crate::sim::{MapSet, MessageLog, PlayerState, RemovedEntities};

    struct World {
        player: PlayerState,
        quests: QuestState,
        maps: MapSet,
        removed: RemovedEntities,
        messages: MessageLog,
        hints: Vec<SystemHint>,
    }

    impl World {
        fn new() -> Self {
            let mut quests = QuestState::new();
            quests.register("q1", "not_started");
            Self {
                player: PlayerState::default(),
                quests,
                maps: MapSet::new(),
                removed: RemovedEntities::new(),
                messages: MessageLog::default(),
                hints: Vec::new(),
            }
        }

        fn ctx(&mut self) -> ActionContext<'_> {
            ActionContext {
                player: &mut self.player,
                quests: &mut self.quests,
                maps: &mut self.maps,
                removed_entities: &mut self.removed,
                messages: &mut self.messages,
                hints: &mut self.hints,
            }
        }
    }

    fn node(text: &str, options: Vec<DialogueOption>) -> DialogueNode {
        DialogueNode {
            text: text.to_string(),
            options,
        }
    }

    fn option(text: &str, next_state: &str, actions: Vec<Action>) -> DialogueOption {
        DialogueOption {
            text: text.to_string(),
            next_state: Some(next_state.to_string()),
            actions,
        }
    }

    fn script(nodes: Vec<(&str, DialogueNode)>, logic: Vec<LogicRule>) -> ScriptBook {
        let nodes = nodes
            .into_iter()
            .map(|(id, node)| (id.to_string(), node))
            .collect::<BTreeMap<_, _>>();
        let mut book = ScriptBook::new();
        book.insert(
            "old_man".to_string(),
            EntityScript {
                id: "old_man".to_string(),
                name: Some("Old Man".to_string()),
                dialogue: DialogueGraph::new(nodes),
                logic,
            },
        );
        book
    }

    fn accepted_rule(target: &str) -> LogicRule {
        LogicRule {
            conditions: vec![Condition::QuestStatus {
                quest_id: "q1".to_string(),
                status: "accepted".to_string(),
            }],
            target_state: target.to_string(),
        }
    }

    fn open(engine: &mut DialogueEngine, book: &ScriptBook, world: &World) -> Option<DialogueView> {
        engine.open(
            book,
            "old_man",
            None,
            &world.quests,
            &world.player.backpack,
            &mut NoopDialogueObserver,
        )
    }

    #[test]
    fn first_matching_rule_wins() {
        let book = script(
            vec![
                ("start", node("Hi", vec![option("Bye", "end", vec![])])),
                ("stateA", node("A", vec![])),
                ("stateB", node("B", vec![])),
            ],
            vec![accepted_rule("stateA"), accepted_rule("stateB")],
        );
        let mut world = World::new();
        world.quests.set_status("q1", "accepted");
        let mut engine = DialogueEngine::default();
        let view = open(&mut engine, &book, &world).expect("view");
        assert_eq!(view.state_id, "stateA");
        assert!(view.terminal);
    }

    #[test]
    fn accept_option_changes_quest_and_shows_terminal_node() {
        let book = script(
            vec![
                (
                    "start",
                    node(
                        "Hi",
                        vec![option(
                            "Accept",
                            "accepted",
                            vec![Action::ChangeQuestState {
                                quest_id: "q1".to_string(),
                                new_state: "accepted".to_string(),
                            }],
                        )],
                    ),
                ),
                ("accepted", node("Good luck", vec![])),
            ],
            Vec::new(),
        );
        let mut world = World::new();
        let mut engine = DialogueEngine::default();
        let view = open(&mut engine, &book, &world).expect("start");
        assert_eq!(view.options, vec!["Accept".to_string()]);

        let report = engine
            .choose(&book, 0, &mut world.ctx(), &mut NoopDialogueObserver)
            .expect("choose");
        assert_eq!(world.quests.status("q1"), Some("accepted"));
        let view = report.view.expect("still open");
        assert_eq!(view.text, "Good luck");
        assert!(view.terminal);
        assert!(view.options.is_empty());
    }

    #[test]
    fn rules_re_run_on_every_transition() {
        let book = script(
            vec![
                (
                    "start",
                    node(
                        "Hi",
                        vec![option(
                            "Accept",
                            "thanks",
                            vec![Action::ChangeQuestState {
                                quest_id: "q1".to_string(),
                                new_state: "accepted".to_string(),
                            }],
                        )],
                    ),
                ),
                ("thanks", node("Thanks", vec![])),
                ("in_progress", node("Still looking?", vec![])),
            ],
            vec![accepted_rule("in_progress")],
        );
        let mut world = World::new();
        let mut engine = DialogueEngine::default();
        open(&mut engine, &book, &world).expect("start");
        let report = engine
            .choose(&book, 0, &mut world.ctx(), &mut NoopDialogueObserver)
            .expect("choose");
        assert_eq!(report.view.expect("open").state_id, "in_progress");
    }

    #[test]
    fn missing_next_state_falls_back_to_last_displayed() {
        let book = script(
            vec![(
                "start",
                node("Hi", vec![option("Huh", "nowhere", vec![Action::AddMoney { amount: 5 }])]),
            )],
            Vec::new(),
        );
        let mut world = World::new();
        let mut engine = DialogueEngine::default();
        open(&mut engine, &book, &world).expect("start");
        let report = engine
            .choose(&book, 0, &mut world.ctx(), &mut NoopDialogueObserver)
            .expect("choose");
        assert_eq!(report.view.expect("fallback").state_id, "start");
        assert_eq!(world.player.money, 5);
    }

    #[test]
    fn missing_rule_target_on_open_falls_back_to_requested() {
        let book = script(
            vec![("start", node("Hi", vec![]))],
            vec![accepted_rule("ghost")],
        );
        let mut world = World::new();
        world.quests.set_status("q1", "accepted");
        let mut engine = DialogueEngine::default();
        let view = open(&mut engine, &book, &world).expect("fallback");
        assert_eq!(view.state_id, "start");
    }

    #[test]
    fn terminal_sentinel_and_absent_next_state_close() {
        let book = script(
            vec![(
                "start",
                node(
                    "Hi",
                    vec![
                        option("Bye", "end", vec![]),
                        DialogueOption {
                            text: "Leave".to_string(),
                            next_state: None,
                            actions: Vec::new(),
                        },
                    ],
                ),
            )],
            Vec::new(),
        );
        let mut world = World::new();
        for index in 0..2 {
            let mut engine = DialogueEngine::default();
            open(&mut engine, &book, &world).expect("start");
            let report = engine
                .choose(&book, index, &mut world.ctx(), &mut NoopDialogueObserver)
                .expect("choose");
            assert!(report.view.is_none());
            assert!(!engine.is_open());
        }
    }

    #[test]
    fn invalid_option_keeps_dialogue_open() {
        let book = script(vec![("start", node("Hi", vec![]))], Vec::new());
        let mut world = World::new();
        let mut engine = DialogueEngine::default();
        open(&mut engine, &book, &world).expect("start");
        let error = engine
            .choose(&book, 0, &mut world.ctx(), &mut NoopDialogueObserver)
            .expect_err("terminal node has no options");
        assert_eq!(
            error,
            DialogueInputError::InvalidOption {
                index: 0,
                available: 0
            }
        );
        assert!(engine.is_open());
        assert!(engine.close());
        assert_eq!(
            engine.choose(&book, 0, &mut world.ctx(), &mut NoopDialogueObserver),
            Err(DialogueInputError::NotOpen)
        );
    }

    #[test]
    fn hint_is_shown_then_continues_at_its_next_state() {
        let book = script(
            vec![
                (
                    "start",
                    node(
                        "Hi",
                        vec![option(
                            "Teach me",
                            "start",
                            vec![Action::ShowGameSystemHint {
                                message: "Click a tile to walk.".to_string(),
                                next_state: "after".to_string(),
                            }],
                        )],
                    ),
                ),
                ("after", node("Now go.", vec![])),
            ],
            Vec::new(),
        );
        let mut world = World::new();
        let mut engine = DialogueEngine::default();
        open(&mut engine, &book, &world).expect("start");

        let report = engine
            .choose(&book, 0, &mut world.ctx(), &mut NoopDialogueObserver)
            .expect("choose");
        let hint = report.view.expect("hint");
        assert!(hint.system_hint);
        assert_eq!(hint.options, vec![HINT_DISMISS_TEXT.to_string()]);
        assert!(world.hints.is_empty());

        let report = engine
            .choose(&book, 0, &mut world.ctx(), &mut NoopDialogueObserver)
            .expect("dismiss");
        assert_eq!(report.view.expect("after").state_id, "after");
    }

    #[test]
    fn standalone_hint_closes_on_dismiss() {
        let book = ScriptBook::new();
        let mut world = World::new();
        let mut engine = DialogueEngine::default();
        engine.show_hints(
            vec![SystemHint {
                message: "Saved.".to_string(),
                next_state: "end".to_string(),
            }],
            &mut NoopDialogueObserver,
        );
        let view = engine.view(&book).expect("hint");
        assert_eq!(view.entity_id, SYSTEM_ENTITY_ID);
        assert_eq!(view.text, "Saved.");
        let report = engine
            .choose(&book, 0, &mut world.ctx(), &mut NoopDialogueObserver)
            .expect("dismiss");
        assert!(report.view.is_none());
    }
}
