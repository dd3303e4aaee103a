use serde::Serialize;

use crate::actions::{Action, ActionContext, SystemHint};
use crate::sim::{
    Backpack, GameMessage, MapSet, MessageLog, PlayerState, QuestState, RemovedEntities, Skill,
};

use super::engine::{
    ChoiceReport, DialogueEngine, DialogueInputError, DialogueObserver, DialogueSettings,
    DialogueView,
};
use super::model::{Condition, ScriptBook};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    ConditionChecked {
        rule_index: usize,
        condition: Condition,
        holds: bool,
    },
    RuleMatched {
        rule_index: usize,
        target_state: String,
    },
    StateMissing {
        requested: String,
        fallback: Option<String>,
    },
    ActionApplied {
        action: &'static str,
        success: bool,
    },
    StateDisplayed {
        entity_id: String,
        state_id: String,
    },
    Snapshot(PreviewSnapshot),
    Closed {
        entity_id: String,
    },
}

/// Observer that keeps every hook call in order.
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    events: Vec<TraceEvent>,
}

impl TraceRecorder {
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.events)
    }
}

impl DialogueObserver for TraceRecorder {
    fn condition_checked(&mut self, rule_index: usize, condition: &Condition, holds: bool) {
        self.events.push(TraceEvent::ConditionChecked {
            rule_index,
            condition: condition.clone(),
            holds,
        });
    }

    fn rule_matched(&mut self, rule_index: usize, target_state: &str) {
        self.events.push(TraceEvent::RuleMatched {
            rule_index,
            target_state: target_state.to_string(),
        });
    }

    fn state_missing(&mut self, requested: &str, fallback: Option<&str>) {
        self.events.push(TraceEvent::StateMissing {
            requested: requested.to_string(),
            fallback: fallback.map(ToString::to_string),
        });
    }

    fn action_applied(&mut self, action: &Action, success: bool) {
        self.events.push(TraceEvent::ActionApplied {
            action: action.id().as_str(),
            success,
        });
    }

    fn state_displayed(&mut self, entity_id: &str, state_id: &str) {
        self.events.push(TraceEvent::StateDisplayed {
            entity_id: entity_id.to_string(),
            state_id: state_id.to_string(),
        });
    }

    fn closed(&mut self, entity_id: &str) {
        self.events.push(TraceEvent::Closed {
            entity_id: entity_id.to_string(),
        });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewSnapshot {
    pub quests: QuestState,
    pub backpack: Backpack,
    pub money: u64,
    pub energy: u32,
    pub max_energy: u32,
    pub skills: Vec<(String, Skill)>,
    pub messages: Vec<GameMessage>,
}

/// Runs one entity's conversation against a private copy of the state, so
/// authors can try content without touching a live session.
pub struct DialoguePreview {
    scripts: ScriptBook,
    engine: DialogueEngine,
    player: PlayerState,
    quests: QuestState,
    maps: MapSet,
    removed_entities: RemovedEntities,
    messages: MessageLog,
    hints: Vec<SystemHint>,
    trace: TraceRecorder,
}

impl DialoguePreview {
    pub fn new(
        scripts: ScriptBook,
        settings: DialogueSettings,
        player: PlayerState,
        quests: QuestState,
        maps: MapSet,
    ) -> Self {
        Self {
            scripts,
            engine: DialogueEngine::new(settings),
            player,
            quests,
            maps,
            removed_entities: RemovedEntities::new(),
            messages: MessageLog::default(),
            hints: Vec::new(),
            trace: TraceRecorder::default(),
        }
    }

    pub fn open(&mut self, entity_id: &str, requested: Option<&str>) -> Option<DialogueView> {
        let view = self.engine.open(
            &self.scripts,
            entity_id,
            requested,
            &self.quests,
            &self.player.backpack,
            &mut self.trace,
        );
        self.record_snapshot();
        view
    }

    pub fn choose(&mut self, option_index: usize) -> Result<ChoiceReport, DialogueInputError> {
        let mut ctx = ActionContext {
            player: &mut self.player,
            quests: &mut self.quests,
            maps: &mut self.maps,
            removed_entities: &mut self.removed_entities,
            messages: &mut self.messages,
            hints: &mut self.hints,
        };
        let report = self
            .engine
            .choose(&self.scripts, option_index, &mut ctx, &mut self.trace)?;
        self.record_snapshot();
        Ok(report)
    }

    pub fn view(&self) -> Option<DialogueView> {
        self.engine.view(&self.scripts)
    }

    pub fn is_open(&self) -> bool {
        self.engine.is_open()
    }

    pub fn trace(&self) -> &[TraceEvent] {
        self.trace.events()
    }

    pub fn snapshot(&self) -> PreviewSnapshot {
        PreviewSnapshot {
            quests: self.quests.clone(),
            backpack: self.player.backpack.clone(),
            money: self.player.money,
            energy: self.player.energy,
            max_energy: self.player.max_energy,
            skills: self
                .player
                .skills
                .iter()
                .map(|(id, skill)| (id.clone(), *skill))
                .collect(),
            messages: self.messages.iter().cloned().collect(),
        }
    }

    fn record_snapshot(&mut self) {
        let snapshot = self.snapshot();
        self.trace.events.push(TraceEvent::Snapshot(snapshot));
    }
}
