use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::actions::{apply_raw_action, ActionContext, OptionContext, SystemHint};
use crate::config::SessionConfig;
use crate::content::ContentBundle;
use crate::dialogue::{
    ChoiceReport, DialogueEngine, DialogueInputError, DialogueSettings, DialogueView,
    NoopDialogueObserver, ScriptBook,
};
use crate::persistence::{SaveDocument, SAVE_VERSION};
use crate::sim::{
    ClickTarget, GameMessage, GateDecision, GridMap, InteractionGate, Location, MapSet,
    MapTransition, MapTransitionResolver, MessageLog, MovementController, PendingCheck,
    PendingInteraction, PlayerState, QuestState, RemovedEntities, TileCoord, TileRegistry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickMarkerKind {
    Normal,
    Interactive,
}

/// Where the player last clicked; cleared on map change and dialogue close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClickMarker {
    pub cell: TileCoord,
    pub kind: ClickMarkerKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    DialogueOpened(DialogueView),
    Moving {
        destination: Option<TileCoord>,
        pending: Option<PendingInteraction>,
    },
    /// Adjacent entity without a usable script.
    NoDialogue {
        entity_id: String,
    },
    Unreachable,
    OutOfBounds,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub stepped_to: Option<TileCoord>,
    pub transition: Option<MapTransition>,
    pub dialogue_opened: Option<DialogueView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreReport {
    /// False when the save was made against different content.
    pub content_matches: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RestoreError {
    #[error("save refers to unknown map '{map_id}'")]
    UnknownMap { map_id: String },
    #[error("saved position ({x}, {y}) is outside map '{map_id}'")]
    PositionOutOfBounds { map_id: String, x: u32, y: u32 },
}

/// Single owner of all play state. Every mutation goes through its methods,
/// one call at a time.
pub struct GameWorld {
    tiles: TileRegistry,
    content_maps: MapSet,
    maps: MapSet,
    scripts: ScriptBook,
    fingerprint: String,
    active_map: String,
    player: PlayerState,
    quests: QuestState,
    removed_entities: RemovedEntities,
    messages: MessageLog,
    hints: Vec<SystemHint>,
    dialogue: DialogueEngine,
    pending: Option<PendingInteraction>,
    click_marker: Option<ClickMarker>,
    tick_count: u64,
}

impl GameWorld {
    pub fn new(content: ContentBundle, config: &SessionConfig) -> Self {
        let mut player = content.world.player;
        player.movement = MovementController::new(config.step_interval_seconds);
        Self {
            tiles: content.tiles,
            maps: content.maps.clone(),
            content_maps: content.maps,
            scripts: content.scripts,
            fingerprint: content.fingerprint,
            active_map: content.world.active_map,
            player,
            quests: content.world.quests,
            removed_entities: RemovedEntities::new(),
            messages: MessageLog::with_capacity(config.message_log_capacity),
            hints: Vec::new(),
            dialogue: DialogueEngine::new(DialogueSettings::from(config)),
            pending: None,
            click_marker: None,
            tick_count: 0,
        }
    }

    pub fn active_map_id(&self) -> &str {
        &self.active_map
    }

    pub fn active_map(&self) -> Option<&GridMap> {
        self.maps.get(&self.active_map)
    }

    pub fn maps(&self) -> &MapSet {
        &self.maps
    }

    pub fn tiles(&self) -> &TileRegistry {
        &self.tiles
    }

    pub fn scripts(&self) -> &ScriptBook {
        &self.scripts
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn quests(&self) -> &QuestState {
        &self.quests
    }

    pub fn removed_entities(&self) -> &RemovedEntities {
        &self.removed_entities
    }

    pub fn pending(&self) -> Option<&PendingInteraction> {
        self.pending.as_ref()
    }

    pub fn click_marker(&self) -> Option<ClickMarker> {
        self.click_marker
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn content_fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn drain_messages(&mut self) -> Vec<GameMessage> {
        let mut out = Vec::new();
        self.messages.drain_into(&mut out);
        out
    }

    pub fn dialogue_view(&self) -> Option<DialogueView> {
        self.dialogue.view(&self.scripts)
    }

    pub fn is_dialogue_open(&self) -> bool {
        self.dialogue.is_open()
    }

    /// Live ids for the action registry's dynamic option lists.
    pub fn option_context(&self) -> OptionContext {
        OptionContext {
            quest_ids: self.quests.ids().map(ToString::to_string).collect(),
            skill_ids: self.player.skills.keys().cloned().collect(),
            map_ids: self.maps.keys().cloned().collect(),
        }
    }

    /// Player click on a cell of the active map. Any open dialogue closes
    /// first, and the new intent replaces any earlier path and pending
    /// interaction.
    pub fn click(&mut self, cell: TileCoord) -> ClickOutcome {
        if self.dialogue.is_open() {
            self.close_dialogue();
        }
        let Some(map) = self.maps.get(&self.active_map) else {
            warn!(map = %self.active_map, "active_map_missing");
            return ClickOutcome::OutOfBounds;
        };
        if !map.contains(cell) {
            debug!(x = cell.x, y = cell.y, "click_out_of_bounds");
            return ClickOutcome::OutOfBounds;
        }

        let gate = InteractionGate::new(map, &self.tiles);
        let target = gate.classify(cell);
        let decision = gate.decide(self.player.position, &target);
        self.click_marker = Some(ClickMarker {
            cell,
            kind: if target.is_interactive() {
                ClickMarkerKind::Interactive
            } else {
                ClickMarkerKind::Normal
            },
        });
        self.pending = None;

        match decision {
            GateDecision::OpenDialogue { entity_id } => {
                self.player.movement.clear();
                match self.open_dialogue(&entity_id) {
                    Some(view) => ClickOutcome::DialogueOpened(view),
                    None => ClickOutcome::NoDialogue { entity_id },
                }
            }
            GateDecision::Move { path, pending } => {
                self.player
                    .movement
                    .assign_path_from(self.player.position, path);
                debug!(
                    x = cell.x,
                    y = cell.y,
                    steps = self.player.movement.remaining().len(),
                    "movement_assigned"
                );
                self.pending = pending.clone();
                ClickOutcome::Moving {
                    destination: self.player.movement.destination(),
                    pending,
                }
            }
            GateDecision::Unreachable => {
                self.player.movement.clear();
                if let ClickTarget::Entity { entity_id, .. } = &target {
                    debug!(entity = %entity_id, "interaction_unreachable");
                }
                ClickOutcome::Unreachable
            }
        }
    }

    /// One fixed step: movement hop, then transition, then the pending
    /// interaction check.
    pub fn tick(&mut self, dt_seconds: f32) -> TickReport {
        self.tick_count += 1;
        let mut report = TickReport::default();

        if let Some(cell) = self.player.movement.advance(dt_seconds) {
            self.player.position = cell;
            report.stepped_to = Some(cell);

            let mut location = Location {
                map_id: self.active_map.clone(),
                cell,
            };
            let resolver = MapTransitionResolver::new(&self.maps);
            if let Some(transition) = resolver.resolve(&mut location) {
                self.active_map = location.map_id;
                self.player.position = location.cell;
                self.player.movement.clear();
                self.click_marker = None;
                self.pending = None;
                report.transition = Some(transition);
            }
        }

        if let Some(pending) = self.pending.clone() {
            let check = match self.maps.get(&self.active_map) {
                Some(map) => InteractionGate::new(map, &self.tiles).check_pending(
                    &pending,
                    self.player.position,
                    self.player.movement.is_moving(),
                ),
                None => PendingCheck::Drop,
            };
            match check {
                PendingCheck::Wait => {}
                PendingCheck::Drop => {
                    debug!(?pending, "pending_interaction_dropped");
                    self.pending = None;
                }
                PendingCheck::Fire => {
                    self.pending = None;
                    self.player.movement.clear();
                    if let PendingInteraction::Entity { entity_id } = pending {
                        info!(entity = %entity_id, "pending_interaction_fired");
                        report.dialogue_opened = self.open_dialogue(&entity_id);
                    }
                }
            }
        }

        report
    }

    pub fn choose_option(
        &mut self,
        option_index: usize,
    ) -> Result<ChoiceReport, DialogueInputError> {
        let mut ctx = ActionContext {
            player: &mut self.player,
            quests: &mut self.quests,
            maps: &mut self.maps,
            removed_entities: &mut self.removed_entities,
            messages: &mut self.messages,
            hints: &mut self.hints,
        };
        let report = self.dialogue.choose(
            &self.scripts,
            option_index,
            &mut ctx,
            &mut NoopDialogueObserver,
        )?;
        if !self.dialogue.is_open() {
            self.click_marker = None;
        }
        Ok(report)
    }

    pub fn close_dialogue(&mut self) -> bool {
        self.click_marker = None;
        self.dialogue.close()
    }

    /// Applies an authored `{id, params}` action outside any dialogue.
    /// Hints it raises open the system dialogue.
    pub fn apply_action_raw(&mut self, id: &str, params: &Map<String, Value>) -> bool {
        let mut ctx = ActionContext {
            player: &mut self.player,
            quests: &mut self.quests,
            maps: &mut self.maps,
            removed_entities: &mut self.removed_entities,
            messages: &mut self.messages,
            hints: &mut self.hints,
        };
        let success = apply_raw_action(id, params, &mut ctx);
        let hints = std::mem::take(&mut self.hints);
        self.dialogue.show_hints(hints, &mut NoopDialogueObserver);
        success
    }

    pub fn save_document(&self) -> SaveDocument {
        SaveDocument {
            save_version: SAVE_VERSION,
            content_hash: self.fingerprint.clone(),
            active_map: self.active_map.clone(),
            player: self.player.clone(),
            quests: self.quests.clone(),
            removed_entities: self.removed_entities.clone(),
        }
    }

    /// Replaces play state with a saved document. Transient state (path,
    /// pending interaction, dialogue, marker) is reset.
    pub fn restore(&mut self, document: SaveDocument) -> Result<RestoreReport, RestoreError> {
        let map = self
            .content_maps
            .get(&document.active_map)
            .ok_or_else(|| RestoreError::UnknownMap {
                map_id: document.active_map.clone(),
            })?;
        if !map.contains(document.player.position) {
            return Err(RestoreError::PositionOutOfBounds {
                map_id: document.active_map.clone(),
                x: document.player.position.x,
                y: document.player.position.y,
            });
        }

        let mut maps = self.content_maps.clone();
        for (map_id, entity_ids) in &document.removed_entities {
            if let Some(map) = maps.get_mut(map_id) {
                for entity_id in entity_ids {
                    map.remove_entity(entity_id);
                }
            }
        }

        let content_matches = document.content_hash == self.fingerprint;
        if !content_matches {
            warn!(
                saved = %document.content_hash,
                current = %self.fingerprint,
                "save_content_mismatch"
            );
        }

        let step_interval = self.player.movement.step_interval_seconds();
        self.maps = maps;
        self.active_map = document.active_map;
        self.player = document.player;
        self.player.movement = MovementController::new(step_interval);
        self.quests = document.quests;
        self.removed_entities = document.removed_entities;
        self.pending = None;
        self.click_marker = None;
        self.hints.clear();
        self.dialogue.close();
        info!(map = %self.active_map, "save_restored");
        Ok(RestoreReport { content_matches })
    }

    fn open_dialogue(&mut self, entity_id: &str) -> Option<DialogueView> {
        self.dialogue.open(
            &self.scripts,
            entity_id,
            None,
            &self.quests,
            &self.player.backpack,
            &mut NoopDialogueObserver,
        )
    }
}
