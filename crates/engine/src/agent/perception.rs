use std::collections::BTreeMap;

use serde::Serialize;

use crate::dialogue::DialogueView;
use crate::sim::{Backpack, GameMessage, PendingInteraction, QuestState, Skill, TileCoord};
use crate::world::{ClickMarker, GameWorld};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
    pub position: TileCoord,
    pub money: u64,
    pub energy: u32,
    pub max_energy: u32,
    pub hp: u32,
    pub max_hp: u32,
    pub moving: bool,
    pub steps_remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NpcView {
    pub id: String,
    pub name: String,
    pub position: TileCoord,
    /// Chebyshev distance from the player.
    pub distance: u32,
    pub has_dialogue: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionView {
    pub position: TileCoord,
    pub target_map: String,
    pub distance: u32,
}

/// Something the agent can act on without moving first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interactable {
    Npc { id: String, position: TileCoord },
    Transition { target_map: String },
}

/// Read-only snapshot of what the agent needs to decide its next command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Perception {
    pub tick: u64,
    pub map_id: String,
    pub map_width: u32,
    pub map_height: u32,
    pub player: PlayerView,
    pub skills: BTreeMap<String, Skill>,
    pub backpack: Backpack,
    pub npcs: Vec<NpcView>,
    pub transitions: Vec<TransitionView>,
    pub interactables: Vec<Interactable>,
    pub quests: QuestState,
    pub pending: Option<PendingInteraction>,
    pub click_marker: Option<ClickMarker>,
    pub dialogue: Option<DialogueView>,
    pub recent_messages: Vec<GameMessage>,
}

pub fn perceive(world: &GameWorld) -> Perception {
    let player = world.player();
    let here = player.position;
    let map = world.active_map();

    let mut npcs = map
        .map(|map| {
            map.entities()
                .iter()
                .map(|entity| {
                    let script = world.scripts().get(&entity.id);
                    NpcView {
                        id: entity.id.clone(),
                        name: script
                            .map(|script| script.display_name().to_string())
                            .unwrap_or_else(|| entity.id.clone()),
                        position: entity.cell(),
                        distance: here.chebyshev_distance(entity.cell()),
                        has_dialogue: script.is_some(),
                    }
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    npcs.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));

    let mut transitions = map
        .map(|map| {
            map.transitions()
                .iter()
                .map(|transition| TransitionView {
                    position: transition.cell(),
                    target_map: transition.target_map.clone(),
                    distance: here.chebyshev_distance(transition.cell()),
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    transitions.sort_by_key(|transition| (transition.distance, transition.position));

    let mut interactables = npcs
        .iter()
        .filter(|npc| npc.distance == 1)
        .map(|npc| Interactable::Npc {
            id: npc.id.clone(),
            position: npc.position,
        })
        .collect::<Vec<_>>();
    if let Some(transition) = map.and_then(|map| map.transition_at(here)) {
        interactables.push(Interactable::Transition {
            target_map: transition.target_map.clone(),
        });
    }

    Perception {
        tick: world.tick_count(),
        map_id: world.active_map_id().to_string(),
        map_width: map.map_or(0, |map| map.width()),
        map_height: map.map_or(0, |map| map.height()),
        player: PlayerView {
            position: here,
            money: player.money,
            energy: player.energy,
            max_energy: player.max_energy,
            hp: player.hp,
            max_hp: player.max_hp,
            moving: player.movement.is_moving(),
            steps_remaining: player.movement.remaining().len(),
        },
        skills: player.skills.clone(),
        backpack: player.backpack.clone(),
        npcs,
        transitions,
        interactables,
        quests: world.quests().clone(),
        pending: world.pending().cloned(),
        click_marker: world.click_marker(),
        dialogue: world.dialogue_view(),
        recent_messages: world.messages().iter().cloned().collect(),
    }
}
