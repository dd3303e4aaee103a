use serde::Serialize;

use super::grid::{GridMap, TileCoord, TileRegistry};
use super::nav::{PathFinder, TilePath};

/// What occupies a clicked cell. Entities win over transition markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickTarget {
    Entity { entity_id: String, cell: TileCoord },
    Transition { cell: TileCoord },
    Ground { cell: TileCoord },
}

impl ClickTarget {
    pub fn cell(&self) -> TileCoord {
        match self {
            Self::Entity { cell, .. } | Self::Transition { cell } | Self::Ground { cell } => *cell,
        }
    }

    pub fn is_interactive(&self) -> bool {
        !matches!(self, Self::Ground { .. })
    }
}

/// A deferred interaction, re-checked every tick until it fires or is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingInteraction {
    Entity { entity_id: String },
    Transition { cell: TileCoord },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Adjacent entity: talk now, no movement.
    OpenDialogue { entity_id: String },
    Move {
        path: TilePath,
        pending: Option<PendingInteraction>,
    },
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingCheck {
    Fire,
    Wait,
    Drop,
}

pub struct InteractionGate<'a> {
    map: &'a GridMap,
    tiles: &'a TileRegistry,
}

impl<'a> InteractionGate<'a> {
    pub fn new(map: &'a GridMap, tiles: &'a TileRegistry) -> Self {
        Self { map, tiles }
    }

    pub fn classify(&self, cell: TileCoord) -> ClickTarget {
        if let Some(entity) = self.map.entity_at(cell) {
            return ClickTarget::Entity {
                entity_id: entity.id.clone(),
                cell,
            };
        }
        if self.map.transition_at(cell).is_some() {
            return ClickTarget::Transition { cell };
        }
        ClickTarget::Ground { cell }
    }

    pub fn decide(&self, player: TileCoord, target: &ClickTarget) -> GateDecision {
        let finder = PathFinder::new(self.map, self.tiles);
        match target {
            ClickTarget::Entity { entity_id, cell } => {
                if player.is_adjacent(*cell) {
                    return GateDecision::OpenDialogue {
                        entity_id: entity_id.clone(),
                    };
                }
                let mut candidates = self.map.adjacent_walkable_cells(*cell, self.tiles);
                candidates.sort_by_key(|candidate| player.manhattan_distance(*candidate));
                for candidate in candidates {
                    let path = finder.find_path(player, candidate);
                    if !path.is_empty() {
                        return GateDecision::Move {
                            path,
                            pending: Some(PendingInteraction::Entity {
                                entity_id: entity_id.clone(),
                            }),
                        };
                    }
                }
                GateDecision::Unreachable
            }
            ClickTarget::Transition { cell } => {
                let path = finder.find_path(player, *cell);
                if path.len() < 2 {
                    return GateDecision::Unreachable;
                }
                GateDecision::Move {
                    path,
                    pending: Some(PendingInteraction::Transition { cell: *cell }),
                }
            }
            ClickTarget::Ground { cell } => {
                let path = finder.find_path(player, *cell);
                if path.is_empty() {
                    return GateDecision::Unreachable;
                }
                GateDecision::Move {
                    path,
                    pending: None,
                }
            }
        }
    }

    /// Entity interactions fire on the first tick the player is adjacent.
    /// Transition interactions fire through the map switch itself, so here
    /// they only wait or drop.
    pub fn check_pending(
        &self,
        pending: &PendingInteraction,
        player: TileCoord,
        moving: bool,
    ) -> PendingCheck {
        match pending {
            PendingInteraction::Entity { entity_id } => {
                let Some(entity) = self.map.entity(entity_id) else {
                    return PendingCheck::Drop;
                };
                if player.is_adjacent(entity.cell()) {
                    PendingCheck::Fire
                } else if moving {
                    PendingCheck::Wait
                } else {
                    PendingCheck::Drop
                }
            }
            PendingInteraction::Transition { .. } => {
                if moving {
                    PendingCheck::Wait
                } else {
                    PendingCheck::Drop
                }
            }
        }
    }
}
