use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type TileType = u16;

/// Maps keyed by id.
pub type MapSet = BTreeMap<String, GridMap>;

/// Blocking tile types used when content ships no `tiles.json`.
pub const DEFAULT_UNWALKABLE_TILES: [TileType; 9] = [1, 2, 7, 9, 11, 12, 15, 20, 21];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn chebyshev_distance(self, other: TileCoord) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    pub fn manhattan_distance(self, other: TileCoord) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
    }

    /// 8-adjacency; a cell is never adjacent to itself.
    pub fn is_adjacent(self, other: TileCoord) -> bool {
        self.chebyshev_distance(other) == 1
    }

    pub(crate) fn offset(self, dx: i32, dy: i32) -> Option<TileCoord> {
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        Some(TileCoord { x, y })
    }
}

/// Walkability table keyed by tile type. Supplied by content, not by the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRegistry {
    unwalkable: BTreeSet<TileType>,
}

impl TileRegistry {
    pub fn new(unwalkable: impl IntoIterator<Item = TileType>) -> Self {
        Self {
            unwalkable: unwalkable.into_iter().collect(),
        }
    }

    pub fn is_walkable(&self, tile: TileType) -> bool {
        !self.unwalkable.contains(&tile)
    }
}

impl Default for TileRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_UNWALKABLE_TILES)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub x: u32,
    pub y: u32,
    pub target_map: String,
    pub target_x: u32,
    pub target_y: u32,
}

impl Transition {
    pub fn cell(&self) -> TileCoord {
        TileCoord::new(self.x, self.y)
    }

    pub fn target_cell(&self) -> TileCoord {
        TileCoord::new(self.target_x, self.target_y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedEntity {
    pub id: String,
    pub x: u32,
    pub y: u32,
}

impl PlacedEntity {
    pub fn cell(&self) -> TileCoord {
        TileCoord::new(self.x, self.y)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridMapError {
    #[error("map '{map_id}' must have non-zero width and height (got {width}x{height})")]
    ZeroSized {
        map_id: String,
        width: u32,
        height: u32,
    },
    #[error("map '{map_id}' declares {expected} tiles ({width}x{height}) but provides {actual}")]
    ShapeMismatch {
        map_id: String,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Static per-level data. Tiles are row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridMap {
    id: String,
    width: u32,
    height: u32,
    tiles: Vec<TileType>,
    transitions: Vec<Transition>,
    entities: Vec<PlacedEntity>,
}

impl GridMap {
    pub fn new(
        id: impl Into<String>,
        width: u32,
        height: u32,
        tiles: Vec<TileType>,
    ) -> Result<Self, GridMapError> {
        let id = id.into();
        if width == 0 || height == 0 {
            return Err(GridMapError::ZeroSized {
                map_id: id,
                width,
                height,
            });
        }
        let expected = width as usize * height as usize;
        if tiles.len() != expected {
            return Err(GridMapError::ShapeMismatch {
                map_id: id,
                width,
                height,
                expected,
                actual: tiles.len(),
            });
        }
        Ok(Self {
            id,
            width,
            height,
            tiles,
            transitions: Vec::new(),
            entities: Vec::new(),
        })
    }

    /// All-zero (open ground) map, mostly for fixtures.
    pub fn open(id: impl Into<String>, width: u32, height: u32) -> Result<Self, GridMapError> {
        let count = width as usize * height as usize;
        Self::new(id, width, height, vec![0; count])
    }

    pub fn with_transitions(mut self, transitions: Vec<Transition>) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn with_entities(mut self, entities: Vec<PlacedEntity>) -> Self {
        self.entities = entities;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tiles(&self) -> &[TileType] {
        &self.tiles
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn entities(&self) -> &[PlacedEntity] {
        &self.entities
    }

    pub fn contains(&self, cell: TileCoord) -> bool {
        cell.x < self.width && cell.y < self.height
    }

    pub(crate) fn index_of(&self, cell: TileCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        Some(cell.y as usize * self.width as usize + cell.x as usize)
    }

    pub(crate) fn cell_of(&self, index: usize) -> TileCoord {
        TileCoord {
            x: (index % self.width as usize) as u32,
            y: (index / self.width as usize) as u32,
        }
    }

    pub fn tile_at(&self, cell: TileCoord) -> Option<TileType> {
        self.index_of(cell)
            .and_then(|index| self.tiles.get(index))
            .copied()
    }

    pub fn is_walkable(&self, cell: TileCoord, registry: &TileRegistry) -> bool {
        self.tile_at(cell)
            .is_some_and(|tile| registry.is_walkable(tile))
    }

    pub fn transition_at(&self, cell: TileCoord) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|transition| transition.cell() == cell)
    }

    pub fn entity_at(&self, cell: TileCoord) -> Option<&PlacedEntity> {
        self.entities.iter().find(|entity| entity.cell() == cell)
    }

    pub fn entity(&self, entity_id: &str) -> Option<&PlacedEntity> {
        self.entities.iter().find(|entity| entity.id == entity_id)
    }

    /// Returns whether anything was removed.
    pub(crate) fn remove_entity(&mut self, entity_id: &str) -> bool {
        let before = self.entities.len();
        self.entities.retain(|entity| entity.id != entity_id);
        self.entities.len() != before
    }

    /// Walkable cells around `center`, in dx-major then dy order.
    pub fn adjacent_walkable_cells(
        &self,
        center: TileCoord,
        registry: &TileRegistry,
    ) -> Vec<TileCoord> {
        let mut cells = Vec::with_capacity(8);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let Some(cell) = center.offset(dx, dy) else {
                    continue;
                };
                if self.is_walkable(cell, registry) {
                    cells.push(cell);
                }
            }
        }
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chebyshev_adjacency_excludes_self() {
        let origin = TileCoord::new(3, 3);
        assert!(!origin.is_adjacent(origin));
        assert!(origin.is_adjacent(TileCoord::new(4, 4)));
        assert!(origin.is_adjacent(TileCoord::new(2, 3)));
        assert!(!origin.is_adjacent(TileCoord::new(5, 3)));
        assert_eq!(origin.chebyshev_distance(TileCoord::new(6, 1)), 3);
        assert_eq!(origin.manhattan_distance(TileCoord::new(6, 1)), 5);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let error = GridMap::new("town", 3, 2, vec![0; 5]).expect_err("shape mismatch");
        assert!(matches!(
            error,
            GridMapError::ShapeMismatch {
                expected: 6,
                actual: 5,
                ..
            }
        ));
        assert!(matches!(
            GridMap::new("void", 0, 4, Vec::new()),
            Err(GridMapError::ZeroSized { .. })
        ));
    }

    #[test]
    fn walkability_comes_from_registry() {
        let map = GridMap::new("town", 2, 2, vec![0, 1, 7, 4]).expect("map");
        let registry = TileRegistry::default();
        assert!(map.is_walkable(TileCoord::new(0, 0), &registry));
        assert!(!map.is_walkable(TileCoord::new(1, 0), &registry));
        assert!(!map.is_walkable(TileCoord::new(0, 1), &registry));
        assert!(map.is_walkable(TileCoord::new(1, 1), &registry));
        assert!(!map.is_walkable(TileCoord::new(2, 0), &registry));

        let permissive = TileRegistry::new([]);
        assert!(map.is_walkable(TileCoord::new(1, 0), &permissive));
    }

    #[test]
    fn adjacent_walkable_cells_skip_blocked_and_out_of_bounds() {
        let mut tiles = vec![0; 9];
        tiles[1] = 1;
        let map = GridMap::new("room", 3, 3, tiles).expect("map");
        let cells = map.adjacent_walkable_cells(TileCoord::new(0, 0), &TileRegistry::default());
        assert_eq!(cells, vec![TileCoord::new(0, 1), TileCoord::new(1, 1)]);
    }

    #[test]
    fn entity_removal_reports_change() {
        let mut map = GridMap::open("forest", 4, 4).expect("map").with_entities(vec![
            PlacedEntity {
                id: "chicken".to_string(),
                x: 2,
                y: 2,
            },
        ]);
        assert!(map.entity_at(TileCoord::new(2, 2)).is_some());
        assert!(map.remove_entity("chicken"));
        assert!(!map.remove_entity("chicken"));
        assert!(map.entity_at(TileCoord::new(2, 2)).is_none());
    }
}
