use tracing::{info, warn};

use super::grid::{MapSet, TileCoord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapTransition {
    pub from_map: String,
    pub from_cell: TileCoord,
    pub to_map: String,
    pub to_cell: TileCoord,
}

/// Where the player is: active map plus cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub map_id: String,
    pub cell: TileCoord,
}

pub struct MapTransitionResolver<'a> {
    maps: &'a MapSet,
}

impl<'a> MapTransitionResolver<'a> {
    pub fn new(maps: &'a MapSet) -> Self {
        Self { maps }
    }

    /// Marker under `location`, if its target map is known.
    pub fn check(&self, location: &Location) -> Option<MapTransition> {
        let map = self.maps.get(&location.map_id)?;
        let marker = map.transition_at(location.cell)?;
        if !self.maps.contains_key(&marker.target_map) {
            warn!(
                map = %location.map_id,
                x = location.cell.x,
                y = location.cell.y,
                target_map = %marker.target_map,
                "transition_target_map_missing"
            );
            return None;
        }
        Some(MapTransition {
            from_map: location.map_id.clone(),
            from_cell: location.cell,
            to_map: marker.target_map.clone(),
            to_cell: marker.target_cell(),
        })
    }

    /// Applies at most one hop; a target cell that is itself a marker is not
    /// followed until the player steps again.
    pub fn resolve(&self, location: &mut Location) -> Option<MapTransition> {
        let transition = self.check(location)?;
        location.map_id = transition.to_map.clone();
        location.cell = transition.to_cell;
        info!(
            from_map = %transition.from_map,
            to_map = %transition.to_map,
            x = transition.to_cell.x,
            y = transition.to_cell.y,
            "map_transition"
        );
        Some(transition)
    }
}
