use tracing::debug;

use super::grid::{GridMap, TileCoord, TileRegistry};

/// Start-inclusive cell sequence. Empty means unreachable.
pub type TilePath = Vec<TileCoord>;

/// Neighbor expansion order: dx outer, dy inner, both -1..=1.
const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// A* over a single map with unit step cost (diagonals included) and a
/// Manhattan heuristic. Closed cells are never reopened, so routes around
/// obstacles are not guaranteed shortest.
pub struct PathFinder<'a> {
    map: &'a GridMap,
    tiles: &'a TileRegistry,
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    index: usize,
    g_cost: u32,
    h_cost: u32,
    f_cost: u32,
}

impl<'a> PathFinder<'a> {
    pub fn new(map: &'a GridMap, tiles: &'a TileRegistry) -> Self {
        Self { map, tiles }
    }

    pub fn find_path(&self, start: TileCoord, goal: TileCoord) -> TilePath {
        let (Some(start_index), Some(goal_index)) =
            (self.map.index_of(start), self.map.index_of(goal))
        else {
            return TilePath::new();
        };
        if start == goal {
            return vec![start];
        }
        if !self.map.is_walkable(goal, self.tiles) {
            return TilePath::new();
        }

        let node_count = self.map.tiles().len();
        let mut closed = vec![false; node_count];
        let mut in_open = vec![false; node_count];
        let mut parent = vec![None::<usize>; node_count];

        let start_h = start.manhattan_distance(goal);
        let mut open = vec![OpenNode {
            index: start_index,
            g_cost: 0,
            h_cost: start_h,
            f_cost: start_h,
        }];
        in_open[start_index] = true;

        while !open.is_empty() {
            // Stable sort keeps earlier-found nodes ahead on equal f.
            open.sort_by_key(|node| node.f_cost);
            let current = open.remove(0);
            in_open[current.index] = false;

            if current.index == goal_index {
                return self.reconstruct_tile_path(&parent, start_index, goal_index);
            }
            closed[current.index] = true;

            let current_cell = self.map.cell_of(current.index);
            for (dx, dy) in NEIGHBOR_OFFSETS {
                let Some(neighbor) = current_cell.offset(dx, dy) else {
                    continue;
                };
                let Some(neighbor_index) = self.map.index_of(neighbor) else {
                    continue;
                };
                if closed[neighbor_index] || !self.map.is_walkable(neighbor, self.tiles) {
                    continue;
                }

                let tentative_g = current.g_cost.saturating_add(1);
                if in_open[neighbor_index] {
                    let Some(existing) = open.iter_mut().find(|node| node.index == neighbor_index)
                    else {
                        continue;
                    };
                    if tentative_g < existing.g_cost {
                        existing.g_cost = tentative_g;
                        existing.f_cost = tentative_g.saturating_add(existing.h_cost);
                        parent[neighbor_index] = Some(current.index);
                    }
                    continue;
                }

                let h_cost = neighbor.manhattan_distance(goal);
                open.push(OpenNode {
                    index: neighbor_index,
                    g_cost: tentative_g,
                    h_cost,
                    f_cost: tentative_g.saturating_add(h_cost),
                });
                in_open[neighbor_index] = true;
                parent[neighbor_index] = Some(current.index);
            }
        }

        debug!(
            map = self.map.id(),
            start_x = start.x,
            start_y = start.y,
            goal_x = goal.x,
            goal_y = goal.y,
            "path_unreachable"
        );
        TilePath::new()
    }

    fn reconstruct_tile_path(
        &self,
        parent: &[Option<usize>],
        start_index: usize,
        goal_index: usize,
    ) -> TilePath {
        let mut cursor = goal_index;
        let mut indices = vec![cursor];
        while cursor != start_index {
            let Some(next) = parent.get(cursor).and_then(|value| *value) else {
                return TilePath::new();
            };
            cursor = next;
            indices.push(cursor);
        }
        indices.reverse();
        indices
            .into_iter()
            .map(|index| self.map.cell_of(index))
            .collect()
    }
}
