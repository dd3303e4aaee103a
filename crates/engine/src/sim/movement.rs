use std::collections::VecDeque;

use super::grid::TileCoord;
use super::nav::TilePath;

pub const DEFAULT_STEP_INTERVAL_SECONDS: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementState {
    Idle,
    Moving,
}

/// Discrete cell-hop movement. At most one hop per `advance` call.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementController {
    path: VecDeque<TileCoord>,
    move_timer_seconds: f32,
    step_interval_seconds: f32,
}

impl Default for MovementController {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_INTERVAL_SECONDS)
    }
}

impl MovementController {
    pub fn new(step_interval_seconds: f32) -> Self {
        Self {
            path: VecDeque::new(),
            move_timer_seconds: 0.0,
            step_interval_seconds: step_interval_seconds.max(0.0),
        }
    }

    pub fn set_step_interval(&mut self, step_interval_seconds: f32) {
        self.step_interval_seconds = step_interval_seconds.max(0.0);
    }

    pub fn step_interval_seconds(&self) -> f32 {
        self.step_interval_seconds
    }

    pub fn state(&self) -> MovementState {
        if self.path.is_empty() {
            MovementState::Idle
        } else {
            MovementState::Moving
        }
    }

    pub fn is_moving(&self) -> bool {
        self.state() == MovementState::Moving
    }

    pub fn remaining(&self) -> impl ExactSizeIterator<Item = TileCoord> + '_ {
        self.path.iter().copied()
    }

    pub fn destination(&self) -> Option<TileCoord> {
        self.path.back().copied()
    }

    /// Replaces the queue with `path` minus its leading cell when that cell is
    /// `current`. The first hop happens on the next `advance`. Returns whether
    /// any movement was queued.
    pub fn assign_path_from(&mut self, current: TileCoord, path: TilePath) -> bool {
        let mut queue = VecDeque::from(path);
        if queue.front() == Some(&current) {
            queue.pop_front();
        }
        self.path = queue;
        self.move_timer_seconds = 0.0;
        !self.path.is_empty()
    }

    pub fn clear(&mut self) {
        self.path.clear();
    }

    /// Returns the cell the player hopped onto, if the timer elapsed.
    pub fn advance(&mut self, dt_seconds: f32) -> Option<TileCoord> {
        if self.path.is_empty() {
            return None;
        }
        self.move_timer_seconds -= dt_seconds;
        if self.move_timer_seconds > 0.0 {
            return None;
        }
        self.move_timer_seconds = self.step_interval_seconds;
        self.path.pop_front()
    }
}
