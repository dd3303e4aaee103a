use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    pub ticks_to_run: u32,
    pub dropped_backlog: Duration,
}

/// Turns wall-clock deltas into a whole number of fixed ticks.
#[derive(Debug, Clone)]
pub struct FixedStepClock {
    fixed_dt: Duration,
    max_ticks_per_advance: u32,
    accumulator: Duration,
}

impl FixedStepClock {
    pub fn new(target_tps: u32, max_ticks_per_advance: u32) -> Self {
        let target_tps = target_tps.max(1);
        Self {
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps as f64),
            max_ticks_per_advance: max_ticks_per_advance.max(1),
            accumulator: Duration::ZERO,
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn fixed_dt_seconds(&self) -> f32 {
        self.fixed_dt.as_secs_f32()
    }

    /// Backlog beyond the per-advance tick cap is dropped, not carried.
    pub fn advance(&mut self, elapsed: Duration) -> StepPlan {
        let mut accumulator = self.accumulator.saturating_add(elapsed);
        let mut ticks_to_run = 0u32;
        while accumulator >= self.fixed_dt && ticks_to_run < self.max_ticks_per_advance {
            accumulator = accumulator.saturating_sub(self.fixed_dt);
            ticks_to_run = ticks_to_run.saturating_add(1);
        }

        let dropped_backlog = if accumulator >= self.fixed_dt {
            let dropped = accumulator;
            accumulator = Duration::ZERO;
            warn!(
                dropped_backlog_ms = dropped.as_millis() as u64,
                max_ticks_per_advance = self.max_ticks_per_advance,
                "sim_clamp_triggered"
            );
            dropped
        } else {
            Duration::ZERO
        };
        self.accumulator = accumulator;

        StepPlan {
            ticks_to_run,
            dropped_backlog,
        }
    }
}
