use crate::config::{RampKind, Stage};
use std::time::Duration;

/// Where the run is in its stage list at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSnapshot {
    pub index: usize,
    /// VU count the pool should hold right now.
    pub target: usize,
    /// Target declared by the active stage. `target` never exceeds it.
    pub stage_target: usize,
}

/// Maps elapsed wall-clock time to a target VU count.
#[derive(Debug, Clone)]
pub struct Schedule {
    stages: Vec<Stage>,
    ramp: RampKind,
}

impl Schedule {
    pub fn new(stages: &[Stage], ramp: RampKind) -> Self {
        Self {
            stages: stages.to_vec(),
            ramp,
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Returns `None` once every stage has elapsed.
    pub fn target_at(&self, elapsed: Duration) -> Option<StageSnapshot> {
        let mut start = Duration::ZERO;
        let mut previous = 0usize;

        for (index, stage) in self.stages.iter().enumerate() {
            let end = start + stage.duration;
            if elapsed < end {
                let target = match self.ramp {
                    RampKind::Step => stage.target,
                    RampKind::Linear => {
                        let progress =
                            (elapsed - start).as_secs_f64() / stage.duration.as_secs_f64();
                        let value = previous as f64
                            + (stage.target as f64 - previous as f64) * progress;
                        // Ramping down lands on the new target immediately.
                        (value.floor() as usize).min(stage.target)
                    }
                };

                return Some(StageSnapshot {
                    index,
                    target,
                    stage_target: stage.target,
                });
            }

            start = end;
            previous = stage.target;
        }

        None
    }

    /// Lowest target between `elapsed` and `elapsed + window`, stage boundaries included.
    ///
    /// The scheduler only samples the schedule once per tick; using the lowest value over the
    /// coming tick keeps the pool from sitting above a ramp-down that lands between two ticks.
    pub fn target_within(&self, elapsed: Duration, window: Duration) -> Option<StageSnapshot> {
        let mut snapshot = self.target_at(elapsed)?;
        let horizon = elapsed + window;

        let mut start = Duration::ZERO;
        let boundaries = self.stages.iter().map(|stage| {
            start += stage.duration;
            start
        });
        let upcoming = boundaries
            .filter(|b| *b > elapsed && *b <= horizon)
            .chain(std::iter::once(horizon));

        for at in upcoming {
            if let Some(next) = self.target_at(at) {
                snapshot.target = snapshot.target.min(next.target);
            }
        }

        Some(snapshot)
    }
}
