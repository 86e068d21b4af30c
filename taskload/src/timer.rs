use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// A tick counts as late once it takes this many periods.
const LATE_TICK_FACTOR: u32 = 2;

/// Paces the scheduler loop and notices when the loop falls behind.
pub(crate) struct Timer {
    interval: Interval,
    period: Duration,
    last_tick: Instant,
    late_ticks: u64,
}

impl Timer {
    pub async fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // NOTE: First tick completes instantly
        interval.tick().await;
        Self {
            interval,
            period,
            last_tick: Instant::now(),
            late_ticks: 0,
        }
    }

    /// Wait for the next tick and return how long the loop actually took since the last one.
    pub async fn tick(&mut self) -> Duration {
        self.interval.tick().await;
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);
        self.last_tick = now;

        if elapsed >= self.period * LATE_TICK_FACTOR {
            self.late_ticks += 1;
            debug!(
                "Scheduler tick took {}, expected {}",
                humantime::format_duration(elapsed),
                self
            );
        }
        elapsed
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks that took at least twice the period.
    pub fn late_ticks(&self) -> u64 {
        self.late_ticks
    }
}

impl std::fmt::Display for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", humantime::format_duration(self.period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ticks_at_the_period() {
        let mut timer = Timer::new(Duration::from_millis(20)).await;
        assert_eq!(timer.to_string(), "20ms");

        let elapsed = timer.tick().await;
        assert!(elapsed >= Duration::from_millis(15));
        assert_eq!(timer.period(), Duration::from_millis(20));
    }

    #[tokio::test]
    async fn counts_ticks_the_loop_was_late_for() {
        let mut timer = Timer::new(Duration::from_millis(20)).await;
        timer.tick().await;
        let before = timer.late_ticks();

        // Blocks the runtime, so the next tick is overdue.
        std::thread::sleep(Duration::from_millis(70));
        let elapsed = timer.tick().await;

        assert!(elapsed >= Duration::from_millis(70));
        assert_eq!(timer.late_ticks(), before + 1);
    }
}
