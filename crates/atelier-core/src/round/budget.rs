//! Wall-clock budget of one round.

use std::time::Duration;

use tokio::time::Instant;

/// Fixed-length budget measured from round start.
///
/// Uses the tokio clock so paused-time tests can advance it.
#[derive(Debug, Clone, Copy)]
pub struct RoundBudget {
    started: Instant,
    duration: Duration,
}

impl RoundBudget {
    pub fn start(duration: Duration) -> Self {
        Self {
            started: Instant::now(),
            duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.elapsed())
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining().as_millis() as u64
    }

    /// True when strictly less than `threshold` is left.
    pub fn is_below(&self, threshold: Duration) -> bool {
        self.remaining() < threshold
    }
}
