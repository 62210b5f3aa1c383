//! Exponential backoff state for the poll loop.

use std::time::Duration;

const FIRST_DELAY: Duration = Duration::from_secs(1);

/// Extra delay added after failed cycles: 1s, doubling up to a cap, reset
/// to zero by any success.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    delay: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(max: Duration) -> Self {
        Self {
            delay: Duration::ZERO,
            max,
        }
    }

    /// The delay to add to the next wait.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn succeed(&mut self) {
        self.delay = Duration::ZERO;
    }

    pub fn fail(&mut self) {
        self.delay = if self.delay.is_zero() {
            FIRST_DELAY.min(self.max)
        } else {
            (self.delay * 2).min(self.max)
        };
    }
}
