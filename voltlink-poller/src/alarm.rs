//! Debounced high-temperature alarm.
//!
//! A two-state hysteresis machine: the alarm raises after the temperature
//! has stayed strictly above `hi` for an unbroken `raise_after`, and clears
//! after it has stayed strictly below `lo` for an unbroken `clear_after`.
//! A single sample at or inside the band discards the running timer.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Hysteresis band and debounce windows.
#[derive(Debug, Clone, Copy)]
pub struct AlarmThresholds {
    /// Raise threshold in degrees Celsius (strict comparison).
    pub hi: f64,
    /// Clear threshold in degrees Celsius (strict comparison).
    pub lo: f64,
    /// Unbroken time above `hi` before the alarm raises.
    pub raise_after: Duration,
    /// Unbroken time below `lo` before the alarm clears.
    pub clear_after: Duration,
}

/// Rejected at construction: the band is meaningless unless `lo < hi`.
#[derive(Debug, Error, PartialEq)]
#[error("invalid hysteresis band: lo ({lo}) must be below hi ({hi})")]
pub struct InvalidThresholds {
    pub hi: f64,
    pub lo: f64,
}

/// Emitted on an alarm state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmEvent {
    Raised,
    Cleared,
}

/// The alarm state machine. One instance lives for the process lifetime of
/// the poller and is mutated only through [`AlarmSupervisor::update`].
#[derive(Debug)]
pub struct AlarmSupervisor {
    thresholds: AlarmThresholds,
    active: bool,
    high_since: Option<Instant>,
    low_since: Option<Instant>,
}

impl AlarmSupervisor {
    pub fn new(thresholds: AlarmThresholds) -> Result<Self, InvalidThresholds> {
        if thresholds.lo >= thresholds.hi {
            return Err(InvalidThresholds {
                hi: thresholds.hi,
                lo: thresholds.lo,
            });
        }

        Ok(Self {
            thresholds,
            active: false,
            high_since: None,
            low_since: None,
        })
    }

    pub fn thresholds(&self) -> AlarmThresholds {
        self.thresholds
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Feed one temperature sample into the machine.
    ///
    /// At most one event is returned per call. Timestamps must be
    /// monotonically non-decreasing; behavior under clock regression is
    /// undefined.
    pub fn update(&mut self, temp_c: f64, now: Instant) -> Option<AlarmEvent> {
        if self.active {
            if temp_c < self.thresholds.lo {
                let since = *self.low_since.get_or_insert(now);
                if now.duration_since(since) >= self.thresholds.clear_after {
                    self.active = false;
                    self.low_since = None;
                    return Some(AlarmEvent::Cleared);
                }
            } else {
                self.low_since = None;
            }
        } else if temp_c > self.thresholds.hi {
            let since = *self.high_since.get_or_insert(now);
            if now.duration_since(since) >= self.thresholds.raise_after {
                self.active = true;
                self.high_since = None;
                return Some(AlarmEvent::Raised);
            }
        } else {
            self.high_since = None;
        }

        None
    }
}
