//! The synthetic process model.
//!
//! One tick advances the register bank: power drifts toward the setpoint,
//! voltage jitters around nominal, current follows from the two,
//! temperature chases a two-phase duty cycle through an exponential smoother,
//! and the state of charge random-walks. Each register access takes the bank
//! lock for just that field.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use voltlink_common::registers::{
    CURRENT_SCALE, REG_CURRENT, REG_POWER_W, REG_SETPOINT_W, REG_SOC, REG_STATUS, REG_TEMP,
    REG_VOLTAGE, SOC_SCALE, STATUS_RUNNING, TEMP_SCALE, VOLTAGE_SCALE,
};

use crate::registers::RegisterBank;

const POWER_MAX_W: i32 = 5000;
/// Inside this gap the power only jitters instead of stepping.
const POWER_DEADBAND_W: i32 = 10;
/// Fraction of the (clamped) gap applied per tick.
const POWER_STEP_FRACTION: f64 = 0.3;
const POWER_GAP_CLAMP_W: i32 = 50;
const POWER_JITTER_W: i32 = 5;

const VOLTAGE_NOMINAL_RAW: i32 = 2300;
const VOLTAGE_JITTER_RAW: i32 = 15;

const CURRENT_MAX_RAW: f64 = 2000.0;

/// The temperature duty cycle: 10 s toward the high target, 10 s toward the
/// low one, repeating.
const DUTY_HALF_PERIOD: Duration = Duration::from_secs(10);
const TEMP_TARGET_HIGH_C: f64 = 65.0;
const TEMP_TARGET_LOW_C: f64 = 40.0;
const TEMP_TARGET_JITTER_C: f64 = 0.5;
/// Weight of the current target in the exponential smoother.
const TEMP_SMOOTHING: f64 = 0.2;

const SOC_WALK_PCT: f64 = 0.2;

/// Internal model errors. Recoverable: the updater logs and carries on at
/// the next tick.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("register address {0} out of range")]
    Address(u16),
}

/// The stateful process model. The ticker task is its sole owner; all
/// shared state lives in the [`RegisterBank`].
pub struct ProcessModel {
    rng: SmallRng,
    tick: Duration,
    elapsed: Duration,
}

impl ProcessModel {
    pub fn new(tick: Duration) -> Self {
        Self::with_rng(tick, SmallRng::from_os_rng())
    }

    /// Seeded variant for deterministic tests.
    pub fn with_rng(tick: Duration, rng: SmallRng) -> Self {
        Self {
            rng,
            tick,
            elapsed: Duration::ZERO,
        }
    }

    /// Advance the process by one tick.
    pub fn advance(&mut self, bank: &RegisterBank) -> Result<(), ModelError> {
        // Power drifts toward the setpoint; inside the deadband it only
        // jitters.
        let setpoint = i32::from(read(bank, REG_SETPOINT_W)?);
        let power = i32::from(read(bank, REG_POWER_W)?);
        let gap = (setpoint - power).clamp(-POWER_GAP_CLAMP_W, POWER_GAP_CLAMP_W);
        let power = if gap.abs() > POWER_DEADBAND_W {
            power + (f64::from(gap) * POWER_STEP_FRACTION) as i32
        } else {
            power + self.rng.random_range(-POWER_JITTER_W..=POWER_JITTER_W)
        };
        let power = power.clamp(0, POWER_MAX_W) as u16;
        write(bank, REG_POWER_W, power)?;

        // Mains voltage jitters around nominal, no smoothing.
        let voltage_raw =
            VOLTAGE_NOMINAL_RAW + self.rng.random_range(-VOLTAGE_JITTER_RAW..=VOLTAGE_JITTER_RAW);
        write(bank, REG_VOLTAGE, voltage_raw as u16)?;

        // Current is derived from power and voltage.
        let volts = (f64::from(voltage_raw) / VOLTAGE_SCALE).max(1.0);
        let current_raw = (f64::from(power) / volts * CURRENT_SCALE).clamp(0.0, CURRENT_MAX_RAW);
        write(bank, REG_CURRENT, current_raw as u16)?;

        // Temperature chases the duty-cycle target through the smoother, so
        // it ramps instead of snapping.
        let target = self.temp_target();
        let temp = f64::from(read(bank, REG_TEMP)?) / TEMP_SCALE;
        let temp = temp * (1.0 - TEMP_SMOOTHING) + target * TEMP_SMOOTHING;
        write(bank, REG_TEMP, (temp * TEMP_SCALE) as u16)?;

        // Bounded random walk for the state of charge.
        let soc = f64::from(read(bank, REG_SOC)?) / SOC_SCALE;
        let soc = (soc + self.rng.random_range(-SOC_WALK_PCT..SOC_WALK_PCT)).clamp(0.0, 100.0);
        write(bank, REG_SOC, (soc * SOC_SCALE) as u16)?;

        write(bank, REG_STATUS, STATUS_RUNNING)?;

        self.elapsed += self.tick;
        Ok(())
    }

    fn temp_target(&mut self) -> f64 {
        let half_periods =
            (self.elapsed.as_secs_f64() / DUTY_HALF_PERIOD.as_secs_f64()) as u64;
        let base = if half_periods % 2 == 0 {
            TEMP_TARGET_HIGH_C
        } else {
            TEMP_TARGET_LOW_C
        };
        base + self.rng.random_range(-TEMP_TARGET_JITTER_C..TEMP_TARGET_JITTER_C)
    }

    /// Run the updater loop, advancing the bank once per tick until the
    /// task is cancelled. Model errors are never fatal.
    pub async fn run(mut self, bank: Arc<RegisterBank>) {
        let mut ticker = tokio::time::interval(self.tick);

        loop {
            ticker.tick().await;

            if let Err(e) = self.advance(&bank) {
                warn!(error = %e, "Process model update failed");
            }
        }
    }
}

fn read(bank: &RegisterBank, addr: u16) -> Result<u16, ModelError> {
    bank.get(addr).ok_or(ModelError::Address(addr))
}

fn write(bank: &RegisterBank, addr: u16, value: u16) -> Result<(), ModelError> {
    if bank.set(addr, value) {
        Ok(())
    } else {
        Err(ModelError::Address(addr))
    }
}
