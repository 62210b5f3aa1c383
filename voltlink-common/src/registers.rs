//! Device register map and block codec.
//!
//! The device exposes a fixed block of 16-bit holding registers. Physical
//! quantities are stored as unsigned raw values with a fixed decimal scale,
//! so every decoded value lands in the 0..=6553.5 range.
//!
//! | offset | field      | encoding          |
//! |--------|------------|-------------------|
//! | 0      | device_id  | raw integer       |
//! | 1      | status     | bitfield          |
//! | 2      | power_w    | raw integer (W)   |
//! | 3      | voltage_v  | raw / 10          |
//! | 4      | current_a  | raw / 100         |
//! | 5      | temp_c     | raw / 10          |
//! | 6      | soc_pct    | raw / 10          |
//! | 7      | setpoint_w | raw integer (W)   |
//!
//! Offsets 8..=9 are reserved. The poller reads offsets 0..=9 as one block;
//! the simulator additionally accepts writes to `setpoint_w`.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::telemetry::{TelemetrySample, TelemetryValues};

/// Total length of the holding register bank served by the simulator.
pub const HR_LEN: u16 = 16;

/// Number of registers the poller reads per transaction.
pub const POLL_COUNT: u16 = 10;

pub const REG_DEVICE_ID: u16 = 0;
pub const REG_STATUS: u16 = 1;
pub const REG_POWER_W: u16 = 2;
pub const REG_VOLTAGE: u16 = 3;
pub const REG_CURRENT: u16 = 4;
pub const REG_TEMP: u16 = 5;
pub const REG_SOC: u16 = 6;
pub const REG_SETPOINT_W: u16 = 7;

/// Voltage is stored in tenths of a volt.
pub const VOLTAGE_SCALE: f64 = 10.0;
/// Current is stored in hundredths of an ampere.
pub const CURRENT_SCALE: f64 = 100.0;
/// Temperature is stored in tenths of a degree Celsius.
pub const TEMP_SCALE: f64 = 10.0;
/// State of charge is stored in tenths of a percentage point.
pub const SOC_SCALE: f64 = 10.0;

/// Status bit 0: the process model is running.
pub const STATUS_RUNNING: u16 = 0b0000_0001;

/// Errors decoding a raw register block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("insufficient register block: got {got} registers, need {POLL_COUNT}")]
    InsufficientLength { got: usize },
}

/// Decode a raw holding-register block into a good-quality telemetry sample.
///
/// Fails only when fewer than [`POLL_COUNT`] registers are supplied. No
/// range validation is applied beyond that: the register contract is
/// unsigned-with-fixed-scale, so any 16-bit content decodes to some value
/// and malformed responses are the transport layer's problem.
pub fn decode_block(raw: &[u16], ts: DateTime<Utc>) -> Result<TelemetrySample, DecodeError> {
    if raw.len() < POLL_COUNT as usize {
        return Err(DecodeError::InsufficientLength { got: raw.len() });
    }

    let values = TelemetryValues {
        power_w: raw[REG_POWER_W as usize],
        voltage_v: f64::from(raw[REG_VOLTAGE as usize]) / VOLTAGE_SCALE,
        current_a: f64::from(raw[REG_CURRENT as usize]) / CURRENT_SCALE,
        temp_c: f64::from(raw[REG_TEMP as usize]) / TEMP_SCALE,
        soc_pct: f64::from(raw[REG_SOC as usize]) / SOC_SCALE,
    };

    Ok(TelemetrySample::good(ts, raw[REG_DEVICE_ID as usize], values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Quality;

    #[test]
    fn test_decode_block() {
        let raw = [1001u16, 1, 1200, 2300, 500, 550, 700, 1200, 0, 0];
        let ts = Utc::now();

        let sample = decode_block(&raw, ts).unwrap();

        assert_eq!(sample.ts, ts);
        assert_eq!(sample.device_id, Some(1001));
        assert_eq!(sample.quality, Quality::Good);
        assert!(sample.error.is_none());

        let values = sample.values.unwrap();
        assert_eq!(values.power_w, 1200);
        assert_eq!(values.voltage_v, 230.0);
        assert_eq!(values.current_a, 5.0);
        assert_eq!(values.temp_c, 55.0);
        assert_eq!(values.soc_pct, 70.0);
    }

    #[test]
    fn test_decode_insufficient_length() {
        let raw = [1001u16, 1, 1200, 2300, 500, 550, 700, 1200, 0];

        let err = decode_block(&raw, Utc::now()).unwrap_err();

        assert_eq!(err, DecodeError::InsufficientLength { got: 9 });
    }

    #[test]
    fn test_decode_empty_block() {
        let err = decode_block(&[], Utc::now()).unwrap_err();

        assert_eq!(err, DecodeError::InsufficientLength { got: 0 });
    }

    #[test]
    fn test_decode_passes_garbage_through() {
        // Out-of-range content is not the codec's concern.
        let raw = [u16::MAX; 10];

        let sample = decode_block(&raw, Utc::now()).unwrap();
        let values = sample.values.unwrap();

        assert_eq!(sample.device_id, Some(u16::MAX));
        assert_eq!(values.voltage_v, 6553.5);
        assert_eq!(values.current_a, 655.35);
    }

    #[test]
    fn test_decode_ignores_trailing_registers() {
        let mut raw = vec![0u16; HR_LEN as usize];
        raw[REG_DEVICE_ID as usize] = 7;
        raw[REG_TEMP as usize] = 615;

        let sample = decode_block(&raw, Utc::now()).unwrap();

        assert_eq!(sample.device_id, Some(7));
        assert_eq!(sample.values.unwrap().temp_c, 61.5);
    }
}
