//! Bus message types.
//!
//! Two kinds of messages travel over the bus: a [`TelemetrySample`] once per
//! poll cycle, and an [`AlarmMessage`] only on alarm state transitions. Both
//! serialize to the fixed JSON shapes consumed downstream; timestamps are
//! RFC 3339 UTC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Alarm type identifier for the high-temperature alarm.
pub const ALARM_TEMP_HIGH: &str = "TEMP_HIGH";

/// Per-sample quality flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// The reading was successfully obtained from the device.
    Good,
    /// Placeholder sample after a failed poll cycle.
    Bad,
}

/// Decoded physical values of one register block read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryValues {
    pub power_w: u16,
    pub voltage_v: f64,
    pub current_a: f64,
    pub temp_c: f64,
    pub soc_pct: f64,
}

/// One telemetry sample, published once per poll cycle.
///
/// Immutable after construction. A good sample carries the device id and
/// decoded values; a bad sample carries neither (`device_id` serializes as
/// `null`, `values` as `{}`) plus an error description.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySample {
    pub ts: DateTime<Utc>,
    pub device_id: Option<u16>,
    #[serde(serialize_with = "values_or_empty")]
    pub values: Option<TelemetryValues>,
    pub quality: Quality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TelemetrySample {
    /// Create a good-quality sample from decoded values.
    pub fn good(ts: DateTime<Utc>, device_id: u16, values: TelemetryValues) -> Self {
        Self {
            ts,
            device_id: Some(device_id),
            values: Some(values),
            quality: Quality::Good,
            error: None,
        }
    }

    /// Create a degraded placeholder sample after a failed poll cycle.
    pub fn bad(ts: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            ts,
            device_id: None,
            values: None,
            quality: Quality::Bad,
            error: Some(error.into()),
        }
    }
}

/// A bad sample publishes `"values": {}` rather than omitting the field.
fn values_or_empty<S: Serializer>(
    values: &Option<TelemetryValues>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match values {
        Some(v) => v.serialize(serializer),
        None => serde_json::Map::new().serialize(serializer),
    }
}

/// Direction of an alarm state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmTransition {
    Raised,
    Cleared,
}

/// An alarm transition message, published only when the alarm state changes.
#[derive(Debug, Clone, Serialize)]
pub struct AlarmMessage {
    pub ts: DateTime<Utc>,
    pub device_id: u16,
    #[serde(rename = "type")]
    pub alarm_type: &'static str,
    pub state: AlarmTransition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_hi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_lo: Option<f64>,
}

impl AlarmMessage {
    /// Build the message for a raised high-temperature alarm.
    pub fn temp_high_raised(ts: DateTime<Utc>, device_id: u16, threshold_hi: f64) -> Self {
        Self {
            ts,
            device_id,
            alarm_type: ALARM_TEMP_HIGH,
            state: AlarmTransition::Raised,
            threshold_hi: Some(threshold_hi),
            threshold_lo: None,
        }
    }

    /// Build the message for a cleared high-temperature alarm.
    pub fn temp_high_cleared(ts: DateTime<Utc>, device_id: u16, threshold_lo: f64) -> Self {
        Self {
            ts,
            device_id,
            alarm_type: ALARM_TEMP_HIGH,
            state: AlarmTransition::Cleared,
            threshold_hi: None,
            threshold_lo: Some(threshold_lo),
        }
    }
}
