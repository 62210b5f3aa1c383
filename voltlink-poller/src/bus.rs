//! Telemetry publishing.
//!
//! Publishing is fire-and-forget: the poll loop never blocks on delivery
//! and a failed publish only produces a log line.

use tracing::{debug, warn};
use voltlink_common::telemetry::{AlarmMessage, TelemetrySample};
use zenoh::Session;

/// Message delivery the scheduler publishes through.
#[allow(async_fn_in_trait)]
pub trait TelemetryBus {
    async fn publish_sample(&self, sample: &TelemetrySample);
    async fn publish_alarm(&self, alarm: &AlarmMessage);
}

/// Zenoh-backed bus publishing JSON payloads to configured key expressions.
pub struct ZenohBus {
    session: Session,
    telemetry_key: String,
    alarm_key: String,
}

impl ZenohBus {
    pub fn new(session: Session, telemetry_key: String, alarm_key: String) -> Self {
        Self {
            session,
            telemetry_key,
            alarm_key,
        }
    }

    async fn put_json<T: serde::Serialize>(&self, key: &str, message: &T) {
        match serde_json::to_vec(message) {
            Ok(payload) => {
                if let Err(e) = self.session.put(key, payload).await {
                    warn!(key, "Failed to publish: {}", e);
                } else {
                    debug!(key, "Published");
                }
            }
            Err(e) => {
                warn!(key, "Failed to encode message: {}", e);
            }
        }
    }
}

impl TelemetryBus for ZenohBus {
    async fn publish_sample(&self, sample: &TelemetrySample) {
        self.put_json(&self.telemetry_key, sample).await;
    }

    async fn publish_alarm(&self, alarm: &AlarmMessage) {
        self.put_json(&self.alarm_key, alarm).await;
    }
}
