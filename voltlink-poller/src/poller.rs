//! The poll loop: cadence, backoff, and per-cycle failure handling.

use chrono::Utc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use voltlink_common::registers::{DecodeError, decode_block};
use voltlink_common::telemetry::{AlarmMessage, TelemetrySample};

use crate::alarm::{AlarmEvent, AlarmSupervisor};
use crate::backoff::Backoff;
use crate::bus::TelemetryBus;
use crate::transport::{Transport, TransportError};

/// Everything that can fail a poll cycle. None of these are fatal.
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Drives one transaction per cycle against the transport and publishes the
/// outcome, good or degraded, to the bus.
pub struct Poller<T, B> {
    period: Duration,
    transport: T,
    bus: B,
    alarm: AlarmSupervisor,
    backoff: Backoff,
}

impl<T: Transport, B: TelemetryBus> Poller<T, B> {
    pub fn new(
        period: Duration,
        max_backoff: Duration,
        transport: T,
        bus: B,
        alarm: AlarmSupervisor,
    ) -> Self {
        Self {
            period,
            transport,
            bus,
            alarm,
            backoff: Backoff::new(max_backoff),
        }
    }

    /// Run the poll loop until the task is cancelled.
    ///
    /// Cancellation is cooperative at cycle boundaries: a transaction in
    /// flight runs to completion (or to its own timeout) first.
    pub async fn run(mut self) {
        info!(period_secs = self.period.as_secs_f64(), "Starting poll loop");

        loop {
            let started = Instant::now();

            self.cycle().await;

            let wait = self.period.saturating_sub(started.elapsed()) + self.backoff.delay();
            tokio::time::sleep(wait).await;
        }
    }

    /// One transaction plus its failure handling.
    async fn cycle(&mut self) {
        match self.poll_once().await {
            Ok(()) => {
                self.backoff.succeed();
            }
            Err(e) => {
                warn!(error = %e, "Poll cycle failed");

                let sample = TelemetrySample::bad(Utc::now(), e.to_string());
                self.bus.publish_sample(&sample).await;

                self.backoff.fail();
                debug!(
                    backoff_secs = self.backoff.delay().as_secs_f64(),
                    "Backoff extended"
                );
            }
        }
    }

    async fn poll_once(&mut self) -> Result<(), PollError> {
        let raw = self.transport.read_block().await?;
        let sample = decode_block(&raw, Utc::now())?;

        self.bus.publish_sample(&sample).await;

        if let (Some(device_id), Some(values)) = (sample.device_id, sample.values.as_ref()) {
            match self.alarm.update(values.temp_c, Instant::now()) {
                Some(AlarmEvent::Raised) => {
                    info!(temp_c = values.temp_c, "Temperature alarm raised");
                    let msg = AlarmMessage::temp_high_raised(
                        Utc::now(),
                        device_id,
                        self.alarm.thresholds().hi,
                    );
                    self.bus.publish_alarm(&msg).await;
                }
                Some(AlarmEvent::Cleared) => {
                    info!(temp_c = values.temp_c, "Temperature alarm cleared");
                    let msg = AlarmMessage::temp_high_cleared(
                        Utc::now(),
                        device_id,
                        self.alarm.thresholds().lo,
                    );
                    self.bus.publish_alarm(&msg).await;
                }
                None => {}
            }
        }

        Ok(())
    }
}
