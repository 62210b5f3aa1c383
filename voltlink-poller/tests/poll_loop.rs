//! Scheduler tests: cadence, backoff, degraded samples, and alarm
//! transitions, all under paused tokio time with scripted collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use voltlink_common::telemetry::{AlarmMessage, AlarmTransition, Quality, TelemetrySample};
use voltlink_poller::alarm::{AlarmSupervisor, AlarmThresholds};
use voltlink_poller::bus::TelemetryBus;
use voltlink_poller::poller::Poller;
use voltlink_poller::transport::{Transport, TransportError};

/// A register block with the given temperature (stored x10).
fn block(temp_c: f64) -> Vec<u16> {
    vec![
        1001,
        1,
        1200,
        2300,
        500,
        (temp_c * 10.0) as u16,
        700,
        1200,
        0,
        0,
    ]
}

/// Plays back a script of transaction outcomes, then keeps succeeding.
struct ScriptedTransport {
    script: VecDeque<Result<Vec<u16>, TransportError>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<Vec<u16>, TransportError>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl Transport for ScriptedTransport {
    async fn read_block(&mut self) -> Result<Vec<u16>, TransportError> {
        self.script.pop_front().unwrap_or_else(|| Ok(block(55.0)))
    }
}

/// Records everything published, stamped with the virtual clock.
#[derive(Clone, Default)]
struct RecordingBus {
    samples: Arc<Mutex<Vec<(TelemetrySample, Duration)>>>,
    alarms: Arc<Mutex<Vec<(AlarmMessage, Duration)>>>,
    epoch: Option<Instant>,
}

impl RecordingBus {
    fn started_at(epoch: Instant) -> Self {
        Self {
            epoch: Some(epoch),
            ..Default::default()
        }
    }

    fn offset(&self) -> Duration {
        match self.epoch {
            Some(epoch) => Instant::now().duration_since(epoch),
            None => Duration::ZERO,
        }
    }

    fn samples(&self) -> Vec<(TelemetrySample, Duration)> {
        self.samples.lock().unwrap().clone()
    }

    fn alarms(&self) -> Vec<(AlarmMessage, Duration)> {
        self.alarms.lock().unwrap().clone()
    }
}

impl TelemetryBus for RecordingBus {
    async fn publish_sample(&self, sample: &TelemetrySample) {
        self.samples.lock().unwrap().push((sample.clone(), self.offset()));
    }

    async fn publish_alarm(&self, alarm: &AlarmMessage) {
        self.alarms.lock().unwrap().push((alarm.clone(), self.offset()));
    }
}

fn alarm() -> AlarmSupervisor {
    AlarmSupervisor::new(AlarmThresholds {
        hi: 60.0,
        lo: 58.0,
        raise_after: Duration::from_secs(5),
        clear_after: Duration::from_secs(3),
    })
    .unwrap()
}

fn poller<T: Transport>(transport: T, bus: RecordingBus, max_backoff: u64) -> Poller<T, RecordingBus> {
    Poller::new(
        Duration::from_secs(1),
        Duration::from_secs(max_backoff),
        transport,
        bus,
        alarm(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_backoff_stretches_then_resets() {
    let transport = ScriptedTransport::new(vec![
        Err(TransportError::Unavailable("connection refused".to_string())),
        Err(TransportError::Timeout(Duration::from_secs(1))),
        Err(TransportError::Protocol("malformed frame".to_string())),
    ]);
    let bus = RecordingBus::started_at(Instant::now());

    let task = tokio::spawn(poller(transport, bus.clone(), 30).run());
    tokio::time::sleep(Duration::from_secs(13)).await;
    task.abort();

    let samples = bus.samples();

    // Failures at t=0/2/5 (waits of 1+1, 1+2, 1+4), recovery at t=10, then
    // base cadence again.
    let offsets: Vec<u64> = samples.iter().map(|(_, at)| at.as_secs()).collect();
    assert_eq!(&offsets[..6], &[0, 2, 5, 10, 11, 12]);

    let qualities: Vec<Quality> = samples.iter().map(|(s, _)| s.quality).collect();
    assert_eq!(
        &qualities[..6],
        &[
            Quality::Bad,
            Quality::Bad,
            Quality::Bad,
            Quality::Good,
            Quality::Good,
            Quality::Good
        ]
    );

    // Degraded samples carry the failure, not stale values.
    let (first_bad, _) = &samples[0];
    assert_eq!(first_bad.device_id, None);
    assert!(first_bad.values.is_none());
    assert!(
        first_bad
            .error
            .as_deref()
            .unwrap()
            .contains("connection refused")
    );

    let (recovered, _) = &samples[3];
    assert_eq!(recovered.device_id, Some(1001));
    assert!(recovered.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_backoff_caps_at_configured_max() {
    let failures: Vec<Result<Vec<u16>, TransportError>> = (0..6)
        .map(|_| Err(TransportError::Unavailable("down".to_string())))
        .collect();
    let bus = RecordingBus::started_at(Instant::now());

    let task = tokio::spawn(poller(ScriptedTransport::new(failures), bus.clone(), 4).run());
    tokio::time::sleep(Duration::from_secs(21)).await;
    task.abort();

    // Delays run 1, 2, 4, then stay capped at 4.
    let offsets: Vec<u64> = bus.samples().iter().map(|(_, at)| at.as_secs()).collect();
    assert_eq!(&offsets[..5], &[0, 2, 5, 10, 15]);
}

#[tokio::test(start_paused = true)]
async fn test_short_block_degrades_the_cycle() {
    let transport = ScriptedTransport::new(vec![Ok(vec![1001, 1, 1200])]);
    let bus = RecordingBus::started_at(Instant::now());

    let task = tokio::spawn(poller(transport, bus.clone(), 30).run());
    tokio::time::sleep(Duration::from_secs(3)).await;
    task.abort();

    let samples = bus.samples();

    let (bad, at) = &samples[0];
    assert_eq!(*at, Duration::ZERO);
    assert_eq!(bad.quality, Quality::Bad);
    assert!(bad.error.as_deref().unwrap().contains("insufficient"));

    // The decode failure drives the same backoff as a transport failure.
    let (good, at) = &samples[1];
    assert_eq!(at.as_secs(), 2);
    assert_eq!(good.quality, Quality::Good);
}

#[tokio::test(start_paused = true)]
async fn test_alarm_raises_and_clears_through_the_loop() {
    // 61 degrees for t=0..=5, then 57 until the clear lands.
    let mut script = Vec::new();
    for _ in 0..=5 {
        script.push(Ok(block(61.0)));
    }
    for _ in 0..8 {
        script.push(Ok(block(57.0)));
    }
    let bus = RecordingBus::started_at(Instant::now());

    let task = tokio::spawn(poller(ScriptedTransport::new(script), bus.clone(), 30).run());
    tokio::time::sleep(Duration::from_secs(12)).await;
    task.abort();

    let alarms = bus.alarms();
    assert_eq!(alarms.len(), 2);

    let (raised, at) = &alarms[0];
    assert_eq!(at.as_secs(), 5);
    assert_eq!(raised.state, AlarmTransition::Raised);
    assert_eq!(raised.device_id, 1001);
    assert_eq!(raised.threshold_hi, Some(60.0));
    assert_eq!(raised.threshold_lo, None);

    // Below lo from t=6; three unbroken seconds land the clear at t=9.
    let (cleared, at) = &alarms[1];
    assert_eq!(at.as_secs(), 9);
    assert_eq!(cleared.state, AlarmTransition::Cleared);
    assert_eq!(cleared.threshold_lo, Some(58.0));
    assert_eq!(cleared.threshold_hi, None);

    // Telemetry kept flowing the whole time, all good quality.
    assert!(bus.samples().len() >= 12);
    assert!(bus.samples().iter().all(|(s, _)| s.quality == Quality::Good));
}
