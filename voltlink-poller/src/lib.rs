//! Modbus polling client for voltlink.
//!
//! The poller reads the device register block over Modbus TCP once per
//! period, publishes a decoded telemetry sample to Zenoh, and feeds the
//! temperature through a debounced high-temperature alarm.
//!
//! # Key Expressions
//!
//! ```text
//! voltlink/telemetry   - one sample per poll cycle (good or degraded)
//! voltlink/alarms      - alarm transitions only
//! ```
//!
//! Both are configuration values, not protocol constants.
//!
//! Failure handling is cyclical, never fatal: a failed transaction degrades
//! that cycle's sample to `quality = bad` and stretches the next wait by an
//! exponential backoff, which collapses back to the base cadence on the
//! first success.

pub mod alarm;
pub mod backoff;
pub mod bus;
pub mod config;
pub mod poller;
pub mod transport;
