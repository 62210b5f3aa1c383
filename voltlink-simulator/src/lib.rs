//! Modbus TCP device simulator for voltlink.
//!
//! Serves the holding-register block of a synthetic inverter/BMS so the
//! poller can be exercised without real hardware. One background ticker
//! advances the process model at a fixed interval; any number of concurrent
//! connections read (and write the power setpoint) against the same
//! register bank.

pub mod config;
pub mod model;
pub mod registers;
pub mod server;
