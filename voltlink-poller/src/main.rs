//! Modbus polling client for voltlink.
//!
//! Reads the device register block once per period, publishes telemetry to
//! Zenoh, and raises/clears a debounced high-temperature alarm.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use voltlink_common::LoggingConfig;
use voltlink_poller::alarm::AlarmSupervisor;
use voltlink_poller::bus::ZenohBus;
use voltlink_poller::config::PollerConfig;
use voltlink_poller::poller::Poller;
use voltlink_poller::transport::ModbusTransport;

/// Modbus polling client publishing telemetry to Zenoh.
#[derive(Parser, Debug)]
#[command(name = "voltlink-poller")]
#[command(about = "Polls a Modbus device and publishes telemetry to Zenoh")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "poller.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = PollerConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let log_config = LoggingConfig {
        level: args
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone()),
        format: config.logging.format,
    };
    voltlink_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting voltlink-poller");
    info!("Loaded configuration from {:?}", args.config);

    let addr = config.modbus.socket_addr()?;
    let alarm = AlarmSupervisor::new(config.alarm.thresholds())?;

    info!("Connecting to Zenoh...");
    let session = voltlink_common::connect(&config.zenoh)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Zenoh: {}", e))?;

    let transport = ModbusTransport::new(addr, config.modbus.unit_id, config.modbus.timeout());
    let bus = ZenohBus::new(
        session.clone(),
        config.keys.telemetry.clone(),
        config.keys.alarms.clone(),
    );

    let poller = Poller::new(
        config.poll.period(),
        config.poll.max_backoff(),
        transport,
        bus,
        alarm,
    );

    info!(device = %addr, period_secs = config.poll.period_secs, "Starting poller");
    let task = tokio::spawn(poller.run());

    // Publish poller status
    let status = serde_json::json!({
        "component": "poller",
        "version": env!("CARGO_PKG_VERSION"),
        "device": addr.to_string(),
        "status": "running"
    });
    if let Err(e) = session.put(&config.keys.status, status.to_string()).await {
        error!("Failed to publish poller status: {}", e);
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    // Stopping the task drops the transport, which releases the device
    // connection.
    task.abort();

    // Publish offline status
    let status = serde_json::json!({
        "component": "poller",
        "status": "offline"
    });
    let _ = session.put(&config.keys.status, status.to_string()).await;

    session
        .close()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to close Zenoh session: {}", e))?;
    info!("Poller stopped");

    Ok(())
}
