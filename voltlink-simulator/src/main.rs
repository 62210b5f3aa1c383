//! Modbus TCP device simulator for voltlink.
//!
//! Serves a synthetic inverter/BMS register block and advances the process
//! model once per tick.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use voltlink_common::LoggingConfig;
use voltlink_simulator::config::SimulatorConfig;
use voltlink_simulator::model::ProcessModel;
use voltlink_simulator::registers::RegisterBank;
use voltlink_simulator::server;

/// Modbus TCP inverter/BMS simulator.
#[derive(Parser, Debug)]
#[command(name = "voltlink-simulator")]
#[command(about = "Serves a synthetic device register block over Modbus TCP")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "simulator.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = SimulatorConfig::load_from_file(&args.config)
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

    info!("Starting voltlink-simulator");
    info!("Loaded configuration from {:?}", args.config);

    let bank = Arc::new(RegisterBank::new());
    let model = ProcessModel::new(config.tick());

    let updater = tokio::spawn(model.run(bank.clone()));

    let addr = config.listen.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, tick_ms = config.tick_ms, "Modbus TCP simulator listening");

    tokio::select! {
        result = server::serve(listener, bank) => {
            result.context("Modbus server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    updater.abort();
    info!("Simulator stopped");

    Ok(())
}
