//! Modbus TCP transport for the poll loop.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio_modbus::client::{Context, Reader};
use tokio_modbus::prelude::*;
use tracing::debug;
use voltlink_common::registers::POLL_COUNT;

/// Transport-level failures. All are recoverable at the scheduler: they
/// degrade the cycle's sample and drive the backoff policy.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("transport timeout after {0:?}")]
    Timeout(Duration),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Read primitive the scheduler polls against.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Read the device register block. Exactly one transaction per call.
    async fn read_block(&mut self) -> Result<Vec<u16>, TransportError>;
}

/// Modbus TCP client with connect-on-demand.
///
/// The connection is established lazily on the first read and dropped on
/// any failure, so the next cycle reconnects from scratch.
pub struct ModbusTransport {
    addr: SocketAddr,
    slave: Slave,
    timeout: Duration,
    ctx: Option<Context>,
}

impl ModbusTransport {
    pub fn new(addr: SocketAddr, unit_id: u8, timeout: Duration) -> Self {
        Self {
            addr,
            slave: Slave(unit_id),
            timeout,
            ctx: None,
        }
    }

    async fn connect(
        addr: SocketAddr,
        slave: Slave,
        timeout: Duration,
    ) -> Result<Context, TransportError> {
        debug!(addr = %addr, "Connecting to Modbus device");

        tokio::time::timeout(timeout, tcp::connect_slave(addr, slave))
            .await
            .map_err(|_| TransportError::Unavailable("connection timeout".to_string()))?
            .map_err(|e| TransportError::Unavailable(e.to_string()))
    }

    async fn read(ctx: &mut Context, timeout: Duration) -> Result<Vec<u16>, TransportError> {
        tokio::time::timeout(timeout, ctx.read_holding_registers(0, POLL_COUNT))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|e| TransportError::Protocol(e.to_string()))?
            .map_err(|e| TransportError::Protocol(format!("device exception: {:?}", e)))
    }
}

impl Transport for ModbusTransport {
    async fn read_block(&mut self) -> Result<Vec<u16>, TransportError> {
        if self.ctx.is_none() {
            self.ctx = Some(Self::connect(self.addr, self.slave, self.timeout).await?);
        }

        let result = match self.ctx.as_mut() {
            Some(ctx) => Self::read(ctx, self.timeout).await,
            None => Err(TransportError::Unavailable("not connected".to_string())),
        };

        if result.is_err() {
            self.ctx = None;
        }

        result
    }
}
