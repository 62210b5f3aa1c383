//! Modbus TCP server surface.
//!
//! One [`DeviceService`] per inbound connection, all answering against the
//! same register bank. Reads cover any in-range span of the holding block;
//! the only writable address is the power setpoint.

use std::future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_modbus::prelude::*;
use tokio_modbus::server::tcp::{Server, accept_tcp_connection};
use tracing::{debug, warn};
use voltlink_common::registers::{HR_LEN, REG_SETPOINT_W};

use crate::registers::RegisterBank;

/// Modbus request handler over the shared register bank.
#[derive(Debug, Clone)]
pub struct DeviceService {
    bank: Arc<RegisterBank>,
}

impl DeviceService {
    pub fn new(bank: Arc<RegisterBank>) -> Self {
        Self { bank }
    }

    fn read_holding(&self, addr: u16, cnt: u16) -> Result<Vec<u16>, ExceptionCode> {
        let end = addr
            .checked_add(cnt)
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        if cnt == 0 || end > HR_LEN {
            return Err(ExceptionCode::IllegalDataAddress);
        }

        // One lock acquisition per register: a concurrent tick may land
        // between fields of the same response. Accepted relaxation.
        (addr..end)
            .map(|a| self.bank.get(a).ok_or(ExceptionCode::IllegalDataAddress))
            .collect()
    }

    fn write_single(&self, addr: u16, value: u16) -> Result<(), ExceptionCode> {
        // The setpoint is the only control input.
        if addr != REG_SETPOINT_W {
            return Err(ExceptionCode::IllegalDataAddress);
        }

        if self.bank.set(addr, value) {
            debug!(addr, value, "Setpoint written");
            Ok(())
        } else {
            Err(ExceptionCode::IllegalDataAddress)
        }
    }
}

impl tokio_modbus::server::Service for DeviceService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let result = match req {
            Request::ReadHoldingRegisters(addr, cnt) => self
                .read_holding(addr, cnt)
                .map(Response::ReadHoldingRegisters),
            Request::WriteSingleRegister(addr, value) => self
                .write_single(addr, value)
                .map(|()| Response::WriteSingleRegister(addr, value)),
            _ => {
                debug!(request = ?req, "Unsupported Modbus function");
                Err(ExceptionCode::IllegalFunction)
            }
        };

        future::ready(result)
    }
}

/// Serve Modbus TCP on the listener until the task is cancelled.
pub async fn serve(listener: TcpListener, bank: Arc<RegisterBank>) -> std::io::Result<()> {
    let server = Server::new(listener);

    let on_connected = |stream, socket_addr| {
        let bank = bank.clone();
        async move {
            debug!(peer = %socket_addr, "Client connected");
            accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                Ok(Some(DeviceService::new(bank.clone())))
            })
        }
    };
    let on_process_error = |err| {
        warn!(error = %err, "Modbus connection error");
    };

    server.serve(&on_connected, on_process_error).await
}
