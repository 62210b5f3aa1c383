//! End-to-end: the real Modbus transport against an in-process simulator
//! server on an ephemeral port.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use voltlink_common::registers::{POLL_COUNT, decode_block};
use voltlink_common::telemetry::Quality;
use voltlink_poller::transport::{ModbusTransport, Transport, TransportError};
use voltlink_simulator::registers::RegisterBank;
use voltlink_simulator::server;

async fn start_simulator() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let bank = Arc::new(RegisterBank::new());
    tokio::spawn(async move {
        let _ = server::serve(listener, bank).await;
    });
    addr
}

#[tokio::test]
async fn test_read_block_against_simulator() {
    let addr = start_simulator().await;
    let mut transport = ModbusTransport::new(addr, 1, Duration::from_secs(1));

    let raw = transport.read_block().await.unwrap();
    assert_eq!(raw.len(), POLL_COUNT as usize);

    let sample = decode_block(&raw, Utc::now()).unwrap();
    assert_eq!(sample.quality, Quality::Good);
    assert_eq!(sample.device_id, Some(1001));

    let values = sample.values.unwrap();
    assert_eq!(values.voltage_v, 230.0);
    assert_eq!(values.temp_c, 55.0);

    // The connection is reused across transactions.
    let again = transport.read_block().await.unwrap();
    assert_eq!(again, raw);
}

#[tokio::test]
async fn test_unreachable_device_is_unavailable() {
    // Bind then drop, so the port is very likely unbound.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let mut transport = ModbusTransport::new(addr, 1, Duration::from_secs(1));

    match transport.read_block().await {
        Err(TransportError::Unavailable(_)) => {}
        other => panic!("expected Unavailable, got {:?}", other),
    }
}
