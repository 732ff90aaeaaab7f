//! Shared harness for dashboard integration tests.
//!
//! Wires a loopback-backed transport, a store and the broadcaster together
//! the same way the gateway binary does, minus the real serial device.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use roomwatch_dashboard::{run_broadcaster, AppState, DashboardConfig, GatewayState};
use roomwatch_serial::{LoopbackDevice, LoopbackOpener, PortInfo, SerialConfig, SerialTransport};
use roomwatch_store::{SensorStore, StoreConfig};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

pub const SAMPLE_LINE: &str = r#"{"occupied":0,"motion":1,"distance":150,"lights":0}"#;

pub struct Harness {
    pub device: LoopbackDevice,
    pub transport: SerialTransport,
    pub store: Arc<SensorStore>,
    pub gateway: GatewayState,
    pub broadcast_tx: broadcast::Sender<String>,
    pub shutdown: CancellationToken,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_history(100)
    }

    pub fn with_history(history_capacity: usize) -> Self {
        let device = LoopbackDevice::new();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let transport = SerialTransport::with_opener(
            SerialConfig {
                port: "loopback0".to_string(),
                read_timeout_ms: 10,
                ..Default::default()
            },
            Arc::new(LoopbackOpener::new(device.clone())),
            event_tx,
        );

        let store = Arc::new(SensorStore::new(StoreConfig { history_capacity }));
        let gateway = GatewayState::with_port_lister(
            store.clone(),
            transport.command_handle(),
            Arc::new(fixed_ports),
        );

        let (broadcast_tx, _) = broadcast::channel(64);
        tokio::spawn(run_broadcaster(
            gateway.clone(),
            event_rx,
            broadcast_tx.clone(),
        ));

        Self {
            device,
            transport,
            store,
            gateway,
            broadcast_tx,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn app_state(&self, config: DashboardConfig) -> AppState {
        AppState::new(
            self.gateway.clone(),
            self.broadcast_tx.clone(),
            config,
            self.shutdown.clone(),
        )
    }

    /// Emit one reading and wait until the store has aggregated it.
    pub async fn feed(&self, line: &str) {
        let before = self.store.get_stats().total_readings;
        assert!(self.device.send_line(line), "device not open");
        wait_until(|| self.store.get_stats().total_readings > before).await;
    }

    /// Wait until the device has received `command`.
    pub async fn wait_for_write(&self, command: &str) {
        wait_until(|| self.device.written_lines().iter().any(|l| l == command)).await;
    }
}

fn fixed_ports() -> Vec<PortInfo> {
    vec![
        PortInfo {
            path: "/dev/ttyACM0".to_string(),
            manufacturer: Some("Arduino (www.arduino.cc)".to_string()),
        },
        PortInfo {
            path: "/dev/ttyS0".to_string(),
            manufacturer: None,
        },
    ]
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within timeout"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
