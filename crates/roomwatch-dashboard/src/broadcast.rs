//! Broadcaster: transport events in, session pushes out.
//!
//! The broadcaster is the single consumer of the transport's event stream.
//! It is also the only caller of `SensorStore::update`, so aggregation
//! happens in exactly the order the transport emitted readings. Every push
//! goes through one `broadcast::Sender`; each session owns a receiver, so a
//! failing session never affects delivery to the others.

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, trace, warn};

use roomwatch_core::Command;
use roomwatch_serial::{SerialError, TransportEvent};
use roomwatch_telemetry::Metrics;

use crate::state::GatewayState;
use crate::types::GatewayMessage;

/// Run the broadcaster task until the transport's event stream ends.
pub async fn run_broadcaster(
    state: GatewayState,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    tx: broadcast::Sender<String>,
) {
    while let Some(event) = events.recv().await {
        handle_event(&state, &tx, event);
    }
    debug!("Transport event stream closed, broadcaster exiting");
}

/// Apply one transport event.
pub fn handle_event(state: &GatewayState, tx: &broadcast::Sender<String>, event: TransportEvent) {
    match event {
        TransportEvent::Connected => {
            Metrics::serial_connected();
            info!("Device connected");
            publish(tx, &GatewayMessage::DeviceStatus { connected: true });
        }
        TransportEvent::Disconnected => {
            Metrics::serial_disconnected();
            info!("Device disconnected");
            publish(tx, &GatewayMessage::DeviceStatus { connected: false });
        }
        TransportEvent::Data(reading) => {
            let snapshot = state.store().update(reading);
            Metrics::reading_received();
            publish(
                tx,
                &GatewayMessage::SensorUpdate {
                    data: Some(snapshot),
                },
            );
        }
        TransportEvent::Error(reason) => {
            error!(reason = %reason, "Serial error");
        }
        TransportEvent::DecodeFailed { line, reason } => {
            Metrics::decode_error();
            debug!(line = %line, reason = %reason, "Malformed line not aggregated");
        }
        TransportEvent::WriteFailed { command, error } => {
            Metrics::command("write_failed");
            warn!(command = %command, error = %error, "Command write failed");
            publish(
                tx,
                &GatewayMessage::CommandFailed {
                    command: command.to_string(),
                    error,
                },
            );
        }
    }
}

/// Serialize and send a message to every attached session.
///
/// Returns the number of sessions it was queued for.
pub fn publish(tx: &broadcast::Sender<String>, msg: &GatewayMessage) -> usize {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            debug!(error = %e, kind = msg.kind(), "Failed to serialize message");
            return 0;
        }
    };

    Metrics::broadcast(msg.kind());
    match tx.send(json) {
        Ok(n) => {
            trace!(receivers = n, kind = msg.kind(), "Broadcast sent");
            n
        }
        Err(_) => {
            // No sessions attached - normal
            trace!(kind = msg.kind(), "No WebSocket receivers connected");
            0
        }
    }
}

/// Result of relaying a client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Queued for the device. Not a confirmation that it executed.
    Accepted,
    /// Port not open; maps to service-unavailable.
    NotConnected,
    /// Rejected for another reason.
    Failed(String),
}

impl CommandOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Client-facing error text.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Accepted => None,
            Self::NotConnected => Some("Device not connected".to_string()),
            Self::Failed(reason) => Some(reason.clone()),
        }
    }
}

/// Relay a client-issued command to the transport.
pub fn relay_command(state: &GatewayState, command: &Command) -> CommandOutcome {
    match state.commands().try_send(command) {
        Ok(()) => {
            Metrics::command("accepted");
            info!(command = %command, "Command dispatched");
            CommandOutcome::Accepted
        }
        Err(SerialError::NotConnected) => {
            Metrics::command("rejected");
            warn!(command = %command, "Command rejected, device not connected");
            CommandOutcome::NotConnected
        }
        Err(e) => {
            Metrics::command("rejected");
            warn!(command = %command, error = %e, "Command rejected");
            CommandOutcome::Failed(e.to_string())
        }
    }
}
