//! Dashboard API types.
//!
//! REST responses keep the `{ "success": ..., ... }` envelope the browser
//! client expects. WebSocket pushes are a tagged enum.

use std::sync::Arc;

use roomwatch_serial::PortInfo;
use roomwatch_store::{Snapshot, StoreStats};
use serde::{Deserialize, Serialize};

/// `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    /// Latest snapshot, `null` before the first reading.
    pub data: Option<Arc<Snapshot>>,
    pub connected: bool,
}

/// `GET /api/history`.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    /// Oldest first.
    pub data: Vec<Arc<Snapshot>>,
}

/// `GET /api/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub data: StoreStats,
    pub connected: bool,
}

/// `GET /api/ports`.
#[derive(Debug, Clone, Serialize)]
pub struct PortsResponse {
    pub success: bool,
    pub ports: Vec<PortInfo>,
}

/// `POST /api/command` body.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

/// Response to every command endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn sent(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Server → session push messages (tagged enum for type safety).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    /// Serial link went up or down.
    DeviceStatus { connected: bool },
    /// New aggregated reading (`null` when sent on attach before any data).
    SensorUpdate { data: Option<Arc<Snapshot>> },
    /// Reply to a command sent over this session only.
    CommandResult {
        command: String,
        accepted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A dispatched command failed at the wire level.
    CommandFailed { command: String, error: String },
}

impl GatewayMessage {
    /// Label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeviceStatus { .. } => "device_status",
            Self::SensorUpdate { .. } => "sensor_update",
            Self::CommandResult { .. } => "command_result",
            Self::CommandFailed { .. } => "command_failed",
        }
    }
}

/// Session → server messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Relay a command to the device.
    Command { command: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomwatch_core::Reading;
    use roomwatch_store::SensorStore;
    use serde_json::json;

    #[test]
    fn test_message_tagging() {
        let msg = GatewayMessage::DeviceStatus { connected: true };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"device_status","connected":true}"#);
        assert_eq!(msg.kind(), "device_status");
    }

    #[test]
    fn test_sensor_update_carries_flat_snapshot() {
        let store = SensorStore::default();
        let snapshot = store.update(Reading::from_value(json!({"occupied": 1})).unwrap());
        let msg = GatewayMessage::SensorUpdate {
            data: Some(snapshot),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "sensor_update");
        assert_eq!(value["data"]["occupied"], 1);

        let empty = GatewayMessage::SensorUpdate { data: None };
        assert!(serde_json::to_value(&empty).unwrap()["data"].is_null());
    }

    #[test]
    fn test_command_response_omits_empty_fields() {
        let json = serde_json::to_string(&CommandResponse::failed("Device not connected")).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"Device not connected"}"#);
    }

    #[test]
    fn test_client_message_parse() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"command","command":"LED_ON"}"#).unwrap();
        let ClientMessage::Command { command } = msg;
        assert_eq!(command, "LED_ON");
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"other"}"#).is_err());
    }
}
