//! roomwatch-dashboard - Real-time fan-out of sensor data to web clients.
//!
//! This crate bridges the serial transport and the aggregation store to any
//! number of browser sessions. It includes:
//!
//! - Broadcaster: consumes transport events, updates the store, pushes to sessions
//! - REST API for current state, history, stats and available ports
//! - Command endpoints relaying actuator commands to the device
//! - WebSocket sessions with late-joiner catch-up
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ TransportEvent ┌──────────────┐ update ┌──────────────┐
//! │SerialTransport├──────────────►│  Broadcaster ├───────►│ SensorStore  │
//! └──────▲───────┘   (mpsc)       └──────┬───────┘        └──────▲───────┘
//!        │                               │ broadcast::Sender       │ queries
//!        │ CommandHandle                 ▼                         │
//! ┌──────┴───────────────────────────────────────────────────────┴───────┐
//! │                  axum HTTP Server (default port 3000)                 │
//! │  GET  /api/status /api/history /api/stats /api/ports   → JSON         │
//! │  POST /api/led/on /api/led/off /api/command            → device       │
//! │  GET  /ws                                              → push events  │
//! │  GET  /metrics                                         → Prometheus   │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use roomwatch_dashboard::{run_broadcaster, run_server, DashboardConfig, GatewayState};
//!
//! let (broadcast_tx, _) = tokio::sync::broadcast::channel(config.broadcast_capacity);
//! let state = GatewayState::new(store.clone(), transport.command_handle());
//!
//! tokio::spawn(run_broadcaster(state.clone(), event_rx, broadcast_tx.clone()));
//! run_server(state, broadcast_tx, config, shutdown_token).await?;
//! ```

mod broadcast;
mod config;
mod error;
mod server;
mod state;
mod types;

pub use broadcast::{handle_event, publish, relay_command, run_broadcaster, CommandOutcome};
pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use server::{create_router, run_server, serve, AppState, ConnectionGuard, ConnectionLimiter};
pub use state::{GatewayState, PortLister};
pub use types::{
    ClientMessage, CommandRequest, CommandResponse, GatewayMessage, HistoryResponse,
    PortsResponse, StatsResponse, StatusResponse,
};
