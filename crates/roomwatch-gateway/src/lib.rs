//! Roomwatch gateway.
//!
//! Wires the components into one process:
//! - Serial transport to the sensor board, with optional bounded reconnect
//! - Broadcaster feeding the aggregation store and WebSocket sessions
//! - HTTP/WebSocket dashboard server
//! - Ctrl-C shutdown

pub mod app;
pub mod config;
pub mod error;
pub mod reconnect;

pub use app::Application;
pub use config::{AppConfig, CONFIG_ENV, DEFAULT_CONFIG_PATH};
pub use error::{AppError, AppResult};
pub use reconnect::{connect_with_retry, ReconnectConfig};
