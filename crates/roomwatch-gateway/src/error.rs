//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serial error: {0}")]
    Serial(#[from] roomwatch_serial::SerialError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] roomwatch_dashboard::DashboardError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] roomwatch_telemetry::TelemetryError),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
