//! Core domain types for the roomwatch sensor gateway.
//!
//! This crate provides the types shared between the serial transport,
//! the aggregation store and the dashboard:
//! - `Reading`: One decoded line of sensor data from the device
//! - `Command`: A short text token sent back to the device

pub mod command;
pub mod error;
pub mod reading;

pub use command::Command;
pub use error::{CoreError, Result};
pub use reading::Reading;
