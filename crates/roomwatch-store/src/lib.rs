//! Sensor state aggregation for the roomwatch gateway.
//!
//! `SensorStore` turns the stream of decoded readings into:
//! - the current `Snapshot` (latest reading + capture time)
//! - a bounded, chronological history
//! - running statistics (`total_readings`, uptime)
//!
//! `update()` is the single mutation entry point. Readers take cheap clones
//! of shared snapshots and never observe a half-applied update.

mod config;
mod store;

pub use config::StoreConfig;
pub use store::{SensorStore, Snapshot, StoreStats};
