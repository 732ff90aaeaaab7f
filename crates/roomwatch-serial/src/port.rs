//! Port opening and enumeration.
//!
//! `PortOpener` is the seam between the transport state machine and the
//! operating system. `SystemPortOpener` opens real devices through the
//! `serialport` crate; tests use `LoopbackOpener` instead.

use crate::error::{SerialError, SerialResult};
use serde::Serialize;
use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

/// An opened device, split into independent read and write halves.
///
/// The reader is expected to return `ErrorKind::TimedOut` (or `WouldBlock`)
/// when no data arrives within the configured timeout, and `Ok(0)` once the
/// device is gone.
pub struct SerialIo {
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
}

impl std::fmt::Debug for SerialIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialIo").finish_non_exhaustive()
    }
}

/// Opens a device path. Called from a blocking task.
#[cfg_attr(test, mockall::automock)]
pub trait PortOpener: Send + Sync + 'static {
    fn open(&self, path: &str, baud_rate: u32, timeout: Duration) -> SerialResult<SerialIo>;
}

/// Opens real serial devices (8N1, no flow control).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(&self, path: &str, baud_rate: u32, timeout: Duration) -> SerialResult<SerialIo> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| SerialError::connection(path, e))?;

        let writer = port
            .try_clone()
            .map_err(|e| SerialError::connection(path, format!("clone for writing: {e}")))?;

        debug!(path, baud_rate, "Serial device opened");
        Ok(SerialIo {
            reader: Box::new(port),
            writer: Box::new(writer),
        })
    }
}

/// An available device path on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
}

/// Enumerate available serial devices, sorted by path.
///
/// Enumeration failures are logged and yield an empty list.
pub fn list_ports() -> Vec<PortInfo> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            warn!(error = %e, "Failed to enumerate serial ports");
            return Vec::new();
        }
    };

    let mut ports: Vec<PortInfo> = ports
        .into_iter()
        .map(|p| PortInfo {
            manufacturer: match p.port_type {
                SerialPortType::UsbPort(usb) => usb.manufacturer,
                _ => None,
            },
            path: p.port_name,
        })
        .collect();
    ports.sort_by(|a, b| a.path.cmp(&b.path));

    if ports.is_empty() {
        info!("No serial ports found");
    } else {
        for (i, port) in ports.iter().enumerate() {
            info!(
                index = i + 1,
                path = %port.path,
                manufacturer = port.manufacturer.as_deref().unwrap_or("-"),
                "Available serial port"
            );
        }
    }

    ports
}
