//! In-memory serial device.
//!
//! `LoopbackOpener` stands in for real hardware: bytes pushed through
//! `LoopbackDevice` arrive at the transport's reader, and commands written by
//! the transport are captured for inspection. Used by the transport and
//! dashboard test suites.

use crate::error::{SerialError, SerialResult};
use crate::port::{PortOpener, SerialIo};
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct DeviceShared {
    inbound: Mutex<Option<Sender<Vec<u8>>>>,
    written: Mutex<Vec<u8>>,
    fail_writes: AtomicBool,
    open_count: AtomicUsize,
}

/// Test-side handle of the simulated device.
#[derive(Clone, Default)]
pub struct LoopbackDevice {
    shared: Arc<DeviceShared>,
}

impl LoopbackDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit raw bytes from the device. Returns false if no port is open.
    pub fn send_bytes(&self, bytes: &[u8]) -> bool {
        match self.shared.inbound.lock().as_ref() {
            Some(tx) => tx.send(bytes.to_vec()).is_ok(),
            None => false,
        }
    }

    /// Emit one newline-terminated line.
    pub fn send_line(&self, line: &str) -> bool {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.send_bytes(&bytes)
    }

    /// Simulate the cable being pulled: the reader sees end-of-stream.
    pub fn unplug(&self) {
        self.shared.inbound.lock().take();
    }

    /// Make subsequent writes fail with a broken pipe.
    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Everything the transport wrote, split into lines.
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.shared.written.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.shared.open_count.load(Ordering::SeqCst)
    }
}

/// `PortOpener` backed by a `LoopbackDevice`.
#[derive(Clone)]
pub struct LoopbackOpener {
    device: LoopbackDevice,
    fail_with: Option<String>,
    open_delay: Duration,
}

impl LoopbackOpener {
    pub fn new(device: LoopbackDevice) -> Self {
        Self {
            device,
            fail_with: None,
            open_delay: Duration::ZERO,
        }
    }

    /// Every open attempt fails with `reason`.
    pub fn failing(device: LoopbackDevice, reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::new(device)
        }
    }

    /// Block inside `open` for `delay` before succeeding.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }
}

impl PortOpener for LoopbackOpener {
    fn open(&self, path: &str, _baud_rate: u32, timeout: Duration) -> SerialResult<SerialIo> {
        if !self.open_delay.is_zero() {
            std::thread::sleep(self.open_delay);
        }
        if let Some(reason) = &self.fail_with {
            return Err(SerialError::connection(path, reason));
        }

        let (tx, rx) = mpsc::channel();
        let shared = &self.device.shared;
        *shared.inbound.lock() = Some(tx);
        shared.open_count.fetch_add(1, Ordering::SeqCst);

        Ok(SerialIo {
            reader: Box::new(LoopbackReader {
                rx,
                pending: Vec::new(),
                timeout,
            }),
            writer: Box::new(LoopbackWriter {
                shared: shared.clone(),
            }),
        })
    }
}

struct LoopbackReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    timeout: Duration,
}

impl Read for LoopbackReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.timeout) {
                Ok(bytes) => self.pending = bytes,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"))
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

struct LoopbackWriter {
    shared: Arc<DeviceShared>,
}

impl Write for LoopbackWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device write failed"));
        }
        self.shared.written.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
