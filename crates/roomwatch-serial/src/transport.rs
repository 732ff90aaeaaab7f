//! Serial transport state machine.
//!
//! Handles the connection lifecycle (`Disconnected -> Connected ->
//! Disconnected`), runs the reader and writer threads for an open port, and
//! publishes a single ordered stream of `TransportEvent`s.
//!
//! # Threads
//!
//! Serial I/O is blocking, so each open port gets two OS threads:
//! - reader: splits bytes into lines, decodes them, emits `Data`
//! - writer: drains the command queue, one write at a time
//!
//! Both threads belong to one connection session identified by a
//! `CancellationToken`. Every event is emitted while holding the state lock
//! and only if the session is still live, so nothing from a session can be
//! observed after `close()` returns.

use crate::command_handle::CommandHandle;
use crate::config::SerialConfig;
use crate::error::{SerialError, SerialResult};
use crate::line::{decode_line, Frame, LineSplitter};
use crate::port::{PortOpener, SerialIo, SystemPortOpener};
use parking_lot::Mutex;
use roomwatch_core::{Command, Reading};
use serde::Serialize;
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Events published by the transport, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Port opened.
    Connected,
    /// Port closed, by `close()` or because the device went away.
    Disconnected,
    /// One decoded line.
    Data(Reading),
    /// Connection-level failure (open failed, read error, end of stream).
    Error(String),
    /// A line was dropped because it could not be decoded.
    DecodeFailed { line: String, reason: String },
    /// A command accepted by `send_command` could not be written.
    WriteFailed { command: Command, error: String },
}

struct Session {
    token: CancellationToken,
    command_tx: Option<mpsc::UnboundedSender<Command>>,
}

struct Inner {
    state: ConnectionState,
    session: Option<Session>,
}

pub(crate) struct Shared {
    config: SerialConfig,
    inner: Mutex<Inner>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl Shared {
    pub(crate) fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub(crate) fn try_send(&self, command: &Command) -> SerialResult<()> {
        let inner = self.inner.lock();
        if inner.state != ConnectionState::Connected {
            warn!(command = %command, "Cannot send - port not open");
            return Err(SerialError::NotConnected);
        }
        let tx = inner
            .session
            .as_ref()
            .and_then(|s| s.command_tx.as_ref())
            .ok_or(SerialError::NotConnected)?;
        tx.send(command.clone())
            .map_err(|_| SerialError::Write("writer stopped".to_string()))?;
        debug!(command = %command, "Command queued");
        Ok(())
    }

    /// Emit an event for `token`'s session. Dropped if the session is over.
    fn emit_if_live(&self, token: &CancellationToken, event: TransportEvent) -> bool {
        let _inner = self.inner.lock();
        if token.is_cancelled() {
            return false;
        }
        self.emit(event);
        true
    }

    fn emit(&self, event: TransportEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("Transport event receiver dropped");
        }
    }

    /// The device went away underneath an open session.
    fn device_lost(&self, token: &CancellationToken, reason: String) {
        let mut inner = self.inner.lock();
        if token.is_cancelled() {
            return;
        }
        token.cancel();
        inner.session = None;
        inner.state = ConnectionState::Disconnected;
        error!(reason = %reason, "Serial device lost");
        self.emit(TransportEvent::Error(reason));
        self.emit(TransportEvent::Disconnected);
    }

    fn handle_line(&self, token: &CancellationToken, raw: &[u8]) {
        match decode_line(raw) {
            Ok(None) => {}
            Ok(Some(reading)) => {
                if self.config.debug {
                    debug!(
                        reading = %serde_json::Value::Object(reading.fields().clone()),
                        "Reading received"
                    );
                }
                self.emit_if_live(token, TransportEvent::Data(reading));
            }
            Err(SerialError::Decode { line, reason }) => {
                warn!(line = %line, reason = %reason, "JSON parse error, line dropped");
                self.emit_if_live(token, TransportEvent::DecodeFailed { line, reason });
            }
            Err(e) => warn!(error = %e, "Unexpected decode failure"),
        }
    }
}

/// Serial transport.
///
/// Owns the only handle to the device. Other components write through a
/// `CommandHandle` and observe the transport through its event stream.
pub struct SerialTransport {
    shared: Arc<Shared>,
    opener: Arc<dyn PortOpener>,
}

impl SerialTransport {
    /// Create a transport for real hardware.
    pub fn new(config: SerialConfig, event_tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self::with_opener(config, Arc::new(SystemPortOpener), event_tx)
    }

    /// Create a transport with a custom device opener.
    pub fn with_opener(
        config: SerialConfig,
        opener: Arc<dyn PortOpener>,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    session: None,
                }),
                event_tx,
            }),
            opener,
        }
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Get a cloneable handle for sending commands.
    pub fn command_handle(&self) -> CommandHandle {
        CommandHandle::new(self.shared.clone())
    }

    /// Queue a command for the device.
    ///
    /// Returns true if the command was accepted for dispatch. Never blocks;
    /// write failures are reported later as `TransportEvent::WriteFailed`.
    pub fn send_command(&self, command: &Command) -> bool {
        self.shared.try_send(command).is_ok()
    }

    /// Open the device. Single attempt, no retry.
    ///
    /// On failure the state stays `Disconnected` and an `Error` event carries
    /// the cause. If `close()` is called while the open is in flight, this
    /// returns `SerialError::Aborted` and no `Connected` event is emitted.
    pub async fn connect(&self) -> SerialResult<()> {
        let token = {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                ConnectionState::Connected => {
                    debug!("Already connected");
                    return Ok(());
                }
                ConnectionState::Connecting => return Err(SerialError::AlreadyConnecting),
                ConnectionState::Disconnected => {}
            }
            let token = CancellationToken::new();
            inner.state = ConnectionState::Connecting;
            inner.session = Some(Session {
                token: token.clone(),
                command_tx: None,
            });
            token
        };

        let config = &self.shared.config;
        info!(
            port = %config.port,
            baud_rate = config.baud_rate,
            "Opening serial port"
        );

        let opener = self.opener.clone();
        let path = config.port.clone();
        let baud_rate = config.baud_rate;
        let timeout = config.read_timeout();
        let opened = match tokio::task::spawn_blocking(move || {
            opener.open(&path, baud_rate, timeout)
        })
        .await
        {
            Ok(result) => result,
            Err(e) => Err(SerialError::connection(
                &config.port,
                format!("open task failed: {e}"),
            )),
        };

        let mut inner = self.shared.inner.lock();
        if token.is_cancelled() {
            info!("Serial port closed while opening");
            return Err(SerialError::Aborted);
        }

        let io = match opened {
            Ok(io) => io,
            Err(e) => {
                inner.state = ConnectionState::Disconnected;
                inner.session = None;
                error!(error = %e, "Serial connection failed");
                self.shared.emit(TransportEvent::Error(e.to_string()));
                return Err(e);
            }
        };

        let command_tx = match self.spawn_io_threads(io, &token) {
            Ok(tx) => tx,
            Err(e) => {
                token.cancel();
                inner.state = ConnectionState::Disconnected;
                inner.session = None;
                error!(error = %e, "Failed to start serial I/O threads");
                self.shared.emit(TransportEvent::Error(e.to_string()));
                return Err(e);
            }
        };

        inner.state = ConnectionState::Connected;
        if let Some(session) = inner.session.as_mut() {
            session.command_tx = Some(command_tx);
        }
        info!(port = %config.port, "Serial port connected");
        self.shared.emit(TransportEvent::Connected);
        Ok(())
    }

    /// Close the device. Idempotent.
    ///
    /// Emits `Disconnected` only when the port was connected. After this
    /// returns, no further events from the closed session are emitted.
    pub fn close(&self) {
        let mut inner = self.shared.inner.lock();
        let Some(session) = inner.session.take() else {
            debug!("Serial port already closed");
            return;
        };
        session.token.cancel();
        // Dropping the command sender stops the writer thread.
        drop(session.command_tx);

        let was = inner.state;
        inner.state = ConnectionState::Disconnected;
        if was == ConnectionState::Connected {
            info!("Serial port closed");
            self.shared.emit(TransportEvent::Disconnected);
        } else {
            debug!(state = %was, "Serial port closed before connecting");
        }
    }

    fn spawn_io_threads(
        &self,
        io: SerialIo,
        token: &CancellationToken,
    ) -> SerialResult<mpsc::UnboundedSender<Command>> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let shared = self.shared.clone();
        let reader_token = token.clone();
        let reader = io.reader;
        std::thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || reader_loop(reader, shared, reader_token))?;

        let shared = self.shared.clone();
        let writer_token = token.clone();
        let writer = io.writer;
        std::thread::Builder::new()
            .name("serial-writer".to_string())
            .spawn(move || writer_loop(writer, command_rx, shared, writer_token))?;

        Ok(command_tx)
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock();
        if let Some(session) = inner.session.take() {
            session.token.cancel();
            // The writer thread holds `Shared`; it only exits once the sender is gone.
            drop(session.command_tx);
            inner.state = ConnectionState::Disconnected;
        }
    }
}

fn reader_loop(mut reader: Box<dyn Read + Send>, shared: Arc<Shared>, token: CancellationToken) {
    let config = &shared.config;
    let mut splitter = LineSplitter::new(config.delimiter.as_bytes(), config.max_line_bytes);
    let mut buf = [0u8; 1024];

    while !token.is_cancelled() {
        match reader.read(&mut buf) {
            Ok(0) => {
                shared.device_lost(&token, "device closed the stream".to_string());
                break;
            }
            Ok(n) => {
                for frame in splitter.push(&buf[..n]) {
                    match frame {
                        Frame::Line(line) => shared.handle_line(&token, &line),
                        Frame::Overflow { discarded } => {
                            let reason = format!("line exceeds {} bytes", config.max_line_bytes);
                            warn!(discarded, "Overlong line dropped");
                            shared.emit_if_live(
                                &token,
                                TransportEvent::DecodeFailed {
                                    line: String::new(),
                                    reason,
                                },
                            );
                        }
                    }
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                shared.device_lost(&token, format!("read error: {e}"));
                break;
            }
        }
    }
    debug!("Serial reader stopped");
}

fn writer_loop(
    mut writer: Box<dyn Write + Send>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    shared: Arc<Shared>,
    token: CancellationToken,
) {
    while let Some(command) = command_rx.blocking_recv() {
        if token.is_cancelled() {
            break;
        }
        let mut frame = command.as_str().as_bytes().to_vec();
        frame.push(b'\n');

        match writer.write_all(&frame).and_then(|()| writer.flush()) {
            Ok(()) => info!(command = %command, "Command sent"),
            Err(e) => {
                warn!(command = %command, error = %e, "Write error");
                shared.emit_if_live(
                    &token,
                    TransportEvent::WriteFailed {
                        command,
                        error: e.to_string(),
                    },
                );
            }
        }
    }
    debug!("Serial writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockPortOpener;
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_config() -> SerialConfig {
        SerialConfig {
            port: "/dev/ttyTEST0".to_string(),
            read_timeout_ms: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_initial_state_is_disconnected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = SerialTransport::with_opener(
            test_config(),
            Arc::new(MockPortOpener::new()),
            tx,
        );
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_open_failure_emits_error_and_stays_disconnected() {
        let mut opener = MockPortOpener::new();
        opener
            .expect_open()
            .times(1)
            .returning(|path, _, _| Err(SerialError::connection(path, "permission denied")));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = SerialTransport::with_opener(test_config(), Arc::new(opener), tx);

        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, SerialError::Connection { .. }));
        assert_eq!(transport.state(), ConnectionState::Disconnected);

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            TransportEvent::Error(msg) => assert!(msg.contains("permission denied")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_command_rejected_when_disconnected() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = SerialTransport::with_opener(
            test_config(),
            Arc::new(MockPortOpener::new()),
            tx,
        );

        assert!(!transport.send_command(&Command::led_on()));
        assert!(matches!(
            transport.command_handle().try_send(&Command::led_on()),
            Err(SerialError::NotConnected)
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_when_never_opened_is_noop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = SerialTransport::with_opener(
            test_config(),
            Arc::new(MockPortOpener::new()),
            tx,
        );
        transport.close();
        transport.close();
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(
            serde_json::to_string(&ConnectionState::Disconnected).unwrap(),
            "\"disconnected\""
        );
    }
}
