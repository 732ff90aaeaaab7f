//! Command handle for writing to the device.
//!
//! Provides a fire-and-forget sending API that can be cloned into HTTP
//! handlers and WebSocket sessions without giving them the transport itself.

use crate::error::SerialResult;
use crate::transport::{ConnectionState, Shared};
use roomwatch_core::Command;
use std::sync::Arc;

/// Cloneable write handle onto a `SerialTransport`.
///
/// # Delivery
///
/// `send_command()` only confirms the command was queued for the writer
/// thread. The write itself happens asynchronously; a failure surfaces as
/// `TransportEvent::WriteFailed` on the transport's event stream.
#[derive(Clone)]
pub struct CommandHandle {
    shared: Arc<Shared>,
}

impl CommandHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Queue a command, reporting why it was rejected.
    ///
    /// # Errors
    ///
    /// - `SerialError::NotConnected`: Port is not open
    /// - `SerialError::Write`: Writer thread already stopped
    pub fn try_send(&self, command: &Command) -> SerialResult<()> {
        self.shared.try_send(command)
    }

    /// Queue a command. Returns false if the port is not open.
    pub fn send_command(&self, command: &Command) -> bool {
        self.try_send(command).is_ok()
    }

    /// Get current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }
}

impl std::fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandle")
            .field("state", &self.connection_state())
            .finish()
    }
}
