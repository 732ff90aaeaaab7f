//! Gateway state shared by the broadcaster and request handlers.
//!
//! GatewayState is constructed once at startup and cloned into every
//! consumer. It holds the store, the transport's command handle and the
//! port enumerator; there is no global lookup.

use std::sync::Arc;

use roomwatch_serial::{list_ports, CommandHandle, ConnectionState, PortInfo};
use roomwatch_store::{SensorStore, Snapshot, StoreStats};

/// Enumerates device paths (blocking).
pub type PortLister = Arc<dyn Fn() -> Vec<PortInfo> + Send + Sync>;

#[derive(Clone)]
pub struct GatewayState {
    store: Arc<SensorStore>,
    commands: CommandHandle,
    port_lister: PortLister,
}

impl GatewayState {
    pub fn new(store: Arc<SensorStore>, commands: CommandHandle) -> Self {
        Self::with_port_lister(store, commands, Arc::new(list_ports))
    }

    pub fn with_port_lister(
        store: Arc<SensorStore>,
        commands: CommandHandle,
        port_lister: PortLister,
    ) -> Self {
        Self {
            store,
            commands,
            port_lister,
        }
    }

    pub fn store(&self) -> &SensorStore {
        &self.store
    }

    pub fn commands(&self) -> &CommandHandle {
        &self.commands
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.commands.connection_state()
    }

    pub fn is_connected(&self) -> bool {
        self.commands.is_connected()
    }

    pub fn current_state(&self) -> Option<Arc<Snapshot>> {
        self.store.get_current_state()
    }

    pub fn history(&self, count: Option<usize>) -> Vec<Arc<Snapshot>> {
        self.store.get_history(count)
    }

    pub fn stats(&self) -> StoreStats {
        self.store.get_stats()
    }

    /// Enumerate ports on a blocking thread.
    pub async fn ports(&self) -> Vec<PortInfo> {
        let lister = self.port_lister.clone();
        tokio::task::spawn_blocking(move || lister())
            .await
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("connection_state", &self.connection_state())
            .field("history_len", &self.store.history_len())
            .finish()
    }
}
