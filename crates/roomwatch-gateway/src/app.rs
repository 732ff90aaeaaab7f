//! Main application orchestration.

use std::future::Future;
use std::sync::Arc;

use roomwatch_dashboard::{run_broadcaster, run_server, GatewayState};
use roomwatch_serial::{list_ports, PortOpener, SerialTransport, SystemPortOpener, TransportEvent};
use roomwatch_store::SensorStore;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::reconnect::{connect_with_retry, ReconnectConfig};

/// Main application state.
pub struct Application {
    config: AppConfig,
    store: Arc<SensorStore>,
    transport: Arc<SerialTransport>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    /// Stops reconnect attempts. Cancelled before the transport is closed.
    shutdown: CancellationToken,
}

impl Application {
    /// Create an application talking to real hardware.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        Self::with_opener(config, Arc::new(SystemPortOpener))
    }

    /// Create an application with a custom device opener.
    pub fn with_opener(config: AppConfig, opener: Arc<dyn PortOpener>) -> AppResult<Self> {
        config.validate()?;

        let (event_tx, events) = mpsc::unbounded_channel();
        let transport = Arc::new(SerialTransport::with_opener(
            config.serial.clone(),
            opener,
            event_tx,
        ));
        let store = Arc::new(SensorStore::new(config.store.clone()));

        Ok(Self {
            config,
            store,
            transport,
            events,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn store(&self) -> &Arc<SensorStore> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<SerialTransport> {
        &self.transport
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `signal` completes.
    pub async fn run_until<F>(self, signal: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            store,
            transport,
            events,
            shutdown,
        } = self;
        tokio::pin!(signal);

        info!("Roomwatch gateway v{}", env!("CARGO_PKG_VERSION"));
        info!(
            port = %config.serial.port,
            baud_rate = config.serial.baud_rate,
            dashboard = %config.dashboard.listen_addr(),
            "Configuration"
        );
        let ports = tokio::task::spawn_blocking(list_ports)
            .await
            .unwrap_or_default();
        debug!(count = ports.len(), "Port enumeration complete");

        // Transport events pass through a tap that notices device loss.
        let device_lost = Arc::new(Notify::new());
        let (forward_tx, forward_rx) = mpsc::unbounded_channel();
        tokio::spawn(tap_events(events, forward_tx, device_lost.clone()));

        let (broadcast_tx, _) = broadcast::channel(config.dashboard.broadcast_capacity);
        let gateway = GatewayState::new(store, transport.command_handle());
        tokio::spawn(run_broadcaster(
            gateway.clone(),
            forward_rx,
            broadcast_tx.clone(),
        ));

        let connected = tokio::select! {
            result = connect_with_retry(&transport, &config.reconnect, &shutdown) => result,
            () = &mut signal => {
                info!("Shutdown signal received during startup");
                shutdown.cancel();
                transport.close();
                return Ok(());
            }
        };
        if let Err(e) = connected {
            warn!(error = %e, "Serial device unavailable, serving without it");
        }

        if config.reconnect.is_enabled() {
            tokio::spawn(supervise_reconnect(
                transport.clone(),
                config.reconnect.clone(),
                device_lost,
                shutdown.clone(),
            ));
        }

        let server_stop = CancellationToken::new();
        let mut server = tokio::spawn(run_server(
            gateway,
            broadcast_tx,
            config.dashboard.clone(),
            server_stop.clone(),
        ));

        let early_exit = tokio::select! {
            () = &mut signal => {
                info!("Shutdown signal received");
                None
            }
            result = &mut server => Some(result),
        };

        // Stop reconnects first so the close below is not undone.
        shutdown.cancel();
        transport.close();
        server_stop.cancel();

        let result = match early_exit {
            Some(result) => result,
            None => server.await,
        };
        result??;

        info!("Shutdown complete");
        Ok(())
    }
}

/// Forward transport events to the broadcaster, flagging device loss.
async fn tap_events(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    forward: mpsc::UnboundedSender<TransportEvent>,
    device_lost: Arc<Notify>,
) {
    while let Some(event) = events.recv().await {
        if matches!(event, TransportEvent::Disconnected) {
            device_lost.notify_one();
        }
        if forward.send(event).is_err() {
            break;
        }
    }
}

/// Re-run the reconnect policy each time the device drops.
async fn supervise_reconnect(
    transport: Arc<SerialTransport>,
    policy: ReconnectConfig,
    device_lost: Arc<Notify>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            () = device_lost.notified() => {}
            () = shutdown.cancelled() => break,
        }
        if shutdown.is_cancelled() {
            break;
        }

        info!("Device lost, reconnecting");
        match connect_with_retry(&transport, &policy, &shutdown).await {
            Ok(()) => info!("Device reconnected"),
            Err(e) => warn!(error = %e, "Reconnect gave up"),
        }
    }
    debug!("Reconnect supervisor stopped");
}
