//! HTTP server implementation using axum.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};
use uuid::Uuid;

use roomwatch_core::Command;
use roomwatch_telemetry::Metrics;

use crate::broadcast::{relay_command, CommandOutcome};
use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::state::GatewayState;
use crate::types::{
    ClientMessage, CommandRequest, CommandResponse, GatewayMessage, HistoryResponse,
    PortsResponse, StatsResponse, StatusResponse,
};

/// Caps concurrent WebSocket sessions.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Reserve a slot. The slot is released when the guard drops.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

/// Owned slot; moves into the upgraded session.
pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    gateway: GatewayState,
    broadcast_tx: broadcast::Sender<String>,
    connection_limiter: Arc<ConnectionLimiter>,
    config: DashboardConfig,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        gateway: GatewayState,
        broadcast_tx: broadcast::Sender<String>,
        config: DashboardConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            broadcast_tx,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            config,
            shutdown,
        }
    }

}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    let router = Router::new()
        .route("/api/status", get(get_status))
        .route("/api/history", get(get_history))
        .route("/api/stats", get(get_stats))
        .route("/api/ports", get(get_ports))
        .route("/api/led/on", post(led_on))
        .route("/api/led/off", post(led_off))
        .route("/api/command", post(post_command))
        .route("/ws", get(ws_handler))
        .route("/metrics", get(get_metrics))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Serving static client files");
            router.fallback_service(ServeDir::new(dir))
        }
        None => router,
    };

    router.layer(CorsLayer::permissive())
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        data: state.gateway.current_state(),
        connected: state.gateway.is_connected(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct HistoryParams {
    count: Option<String>,
}

impl HistoryParams {
    /// Missing, unparsable or non-positive means all.
    fn count(&self) -> Option<usize> {
        self.count
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
    }
}

async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        success: true,
        data: state.gateway.history(params.count()),
    })
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        success: true,
        data: state.gateway.stats(),
        connected: state.gateway.is_connected(),
    })
}

async fn get_ports(State(state): State<AppState>) -> Json<PortsResponse> {
    Json(PortsResponse {
        success: true,
        ports: state.gateway.ports().await,
    })
}

async fn led_on(State(state): State<AppState>) -> Response {
    dispatch(&state, Command::led_on(), "LED turned on")
}

async fn led_off(State(state): State<AppState>) -> Response {
    dispatch(&state, Command::led_off(), "LED turned off")
}

async fn post_command(
    State(state): State<AppState>,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection, "Invalid command body");
            return (
                StatusCode::BAD_REQUEST,
                Json(CommandResponse::failed("Command is required")),
            )
                .into_response();
        }
    };

    let command = match Command::new(request.command) {
        Ok(command) => command,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(CommandResponse::failed(e.to_string())),
            )
                .into_response();
        }
    };

    let message = format!("Command sent: {command}");
    dispatch(&state, command, message)
}

fn dispatch(state: &AppState, command: Command, message: impl Into<String>) -> Response {
    match relay_command(&state.gateway, &command) {
        CommandOutcome::Accepted => Json(CommandResponse::sent(message)).into_response(),
        outcome @ CommandOutcome::NotConnected => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(CommandResponse::failed(
                outcome.error_message().unwrap_or_default(),
            )),
        )
            .into_response(),
        CommandOutcome::Failed(reason) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CommandResponse::failed(reason)),
        )
            .into_response(),
    }
}

async fn get_metrics() -> Response {
    match Metrics::render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let guard = match state.connection_limiter.try_acquire() {
        Some(guard) => guard,
        None => {
            warn!(
                current = state.connection_limiter.current_count(),
                max = state.config.max_connections,
                "WebSocket connection limit reached"
            );
            return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, guard))
}

/// Handle one WebSocket session.
async fn handle_ws_connection(socket: WebSocket, state: AppState, _guard: ConnectionGuard) {
    let session_id = Uuid::new_v4();
    Metrics::ws_session_opened();
    info!(
        session = %session_id,
        connections = state.connection_limiter.current_count(),
        "WebSocket session attached"
    );

    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the snapshot so no update falls in between.
    let mut broadcast_rx = state.broadcast_tx.subscribe();

    let catch_up = [
        GatewayMessage::SensorUpdate {
            data: state.gateway.current_state(),
        },
        GatewayMessage::DeviceStatus {
            connected: state.gateway.is_connected(),
        },
    ];
    for msg in &catch_up {
        let Ok(json) = serde_json::to_string(msg) else {
            continue;
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            debug!(session = %session_id, "Failed to send catch-up, client disconnected");
            Metrics::ws_session_closed();
            return;
        }
    }

    // Replies go to this session only.
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();
    let gateway = state.gateway.clone();

    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if let Some(reply) = handle_client_text(&gateway, text.as_str()) {
                        if reply_tx.send(reply).is_err() {
                            break;
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!(session = %session_id, "Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(session = %session_id, error = %e, "WebSocket receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            result = broadcast_rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            debug!(session = %session_id, "Failed to send message, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(session = %session_id, skipped = n, "WebSocket client lagged, catching up");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(session = %session_id, "Broadcast channel closed");
                        break;
                    }
                }
            }
            Some(reply) = reply_rx.recv() => {
                if sender.send(Message::Text(reply.into())).await.is_err() {
                    debug!(session = %session_id, "Failed to send reply, client disconnected");
                    break;
                }
            }
            _ = &mut incoming_task => {
                debug!(session = %session_id, "Incoming task completed, closing session");
                break;
            }
            _ = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    incoming_task.abort();
    Metrics::ws_session_closed();
    info!(
        session = %session_id,
        connections = state.connection_limiter.current_count().saturating_sub(1),
        "WebSocket session detached"
    );
}

/// Parse one client frame and build the session-only reply.
fn handle_client_text(gateway: &GatewayState, text: &str) -> Option<String> {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(error = %e, "Ignoring unrecognized client message");
            return None;
        }
    };

    let ClientMessage::Command { command: raw } = msg;
    let reply = match Command::new(raw.clone()) {
        Ok(command) => {
            let outcome = relay_command(gateway, &command);
            GatewayMessage::CommandResult {
                command: command.to_string(),
                accepted: outcome.is_accepted(),
                error: outcome.error_message(),
            }
        }
        Err(e) => GatewayMessage::CommandResult {
            command: raw,
            accepted: false,
            error: Some(e.to_string()),
        },
    };
    serde_json::to_string(&reply).ok()
}

/// Serve the router on an already bound listener until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> DashboardResult<()> {
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// Bind the configured address and run the dashboard server.
pub async fn run_server(
    gateway: GatewayState,
    broadcast_tx: broadcast::Sender<String>,
    config: DashboardConfig,
    shutdown: CancellationToken,
) -> DashboardResult<()> {
    let addr = config.listen_addr();
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| DashboardError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(addr = %addr, "Starting dashboard server");

    let state = AppState::new(gateway, broadcast_tx, config, shutdown.clone());
    serve(listener, state, shutdown).await?;

    info!("Dashboard server stopped");
    Ok(())
}
