//! Hub server: fans push frames out to every connected client.
//!
//! Clients connect over WebSocket on `/notificationHub`, presenting their
//! access token as `Authorization: Bearer <token>`. Anything that can post
//! JSON (a backend job, `curl`, a test) broadcasts a frame with
//! `POST /notify`. The hub never reads what clients send beyond close
//! frames. Idle connections get a WebSocket ping every keep-alive interval
//! so clients can tell a quiet hub from a dead one.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use workpulse_proto::codec;
use workpulse_proto::push::PushFrame;

/// Path clients connect to.
pub const HUB_PATH: &str = "/notificationHub";

/// Path frames are posted to.
pub const NOTIFY_PATH: &str = "/notify";

/// Default number of frames buffered per client before it starts lagging.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Default interval between keep-alive pings.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
enum HubCommand {
    Frame(String),
    CloseAll,
}

/// Shared server state.
#[derive(Debug)]
pub struct HubState {
    tx: broadcast::Sender<HubCommand>,
    accepted_tokens: HashSet<String>,
    connected: AtomicUsize,
    keep_alive: Duration,
}

impl Default for HubState {
    fn default() -> Self {
        Self::new()
    }
}

impl HubState {
    /// A hub that accepts any client, token or not.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_BROADCAST_CAPACITY, Vec::new())
    }

    /// A hub that only accepts clients presenting one of `tokens`.
    #[must_use]
    pub fn with_tokens(tokens: Vec<String>) -> Self {
        Self::with_config(DEFAULT_BROADCAST_CAPACITY, tokens)
    }

    /// A hub with an explicit per-client buffer. An empty `tokens` list
    /// disables authentication.
    #[must_use]
    pub fn with_config(capacity: usize, tokens: Vec<String>) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            accepted_tokens: tokens.into_iter().collect(),
            connected: AtomicUsize::new(0),
            keep_alive: DEFAULT_KEEP_ALIVE,
        }
    }

    /// Override the keep-alive ping interval. Zero is treated as one
    /// millisecond.
    #[must_use]
    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval.max(Duration::from_millis(1));
        self
    }

    /// Send `frame` to every connected client.
    ///
    /// Returns how many clients it was queued for.
    pub fn broadcast(&self, frame: &PushFrame) -> usize {
        let text = match codec::encode_frame(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode push frame");
                return 0;
            }
        };
        let receivers = self.tx.send(HubCommand::Frame(text)).unwrap_or(0);
        tracing::debug!(frame_target = %frame.target, receivers, "frame broadcast");
        receivers
    }

    /// Send a WebSocket Close frame to all connected clients.
    pub fn close_all_connections(&self) {
        let receivers = self.tx.send(HubCommand::CloseAll).unwrap_or(0);
        tracing::info!(receivers, "closing all client connections");
    }

    /// Number of clients currently connected.
    #[must_use]
    pub fn connected_clients(&self) -> usize {
        self.connected.load(Ordering::Acquire)
    }

    fn authorize(&self, headers: &HeaderMap) -> bool {
        if self.accepted_tokens.is_empty() {
            return true;
        }
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| self.accepted_tokens.contains(token.trim()))
    }
}

/// Serve one upgraded client until either side closes.
pub async fn handle_socket(socket: WebSocket, state: Arc<HubState>) {
    let mut rx = state.tx.subscribe();
    let clients = state.connected.fetch_add(1, Ordering::AcqRel) + 1;
    tracing::info!(clients, "client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let keep_alive = state.keep_alive;

    let mut write_task = tokio::spawn(async move {
        let mut pings =
            tokio::time::interval_at(tokio::time::Instant::now() + keep_alive, keep_alive);
        loop {
            let command = tokio::select! {
                command = rx.recv() => command,
                _ = pings.tick() => {
                    if ws_sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        tracing::warn!("WebSocket ping failed");
                        break;
                    }
                    continue;
                }
            };
            match command {
                Ok(HubCommand::Frame(text)) => {
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        tracing::warn!("WebSocket write failed");
                        break;
                    }
                }
                Ok(HubCommand::CloseAll) => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "client lagging, frames dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if let Message::Close(_) = msg {
                tracing::debug!("received close frame");
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    let clients = state.connected.fetch_sub(1, Ordering::AcqRel) - 1;
    tracing::info!(clients, "client disconnected");
}

/// Start the hub with default state on `addr`.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(HubState::new())).await
}

/// Start the hub with a pre-configured [`HubState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<HubState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route(HUB_PATH, axum::routing::get(ws_handler))
        .route(NOTIFY_PATH, axum::routing::post(notify_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "hub server error");
        }
    });

    Ok((bound_addr, handle))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<HubState>>,
) -> Response {
    if !state.authorize(&headers) {
        tracing::warn!("rejected client without a valid token");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

async fn notify_handler(
    State(state): State<Arc<HubState>>,
    Json(frame): Json<PushFrame>,
) -> (StatusCode, Json<serde_json::Value>) {
    let receivers = state.broadcast(&frame);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "receivers": receivers })),
    )
}
