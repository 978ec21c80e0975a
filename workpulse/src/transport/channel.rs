//! Self-reconnecting push channel.
//!
//! A single supervisor task owns the connection. It opens a connection via
//! the [`Connector`], pumps frames to the registered handlers in arrival
//! order, and on loss waits out an exponential backoff before the next
//! attempt. A connection that stays silent for longer than the configured
//! server timeout counts as lost. Handlers registered with
//! [`PushChannel::on`] survive reconnects. Frames are not buffered while
//! disconnected.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use workpulse_proto::push::PushFrame;

use super::{ConnectionState, Connector, FrameStream, Inbound, TokenProvider};
use crate::config::ReconnectConfig;

/// Identifies a registered frame handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&PushFrame) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    by_target: HashMap<String, Vec<(HandlerId, Handler)>>,
}

impl Registry {
    fn handlers_for(&self, target: &str) -> Vec<Handler> {
        self.by_target
            .get(target)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }
}

/// Persistent, receive-only connection to the notification hub.
pub struct PushChannel {
    reconnect: ReconnectConfig,
    registry: Arc<Mutex<Registry>>,
    state: Arc<watch::Sender<ConnectionState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PushChannel {
    /// Create an idle channel. Register handlers, then call
    /// [`PushChannel::connect`].
    #[must_use]
    pub fn new(reconnect: ReconnectConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            reconnect,
            registry: Arc::new(Mutex::new(Registry::default())),
            state: Arc::new(state),
            task: Mutex::new(None),
        }
    }

    /// Start the connection supervisor.
    ///
    /// Never fails: connection errors move the channel to
    /// [`ConnectionState::Reconnecting`]. `tokens` is called once per
    /// attempt. A previous connection, if any, is torn down first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect<C: Connector>(&self, connector: C, tokens: TokenProvider) {
        self.disconnect();
        self.state.send_replace(ConnectionState::Connecting);
        tracing::info!(endpoint = connector.endpoint(), "starting push channel");

        let handle = tokio::spawn(supervise(
            connector,
            tokens,
            self.reconnect.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.state),
        ));
        *self.task.lock() = Some(handle);
    }

    /// Register `handler` for frames whose target is `target`.
    ///
    /// Handlers run on the supervisor task, one frame at a time, in arrival
    /// order and registration order.
    pub fn on(
        &self,
        target: &str,
        handler: impl Fn(&PushFrame) + Send + Sync + 'static,
    ) -> HandlerId {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = HandlerId(registry.next_id);
        registry
            .by_target
            .entry(target.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn off(&self, id: HandlerId) -> bool {
        let mut registry = self.registry.lock();
        let mut removed = false;
        registry.by_target.retain(|_, handlers| {
            let before = handlers.len();
            handlers.retain(|(hid, _)| *hid != id);
            removed |= handlers.len() != before;
            !handlers.is_empty()
        });
        removed
    }

    /// Stop the supervisor and close the connection. Idempotent.
    pub fn disconnect(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            tracing::info!("push channel disconnected");
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

/// Connection loop: connect, pump, back off, repeat.
async fn supervise<C: Connector>(
    connector: C,
    tokens: TokenProvider,
    reconnect: ReconnectConfig,
    registry: Arc<Mutex<Registry>>,
    state: Arc<watch::Sender<ConnectionState>>,
) {
    let endpoint = connector.endpoint().to_string();
    // Consecutive failed attempts since the last successful connection.
    let mut failures: u32 = 0;

    loop {
        match connector.open(tokens()).await {
            Ok(frames) => {
                failures = 0;
                state.send_replace(ConnectionState::Connected);
                tracing::info!(endpoint = %endpoint, "push channel connected");
                pump(frames, &registry, reconnect.server_timeout).await;
                tracing::info!(endpoint = %endpoint, "push connection lost");
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(endpoint = %endpoint, failures, err = %e, "push connect failed");
                if reconnect.max_attempts.is_some_and(|max| failures >= max) {
                    tracing::error!(endpoint = %endpoint, attempts = failures, "giving up on push channel");
                    state.send_replace(ConnectionState::Failed);
                    return;
                }
            }
        }

        let delay = reconnect.delay_for(failures.max(1));
        state.send_replace(ConnectionState::Reconnecting);
        tracing::info!(
            endpoint = %endpoint,
            failures,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "reconnecting push channel"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Deliver every frame of one connection to its handlers.
///
/// Returns when the connection closes, breaks, or stays silent for
/// `server_timeout`.
async fn pump(mut frames: FrameStream, registry: &Mutex<Registry>, server_timeout: Duration) {
    loop {
        let item = match tokio::time::timeout(server_timeout, frames.next()).await {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = u64::try_from(server_timeout.as_millis()).unwrap_or(u64::MAX),
                    "hub went silent, dropping connection"
                );
                break;
            }
        };
        match item {
            Ok(Inbound::KeepAlive) => tracing::trace!("hub keep-alive"),
            Ok(Inbound::Frame(frame)) => {
                let handlers = registry.lock().handlers_for(&frame.target);
                if handlers.is_empty() {
                    tracing::debug!(frame_target = %frame.target, "no handler for push frame");
                }
                for handler in handlers {
                    handler(&frame);
                }
            }
            Err(e) => {
                tracing::warn!(err = %e, "push connection broke");
                break;
            }
        }
    }
}
