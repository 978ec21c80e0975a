//! In-process connector for testing.
//!
//! [`LoopbackConnector::pair`] returns the connector plus a
//! [`LoopbackHub`] handle that plays the server: it pushes frames and
//! keep-alives into the live connection, drops it to force a reconnect,
//! refuses attempts, and records the token presented on each attempt.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use workpulse_proto::push::PushFrame;

use super::{Connector, FrameStream, Inbound, TransportError};

#[derive(Default)]
struct Shared {
    live: Option<mpsc::UnboundedSender<Inbound>>,
    refuse: bool,
    required_token: Option<String>,
    attempts: Vec<Option<String>>,
}

/// Connector whose connections are fed by a [`LoopbackHub`].
#[derive(Clone)]
pub struct LoopbackConnector {
    shared: Arc<Mutex<Shared>>,
}

/// Server side of a [`LoopbackConnector`].
#[derive(Clone)]
pub struct LoopbackHub {
    shared: Arc<Mutex<Shared>>,
}

impl LoopbackConnector {
    /// Create a connected connector/hub pair.
    #[must_use]
    pub fn pair() -> (Self, LoopbackHub) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            Self {
                shared: Arc::clone(&shared),
            },
            LoopbackHub { shared },
        )
    }
}

impl Connector for LoopbackConnector {
    fn endpoint(&self) -> &str {
        "loopback"
    }

    async fn open(&self, token: Option<String>) -> Result<FrameStream, TransportError> {
        let mut shared = self.shared.lock();
        shared.attempts.push(token.clone());

        if shared.refuse {
            return Err(TransportError::Unreachable("loopback".to_string()));
        }
        if shared.required_token.is_some() && shared.required_token != token {
            return Err(TransportError::Unauthorized);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        shared.live = Some(tx);
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (Ok(item), rx))
        })
        .boxed())
    }
}

impl LoopbackHub {
    /// Deliver a frame over the live connection.
    ///
    /// Returns `false` if no connection is open.
    pub fn push(&self, frame: PushFrame) -> bool {
        self.send(Inbound::Frame(frame))
    }

    /// Deliver a keep-alive over the live connection.
    pub fn keep_alive(&self) -> bool {
        self.send(Inbound::KeepAlive)
    }

    fn send(&self, item: Inbound) -> bool {
        self.shared
            .lock()
            .live
            .as_ref()
            .is_some_and(|tx| tx.send(item).is_ok())
    }

    /// Close the live connection, as if the network dropped it.
    pub fn drop_connection(&self) {
        self.shared.lock().live = None;
    }

    /// Make subsequent connection attempts fail (or succeed again).
    pub fn set_refuse(&self, refuse: bool) {
        self.shared.lock().refuse = refuse;
    }

    /// Only accept attempts presenting `token`.
    pub fn require_token(&self, token: Option<String>) {
        self.shared.lock().required_token = token;
    }

    /// Tokens presented on each connection attempt so far, in order.
    #[must_use]
    pub fn attempts(&self) -> Vec<Option<String>> {
        self.shared.lock().attempts.clone()
    }

    /// Whether a connection is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared
            .lock()
            .live
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}
