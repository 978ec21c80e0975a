//! Push transport for `WorkPulse`.
//!
//! The [`channel::PushChannel`] owns one persistent, self-reconnecting
//! connection to the portal's notification hub. Each connection attempt is
//! delegated to a [`Connector`]:
//! - [`ws::WsConnector`]: WebSocket connection with a bearer token
//! - [`loopback::LoopbackConnector`]: in-process frames for testing
//!
//! The channel is receive-only: nothing is ever sent to the hub.

pub mod channel;
pub mod loopback;
pub mod ws;

use std::fmt;
use std::sync::Arc;

use futures_util::stream::BoxStream;
use workpulse_proto::push::PushFrame;

pub use channel::{HandlerId, PushChannel};

/// Returns the current bearer token, if any.
///
/// Called once per connection attempt (and once per REST request), so an
/// expired token replaced in session storage is picked up on the next try.
pub type TokenProvider = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Items received over one live connection. The stream ends when the
/// connection closes; an `Err` item means it broke.
pub type FrameStream = BoxStream<'static, Result<Inbound, TransportError>>;

/// One item read from a live connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A decoded push frame.
    Frame(PushFrame),
    /// Traffic with no frame in it, such as a ping. Proves the hub is alive.
    KeepAlive,
}

/// Builds a [`TokenProvider`] that always yields the same token.
pub fn static_token(token: Option<String>) -> TokenProvider {
    Arc::new(move || token.clone())
}

/// Lifecycle of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started, or torn down.
    Disconnected,
    /// First connection attempt in progress.
    Connecting,
    /// Receiving frames.
    Connected,
    /// Waiting out the backoff before the next attempt.
    Reconnecting,
    /// Gave up after the configured number of attempts.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Errors that can occur while establishing or reading a push connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The connection attempt timed out.
    #[error("connection attempt timed out")]
    Timeout,

    /// The hub rejected the bearer token.
    #[error("hub rejected credentials")]
    Unauthorized,

    /// The hub could not be reached.
    #[error("hub {0} is unreachable")]
    Unreachable(String),

    /// The endpoint or the exchanged frames were invalid.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An underlying I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens one connection to the push hub.
///
/// Implementations perform a single attempt; retrying and backoff are the
/// [`PushChannel`]'s job.
pub trait Connector: Send + Sync + 'static {
    /// Human-readable endpoint, used in logs.
    fn endpoint(&self) -> &str;

    /// Attempt a connection, presenting `token` as the bearer credential.
    fn open(
        &self,
        token: Option<String>,
    ) -> impl std::future::Future<Output = Result<FrameStream, TransportError>> + Send;
}
