//! WebSocket connector for the notification hub.
//!
//! Each [`Connector::open`] call performs one WebSocket handshake, presenting
//! the current token as `Authorization: Bearer <token>`, and yields the
//! decoded [`PushFrame`](workpulse_proto::push::PushFrame)s of that connection as a stream. Text frames that
//! fail to decode are logged and skipped; the connection stays up. Pings and
//! other control traffic surface as [`Inbound::KeepAlive`].

use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;
use workpulse_proto::codec;

use super::{Connector, FrameStream, Inbound, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Default timeout for one connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Path of the notification hub, relative to the server root.
pub const HUB_PATH: &str = "notificationHub";

/// Derive the hub URL from the REST API base URL.
///
/// A trailing `/api` path segment is stripped, `/notificationHub` appended,
/// and `http(s)` mapped to `ws(s)`.
///
/// # Errors
///
/// Returns [`TransportError::Protocol`] if `api_base` is not an absolute
/// `http`, `https`, `ws` or `wss` URL.
pub fn hub_url(api_base: &str) -> Result<String, TransportError> {
    let mut url = Url::parse(api_base)
        .map_err(|e| TransportError::Protocol(format!("invalid API base URL {api_base}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::Protocol(format!(
                "unsupported URL scheme {other}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| TransportError::Protocol(format!("cannot use {scheme} for {api_base}")))?;

    let path = url.path().trim_end_matches('/');
    let root = path.strip_suffix("/api").unwrap_or(path).to_string();
    url.set_path(&format!("{root}/{HUB_PATH}"));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Connects to the hub over WebSocket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    connect_timeout: Duration,
}

impl WsConnector {
    /// Create a connector for the given `ws://` or `wss://` hub URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the per-attempt connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Connector for WsConnector {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn open(&self, token: Option<String>) -> Result<FrameStream, TransportError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(map_ws_connect_error)?;
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::Protocol(format!("invalid bearer token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (ws, _response) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| {
                tracing::warn!(url = %self.url, "hub connect timed out");
                TransportError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url = %self.url, err = %e, "hub connect failed");
                map_ws_connect_error(e)
            })?;

        Ok(frames(ws).boxed())
    }
}

/// Turn a live socket into a stream of decoded push frames.
fn frames(ws: WsStream) -> impl futures_util::Stream<Item = Result<Inbound, TransportError>> {
    stream::unfold(Some(ws), |state| async move {
        let mut ws = state?;
        let item = match ws.next().await? {
            Ok(Message::Text(text)) => match codec::decode_frame(text.as_str()) {
                Ok(frame) => Inbound::Frame(frame),
                Err(e) => {
                    tracing::warn!(err = %e, "malformed push frame, skipping");
                    Inbound::KeepAlive
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("hub closed the connection");
                return None;
            }
            Ok(_) => Inbound::KeepAlive,
            Err(e) => {
                tracing::warn!(err = %e, "hub read error");
                return Some((Err(TransportError::Protocol(e.to_string())), None));
            }
        };
        Some((Ok(item), Some(ws)))
    })
}

/// Map a `tokio_tungstenite` connection error to a [`TransportError`].
fn map_ws_connect_error(err: tokio_tungstenite::tungstenite::Error) -> TransportError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => {
            if matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::AddrNotAvailable
            ) {
                TransportError::Unreachable(io_err.to_string())
            } else {
                TransportError::Io(io_err)
            }
        }
        WsError::Http(response) if response.status().as_u16() == 401 => {
            TransportError::Unauthorized
        }
        WsError::Http(response) => {
            TransportError::Protocol(format!("hub HTTP error: status {}", response.status()))
        }
        WsError::Url(e) => TransportError::Protocol(format!("invalid hub URL: {e}")),
        other => TransportError::Protocol(other.to_string()),
    }
}
