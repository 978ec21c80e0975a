//! Push channel frames.
//!
//! The hub sends one JSON text frame per server message:
//!
//! ```json
//! { "target": "ReceiveNotification", "arguments": ["TaskUpdated"] }
//! ```
//!
//! `target` names the client-side handler; `arguments` is an ordered list
//! of JSON values. The portal's hub only ever sends `ReceiveNotification`
//! with a single string argument naming the message type, but the frame
//! shape leaves room for other targets.

use serde::{Deserialize, Serialize};

/// Handler target carrying portal notifications.
pub const RECEIVE_NOTIFICATION: &str = "ReceiveNotification";

/// Message type announcing a new chat message (a targeted event).
pub const NEW_CHAT_MESSAGE: &str = "NewChatMessage";

/// A single server-to-client push message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    /// Name of the client handler this frame is addressed to.
    pub target: String,
    /// Positional arguments for the handler.
    #[serde(default)]
    pub arguments: Vec<serde_json::Value>,
}

impl PushFrame {
    /// Creates a frame for an arbitrary target.
    pub fn new(target: impl Into<String>, arguments: Vec<serde_json::Value>) -> Self {
        Self {
            target: target.into(),
            arguments,
        }
    }

    /// Creates a `ReceiveNotification` frame for the given message type.
    pub fn notification(message_type: impl Into<String>) -> Self {
        Self::new(
            RECEIVE_NOTIFICATION,
            vec![serde_json::Value::String(message_type.into())],
        )
    }

    /// Returns the first argument if it is a string.
    ///
    /// For `ReceiveNotification` frames this is the message type.
    #[must_use]
    pub fn message_type(&self) -> Option<&str> {
        self.arguments.first().and_then(serde_json::Value::as_str)
    }
}
