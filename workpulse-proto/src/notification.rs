//! Bell notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A notification record from the notifications list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Server identifier.
    pub id: i64,
    /// Display text.
    pub message: String,
    /// Creation time.
    #[serde(with = "crate::time::timestamp")]
    pub created_at: DateTime<Utc>,
    /// Whether the user has read it. Absent means unread.
    #[serde(default, alias = "isRead")]
    pub read: bool,
}
