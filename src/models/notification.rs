use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Which pipeline a notification originates from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    Import,
    Export,
    System,
}

/// Lifecycle stage the notification reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationStatus {
    Started,
    Completed,
    Failed,
}

/// The message structure delivered over a live connection.
///
/// `user_id` absent means broadcast to every connection; present means
/// delivered only to that user's connections. Immutable once pushed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub status: NotificationStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl NotificationEnvelope {
    pub fn new(
        kind: NotificationKind,
        status: NotificationStatus,
        message: impl Into<String>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            status,
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
            user_id,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Frames the server sends over a WebSocket connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A notification envelope pushed to the client.
    Notification(NotificationEnvelope),
    /// Acknowledgement after a successful `join`.
    Joined { user_id: String, message: String },
}

/// Frames a client may send over a WebSocket connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register this connection for a user's targeted notifications.
    Join { user_id: String },
}
