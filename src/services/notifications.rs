use redis::AsyncCommands;

use crate::models::notification::NotificationEnvelope;

const NOTIFICATION_KEY: &str = "vehicle_bulk:notifications";

/// Redis list carrying notification envelopes from the workers to the
/// server process that owns the live WebSocket connections.
///
/// Delivery is fire-and-forget past this point: once the server pops an
/// envelope it is either dispatched to live connections or dropped as
/// undeliverable; nothing is replayed.
pub struct NotificationQueue {
    client: redis::Client,
}

impl NotificationQueue {
    pub fn new(redis_url: &str) -> Result<Self, NotifyError> {
        let client = redis::Client::open(redis_url).map_err(NotifyError::Redis)?;
        Ok(Self { client })
    }

    /// Push an envelope for the server's dispatch loop.
    pub async fn push(&self, envelope: &NotificationEnvelope) -> Result<(), NotifyError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(NotifyError::Redis)?;
        let payload = serde_json::to_string(envelope).map_err(NotifyError::Serialize)?;
        conn.lpush::<_, _, ()>(NOTIFICATION_KEY, &payload)
            .await
            .map_err(NotifyError::Redis)?;
        Ok(())
    }

    /// Pop the oldest pending envelope, if any.
    pub async fn pop(&self) -> Result<Option<NotificationEnvelope>, NotifyError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(NotifyError::Redis)?;
        let raw: Option<String> = conn.rpop(NOTIFICATION_KEY, None).await.map_err(NotifyError::Redis)?;

        match raw {
            Some(payload) => {
                let envelope = serde_json::from_str(&payload).map_err(NotifyError::Serialize)?;
                Ok(Some(envelope))
            }
            None => Ok(None),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
