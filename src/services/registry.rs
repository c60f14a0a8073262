use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::notification::{NotificationEnvelope, ServerMessage};

type ConnectionSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Default)]
struct Inner {
    /// user id -> live connections for that user (multi-tab/device)
    user_connections: HashMap<String, HashSet<Uuid>>,
    /// reverse mapping for O(1) cleanup on disconnect
    connection_users: HashMap<Uuid, String>,
    /// per-connection ordered delivery channel
    senders: HashMap<Uuid, ConnectionSender>,
}

/// Process-local registry mapping user identities to live notification
/// channels. Rebuilt from scratch on restart; clients re-join after
/// reconnecting.
///
/// All three maps are updated together under one mutex so a concurrent
/// join/disconnect can never observe a half-applied pair. Delivery happens
/// after the lock is released; per-connection ordering is preserved by each
/// connection's own channel.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly opened connection's send channel. The connection
    /// receives broadcasts immediately but targeted notifications only
    /// after a `join`.
    pub fn register(&self, connection_id: Uuid, sender: ConnectionSender) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner.senders.insert(connection_id, sender);
    }

    /// Associate a connection with a user. Last join wins per connection: a
    /// stale mapping to a previous user is removed first. A user may hold
    /// any number of simultaneous connections.
    pub fn join(&self, user_id: &str, connection_id: Uuid) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");

        if let Some(previous) = inner.connection_users.remove(&connection_id) {
            if let Some(set) = inner.user_connections.get_mut(&previous) {
                set.remove(&connection_id);
                if set.is_empty() {
                    inner.user_connections.remove(&previous);
                }
            }
        }

        inner
            .user_connections
            .entry(user_id.to_string())
            .or_default()
            .insert(connection_id);
        inner
            .connection_users
            .insert(connection_id, user_id.to_string());
    }

    /// Remove one connection on disconnect, leaving the user's other
    /// connections intact.
    pub fn leave(&self, connection_id: Uuid) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");

        if let Some(user_id) = inner.connection_users.remove(&connection_id) {
            if let Some(set) = inner.user_connections.get_mut(&user_id) {
                set.remove(&connection_id);
                if set.is_empty() {
                    inner.user_connections.remove(&user_id);
                }
            }
        }
        inner.senders.remove(&connection_id);
    }

    /// Deliver an envelope: targeted to one user's connections when
    /// `user_id` is set, broadcast to every live connection otherwise.
    ///
    /// Returns the number of connections the envelope was handed to. An
    /// unreachable user is logged and the envelope dropped; notifications
    /// are never queued for a later connection.
    pub fn dispatch(&self, envelope: NotificationEnvelope) -> usize {
        let targets: Vec<ConnectionSender> = {
            let inner = self.inner.lock().expect("registry lock poisoned");
            match &envelope.user_id {
                Some(user_id) => inner
                    .user_connections
                    .get(user_id)
                    .map(|conns| {
                        conns
                            .iter()
                            .filter_map(|id| inner.senders.get(id).cloned())
                            .collect()
                    })
                    .unwrap_or_default(),
                None => inner.senders.values().cloned().collect(),
            }
        };

        if targets.is_empty() {
            match &envelope.user_id {
                Some(user_id) => tracing::warn!(
                    user_id = %user_id,
                    message = %envelope.message,
                    "User not connected, notification not sent"
                ),
                None => tracing::debug!(
                    message = %envelope.message,
                    "No live connections for broadcast"
                ),
            }
            return 0;
        }

        let mut delivered = 0;
        for sender in targets {
            // A closed channel means the socket is tearing down; `leave`
            // will prune it.
            if sender.send(ServerMessage::Notification(envelope.clone())).is_ok() {
                delivered += 1;
            }
        }

        tracing::debug!(
            message = %envelope.message,
            delivered,
            targeted = envelope.user_id.is_some(),
            "Notification dispatched"
        );
        delivered
    }

    /// Send a single frame to one connection (join acknowledgements).
    pub fn send_to(&self, connection_id: Uuid, message: ServerMessage) {
        let sender = {
            let inner = self.inner.lock().expect("registry lock poisoned");
            inner.senders.get(&connection_id).cloned()
        };
        if let Some(sender) = sender {
            let _ = sender.send(message);
        }
    }

    /// Number of live connections (all users).
    pub fn connection_count(&self) -> usize {
        self.inner.lock().expect("registry lock poisoned").senders.len()
    }
}
