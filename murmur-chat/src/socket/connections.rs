use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Best-effort push to a connected user.
pub trait Notifier: Send + Sync {
    /// Returns whether the payload was queued on a live connection.
    fn notify(&self, user_id: Uuid, payload: &Value) -> bool;
}

struct Registration {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<Value>,
}

/// Outbound side of one accepted connection; drained by the socket forwarder.
pub struct Connection {
    pub id: ConnectionId,
    pub receiver: mpsc::UnboundedReceiver<Value>,
}

/// One live connection per user; a newer connection replaces the older one.
#[derive(Default)]
pub struct ConnectionManager {
    connections: DashMap<Uuid, Registration>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&self, user_id: Uuid) -> Connection {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::now_v7();

        // Dropping the replaced sender ends the previous forwarder.
        if let Some(previous) = self.connections.insert(user_id, Registration { id, sender }) {
            tracing::debug!(user_id = %user_id, replaced = %previous.id, "live connection replaced");
        }

        Connection { id, receiver }
    }

    pub fn send(&self, user_id: Uuid, payload: Value) -> bool {
        let queued = match self.connections.get(&user_id) {
            Some(registration) => registration.sender.send(payload).is_ok(),
            None => return false,
        };

        if !queued {
            self.connections
                .remove_if(&user_id, |_, registration| registration.sender.is_closed());
            metrics::counter!("chat_notifications_dropped_total").increment(1);
            tracing::debug!(user_id = %user_id, "dropped event for closed connection");
        }
        queued
    }

    /// Removes the registration only if it still belongs to `connection_id`.
    pub fn disconnect(&self, user_id: Uuid, connection_id: ConnectionId) -> bool {
        self.connections
            .remove_if(&user_id, |_, registration| registration.id == connection_id)
            .is_some()
    }

    pub fn is_connected(&self, user_id: Uuid) -> bool {
        self.connections.contains_key(&user_id)
    }

    pub fn connected_count(&self) -> usize {
        self.connections.len()
    }
}

impl Notifier for ConnectionManager {
    fn notify(&self, user_id: Uuid, payload: &Value) -> bool {
        self.send(user_id, payload.clone())
    }
}
