use huddle_protocol::{ConnectionId, ServerMessage};
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Registry of live connections and the identity each one is bound to.
///
/// The per-identity connection sets double as the personal notification
/// channel: a user with several devices or tabs has one entry per connection.
pub struct ConnectionManager {
    /// Map from connection ID to message sender channel
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
    /// Map from connection ID to the identity bound to it
    identities: RwLock<HashMap<ConnectionId, Uuid>>,
    /// Map from user ID to connection IDs (a user may have multiple connections)
    user_connections: RwLock<HashMap<Uuid, HashSet<ConnectionId>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
            identities: RwLock::new(HashMap::new()),
            user_connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection's outbound queue and bind it to `user_id`
    pub async fn add_connection(
        &self,
        connection_id: ConnectionId,
        user_id: Uuid,
        sender: mpsc::UnboundedSender<String>,
    ) {
        self.senders.write().await.insert(connection_id, sender);
        self.identities.write().await.insert(connection_id, user_id);

        self.user_connections
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(connection_id);

        tracing::debug!(%user_id, %connection_id, "Connection bound to identity");
    }

    /// Unbind a connection. Safe to call more than once.
    pub async fn remove_connection(&self, connection_id: ConnectionId) {
        let user_id = self.identities.write().await.remove(&connection_id);

        if let Some(user_id) = user_id {
            let mut user_connections = self.user_connections.write().await;
            if let Some(conns) = user_connections.get_mut(&user_id) {
                conns.remove(&connection_id);
                if conns.is_empty() {
                    user_connections.remove(&user_id);
                }
            }

            tracing::debug!(%user_id, %connection_id, "Connection unbound");
        }

        self.senders.write().await.remove(&connection_id);
    }

    /// Fan a message out to every connection bound to `user_id`.
    /// Returns how many connections it was queued for.
    pub async fn send_to_user(&self, user_id: Uuid, message: &ServerMessage) -> usize {
        let Some(json) = encode(message) else {
            return 0;
        };

        let user_connections = self.user_connections.read().await;
        let senders = self.senders.read().await;

        let mut delivered = 0;
        if let Some(conn_ids) = user_connections.get(&user_id) {
            for conn_id in conn_ids {
                if let Some(sender) = senders.get(conn_id) {
                    match sender.send(json.clone()) {
                        Ok(()) => delivered += 1,
                        Err(e) => {
                            tracing::error!("Failed to send message to user {} ({}): {}", user_id, conn_id, e)
                        }
                    }
                }
            }
        }
        delivered
    }

    /// Queue a message for one connection. Returns `false` if it is not registered.
    pub async fn send_to_connection(
        &self,
        connection_id: ConnectionId,
        message: &ServerMessage,
    ) -> bool {
        let Some(json) = encode(message) else {
            return false;
        };

        let senders = self.senders.read().await;

        match senders.get(&connection_id) {
            Some(sender) => match sender.send(json) {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!("Failed to send message to {}: {}", connection_id, e);
                    false
                }
            },
            None => false,
        }
    }

    /// Queue the same message for several connections
    pub async fn send_to_many(&self, connection_ids: &[ConnectionId], message: &ServerMessage) {
        if connection_ids.is_empty() {
            return;
        }
        let Some(json) = encode(message) else {
            return;
        };

        let senders = self.senders.read().await;
        for conn_id in connection_ids {
            if let Some(sender) = senders.get(conn_id) {
                if let Err(e) = sender.send(json.clone()) {
                    tracing::error!("Failed to send message to {}: {}", conn_id, e);
                }
            }
        }
    }

    pub async fn is_user_online(&self, user_id: Uuid) -> bool {
        self.user_connections
            .read()
            .await
            .get(&user_id)
            .map(|conns| !conns.is_empty())
            .unwrap_or(false)
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(j) => Some(j),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notifies_every_device_of_an_identity() {
        let manager = ConnectionManager::new();
        let user = Uuid::new_v4();
        let (phone_tx, mut phone_rx) = mpsc::unbounded_channel();
        let (laptop_tx, mut laptop_rx) = mpsc::unbounded_channel();
        let phone = ConnectionId::new();
        let laptop = ConnectionId::new();

        manager.add_connection(phone, user, phone_tx).await;
        manager.add_connection(laptop, user, laptop_tx).await;

        let msg = ServerMessage::Notification {
            sender_id: Uuid::new_v4(),
            message: "friend request".into(),
        };
        assert_eq!(manager.send_to_user(user, &msg).await, 2);
        assert!(phone_rx.try_recv().unwrap().contains("friend request"));
        assert!(laptop_rx.try_recv().unwrap().contains("friend request"));

        manager.remove_connection(phone).await;
        assert_eq!(manager.send_to_user(user, &msg).await, 1);
        assert!(manager.is_user_online(user).await);

        manager.remove_connection(laptop).await;
        manager.remove_connection(laptop).await;
        assert!(!manager.is_user_online(user).await);
        assert_eq!(manager.send_to_user(user, &msg).await, 0);
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn send_to_unknown_connection_reports_false() {
        let manager = ConnectionManager::new();
        assert!(!manager.send_to_connection(ConnectionId::new(), &ServerMessage::Pong).await);
    }
}
