use std::collections::HashMap;
use std::fmt;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use warp::ws::Message;

/// Outbound half of one live socket.
pub type Tx = mpsc::UnboundedSender<Message>;

/// Opaque token for one live socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        ConnectionId(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Connection {
    id: ConnectionId,
    tx: Tx,
}

/// Maps a user id to the sockets it currently has open.
///
/// In single-connection mode the latest socket replaces any earlier one, so
/// a user has at most one entry. In multi-device mode sockets accumulate.
#[derive(Debug, Default)]
pub struct SocketRegistry {
    connections: RwLock<HashMap<String, Vec<Connection>>>,
    multi_device: bool,
}

impl SocketRegistry {
    pub fn new(multi_device: bool) -> Self {
        SocketRegistry {
            connections: RwLock::new(HashMap::new()),
            multi_device,
        }
    }

    /// Returns the connections this one displaced. Each of them is sent a
    /// close frame so its socket shuts down instead of idling.
    pub async fn register(&self, user_id: &str, id: ConnectionId, tx: Tx) -> Vec<ConnectionId> {
        let mut connections = self.connections.write().await;
        let entry = connections.entry(user_id.to_string()).or_default();

        let replaced = if self.multi_device {
            Vec::new()
        } else {
            entry
                .drain(..)
                .map(|c| {
                    // fails only when the writer is already gone
                    let _ = c.tx.send(Message::close());
                    c.id
                })
                .collect()
        };
        entry.push(Connection { id, tx });
        replaced
    }

    /// Removes `id` only. A late disconnect from a replaced socket leaves
    /// the user's current socket alone.
    pub async fn unregister(&self, user_id: &str, id: ConnectionId) -> bool {
        let mut connections = self.connections.write().await;
        let Some(entry) = connections.get_mut(user_id) else {
            return false;
        };

        let before = entry.len();
        entry.retain(|c| c.id != id);
        let removed = entry.len() != before;
        if entry.is_empty() {
            connections.remove(user_id);
        }
        removed
    }

    /// Empty when the user is offline.
    pub async fn lookup(&self, user_id: &str) -> Vec<ConnectionId> {
        let connections = self.connections.read().await;
        connections
            .get(user_id)
            .map(|entry| entry.iter().map(|c| c.id).collect())
            .unwrap_or_default()
    }

    pub async fn online_users(&self) -> Vec<String> {
        let connections = self.connections.read().await;
        let mut users: Vec<String> = connections.keys().cloned().collect();
        users.sort();
        users
    }

    pub(crate) async fn senders(&self, user_id: &str) -> Vec<Tx> {
        let connections = self.connections.read().await;
        connections
            .get(user_id)
            .map(|entry| entry.iter().map(|c| c.tx.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) async fn all_senders(&self) -> Vec<Tx> {
        let connections = self.connections.read().await;
        connections
            .values()
            .flatten()
            .map(|c| c.tx.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx() -> Tx {
        mpsc::unbounded_channel().0
    }

    #[tokio::test]
    async fn last_connection_wins() {
        let registry = SocketRegistry::new(false);
        let first = ConnectionId::new();
        let second = ConnectionId::new();

        assert!(registry.register("alice", first, tx()).await.is_empty());
        assert_eq!(registry.register("alice", second, tx()).await, vec![first]);
        assert_eq!(registry.lookup("alice").await, vec![second]);

        // the replaced socket closing must not take the new one with it
        assert!(!registry.unregister("alice", first).await);
        assert_eq!(registry.lookup("alice").await, vec![second]);

        assert!(registry.unregister("alice", second).await);
        assert!(registry.lookup("alice").await.is_empty());
        assert!(registry.online_users().await.is_empty());
    }

    #[tokio::test]
    async fn replaced_sockets_are_told_to_close() {
        let registry = SocketRegistry::new(false);
        let (old_tx, mut old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();

        registry.register("alice", ConnectionId::new(), old_tx).await;
        registry.register("alice", ConnectionId::new(), new_tx).await;

        assert!(old_rx.recv().await.unwrap().is_close());
        // the registry held the only sender
        assert!(old_rx.recv().await.is_none());
        assert!(new_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn multi_device_keeps_every_socket() {
        let registry = SocketRegistry::new(true);
        let phone = ConnectionId::new();
        let laptop = ConnectionId::new();

        registry.register("alice", phone, tx()).await;
        registry.register("alice", laptop, tx()).await;
        registry.register("bob", ConnectionId::new(), tx()).await;

        assert_eq!(registry.lookup("alice").await, vec![phone, laptop]);
        assert_eq!(registry.senders("alice").await.len(), 2);
        assert_eq!(registry.all_senders().await.len(), 3);
        assert_eq!(registry.online_users().await, vec!["alice", "bob"]);

        registry.unregister("alice", phone).await;
        assert_eq!(registry.lookup("alice").await, vec![laptop]);
    }

    #[tokio::test]
    async fn unknown_users_are_offline() {
        let registry = SocketRegistry::new(false);
        assert!(registry.lookup("nobody").await.is_empty());
        assert!(!registry.unregister("nobody", ConnectionId::new()).await);
    }
}
