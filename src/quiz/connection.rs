use std::collections::{HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::{mpsc, RwLock};
use warp::ws::Message;

use super::signaling::ServerMessage;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Random 16-digit hex id
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self(format!("{:016x}", rng.gen::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outbound side of the connection layer. Delivery failures are logged by
/// the implementation and never reported back to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_to(&self, connection: &ConnectionId, message: &ServerMessage);

    /// Delivers to every connection currently attached to the room.
    async fn broadcast(&self, room_id: &str, message: &ServerMessage);

    async fn attach(&self, connection: &ConnectionId, room_id: &str);

    async fn detach(&self, connection: &ConnectionId, room_id: &str);

    /// Number of connections attached to the room at the transport level.
    async fn attached_count(&self, room_id: &str) -> usize;
}

/// WebSocket-backed [`Transport`]: one outbound channel per connection plus
/// the set of connections attached to each room.
pub struct ConnectionHub {
    rooms: RwLock<HashMap<String, HashSet<ConnectionId>>>,
    connections: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<Message>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, connection: ConnectionId, sender: mpsc::UnboundedSender<Message>) {
        tracing::debug!(connection_id = %connection, "Registering connection");
        self.connections.write().await.insert(connection, sender);
    }

    /// Forgets the connection and detaches it from every room.
    pub async fn unregister(&self, connection: &ConnectionId) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, members| {
            members.remove(connection);
            !members.is_empty()
        });
        drop(rooms);

        self.connections.write().await.remove(connection);
        tracing::debug!(connection_id = %connection, "Unregistered connection");
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    fn encode(message: &ServerMessage) -> Option<Message> {
        match serde_json::to_string(message) {
            Ok(text) => Some(Message::text(text)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize server message");
                None
            }
        }
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ConnectionHub {
    async fn send_to(&self, connection: &ConnectionId, message: &ServerMessage) {
        let Some(frame) = Self::encode(message) else {
            return;
        };

        let connections = self.connections.read().await;
        match connections.get(connection) {
            Some(sender) => {
                if sender.send(frame).is_err() {
                    tracing::debug!(connection_id = %connection, "Connection already closed");
                }
            }
            None => tracing::debug!(connection_id = %connection, "Unknown connection"),
        }
    }

    async fn broadcast(&self, room_id: &str, message: &ServerMessage) {
        let Some(frame) = Self::encode(message) else {
            return;
        };

        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(room_id) else {
            tracing::debug!(room_id = %room_id, "Broadcast to room with no connections");
            return;
        };

        let connections = self.connections.read().await;
        for member in members {
            if let Some(sender) = connections.get(member) {
                if sender.send(frame.clone()).is_err() {
                    tracing::debug!(connection_id = %member, "Connection already closed");
                }
            }
        }
    }

    async fn attach(&self, connection: &ConnectionId, room_id: &str) {
        let mut rooms = self.rooms.write().await;
        if rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection.clone())
        {
            tracing::debug!(connection_id = %connection, room_id = %room_id, "Connection attached to room");
        }
    }

    async fn detach(&self, connection: &ConnectionId, room_id: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(room_id) {
            members.remove(connection);
            if members.is_empty() {
                rooms.remove(room_id);
            }
        }
    }

    async fn attached_count(&self, room_id: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map_or(0, HashSet::len)
    }
}
