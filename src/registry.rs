use std::collections::{HashMap, HashSet};
use std::fmt;

use tokio::sync::{mpsc, RwLock};
use warp::ws::Message;

pub type ConnectionId = String;
pub type Outbound = mpsc::Sender<Message>;

/// Broadcast group name. Chat and user rooms live in separate namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomId {
    Chat(String),
    User(String),
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomId::Chat(chat_id) => write!(f, "chat_{chat_id}"),
            RoomId::User(user_id) => write!(f, "user_{user_id}"),
        }
    }
}

struct Connection {
    outbound: Outbound,
    chat_room: Option<String>,
    user_room: Option<String>,
}

#[derive(Default)]
struct Membership {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl Membership {
    fn insert_member(&mut self, room: RoomId, connection_id: &str) {
        self.rooms
            .entry(room)
            .or_default()
            .insert(connection_id.to_string());
    }

    fn remove_member(&mut self, room: &RoomId, connection_id: &str) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(connection_id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }
}

/// Live connections and the rooms they occupy.
///
/// Each connection sits in at most one chat room and at most one user room.
/// All membership changes go through a single write lock, so moving a
/// connection between chat rooms is never observed half-done.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Membership>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection_id: ConnectionId, outbound: Outbound) {
        let mut membership = self.inner.write().await;
        membership.connections.insert(
            connection_id,
            Connection {
                outbound,
                chat_room: None,
                user_room: None,
            },
        );
    }

    /// Drops the connection from every room. Returns `false` if it was not registered.
    pub async fn unregister(&self, connection_id: &str) -> bool {
        let mut membership = self.inner.write().await;
        let Some(connection) = membership.connections.remove(connection_id) else {
            return false;
        };
        if let Some(chat_id) = connection.chat_room {
            membership.remove_member(&RoomId::Chat(chat_id), connection_id);
        }
        if let Some(user_id) = connection.user_room {
            membership.remove_member(&RoomId::User(user_id), connection_id);
        }
        true
    }

    /// Puts the connection in `user_<user_id>`, replacing any other user room.
    /// Chat membership is untouched.
    pub async fn join_user_room(&self, connection_id: &str, user_id: &str) -> bool {
        let mut membership = self.inner.write().await;
        let Some(connection) = membership.connections.get_mut(connection_id) else {
            return false;
        };
        let previous = connection.user_room.replace(user_id.to_string());
        if let Some(previous) = previous {
            membership.remove_member(&RoomId::User(previous), connection_id);
        }
        membership.insert_member(RoomId::User(user_id.to_string()), connection_id);
        true
    }

    /// Moves the connection into `chat_<chat_id>`, leaving whatever chat room
    /// it was in. The user room is kept.
    pub async fn join_chat_room(&self, connection_id: &str, chat_id: &str) -> bool {
        let mut membership = self.inner.write().await;
        let Some(connection) = membership.connections.get_mut(connection_id) else {
            return false;
        };
        let previous = connection.chat_room.replace(chat_id.to_string());
        if let Some(previous) = previous {
            membership.remove_member(&RoomId::Chat(previous), connection_id);
        }
        membership.insert_member(RoomId::Chat(chat_id.to_string()), connection_id);
        true
    }

    pub async fn chat_room_of(&self, connection_id: &str) -> Option<String> {
        let membership = self.inner.read().await;
        membership.connections.get(connection_id)?.chat_room.clone()
    }

    pub async fn user_room_of(&self, connection_id: &str) -> Option<String> {
        let membership = self.inner.read().await;
        membership.connections.get(connection_id)?.user_room.clone()
    }

    pub async fn members(&self, room: &RoomId) -> Vec<ConnectionId> {
        let membership = self.inner.read().await;
        membership
            .rooms
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// Outbound queues of every member of `room` except `except`.
    pub async fn recipients(
        &self,
        room: &RoomId,
        except: Option<&str>,
    ) -> Vec<(ConnectionId, Outbound)> {
        let membership = self.inner.read().await;
        let Some(members) = membership.rooms.get(room) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|id| Some(id.as_str()) != except)
            .filter_map(|id| {
                membership
                    .connections
                    .get(id)
                    .map(|connection| (id.clone(), connection.outbound.clone()))
            })
            .collect()
    }

    pub async fn outbound(&self, connection_id: &str) -> Option<Outbound> {
        let membership = self.inner.read().await;
        membership
            .connections
            .get(connection_id)
            .map(|connection| connection.outbound.clone())
    }
}
