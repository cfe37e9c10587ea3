use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use healio_shared::middleware::{record_delivery, record_socket_closed, record_socket_opened};
use healio_shared::types::{Notification, PresenceStatus, Role, ServerEvent};

/// Room addressing a single user's connections.
pub fn user_room(user_id: &str) -> String {
    format!("user:{user_id}")
}

/// Room addressing every connection that joined as a role.
pub fn role_room(role: Role) -> String {
    format!("role:{}", role.as_str())
}

/// In-process fan-out registry for connected websocket clients.
///
/// One instance per process, owned by the router state; tests construct their
/// own. Delivery is fire-and-forget: events to rooms with no members are
/// dropped, and durability lives in the notification store, not here.
pub struct RealtimeHub {
    /// Socket id → outbound event channel.
    connections: DashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>,
    /// Room name → member socket ids.
    rooms: DashMap<String, HashSet<Uuid>>,
    /// Reverse index: socket id → joined rooms, for cleanup on unregister.
    memberships: DashMap<Uuid, HashSet<String>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    /// Admits a new connection, returning its socket id and the receiving end
    /// of its outbound event channel.
    pub fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let socket_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(socket_id, tx);
        record_socket_opened();
        (socket_id, rx)
    }

    /// Drops a connection and every room membership it held. There is no
    /// explicit leave operation; this is the only way out of a room.
    pub fn unregister(&self, socket_id: Uuid) {
        if self.connections.remove(&socket_id).is_none() {
            return;
        }
        record_socket_closed();

        let Some((_, joined)) = self.memberships.remove(&socket_id) else {
            return;
        };
        for room in &joined {
            if let Some(mut members) = self.rooms.get_mut(room) {
                members.remove(&socket_id);
                if members.is_empty() {
                    drop(members);
                    self.rooms.remove(room);
                }
            }
        }
    }

    /// Adds the connection to a room. Idempotent; unknown socket ids are
    /// ignored (the connection raced its own close).
    pub fn join(&self, socket_id: Uuid, room: String) {
        if !self.connections.contains_key(&socket_id) {
            return;
        }
        self.rooms.entry(room.clone()).or_default().insert(socket_id);
        self.memberships.entry(socket_id).or_default().insert(room);
    }

    /// Sends an event to a single connection. Returns false if the connection
    /// is gone or its channel closed.
    pub fn send_to(&self, socket_id: Uuid, event: ServerEvent) -> bool {
        match self.connections.get(&socket_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Delivers an event to every member of a room, returning how many
    /// connections received it. A room with no members delivers to zero.
    pub fn emit_to_room(&self, room: &str, event: ServerEvent) -> usize {
        // Snapshot members before sending so no shard lock is held across
        // the fan-out.
        let members: Vec<Uuid> = self
            .rooms
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();

        let name = event.name();
        let mut delivered = 0;
        for socket_id in members {
            if self.send_to(socket_id, event.clone()) {
                delivered += 1;
            }
        }
        record_delivery(name, delivered);
        delivered
    }

    /// Delivers a notification to the recipient's personal room.
    pub fn emit_to_user(&self, user_id: &str, notification: Notification) -> usize {
        self.emit_to_room(&user_room(user_id), ServerEvent::Notification(notification))
    }

    /// Delivers a notification to every connection joined as `role`.
    pub fn emit_to_role(&self, role: Role, notification: Notification) -> usize {
        self.emit_to_room(&role_room(role), ServerEvent::Notification(notification))
    }

    /// Delivers a notification to every connected client, joined or not.
    pub fn broadcast_notification(&self, notification: Notification) -> usize {
        self.broadcast(ServerEvent::Notification(notification))
    }

    /// Announces a presence change to every connected client, including the
    /// one that reported it.
    pub fn broadcast_user_status(&self, user_id: &str, status: PresenceStatus) -> usize {
        self.broadcast(ServerEvent::UserStatus {
            user_id: user_id.to_string(),
            status,
        })
    }

    fn broadcast(&self, event: ServerEvent) -> usize {
        let targets: Vec<Uuid> = self.connections.iter().map(|e| *e.key()).collect();

        let name = event.name();
        let mut delivered = 0;
        for socket_id in targets {
            if self.send_to(socket_id, event.clone()) {
                delivered += 1;
            }
        }
        record_delivery(name, delivered);
        delivered
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}
