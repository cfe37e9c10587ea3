use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::notification::{Notification, Role};

/// Coarse online/offline marker broadcast to every connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Offline => "offline",
        }
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client→server frames. The event names are the wire contract; frames are
/// JSON `{"event": <name>, "data": <payload>}`.
///
/// There is no explicit leave event: closing the transport drops all room
/// memberships server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Join the caller's personal `user:<id>` room.
    Join(String),
    /// Join the `role:<role>` room.
    JoinRole(Role),
    /// Announce the user as online to everyone.
    UserOnline(String),
    /// Announce the user as offline to everyone.
    UserOffline(String),
}

/// Server→client frames, same envelope as [`ClientEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Ack for `join`, sent only to the joining socket.
    Connected {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "socketId")]
        socket_id: Uuid,
    },
    /// A notification delivered to a user or role room.
    Notification(Notification),
    /// Presence change, broadcast to all connected clients.
    UserStatus {
        #[serde(rename = "userId")]
        user_id: String,
        status: PresenceStatus,
    },
}

impl ServerEvent {
    /// Wire event name, used as a metric label on delivery counters.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::Notification(_) => "notification",
            ServerEvent::UserStatus { .. } => "user_status",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::notification::{NewNotification, Priority};
    use chrono::Utc;

    #[test]
    fn join_frame_carries_bare_user_id() {
        let frame = serde_json::to_value(ClientEvent::Join("doc-1".into())).unwrap();
        assert_eq!(frame["event"], "join");
        assert_eq!(frame["data"], "doc-1");
    }

    #[test]
    fn join_role_frame_uses_lowercase_role() {
        let frame = serde_json::to_value(ClientEvent::JoinRole(Role::Doctor)).unwrap();
        assert_eq!(frame["event"], "join_role");
        assert_eq!(frame["data"], "doctor");
    }

    #[test]
    fn user_status_frame_shape() {
        let event = ServerEvent::UserStatus {
            user_id: "pat-3".into(),
            status: PresenceStatus::Online,
        };
        let frame = serde_json::to_value(event).unwrap();
        assert_eq!(frame["event"], "user_status");
        assert_eq!(frame["data"]["userId"], "pat-3");
        assert_eq!(frame["data"]["status"], "online");
    }

    #[test]
    fn connected_frame_shape() {
        let socket_id = Uuid::new_v4();
        let event = ServerEvent::Connected {
            user_id: "doc-1".into(),
            socket_id,
        };
        let frame = serde_json::to_value(event).unwrap();
        assert_eq!(frame["event"], "connected");
        assert_eq!(frame["data"]["userId"], "doc-1");
        assert_eq!(frame["data"]["socketId"], socket_id.to_string());
    }

    #[test]
    fn notification_frame_embeds_record() {
        let new = NewNotification::new("doc-1", Role::Doctor, "test_booking", "New Test Booking", "Bob has booked an X-ray")
            .with_priority(Priority::High);
        let now = Utc::now();
        let notification = Notification {
            id: "n-1".into(),
            recipient_id: new.recipient_id.clone(),
            recipient_role: new.recipient_role,
            sender_id: None,
            sender_role: None,
            notification_type: new.notification_type.clone(),
            title: new.title.clone(),
            message: new.message.clone(),
            icon: "🔔".into(),
            read: false,
            action_screen: None,
            action_data: None,
            priority: new.priority,
            created_at: now,
            updated_at: now,
        };

        let frame = serde_json::to_value(ServerEvent::Notification(notification)).unwrap();
        assert_eq!(frame["event"], "notification");
        assert_eq!(frame["data"]["recipientId"], "doc-1");
        assert_eq!(frame["data"]["type"], "test_booking");
        assert_eq!(frame["data"]["read"], false);
    }

    #[test]
    fn client_events_round_trip() {
        for event in [
            ClientEvent::Join("u1".into()),
            ClientEvent::JoinRole(Role::Lab),
            ClientEvent::UserOnline("u1".into()),
            ClientEvent::UserOffline("u1".into()),
        ] {
            let json = serde_json::to_string(&event).unwrap();
            let back: ClientEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }
}
