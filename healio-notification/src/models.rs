use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};

use healio_shared::types::{
    ActionData, NewNotification, Notification, Priority, Role, SenderRole, DEFAULT_ICON,
};

/// Storage form of a notification. The BSON-specific representation lives
/// here; the API/wire form is [`healio_shared::types::Notification`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub recipient_id: String,
    pub recipient_role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_role: Option<SenderRole>,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub icon: String,
    pub read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_screen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_data: Option<ActionData>,
    pub priority: Priority,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

impl NotificationDocument {
    pub const COLLECTION: &'static str = "notifications";

    /// Document ready for insertion, with creation defaults applied.
    /// `createdAt` and `updatedAt` are equal at creation.
    pub fn from_new(data: NewNotification, now: BsonDateTime) -> Self {
        Self {
            id: None,
            recipient_id: data.recipient_id,
            recipient_role: data.recipient_role,
            sender_id: data.sender_id,
            sender_role: data.sender_role,
            notification_type: data.notification_type,
            title: data.title,
            message: data.message,
            icon: data.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
            read: false,
            action_screen: data.action_screen,
            action_data: data.action_data,
            priority: data.priority,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn into_notification(self) -> Notification {
        Notification {
            id: self.id.map(|id| id.to_hex()).unwrap_or_default(),
            recipient_id: self.recipient_id,
            recipient_role: self.recipient_role,
            sender_id: self.sender_id,
            sender_role: self.sender_role,
            notification_type: self.notification_type,
            title: self.title,
            message: self.message,
            icon: self.icon,
            read: self.read,
            action_screen: self.action_screen,
            action_data: self.action_data,
            priority: self.priority,
            created_at: self.created_at.to_chrono(),
            updated_at: self.updated_at.to_chrono(),
        }
    }
}

/// Turn creation data into a full record with a fresh id and timestamps.
///
/// Used by the in-memory store and by role broadcasts, whose records are
/// delivered live but never persisted.
pub fn materialize_notification(data: NewNotification) -> Notification {
    let now = Utc::now();
    Notification {
        id: ObjectId::new().to_hex(),
        recipient_id: data.recipient_id,
        recipient_role: data.recipient_role,
        sender_id: data.sender_id,
        sender_role: data.sender_role,
        notification_type: data.notification_type,
        title: data.title,
        message: data.message,
        icon: data.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
        read: false,
        action_screen: data.action_screen,
        action_data: data.action_data,
        priority: data.priority,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_serializes_with_mongo_field_names() {
        let data = NewNotification::new("doc-1", Role::Doctor, "appointment_request", "Title", "Body");
        let mut document = NotificationDocument::from_new(data, BsonDateTime::now());
        document.id = Some(ObjectId::new());

        let bson = mongodb::bson::to_document(&document).unwrap();
        assert!(bson.contains_key("_id"));
        assert!(bson.contains_key("recipientId"));
        assert!(bson.contains_key("createdAt"));
        assert_eq!(bson.get_str("type").unwrap(), "appointment_request");
        assert_eq!(bson.get_str("icon").unwrap(), DEFAULT_ICON);
    }

    #[test]
    fn materialize_assigns_unique_ids() {
        let a = materialize_notification(NewNotification::new("u1", Role::Patient, "t", "a", "b"));
        let b = materialize_notification(NewNotification::new("u1", Role::Patient, "t", "a", "b"));
        assert_ne!(a.id, b.id);
        assert!(!a.read);
        assert_eq!(a.created_at, a.updated_at);
    }
}
