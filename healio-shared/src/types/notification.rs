use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Healio account roles, also used for role-room addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Lab,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Lab => "lab",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "lab" => Ok(Role::Lab),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Originator identity tag. `System` marks notifications not sent by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Patient,
    Doctor,
    Lab,
    Admin,
    System,
}

impl From<Role> for SenderRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Patient => SenderRole::Patient,
            Role::Doctor => SenderRole::Doctor,
            Role::Lab => SenderRole::Lab,
            Role::Admin => SenderRole::Admin,
        }
    }
}

/// Advisory delivery priority; no behavioral difference server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Scalar value inside `actionData`. Nested structures are deliberately not
/// representable; the payload is an opaque navigation hint, not a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

pub type ActionData = BTreeMap<String, ActionValue>;

pub const DEFAULT_ICON: &str = "🔔";

/// A persisted notification as served over REST and pushed over the socket.
///
/// `id` is assigned once at creation and never reused. `read` only ever
/// transitions false→true. Everything except `read`/`updatedAt` is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller supplies to create a notification. The server assigns
/// `id`, `read`, `createdAt`, `updatedAt` and fills the icon/priority
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_screen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_data: Option<ActionData>,
    #[serde(default)]
    pub priority: Priority,
}

impl NewNotification {
    pub fn new(
        recipient_id: impl Into<String>,
        recipient_role: Role,
        notification_type: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            recipient_role,
            sender_id: None,
            sender_role: None,
            notification_type: notification_type.into(),
            title: title.into(),
            message: message.into(),
            icon: None,
            action_screen: None,
            action_data: None,
            priority: Priority::default(),
        }
    }

    pub fn with_sender(mut self, sender_id: impl Into<String>, sender_role: SenderRole) -> Self {
        self.sender_id = Some(sender_id.into());
        self.sender_role = Some(sender_role);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_action(mut self, screen: impl Into<String>, data: Option<ActionData>) -> Self {
        self.action_screen = Some(screen.into());
        self.action_data = data;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}
