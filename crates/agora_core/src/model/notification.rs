//! Notifications and their per-recipient delivery state.

use super::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DIRECT_MESSAGE_THREAD_CONTEXT: &str = "DIRECT_MESSAGE_THREAD";

/// Reference to an entity taking part in a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl NotificationRef {
    pub fn new(id: &str, kind: &str, payload: Value) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub event: String,
    pub context: NotificationRef,
    #[serde(default)]
    pub actors: Vec<NotificationRef>,
    #[serde(default)]
    pub entities: Vec<NotificationRef>,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Notification {
    pub fn is_direct_message(&self) -> bool {
        self.context.kind == DIRECT_MESSAGE_THREAD_CONTEXT
    }
}

impl Entity for Notification {
    const COLLECTION: &'static str = "notifications";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Input for a notification before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub event: String,
    pub context: NotificationRef,
    pub actors: Vec<NotificationRef>,
    pub entities: Vec<NotificationRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersNotifications {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub notification_id: String,
    pub user_id: String,
    #[serde(default)]
    pub is_seen: bool,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: i64,
    pub entity_added_at: i64,
}

impl Entity for UsersNotifications {
    const COLLECTION: &'static str = "usersNotifications";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A notification as delivered to one recipient.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNotification {
    pub notification: Notification,
    pub delivery: UsersNotifications,
}
