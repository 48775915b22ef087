//! User accounts, per-user settings and web push subscriptions.

use super::Entity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_email: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub cover_photo: Option<String>,
    #[serde(default)]
    pub timezone: Option<i64>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub fb_provider_id: Option<String>,
    #[serde(default)]
    pub google_provider_id: Option<String>,
    #[serde(default)]
    pub github_provider_id: Option<String>,
    #[serde(default)]
    pub github_username: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub last_seen: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub modified_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_last_accepted_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banned_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banned_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banned_reason: Option<String>,
}

impl Entity for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Input for registering a user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewUser {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub profile_photo: Option<String>,
    pub provider_id: Option<String>,
}

/// Profile fields a user may change; `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub username: Option<String>,
    pub timezone: Option<i64>,
    pub profile_photo: Option<String>,
    pub cover_photo: Option<String>,
}

/// Email notification kinds a user can opt out of.
pub const EMAIL_NOTIFICATION_TYPES: [&str; 6] = [
    "newMessageInThreads",
    "newMention",
    "newDirectMessage",
    "newThreadCreated",
    "dailyDigest",
    "weeklyDigest",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailToggle {
    pub email: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub types: BTreeMap<String, EmailToggle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersSettings {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    pub notifications: NotificationSettings,
}

impl UsersSettings {
    /// Every email notification enabled.
    pub fn defaults(user_id: &str) -> Self {
        let types = EMAIL_NOTIFICATION_TYPES
            .iter()
            .map(|kind| (kind.to_string(), EmailToggle { email: true }))
            .collect();
        Self {
            id: String::new(),
            user_id: user_id.to_string(),
            notifications: NotificationSettings { types },
        }
    }

    pub fn email_enabled(&self, kind: &str) -> bool {
        self.notifications
            .types
            .get(kind)
            .is_some_and(|toggle| toggle.email)
    }
}

impl Entity for UsersSettings {
    const COLLECTION: &'static str = "usersSettings";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPushKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebPushSubscription {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub endpoint: String,
    pub keys: WebPushKeys,
    pub user_id: String,
}

impl Entity for WebPushSubscription {
    const COLLECTION: &'static str = "webPushSubscriptions";

    fn id(&self) -> &str {
        &self.id
    }
}
