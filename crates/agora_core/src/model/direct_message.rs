//! Direct message threads and their members.

use super::user::User;
use super::Entity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessageThread {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    pub created_at: i64,
    pub thread_last_active: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl Entity for DirectMessageThread {
    const COLLECTION: &'static str = "directMessageThreads";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersDirectMessageThreads {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub thread_id: String,
    pub user_id: String,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<i64>,
    #[serde(default)]
    pub receive_notifications: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl Entity for UsersDirectMessageThreads {
    const COLLECTION: &'static str = "usersDirectMessageThreads";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A member record together with the member's user document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectMessageMember {
    pub record: UsersDirectMessageThreads,
    pub user: User,
}
