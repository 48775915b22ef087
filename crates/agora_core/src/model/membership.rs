//! Channel and community membership records.
//!
//! A record is never deleted when a user leaves; its flags are cleared so
//! the history of blocks and moderation survives.

use super::Entity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersChannels {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub is_member: bool,
    #[serde(default)]
    pub is_moderator: bool,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub is_pending: bool,
    #[serde(default)]
    pub receive_notifications: bool,
    pub created_at: i64,
}

impl Entity for UsersChannels {
    const COLLECTION: &'static str = "usersChannels";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersCommunities {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub community_id: String,
    pub user_id: String,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub is_member: bool,
    #[serde(default)]
    pub is_moderator: bool,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub is_pending: bool,
    #[serde(default)]
    pub receive_notifications: bool,
    #[serde(default)]
    pub reputation: i64,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<i64>,
}

impl Entity for UsersCommunities {
    const COLLECTION: &'static str = "usersCommunities";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Role flags of one user in one channel or community.
///
/// Users without a record get [`Permissions::none`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub is_owner: bool,
    pub is_member: bool,
    pub is_moderator: bool,
    pub is_blocked: bool,
    pub is_pending: bool,
    pub receive_notifications: bool,
    pub reputation: i64,
}

impl Permissions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_team(&self) -> bool {
        self.is_owner || self.is_moderator
    }
}

impl From<&UsersChannels> for Permissions {
    fn from(record: &UsersChannels) -> Self {
        Self {
            is_owner: record.is_owner,
            is_member: record.is_member,
            is_moderator: record.is_moderator,
            is_blocked: record.is_blocked,
            is_pending: record.is_pending,
            receive_notifications: record.receive_notifications,
            reputation: 0,
        }
    }
}

impl From<&UsersCommunities> for Permissions {
    fn from(record: &UsersCommunities) -> Self {
        Self {
            is_owner: record.is_owner,
            is_member: record.is_member,
            is_moderator: record.is_moderator,
            is_blocked: record.is_blocked,
            is_pending: record.is_pending,
            receive_notifications: record.receive_notifications,
            reputation: record.reputation,
        }
    }
}

/// Summed reputation of one user across their communities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReputation {
    pub user_id: String,
    pub reputation: i64,
}
