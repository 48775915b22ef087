//! Channel and channel settings documents.

use super::Entity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub community_id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub member_count: i64,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
}

impl Entity for Channel {
    const COLLECTION: &'static str = "channels";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Input for creating a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChannel {
    pub community_id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub is_default: bool,
}

/// Input for editing a channel's presentation fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEdit {
    pub channel_id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSettings {
    #[serde(default)]
    pub token_join_enabled: bool,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BotLinks {
    #[serde(default)]
    pub thread_created: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSlackSettings {
    #[serde(default)]
    pub bot_links: BotLinks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSettings {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub channel_id: String,
    #[serde(default = "JoinSettings::disabled")]
    pub join_settings: JoinSettings,
    #[serde(default)]
    pub slack_settings: ChannelSlackSettings,
}

impl JoinSettings {
    pub fn disabled() -> Self {
        Self {
            token_join_enabled: false,
            token: None,
        }
    }
}

impl ChannelSettings {
    /// Settings every channel starts with.
    pub fn defaults(channel_id: &str) -> Self {
        Self {
            id: String::new(),
            channel_id: channel_id.to_string(),
            join_settings: JoinSettings::disabled(),
            slack_settings: ChannelSlackSettings::default(),
        }
    }
}

impl Entity for ChannelSettings {
    const COLLECTION: &'static str = "channelSettings";

    fn id(&self) -> &str {
        &self.id
    }
}
