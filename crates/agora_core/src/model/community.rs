//! Community, community settings and curated content documents.

use super::channel::JoinSettings;
use super::Entity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub cover_photo: Option<String>,
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub administrator_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_administrator_email: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub member_count: i64,
    #[serde(default)]
    pub redirect: bool,
    #[serde(default)]
    pub noindex: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watercooler_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_thread_id: Option<String>,
    pub created_at: i64,
    #[serde(default)]
    pub modified_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
}

impl Entity for Community {
    const COLLECTION: &'static str = "communities";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommunity {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub profile_photo: Option<String>,
    pub cover_photo: Option<String>,
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityEdit {
    pub community_id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub watercooler_id: Option<String>,
    pub profile_photo: Option<String>,
    pub cover_photo: Option<String>,
}

/// Current vs previous window counts for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Growth {
    pub current_period_count: u64,
    pub prev_period_count: u64,
    /// Percentage change; `None` when the previous window is empty.
    pub growth: Option<i64>,
}

impl Growth {
    pub fn new(current: u64, previous: u64) -> Self {
        let growth = if previous == 0 {
            None
        } else {
            let rate = (current as f64 - previous as f64) / previous as f64;
            Some((rate * 100.0).round() as i64)
        };
        Self {
            current_period_count: current,
            prev_period_count: previous,
            growth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandedLogin {
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommunitySlackSettings {
    #[serde(default)]
    pub connected_at: Option<i64>,
    #[serde(default)]
    pub connected_by: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub invites_sent_at: Option<i64>,
    #[serde(default)]
    pub invites_member_count: Option<i64>,
    #[serde(default)]
    pub invites_custom_message: Option<String>,
}

/// Fields supplied when a Slack workspace is connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackConnection {
    pub connected_by: String,
    pub team_name: String,
    pub team_id: String,
    pub scope: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunitySettings {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub community_id: String,
    #[serde(default = "BrandedLogin::disabled")]
    pub branded_login: BrandedLogin,
    #[serde(default)]
    pub slack_settings: CommunitySlackSettings,
    #[serde(default = "JoinSettings::disabled")]
    pub join_settings: JoinSettings,
}

impl BrandedLogin {
    pub fn disabled() -> Self {
        Self {
            is_enabled: false,
            message: None,
        }
    }
}

impl CommunitySettings {
    pub fn defaults(community_id: &str) -> Self {
        Self {
            id: String::new(),
            community_id: community_id.to_string(),
            branded_login: BrandedLogin::disabled(),
            slack_settings: CommunitySlackSettings::default(),
            join_settings: JoinSettings::disabled(),
        }
    }
}

impl Entity for CommunitySettings {
    const COLLECTION: &'static str = "communitySettings";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Editorial list of community slugs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuratedContent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Vec<String>,
}

impl Entity for CuratedContent {
    const COLLECTION: &'static str = "curatedContent";

    fn id(&self) -> &str {
        &self.id
    }
}
