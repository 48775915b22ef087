//! Thread and thread participant documents.

use super::{Entity, DAY_MS, HOUR_MS};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThreadContent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Snapshot appended to `edits` on every content change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEdit {
    pub content: ThreadContent,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub channel_id: String,
    pub community_id: String,
    pub creator_id: String,
    pub content: ThreadContent,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<i64>,
    #[serde(default)]
    pub watercooler: bool,
    #[serde(default)]
    pub edits: Vec<ThreadEdit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_by: Option<String>,
    #[serde(default)]
    pub message_count: i64,
    #[serde(default)]
    pub reaction_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_updated_at: Option<i64>,
    pub created_at: i64,
    pub last_active: i64,
    #[serde(default)]
    pub modified_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
}

impl Entity for Thread {
    const COLLECTION: &'static str = "threads";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Input for publishing a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThread {
    pub channel_id: String,
    pub community_id: String,
    pub content: ThreadContent,
    pub kind: Option<String>,
    pub watercooler: bool,
}

/// Ordering of channel feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedSort {
    #[default]
    Latest,
    Trending,
}

/// Age band of activity weighed by the trending score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreWindow {
    /// The last hour.
    Hourly,
    /// One hour to one day ago.
    Daily,
    /// One day to one week ago.
    Weekly,
    /// Older than a week.
    Rest,
}

impl ScoreWindow {
    /// `(from, until)` bounds relative to `now`; `from` is inclusive and
    /// `until` exclusive. A missing bound is open.
    pub fn bounds(self, now: i64) -> (Option<i64>, Option<i64>) {
        match self {
            Self::Hourly => (Some(now - HOUR_MS), None),
            Self::Daily => (Some(now - DAY_MS), Some(now - HOUR_MS)),
            Self::Weekly => (Some(now - 7 * DAY_MS), Some(now - DAY_MS)),
            Self::Rest => (None, Some(now - 7 * DAY_MS)),
        }
    }
}

/// Per-user state inside a thread (`usersThreads`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersThreads {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub thread_id: String,
    pub user_id: String,
    #[serde(default)]
    pub is_participant: bool,
    #[serde(default)]
    pub receive_notifications: bool,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<i64>,
}

impl Entity for UsersThreads {
    const COLLECTION: &'static str = "usersThreads";

    fn id(&self) -> &str {
        &self.id
    }
}
