//! Daily platform health snapshots.

use super::Entity;
use serde::{Deserialize, Serialize};

/// One stored snapshot of platform activity counts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreMetrics {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Snapshot time in epoch milliseconds.
    #[serde(default)]
    pub date: i64,
    /// Active users in the last day, week and month.
    pub dau: u64,
    pub wau: u64,
    pub mau: u64,
    /// Active communities in the last day, week and month.
    pub dac: u64,
    pub wac: u64,
    pub mac: u64,
    pub users: u64,
    pub communities: u64,
    pub threads: u64,
    pub dm_threads: u64,
}

impl Entity for CoreMetrics {
    const COLLECTION: &'static str = "coreMetrics";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Communities that were both populated and busy inside one window.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActiveCommunities {
    pub count: u64,
    pub communities: Vec<String>,
}
