//! Reputation ledger entries.

use super::Entity;
use serde::{Deserialize, Serialize};

pub const MESSAGE_CREATED: &str = "message created";
pub const MESSAGE_DELETED: &str = "message deleted";
pub const REACTION_CREATED: &str = "reaction created";
pub const REACTION_DELETED: &str = "reaction deleted";
pub const THREAD_REACTION_CREATED: &str = "thread reaction created";
pub const THREAD_REACTION_DELETED: &str = "thread reaction deleted";
pub const THREAD_DELETED: &str = "thread deleted";
pub const THREAD_CREATED: &str = "thread created";

/// Score applied for one event type; unknown types score nothing.
pub fn score_for(kind: &str) -> i64 {
    match kind {
        MESSAGE_CREATED | REACTION_CREATED | THREAD_REACTION_CREATED | THREAD_CREATED => 1,
        MESSAGE_DELETED | REACTION_DELETED | THREAD_REACTION_DELETED | THREAD_DELETED => -1,
        _ => 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationEvent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    pub community_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub score: i64,
    pub timestamp: i64,
}

impl Entity for ReputationEvent {
    const COLLECTION: &'static str = "reputationEvents";

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::{score_for, MESSAGE_DELETED, REACTION_CREATED};

    #[test]
    fn creation_events_add_and_deletions_subtract() {
        assert_eq!(score_for(REACTION_CREATED), 1);
        assert_eq!(score_for(MESSAGE_DELETED), -1);
        assert_eq!(score_for("profile updated"), 0);
    }
}
