//! Reputation event log.

use crate::doc::Document;
use crate::model::reputation::ReputationEvent;
use crate::model::{now_ms, Entity, Timeframe};
use crate::query::traced;
use crate::repo::{insert, RepoResult};
use crate::store::{DocumentStore, Filter};
use serde_json::Value;

pub struct ReputationRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> ReputationRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn save_event(&self, user_id: &str, community_id: &str, kind: &str, score: i64) -> RepoResult<ReputationEvent> {
        traced("save_reputation_event", (user_id, community_id, kind, score), || {
            insert(
                self.store,
                &ReputationEvent {
                    id: String::new(),
                    user_id: user_id.to_string(),
                    community_id: community_id.to_string(),
                    kind: kind.to_string(),
                    score,
                    timestamp: now_ms(),
                },
            )
        })
    }

    /// Net score the user gained inside the current `timeframe` window.
    pub fn change_in_timeframe(&self, user_id: &str, timeframe: Timeframe) -> RepoResult<i64> {
        traced("reputation_change_in_timeframe", (user_id, timeframe), || {
            let now = now_ms();
            let events = self.store.find_all(
                ReputationEvent::COLLECTION,
                &Filter::eq("userId", user_id)
                    .and(Filter::gt("timestamp", now - timeframe.current_ms()))
                    .and(Filter::lte("timestamp", now)),
            )?;
            Ok(sum_scores(&events))
        })
    }

    pub fn total(&self, user_id: &str) -> RepoResult<i64> {
        traced("total_reputation", (user_id,), || {
            let events = self
                .store
                .find_all(ReputationEvent::COLLECTION, &Filter::eq("userId", user_id))?;
            Ok(sum_scores(&events))
        })
    }
}

fn sum_scores(events: &[Document]) -> i64 {
    events
        .iter()
        .filter_map(|event| event.get("score").and_then(Value::as_i64))
        .sum()
}
