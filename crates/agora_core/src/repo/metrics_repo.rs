//! Platform activity counts and stored core metric snapshots.
//!
//! # Invariants
//! - A community counts as active only when it has at least two members and
//!   at least one live thread active inside the window.
//! - Record counts ignore soft-deleted documents.

use crate::model::community::Community;
use crate::model::metrics::{ActiveCommunities, CoreMetrics};
use crate::model::thread::Thread;
use crate::model::user::User;
use crate::model::{now_ms, Entity, Timeframe};
use crate::query::traced;
use crate::relate;
use crate::repo::{decode_all, insert, RepoResult};
use crate::store::{DocumentStore, Filter, FindOptions};

/// Smallest member count of a community that can be active.
pub const ACTIVE_COMMUNITY_MIN_MEMBERS: i64 = 2;

pub struct MetricsRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> MetricsRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    /// Stores `metrics` stamped with the current time.
    pub fn save(&self, metrics: &CoreMetrics) -> RepoResult<CoreMetrics> {
        traced("save_core_metrics", (metrics.dau, metrics.wau, metrics.mau), || {
            insert(
                self.store,
                &CoreMetrics {
                    id: String::new(),
                    date: now_ms(),
                    ..metrics.clone()
                },
            )
        })
    }

    /// Users seen inside the current `timeframe` window.
    pub fn active_users_in_timeframe(&self, timeframe: Timeframe) -> RepoResult<u64> {
        traced("active_users_in_timeframe", (timeframe,), || {
            let now = now_ms();
            Ok(self.store.count(
                User::COLLECTION,
                &Filter::gte("lastSeen", now - timeframe.current_ms())
                    .and(Filter::lte("lastSeen", now)),
            )?)
        })
    }

    pub fn communities_with_minimum_members(&self, min_members: i64) -> RepoResult<Vec<String>> {
        traced("communities_with_minimum_members", (min_members,), || {
            let communities = self.store.find_all(
                Community::COLLECTION,
                &Filter::gte("memberCount", min_members).not_deleted(),
            )?;
            Ok(relate::string_values(&communities, "id"))
        })
    }

    /// Communities owning a live thread active inside the window.
    pub fn communities_with_active_threads_in_timeframe(
        &self,
        timeframe: Timeframe,
    ) -> RepoResult<Vec<String>> {
        traced("communities_with_active_threads_in_timeframe", (timeframe,), || {
            let now = now_ms();
            let threads = self.store.find_all(
                Thread::COLLECTION,
                &Filter::gte("lastActive", now - timeframe.current_ms())
                    .and(Filter::lte("lastActive", now))
                    .not_deleted(),
            )?;
            Ok(relate::distinct(relate::string_values(&threads, "communityId")))
        })
    }

    pub fn active_communities_in_timeframe(
        &self,
        timeframe: Timeframe,
    ) -> RepoResult<ActiveCommunities> {
        traced("active_communities_in_timeframe", (timeframe,), || {
            let populated = self.communities_with_minimum_members(ACTIVE_COMMUNITY_MIN_MEMBERS)?;
            let busy = self.communities_with_active_threads_in_timeframe(timeframe)?;
            let communities: Vec<String> = populated
                .into_iter()
                .filter(|id| busy.contains(id))
                .collect();
            Ok(ActiveCommunities {
                count: communities.len() as u64,
                communities,
            })
        })
    }

    /// Live documents in `collection`.
    pub fn record_count(&self, collection: &str) -> RepoResult<u64> {
        traced("record_count", (collection,), || {
            Ok(self.store.count(collection, &Filter::All.not_deleted())?)
        })
    }

    /// The two newest snapshots, newest first.
    pub fn last_two(&self) -> RepoResult<Vec<CoreMetrics>> {
        traced("last_two_core_metrics", (), || {
            decode_all(self.store.find(
                CoreMetrics::COLLECTION,
                &Filter::All,
                &FindOptions::new().sort_desc("date").limit(2),
            )?)
        })
    }
}
