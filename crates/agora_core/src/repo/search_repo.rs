//! Id lookups that scope search results to what a user may see.
//!
//! # Invariants
//! - Only live threads, channels and communities contribute ids.
//! - Ids keep the order of the records they were derived from; repeated ids
//!   are collapsed.

use crate::doc::Document;
use crate::model::channel::Channel;
use crate::model::community::Community;
use crate::model::membership::{UsersChannels, UsersCommunities};
use crate::model::thread::Thread;
use crate::model::Entity;
use crate::query::traced;
use crate::relate;
use crate::repo::channel_repo::active_role;
use crate::repo::RepoResult;
use crate::store::{DocumentStore, Filter};

pub struct SearchRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> SearchRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn public_channel_ids_in_community(&self, community_id: &str) -> RepoResult<Vec<String>> {
        traced("search_public_channel_ids_in_community", (community_id,), || {
            self.channel_ids_in_community(community_id, false)
        })
    }

    pub fn private_channel_ids_in_community(&self, community_id: &str) -> RepoResult<Vec<String>> {
        traced("search_private_channel_ids_in_community", (community_id,), || {
            self.channel_ids_in_community(community_id, true)
        })
    }

    /// Channels holding the user's threads that are public.
    pub fn public_channel_ids_for_users_threads(&self, user_id: &str) -> RepoResult<Vec<String>> {
        traced("search_public_channel_ids_for_users_threads", (user_id,), || {
            self.thread_scope_ids(user_id, "channelId", Channel::COLLECTION, false)
        })
    }

    pub fn private_channel_ids_for_users_threads(&self, user_id: &str) -> RepoResult<Vec<String>> {
        traced("search_private_channel_ids_for_users_threads", (user_id,), || {
            self.thread_scope_ids(user_id, "channelId", Channel::COLLECTION, true)
        })
    }

    pub fn public_community_ids_for_users_threads(&self, user_id: &str) -> RepoResult<Vec<String>> {
        traced("search_public_community_ids_for_users_threads", (user_id,), || {
            self.thread_scope_ids(user_id, "communityId", Community::COLLECTION, false)
        })
    }

    pub fn private_community_ids_for_users_threads(&self, user_id: &str) -> RepoResult<Vec<String>> {
        traced("search_private_community_ids_for_users_threads", (user_id,), || {
            self.thread_scope_ids(user_id, "communityId", Community::COLLECTION, true)
        })
    }

    /// Live channels where the user is member, moderator or owner.
    pub fn users_joined_channels(&self, user_id: &str) -> RepoResult<Vec<String>> {
        traced("search_users_joined_channels", (user_id,), || {
            self.joined_channel_ids(user_id, None)
        })
    }

    pub fn users_joined_private_channel_ids(&self, user_id: &str) -> RepoResult<Vec<String>> {
        traced("search_users_joined_private_channel_ids", (user_id,), || {
            self.joined_channel_ids(user_id, Some(true))
        })
    }

    /// Live communities the user is a member of.
    pub fn users_joined_communities(&self, user_id: &str) -> RepoResult<Vec<String>> {
        traced("search_users_joined_communities", (user_id,), || {
            self.joined_community_ids(user_id, None)
        })
    }

    pub fn users_joined_private_community_ids(&self, user_id: &str) -> RepoResult<Vec<String>> {
        traced("search_users_joined_private_community_ids", (user_id,), || {
            self.joined_community_ids(user_id, Some(true))
        })
    }

    fn channel_ids_in_community(&self, community_id: &str, is_private: bool) -> RepoResult<Vec<String>> {
        let channels = self.store.find_all(
            Channel::COLLECTION,
            &Filter::eq("communityId", community_id)
                .and(Filter::eq("isPrivate", is_private))
                .not_deleted(),
        )?;
        Ok(relate::string_values(&channels, "id"))
    }

    /// Values of `field` on the user's live threads whose `collection`
    /// document has the given privacy.
    fn thread_scope_ids(
        &self,
        user_id: &str,
        field: &str,
        collection: &str,
        is_private: bool,
    ) -> RepoResult<Vec<String>> {
        let threads = self.store.find_all(
            Thread::COLLECTION,
            &Filter::eq("creatorId", user_id).not_deleted(),
        )?;
        let rows = self.store.join_filtered(
            relate::pluck(&threads, &[field]),
            field,
            collection,
            "id",
            &Filter::eq("isPrivate", is_private).not_deleted(),
        )?;
        let scoped: Vec<Document> = rows.into_iter().map(|row| row.left).collect();
        Ok(relate::distinct(relate::string_values(&scoped, field)))
    }

    fn joined_channel_ids(&self, user_id: &str, is_private: Option<bool>) -> RepoResult<Vec<String>> {
        let records = self.store.find_all(
            UsersChannels::COLLECTION,
            &Filter::eq("userId", user_id).and(active_role()),
        )?;
        self.live_targets(records, "channelId", Channel::COLLECTION, is_private)
    }

    fn joined_community_ids(&self, user_id: &str, is_private: Option<bool>) -> RepoResult<Vec<String>> {
        let records = self.store.find_all(
            UsersCommunities::COLLECTION,
            &Filter::eq("userId", user_id).and(Filter::eq("isMember", true)),
        )?;
        self.live_targets(records, "communityId", Community::COLLECTION, is_private)
    }

    fn live_targets(
        &self,
        records: Vec<Document>,
        field: &str,
        collection: &str,
        is_private: Option<bool>,
    ) -> RepoResult<Vec<String>> {
        let mut filter = Filter::All.not_deleted();
        if let Some(is_private) = is_private {
            filter = filter.and(Filter::eq("isPrivate", is_private));
        }
        let rows = self
            .store
            .join_filtered(records, field, collection, "id", &filter)?;
        let targets: Vec<Document> = rows.into_iter().map(|row| row.right).collect();
        Ok(relate::distinct(relate::string_values(&targets, "id")))
    }
}
