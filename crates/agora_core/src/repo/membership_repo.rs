//! Channel (`usersChannels`) and community (`usersCommunities`) membership
//! repositories.
//!
//! # Responsibility
//! - Apply role transitions to the per-user membership record.
//! - List users per role and resolve permissions with defaults.
//!
//! # Invariants
//! - One record per (user, channel) and per (user, community); transitions
//!   update it in place and never delete it.
//! - Transitions on a missing record return `None` and change nothing,
//!   except the create-or-update flows.
//! - Member counters are not touched here; callers keep them in sync.

use crate::doc::Document;
use crate::model::channel::Channel;
use crate::model::membership::{Permissions, UserReputation, UsersChannels, UsersCommunities};
use crate::model::{now_ms, Entity, Page};
use crate::query::traced;
use crate::relate;
use crate::repo::channel_repo::active_role;
use crate::repo::{decode_all, decode_opt, insert, paged, RepoResult};
use crate::store::{DocumentStore, Filter, FindOptions, Update};
use serde_json::Value;

const DEFAULT_LISTING_SIZE: u64 = 25;

fn listing(page: Page) -> Page {
    Page {
        first: Some(page.first.unwrap_or(DEFAULT_LISTING_SIZE)),
        after: page.after,
    }
}

pub struct ChannelMembershipRepository<'a> {
    store: &'a DocumentStore<'a>,
}

fn channel_record(channel_id: &str, user_id: &str) -> Filter {
    Filter::eq("channelId", channel_id).and(Filter::eq("userId", user_id))
}

impl<'a> ChannelMembershipRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn record(&self, channel_id: &str, user_id: &str) -> RepoResult<Option<UsersChannels>> {
        traced("users_channels_record", (channel_id, user_id), || {
            decode_opt(
                self.store
                    .find_one(UsersChannels::COLLECTION, &channel_record(channel_id, user_id))?,
            )
        })
    }

    /// Owner record for the creator of a new channel.
    pub fn create_owner(&self, channel_id: &str, user_id: &str) -> RepoResult<UsersChannels> {
        traced("create_owner_in_channel", (channel_id, user_id), || {
            insert(
                self.store,
                &UsersChannels {
                    id: String::new(),
                    channel_id: channel_id.to_string(),
                    user_id: user_id.to_string(),
                    is_owner: true,
                    is_member: true,
                    is_moderator: false,
                    is_blocked: false,
                    is_pending: false,
                    receive_notifications: true,
                    created_at: now_ms(),
                },
            )
        })
    }

    /// Joins the user; an existing unblocked record is re-activated.
    ///
    /// Returns `None` when the user is blocked in the channel.
    pub fn create_member(&self, channel_id: &str, user_id: &str) -> RepoResult<Option<UsersChannels>> {
        traced("create_member_in_channel", (channel_id, user_id), || {
            if self.record(channel_id, user_id)?.is_some() {
                return self.transition(
                    &channel_record(channel_id, user_id).and(Filter::ne("isBlocked", true)),
                    Update::new()
                        .set("createdAt", now_ms())
                        .set("isMember", true)
                        .set("receiveNotifications", true),
                );
            }
            insert(
                self.store,
                &UsersChannels {
                    id: String::new(),
                    channel_id: channel_id.to_string(),
                    user_id: user_id.to_string(),
                    is_owner: false,
                    is_member: true,
                    is_moderator: false,
                    is_blocked: false,
                    is_pending: false,
                    receive_notifications: true,
                    created_at: now_ms(),
                },
            )
            .map(Some)
        })
    }

    pub fn remove_member(&self, channel_id: &str, user_id: &str) -> RepoResult<Option<UsersChannels>> {
        traced("remove_member_in_channel", (channel_id, user_id), || {
            self.transition(
                &channel_record(channel_id, user_id),
                Update::new()
                    .set("isModerator", false)
                    .set("isMember", false)
                    .set("isPending", false)
                    .set("receiveNotifications", false),
            )
        })
    }

    /// Clears every membership of a channel.
    pub fn remove_members(&self, channel_id: &str) -> RepoResult<Vec<UsersChannels>> {
        traced("remove_members_in_channel", (channel_id,), || {
            decode_all(self.store.update_many(
                UsersChannels::COLLECTION,
                &Filter::eq("channelId", channel_id),
                &Update::new()
                    .set("isMember", false)
                    .set("receiveNotifications", false),
            )?)
        })
    }

    pub fn unblock(&self, channel_id: &str, user_id: &str) -> RepoResult<Option<UsersChannels>> {
        traced("unblock_member_in_channel", (channel_id, user_id), || {
            self.transition(
                &channel_record(channel_id, user_id),
                Update::new().set("isBlocked", false),
            )
        })
    }

    /// Requests to join a private channel.
    pub fn create_or_update_pending(&self, channel_id: &str, user_id: &str) -> RepoResult<UsersChannels> {
        traced("create_pending_user_in_channel", (channel_id, user_id), || {
            if let Some(record) = self.transition(
                &channel_record(channel_id, user_id),
                Update::new().set("isPending", true),
            )? {
                return Ok(record);
            }
            insert(
                self.store,
                &UsersChannels {
                    id: String::new(),
                    channel_id: channel_id.to_string(),
                    user_id: user_id.to_string(),
                    is_owner: false,
                    is_member: false,
                    is_moderator: false,
                    is_blocked: false,
                    is_pending: true,
                    receive_notifications: false,
                    created_at: now_ms(),
                },
            )
        })
    }

    /// Drops every pending request of a channel.
    pub fn remove_pending(&self, channel_id: &str) -> RepoResult<Vec<UsersChannels>> {
        traced("remove_pending_users_in_channel", (channel_id,), || {
            decode_all(self.store.update_many(
                UsersChannels::COLLECTION,
                &Filter::eq("channelId", channel_id).and(Filter::eq("isPending", true)),
                &Update::new()
                    .set("isPending", false)
                    .set("receiveNotifications", false),
            )?)
        })
    }

    pub fn block(&self, channel_id: &str, user_id: &str) -> RepoResult<Option<UsersChannels>> {
        traced("block_user_in_channel", (channel_id, user_id), || {
            self.transition(
                &channel_record(channel_id, user_id),
                Update::new()
                    .set("isMember", false)
                    .set("isModerator", false)
                    .set("isOwner", false)
                    .set("isPending", false)
                    .set("isBlocked", true)
                    .set("receiveNotifications", false),
            )
        })
    }

    pub fn approve_pending(&self, channel_id: &str, user_id: &str) -> RepoResult<Option<UsersChannels>> {
        traced("approve_pending_user_in_channel", (channel_id, user_id), || {
            self.transition(
                &channel_record(channel_id, user_id).and(Filter::eq("isPending", true)),
                Update::new()
                    .set("isMember", true)
                    .set("isPending", false)
                    .set("receiveNotifications", true),
            )
        })
    }

    /// Turns every pending request of a channel into a membership.
    pub fn approve_all_pending(&self, channel_id: &str) -> RepoResult<Vec<UsersChannels>> {
        traced("approve_pending_users_in_channel", (channel_id,), || {
            decode_all(self.store.update_many(
                UsersChannels::COLLECTION,
                &Filter::eq("channelId", channel_id).and(Filter::eq("isPending", true)),
                &Update::new()
                    .set("isMember", true)
                    .set("isPending", false)
                    .set("receiveNotifications", true),
            )?)
        })
    }

    /// Unblocks a blocked user and makes them a member.
    pub fn approve_blocked(&self, channel_id: &str, user_id: &str) -> RepoResult<Option<UsersChannels>> {
        traced("approve_blocked_user_in_channel", (channel_id, user_id), || {
            self.transition(
                &channel_record(channel_id, user_id).and(Filter::eq("isBlocked", true)),
                Update::new()
                    .set("isMember", true)
                    .set("isBlocked", false)
                    .set("receiveNotifications", false),
            )
        })
    }

    pub fn remove_moderator(&self, channel_id: &str, user_id: &str) -> RepoResult<Option<UsersChannels>> {
        traced("remove_moderator_in_channel", (channel_id, user_id), || {
            self.transition(
                &channel_record(channel_id, user_id),
                Update::new().set("isModerator", false),
            )
        })
    }

    /// Default channels of a community the user is neither a member of nor
    /// blocked in.
    pub fn unjoined_default_channels(&self, community_id: &str, user_id: &str) -> RepoResult<Vec<String>> {
        traced("unjoined_default_channels", (community_id, user_id), || {
            let defaults = self.store.find_all(
                Channel::COLLECTION,
                &Filter::eq("communityId", community_id)
                    .and(Filter::eq("isDefault", true))
                    .not_deleted(),
            )?;
            let records = self.store.find_all(
                UsersChannels::COLLECTION,
                &Filter::eq("userId", user_id).and(Filter::any_of(vec![
                    Filter::eq("isMember", true),
                    Filter::eq("isBlocked", true),
                ])),
            )?;
            let settled = relate::string_values(&records, "channelId");
            Ok(relate::string_values(&defaults, "id")
                .into_iter()
                .filter(|channel_id| !settled.contains(channel_id))
                .collect())
        })
    }

    /// Sets the notification flag on an existing record.
    pub fn set_notifications(
        &self,
        channel_id: &str,
        user_id: &str,
        enabled: bool,
    ) -> RepoResult<Option<UsersChannels>> {
        traced("toggle_user_channel_notifications", (channel_id, user_id, enabled), || {
            self.transition(
                &channel_record(channel_id, user_id),
                Update::new().set("receiveNotifications", enabled),
            )
        })
    }

    /// Clears every channel role of a user; returns the records that were
    /// memberships before the change.
    pub fn remove_all_for_user(&self, user_id: &str) -> RepoResult<Vec<UsersChannels>> {
        traced("remove_users_channel_memberships", (user_id,), || {
            let previous: Vec<UsersChannels> = decode_all(self.store.find_all(
                UsersChannels::COLLECTION,
                &Filter::eq("userId", user_id).and(Filter::eq("isMember", true)),
            )?)?;
            self.store.update_many(
                UsersChannels::COLLECTION,
                &Filter::eq("userId", user_id),
                &Update::new()
                    .set("isOwner", false)
                    .set("isModerator", false)
                    .set("isMember", false)
                    .set("receiveNotifications", false),
            )?;
            Ok(previous)
        })
    }

    pub fn members(&self, channel_id: &str, page: Page) -> RepoResult<Vec<String>> {
        self.user_ids(
            "members_in_channel",
            Filter::eq("channelId", channel_id)
                .and(active_role())
                .and(Filter::ne("isBlocked", true)),
            listing(page),
        )
    }

    pub fn pending(&self, channel_id: &str) -> RepoResult<Vec<String>> {
        self.user_ids(
            "pending_users_in_channel",
            Filter::eq("channelId", channel_id).and(Filter::eq("isPending", true)),
            Page::default(),
        )
    }

    pub fn blocked(&self, channel_id: &str) -> RepoResult<Vec<String>> {
        self.user_ids(
            "blocked_users_in_channel",
            Filter::eq("channelId", channel_id).and(Filter::eq("isBlocked", true)),
            Page::default(),
        )
    }

    pub fn moderators(&self, channel_id: &str) -> RepoResult<Vec<String>> {
        self.user_ids(
            "moderators_in_channel",
            Filter::eq("channelId", channel_id).and(Filter::eq("isModerator", true)),
            Page::default(),
        )
    }

    pub fn owners(&self, channel_id: &str) -> RepoResult<Vec<String>> {
        self.user_ids(
            "owners_in_channel",
            Filter::eq("channelId", channel_id).and(Filter::eq("isOwner", true)),
            Page::default(),
        )
    }

    /// Role flags of the user, all false when no record exists.
    pub fn permissions(&self, channel_id: &str, user_id: &str) -> RepoResult<Permissions> {
        Ok(self
            .record(channel_id, user_id)?
            .map_or_else(Permissions::none, |record| Permissions::from(&record)))
    }

    /// Every record of a user, whatever the role.
    pub fn records_for_user(&self, user_id: &str) -> RepoResult<Vec<UsersChannels>> {
        traced("user_users_channels", (user_id,), || {
            decode_all(
                self.store
                    .find_all(UsersChannels::COLLECTION, &Filter::eq("userId", user_id))?,
            )
        })
    }

    /// Channels where the user holds any role.
    pub fn channel_ids_for_user(&self, user_id: &str) -> RepoResult<Vec<String>> {
        traced("user_channel_ids", (user_id,), || {
            let records = self.store.find_all(
                UsersChannels::COLLECTION,
                &Filter::eq("userId", user_id).and(active_role()),
            )?;
            Ok(relate::string_values(&records, "channelId"))
        })
    }

    fn transition(&self, filter: &Filter, update: Update) -> RepoResult<Option<UsersChannels>> {
        decode_opt(self.store.update_one(UsersChannels::COLLECTION, filter, &update)?)
    }

    fn user_ids(&self, name: &str, filter: Filter, page: Page) -> RepoResult<Vec<String>> {
        traced(name, (page,), || {
            let records = self.store.find(
                UsersChannels::COLLECTION,
                &filter,
                &paged(FindOptions::new(), page),
            )?;
            Ok(relate::string_values(&records, "userId"))
        })
    }
}

pub struct CommunityMembershipRepository<'a> {
    store: &'a DocumentStore<'a>,
}

fn community_record(community_id: &str, user_id: &str) -> Filter {
    Filter::eq("communityId", community_id).and(Filter::eq("userId", user_id))
}

impl<'a> CommunityMembershipRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn record(&self, community_id: &str, user_id: &str) -> RepoResult<Option<UsersCommunities>> {
        traced("users_communities_record", (community_id, user_id), || {
            decode_opt(self.store.find_one(
                UsersCommunities::COLLECTION,
                &community_record(community_id, user_id),
            )?)
        })
    }

    pub fn create_owner(&self, community_id: &str, user_id: &str) -> RepoResult<UsersCommunities> {
        traced("create_owner_in_community", (community_id, user_id), || {
            insert(self.store, &new_record(community_id, user_id, true, true, false))
        })
    }

    /// Joins the user; an existing record is re-activated.
    pub fn create_member(&self, community_id: &str, user_id: &str) -> RepoResult<UsersCommunities> {
        traced("create_member_in_community", (community_id, user_id), || {
            let now = now_ms();
            if let Some(record) = self.transition(
                &community_record(community_id, user_id),
                Update::new()
                    .set("createdAt", now)
                    .set("isMember", true)
                    .set("receiveNotifications", true)
                    .set("lastSeen", now),
            )? {
                return Ok(record);
            }
            insert(self.store, &new_record(community_id, user_id, false, true, false))
        })
    }

    pub fn remove_member(&self, community_id: &str, user_id: &str) -> RepoResult<Option<UsersCommunities>> {
        traced("remove_member_in_community", (community_id, user_id), || {
            self.transition(
                &community_record(community_id, user_id),
                Update::new()
                    .set("isModerator", false)
                    .set("isMember", false)
                    .set("receiveNotifications", false),
            )
        })
    }

    /// Clears every membership of a community.
    pub fn remove_members(&self, community_id: &str) -> RepoResult<Vec<UsersCommunities>> {
        traced("remove_members_in_community", (community_id,), || {
            decode_all(self.store.update_many(
                UsersCommunities::COLLECTION,
                &Filter::eq("communityId", community_id),
                &Update::new()
                    .set("isMember", false)
                    .set("receiveNotifications", false),
            )?)
        })
    }

    pub fn block(&self, community_id: &str, user_id: &str) -> RepoResult<Option<UsersCommunities>> {
        traced("block_user_in_community", (community_id, user_id), || {
            self.transition(
                &community_record(community_id, user_id),
                Update::new()
                    .set("isMember", false)
                    .set("isPending", false)
                    .set("isBlocked", true)
                    .set("isModerator", false)
                    .set("receiveNotifications", false),
            )
        })
    }

    /// Unblocks a blocked user and makes them a member.
    pub fn unblock(&self, community_id: &str, user_id: &str) -> RepoResult<Option<UsersCommunities>> {
        traced("unblock_user_in_community", (community_id, user_id), || {
            self.transition(
                &community_record(community_id, user_id).and(Filter::eq("isBlocked", true)),
                Update::new()
                    .set("isModerator", false)
                    .set("isMember", true)
                    .set("isBlocked", false)
                    .set("isPending", false)
                    .set("receiveNotifications", true),
            )
        })
    }

    pub fn make_moderator(&self, community_id: &str, user_id: &str) -> RepoResult<Option<UsersCommunities>> {
        traced("make_member_moderator_in_community", (community_id, user_id), || {
            self.transition(
                &community_record(community_id, user_id),
                Update::new()
                    .set("isBlocked", false)
                    .set("isMember", true)
                    .set("isModerator", true)
                    .set("receiveNotifications", true),
            )
        })
    }

    pub fn remove_moderator(&self, community_id: &str, user_id: &str) -> RepoResult<Option<UsersCommunities>> {
        traced("remove_moderator_in_community", (community_id, user_id), || {
            self.transition(
                &community_record(community_id, user_id),
                Update::new().set("isModerator", false),
            )
        })
    }

    /// Demotes every moderator of a community to member.
    pub fn remove_moderators(&self, community_id: &str) -> RepoResult<Vec<UsersCommunities>> {
        traced("remove_moderators_in_community", (community_id,), || {
            decode_all(self.store.update_many(
                UsersCommunities::COLLECTION,
                &Filter::eq("communityId", community_id).and(Filter::eq("isModerator", true)),
                &Update::new().set("isModerator", false),
            )?)
        })
    }

    /// Clears every community role of a user; returns the records that were
    /// memberships before the change.
    pub fn remove_all_for_user(&self, user_id: &str) -> RepoResult<Vec<UsersCommunities>> {
        traced("remove_users_community_memberships", (user_id,), || {
            let previous: Vec<UsersCommunities> = decode_all(self.store.find_all(
                UsersCommunities::COLLECTION,
                &Filter::eq("userId", user_id).and(Filter::eq("isMember", true)),
            )?)?;
            self.store.update_many(
                UsersCommunities::COLLECTION,
                &Filter::eq("userId", user_id),
                &Update::new()
                    .set("isOwner", false)
                    .set("isModerator", false)
                    .set("isMember", false)
                    .set("isPending", false)
                    .set("receiveNotifications", false),
            )?;
            Ok(previous)
        })
    }

    /// Requests to join a private community.
    pub fn create_pending(&self, community_id: &str, user_id: &str) -> RepoResult<UsersCommunities> {
        traced("create_pending_member_in_community", (community_id, user_id), || {
            if let Some(record) = self.transition(
                &community_record(community_id, user_id),
                Update::new()
                    .set("createdAt", now_ms())
                    .set("isPending", true),
            )? {
                return Ok(record);
            }
            insert(self.store, &new_record(community_id, user_id, false, false, true))
        })
    }

    pub fn remove_pending(&self, community_id: &str, user_id: &str) -> RepoResult<Option<UsersCommunities>> {
        traced("remove_pending_member_in_community", (community_id, user_id), || {
            self.transition(
                &community_record(community_id, user_id),
                Update::new().set("isPending", false),
            )
        })
    }

    pub fn approve_pending(&self, community_id: &str, user_id: &str) -> RepoResult<Option<UsersCommunities>> {
        traced("approve_pending_member_in_community", (community_id, user_id), || {
            self.transition(
                &community_record(community_id, user_id).and(Filter::eq("isPending", true)),
                Update::new()
                    .set("isMember", true)
                    .set("isPending", false)
                    .set("receiveNotifications", true),
            )
        })
    }

    pub fn block_pending(&self, community_id: &str, user_id: &str) -> RepoResult<Option<UsersCommunities>> {
        traced("block_pending_member_in_community", (community_id, user_id), || {
            self.transition(
                &community_record(community_id, user_id).and(Filter::eq("isPending", true)),
                Update::new()
                    .set("isPending", false)
                    .set("isBlocked", true),
            )
        })
    }

    /// Member user ids ordered by reputation, highest first.
    pub fn members(&self, community_id: &str, page: Page) -> RepoResult<Vec<String>> {
        self.user_ids(
            "members_in_community",
            Filter::eq("communityId", community_id).and(Filter::eq("isMember", true)),
            FindOptions::new().sort_desc("reputation"),
            page,
        )
    }

    pub fn blocked(&self, community_id: &str, page: Page) -> RepoResult<Vec<String>> {
        self.user_ids(
            "blocked_users_in_community",
            Filter::eq("communityId", community_id)
                .and(Filter::ne("isMember", true))
                .and(Filter::eq("isBlocked", true)),
            FindOptions::new(),
            page,
        )
    }

    pub fn pending(&self, community_id: &str, page: Page) -> RepoResult<Vec<String>> {
        self.user_ids(
            "pending_users_in_community",
            Filter::eq("communityId", community_id)
                .and(Filter::ne("isMember", true))
                .and(Filter::eq("isPending", true)),
            FindOptions::new(),
            page,
        )
    }

    pub fn moderators(&self, community_id: &str, page: Page) -> RepoResult<Vec<String>> {
        self.user_ids(
            "moderators_in_community",
            Filter::eq("communityId", community_id).and(Filter::eq("isModerator", true)),
            FindOptions::new(),
            page,
        )
    }

    pub fn owners(&self, community_id: &str, page: Page) -> RepoResult<Vec<String>> {
        self.user_ids(
            "owners_in_community",
            Filter::eq("communityId", community_id).and(Filter::eq("isOwner", true)),
            FindOptions::new(),
            page,
        )
    }

    /// Owners and moderators.
    pub fn team(&self, community_id: &str, page: Page) -> RepoResult<Vec<String>> {
        self.user_ids(
            "team_members_in_community",
            Filter::eq("communityId", community_id).and(Filter::any_of(vec![
                Filter::eq("isOwner", true),
                Filter::eq("isModerator", true),
            ])),
            FindOptions::new(),
            page,
        )
    }

    /// Role flags of the user, all false when no record exists.
    pub fn permissions(&self, community_id: &str, user_id: &str) -> RepoResult<Permissions> {
        Ok(self
            .record(community_id, user_id)?
            .map_or_else(Permissions::none, |record| Permissions::from(&record)))
    }

    /// Permissions for each `(user_id, community_id)` pair, aligned with input.
    pub fn permissions_many(&self, pairs: &[(String, String)]) -> RepoResult<Vec<Permissions>> {
        pairs
            .iter()
            .map(|(user_id, community_id)| self.permissions(community_id, user_id))
            .collect()
    }

    /// Reputation summed over the user's memberships.
    pub fn reputation_by_user(&self, user_id: &str) -> RepoResult<i64> {
        traced("reputation_by_user", (user_id,), || {
            let records = self.store.find_all(
                UsersCommunities::COLLECTION,
                &Filter::eq("userId", user_id).and(Filter::eq("isMember", true)),
            )?;
            Ok(records.iter().map(reputation_of).sum())
        })
    }

    /// Summed reputation per user; users without memberships are omitted.
    pub fn total_reputation(&self, user_ids: &[String]) -> RepoResult<Vec<UserReputation>> {
        traced("users_total_reputation", (user_ids.len(),), || {
            let records = self.store.find_all(
                UsersCommunities::COLLECTION,
                &Filter::is_in("userId", user_ids.iter().cloned()).and(Filter::eq("isMember", true)),
            )?;
            let totals = relate::group_reduce(
                relate::group_by_field(records, "userId"),
                0_i64,
                |total, record| total + reputation_of(&record),
            );
            Ok(totals
                .into_iter()
                .filter_map(|entry| {
                    entry.group.as_str().map(|user_id| UserReputation {
                        user_id: user_id.to_string(),
                        reputation: entry.reduction,
                    })
                })
                .collect())
        })
    }

    /// Moves `lastSeen` forward; older timestamps are ignored.
    pub fn set_last_seen(
        &self,
        community_id: &str,
        user_id: &str,
        last_seen: i64,
    ) -> RepoResult<Option<UsersCommunities>> {
        traced("set_community_last_seen", (community_id, user_id, last_seen), || {
            let Some(record) = self.record(community_id, user_id)? else {
                return Ok(None);
            };
            if record.last_seen.is_some_and(|current| current >= last_seen) {
                return Ok(Some(record));
            }
            self.transition(
                &community_record(community_id, user_id),
                Update::new().set("lastSeen", last_seen),
            )
        })
    }

    /// Adds `score` to the user's reputation in a community.
    pub fn update_reputation(
        &self,
        community_id: &str,
        user_id: &str,
        score: i64,
    ) -> RepoResult<Option<UsersCommunities>> {
        traced("update_reputation", (community_id, user_id, score), || {
            self.transition(
                &community_record(community_id, user_id),
                Update::new().inc("reputation", score),
            )
        })
    }

    fn transition(&self, filter: &Filter, update: Update) -> RepoResult<Option<UsersCommunities>> {
        decode_opt(self.store.update_one(UsersCommunities::COLLECTION, filter, &update)?)
    }

    fn user_ids(
        &self,
        name: &str,
        filter: Filter,
        options: FindOptions,
        page: Page,
    ) -> RepoResult<Vec<String>> {
        traced(name, (page,), || {
            let records = self.store.find(
                UsersCommunities::COLLECTION,
                &filter,
                &paged(options, listing(page)),
            )?;
            Ok(relate::string_values(&records, "userId"))
        })
    }
}

fn new_record(
    community_id: &str,
    user_id: &str,
    is_owner: bool,
    is_member: bool,
    is_pending: bool,
) -> UsersCommunities {
    let now = now_ms();
    UsersCommunities {
        id: String::new(),
        community_id: community_id.to_string(),
        user_id: user_id.to_string(),
        is_owner,
        is_member,
        is_moderator: false,
        is_blocked: false,
        is_pending,
        receive_notifications: true,
        reputation: 0,
        created_at: now,
        last_seen: is_member.then_some(now),
    }
}

fn reputation_of(record: &Document) -> i64 {
    record.get("reputation").and_then(Value::as_i64).unwrap_or(0)
}
