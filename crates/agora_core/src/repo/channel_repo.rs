//! Channel repository.
//!
//! # Invariants
//! - Deleted channels keep their document; the slug is replaced by a UUID so
//!   the original slug can be reused.
//! - `memberCount` never drops below zero.

use crate::doc;
use crate::model::channel::{Channel, ChannelEdit, NewChannel};
use crate::model::community::Community;
use crate::model::membership::UsersChannels;
use crate::model::thread::Thread;
use crate::model::user::User;
use crate::model::{now_ms, Entity, GroupCount, DAY_MS};
use crate::query::traced;
use crate::relate;
use crate::repo::{count_by, decode_all, decode_opt, insert, required, RepoResult};
use crate::store::{DocumentStore, Filter, Update};
use uuid::Uuid;

pub struct ChannelRepository<'a> {
    store: &'a DocumentStore<'a>,
}

/// Filter matching records of users who hold any role in a channel.
pub(crate) fn active_role() -> Filter {
    Filter::any_of(vec![
        Filter::eq("isMember", true),
        Filter::eq("isModerator", true),
        Filter::eq("isOwner", true),
    ])
}

impl<'a> ChannelRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn by_id(&self, channel_id: &str) -> RepoResult<Option<Channel>> {
        traced("channel_by_id", (channel_id,), || {
            decode_opt(self.store.find_one(
                Channel::COLLECTION,
                &Filter::eq("id", channel_id).not_deleted(),
            )?)
        })
    }

    pub fn by_ids(&self, channel_ids: &[String]) -> RepoResult<Vec<Channel>> {
        traced("channels_by_ids", (channel_ids.len(),), || {
            let docs = self.store.get_many(Channel::COLLECTION, channel_ids)?;
            let channels: Vec<Channel> = decode_all(docs)?;
            Ok(channels
                .into_iter()
                .filter(|channel| channel.deleted_at.is_none())
                .collect())
        })
    }

    pub fn by_community(&self, community_id: &str) -> RepoResult<Vec<Channel>> {
        traced("channels_by_community", (community_id,), || {
            decode_all(self.store.find_all(
                Channel::COLLECTION,
                &Filter::eq("communityId", community_id).not_deleted(),
            )?)
        })
    }

    /// Ids of public, unarchived channels of a community.
    pub fn public_ids_by_community(&self, community_id: &str) -> RepoResult<Vec<String>> {
        traced("public_channel_ids_by_community", (community_id,), || {
            let docs = self.store.find_all(
                Channel::COLLECTION,
                &Filter::eq("communityId", community_id)
                    .and(Filter::eq("isPrivate", false))
                    .and(Filter::missing("archivedAt"))
                    .not_deleted(),
            )?;
            Ok(relate::string_values(&docs, "id"))
        })
    }

    /// Ids of unarchived community channels the user is a member of.
    pub fn member_ids_by_user_and_community(
        &self,
        community_id: &str,
        user_id: &str,
    ) -> RepoResult<Vec<String>> {
        traced("channel_ids_by_user_and_community", (community_id, user_id), || {
            let channels = self.store.find_all(
                Channel::COLLECTION,
                &Filter::eq("communityId", community_id)
                    .and(Filter::missing("archivedAt"))
                    .not_deleted(),
            )?;
            let channel_ids = relate::string_values(&channels, "id");
            let records = self.store.find_all(
                UsersChannels::COLLECTION,
                &Filter::eq("userId", user_id)
                    .and(Filter::is_in("channelId", channel_ids))
                    .and(Filter::eq("isMember", true)),
            )?;
            Ok(relate::string_values(&records, "channelId"))
        })
    }

    /// Channels where the user is member, moderator or owner.
    pub fn by_user(&self, user_id: &str) -> RepoResult<Vec<Channel>> {
        traced("channels_by_user", (user_id,), || {
            let records = self.store.find_all(
                UsersChannels::COLLECTION,
                &Filter::eq("userId", user_id).and(active_role()),
            )?;
            let rows = self.store.join_filtered(
                records,
                "channelId",
                Channel::COLLECTION,
                "id",
                &Filter::missing("deletedAt"),
            )?;
            let channels = rows.into_iter().map(|row| {
                row.without_left(&["id", "channelId", "userId", "createdAt"])
                    .zip()
            });
            decode_all(channels.collect())
        })
    }

    pub fn by_slug(&self, channel_slug: &str, community_slug: &str) -> RepoResult<Option<Channel>> {
        traced("channel_by_slug", (channel_slug, community_slug), || {
            let Some(community) = self.store.find_one(
                Community::COLLECTION,
                &Filter::eq("slug", community_slug).not_deleted(),
            )?
            else {
                return Ok(None);
            };
            let community_id = doc::get_str(&community, "id").unwrap_or_default();
            decode_opt(self.store.find_one(
                Channel::COLLECTION,
                &Filter::eq("communityId", community_id)
                    .and(Filter::eq("slug", channel_slug))
                    .not_deleted(),
            )?)
        })
    }

    /// Number of live threads per channel.
    pub fn thread_counts(&self, channel_ids: &[String]) -> RepoResult<Vec<GroupCount>> {
        traced("channel_thread_counts", (channel_ids.len(),), || {
            let threads = self.store.find_all(
                Thread::COLLECTION,
                &Filter::is_in("channelId", channel_ids.iter().cloned()).not_deleted(),
            )?;
            Ok(count_by(threads, "channelId"))
        })
    }

    /// Number of unblocked members per channel.
    pub fn member_counts(&self, channel_ids: &[String]) -> RepoResult<Vec<GroupCount>> {
        traced("channel_member_counts", (channel_ids.len(),), || {
            let records = self.store.find_all(
                UsersChannels::COLLECTION,
                &Filter::is_in("channelId", channel_ids.iter().cloned())
                    .and(Filter::eq("isMember", true))
                    .and(Filter::ne("isBlocked", true)),
            )?;
            Ok(count_by(records, "channelId"))
        })
    }

    /// Members per channel that are online or were seen in the last day.
    pub fn online_member_counts(&self, channel_ids: &[String]) -> RepoResult<Vec<GroupCount>> {
        traced("channel_online_member_counts", (channel_ids.len(),), || {
            let records = self.store.find_all(
                UsersChannels::COLLECTION,
                &Filter::is_in("channelId", channel_ids.iter().cloned())
                    .and(Filter::eq("isMember", true))
                    .and(Filter::ne("isBlocked", true)),
            )?;
            let since = now_ms() - DAY_MS;
            let rows = self.store.join_filtered(
                relate::pluck(&records, &["channelId", "userId"]),
                "userId",
                User::COLLECTION,
                "id",
                &Filter::any_of(vec![
                    Filter::eq("isOnline", true),
                    Filter::gte("lastSeen", since),
                ]),
            )?;
            let online = rows
                .into_iter()
                .map(|row| row.without_right(&["id"]).zip())
                .collect();
            Ok(count_by(online, "channelId"))
        })
    }

    pub fn create(&self, input: &NewChannel) -> RepoResult<Channel> {
        traced("create_channel", (&input.community_id, &input.slug), || {
            insert(
                self.store,
                &Channel {
                    id: String::new(),
                    community_id: input.community_id.clone(),
                    name: input.name.clone(),
                    slug: input.slug.clone(),
                    description: input.description.clone(),
                    is_private: input.is_private,
                    is_default: input.is_default,
                    member_count: 0,
                    created_at: now_ms(),
                    archived_at: None,
                    deleted_at: None,
                    deleted_by: None,
                },
            )
        })
    }

    /// Creates the default public `general` channel of a community.
    pub fn create_general(&self, community_id: &str) -> RepoResult<Channel> {
        self.create(&NewChannel {
            community_id: community_id.to_string(),
            name: "General".to_string(),
            slug: "general".to_string(),
            description: Some("General Chatter".to_string()),
            is_private: false,
            is_default: true,
        })
    }

    pub fn edit(&self, input: &ChannelEdit) -> RepoResult<Channel> {
        traced("edit_channel", (&input.channel_id,), || {
            let update = Update::new()
                .set("name", input.name.as_str())
                .set("slug", input.slug.as_str())
                .set("description", input.description.clone())
                .set("isPrivate", input.is_private);
            required(
                self.store
                    .update_by_id(Channel::COLLECTION, &input.channel_id, &update)?,
                &input.channel_id,
            )
        })
    }

    pub fn delete(&self, channel_id: &str, user_id: &str) -> RepoResult<Channel> {
        traced("delete_channel", (channel_id, user_id), || {
            let update = Update::new()
                .set("deletedBy", user_id)
                .set("deletedAt", now_ms())
                .set("slug", Uuid::new_v4().to_string());
            required(
                self.store
                    .update_by_id(Channel::COLLECTION, channel_id, &update)?,
                channel_id,
            )
        })
    }

    pub fn archive(&self, channel_id: &str) -> RepoResult<Channel> {
        traced("archive_channel", (channel_id,), || {
            required(
                self.store.update_by_id(
                    Channel::COLLECTION,
                    channel_id,
                    &Update::new().set("archivedAt", now_ms()),
                )?,
                channel_id,
            )
        })
    }

    pub fn restore(&self, channel_id: &str) -> RepoResult<Channel> {
        traced("restore_channel", (channel_id,), || {
            required(
                self.store.update_by_id(
                    Channel::COLLECTION,
                    channel_id,
                    &Update::new().unset("archivedAt"),
                )?,
                channel_id,
            )
        })
    }

    /// Archives every live private channel of a community.
    pub fn archive_all_private(&self, community_id: &str) -> RepoResult<Vec<Channel>> {
        traced("archive_all_private_channels", (community_id,), || {
            decode_all(self.store.update_many(
                Channel::COLLECTION,
                &Filter::eq("communityId", community_id)
                    .and(Filter::eq("isPrivate", true))
                    .and(Filter::missing("archivedAt"))
                    .not_deleted(),
                &Update::new().set("archivedAt", now_ms()),
            )?)
        })
    }

    pub fn increment_member_count(&self, channel_id: &str) -> RepoResult<Channel> {
        self.bump_member_count("increment_channel_member_count", channel_id, 1)
    }

    pub fn decrement_member_count(&self, channel_id: &str) -> RepoResult<Channel> {
        self.bump_member_count("decrement_channel_member_count", channel_id, -1)
    }

    pub fn set_member_count(&self, channel_id: &str, count: i64) -> RepoResult<Channel> {
        traced("set_channel_member_count", (channel_id, count), || {
            required(
                self.store.update_by_id(
                    Channel::COLLECTION,
                    channel_id,
                    &Update::new().set("memberCount", count.max(0)),
                )?,
                channel_id,
            )
        })
    }

    fn bump_member_count(&self, name: &str, channel_id: &str, by: i64) -> RepoResult<Channel> {
        traced(name, (channel_id,), || {
            required(
                self.store.update_by_id(
                    Channel::COLLECTION,
                    channel_id,
                    &Update::new().inc_floor("memberCount", by, 0),
                )?,
                channel_id,
            )
        })
    }
}
