//! Community repository.
//!
//! # Invariants
//! - Deleted communities keep their document with a UUID slug.
//! - Growth windows are half-open: `(now - window, now)`.

use crate::doc::Document;
use crate::model::channel::Channel;
use crate::model::community::{Community, CommunityEdit, Growth, NewCommunity};
use crate::model::membership::{UsersChannels, UsersCommunities};
use crate::model::thread::Thread;
use crate::model::user::User;
use crate::model::{now_ms, Entity, GroupCount, Timeframe, DAY_MS};
use crate::query::traced;
use crate::relate;
use crate::repo::{count_by, decode_all, decode_opt, insert, required, RepoError, RepoResult};
use crate::store::{DocumentStore, Filter, FindOptions, Update};
use serde_json::Value;
use uuid::Uuid;

const RECENT_COMMUNITIES_LIMIT: u64 = 100;
const MEMBERSHIP_JOIN_FIELDS: [&str; 4] = ["id", "communityId", "userId", "createdAt"];

pub struct CommunityRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> CommunityRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn by_id(&self, community_id: &str) -> RepoResult<Option<Community>> {
        traced("community_by_id", (community_id,), || {
            decode_opt(self.store.find_one(
                Community::COLLECTION,
                &Filter::eq("id", community_id).not_deleted(),
            )?)
        })
    }

    pub fn by_ids(&self, community_ids: &[String]) -> RepoResult<Vec<Community>> {
        traced("communities_by_ids", (community_ids.len(),), || {
            let communities: Vec<Community> =
                decode_all(self.store.get_many(Community::COLLECTION, community_ids)?)?;
            Ok(communities
                .into_iter()
                .filter(|community| community.deleted_at.is_none())
                .collect())
        })
    }

    pub fn by_slug(&self, slug: &str) -> RepoResult<Option<Community>> {
        traced("community_by_slug", (slug,), || {
            decode_opt(self.store.find_one(
                Community::COLLECTION,
                &Filter::eq("slug", slug).not_deleted(),
            )?)
        })
    }

    pub fn by_slugs(&self, slugs: &[String]) -> RepoResult<Vec<Community>> {
        traced("communities_by_slugs", (slugs.len(),), || {
            decode_all(self.store.find_all(
                Community::COLLECTION,
                &Filter::is_in("slug", slugs.iter().cloned()).not_deleted(),
            )?)
        })
    }

    /// Live communities the user is a member of.
    pub fn by_user(&self, user_id: &str) -> RepoResult<Vec<Community>> {
        traced("communities_by_user", (user_id,), || {
            decode_all(self.joined_memberships(user_id, true)?)
        })
    }

    /// Communities of `evaluating_user_id` that `current_user_id` may see:
    /// the public ones plus the ones both users belong to.
    pub fn visible_by_user(
        &self,
        evaluating_user_id: &str,
        current_user_id: &str,
    ) -> RepoResult<Vec<Community>> {
        traced(
            "visible_communities_by_user",
            (evaluating_user_id, current_user_id),
            || {
                let evaluated = self.joined_memberships(evaluating_user_id, false)?;
                let current = self.joined_memberships(current_user_id, true)?;
                let current_ids = relate::string_values(&current, "id");

                let public_ids = evaluated
                    .iter()
                    .filter(|community| community.get("isPrivate") != Some(&Value::Bool(true)))
                    .filter_map(|community| community.get("id").and_then(Value::as_str))
                    .map(str::to_string);
                let shared_ids = relate::string_values(&evaluated, "id")
                    .into_iter()
                    .filter(|id| current_ids.contains(id));
                let visible = relate::distinct(public_ids.chain(shared_ids).collect());

                decode_all(self.store.find_all(
                    Community::COLLECTION,
                    &Filter::is_in("id", visible),
                )?)
            },
        )
    }

    /// Public communities the user is a member of.
    pub fn public_by_user(&self, user_id: &str) -> RepoResult<Vec<Community>> {
        traced("public_communities_by_user", (user_id,), || {
            let communities = self
                .joined_memberships(user_id, true)?
                .into_iter()
                .filter(|community| community.get("isPrivate") == Some(&Value::Bool(false)))
                .collect();
            decode_all(communities)
        })
    }

    pub fn channel_counts(&self, community_ids: &[String]) -> RepoResult<Vec<GroupCount>> {
        traced("community_channel_counts", (community_ids.len(),), || {
            let channels = self.store.find_all(
                Channel::COLLECTION,
                &Filter::is_in("communityId", community_ids.iter().cloned()).not_deleted(),
            )?;
            Ok(count_by(channels, "communityId"))
        })
    }

    pub fn member_counts(&self, community_ids: &[String]) -> RepoResult<Vec<GroupCount>> {
        traced("community_member_counts", (community_ids.len(),), || {
            let records = self.store.find_all(
                UsersCommunities::COLLECTION,
                &Filter::is_in("communityId", community_ids.iter().cloned())
                    .and(Filter::eq("isMember", true)),
            )?;
            Ok(count_by(records, "communityId"))
        })
    }

    /// Members per community that are online or were seen in the last day.
    pub fn online_member_counts(&self, community_ids: &[String]) -> RepoResult<Vec<GroupCount>> {
        traced("community_online_member_counts", (community_ids.len(),), || {
            let records = self.store.find_all(
                UsersCommunities::COLLECTION,
                &Filter::is_in("communityId", community_ids.iter().cloned())
                    .and(Filter::eq("isMember", true)),
            )?;
            let rows = self.store.join_filtered(
                relate::pluck(&records, &["communityId", "userId"]),
                "userId",
                User::COLLECTION,
                "id",
                &Filter::any_of(vec![
                    Filter::eq("isOnline", true),
                    Filter::gte("lastSeen", now_ms() - DAY_MS),
                ]),
            )?;
            let online = rows
                .into_iter()
                .map(|row| row.without_right(&["id"]).zip())
                .collect();
            Ok(count_by(online, "communityId"))
        })
    }

    /// Largest live communities by member count.
    pub fn top_by_member_count(&self, amount: u64) -> RepoResult<Vec<Community>> {
        traced("top_communities_by_member_count", (amount,), || {
            decode_all(self.store.find(
                Community::COLLECTION,
                &Filter::All.not_deleted(),
                &FindOptions::new().sort_desc("memberCount").limit(amount),
            )?)
        })
    }

    pub fn set_last_active(&self, community_id: &str, last_active: i64) -> RepoResult<Community> {
        self.set_fields(
            "set_community_last_active",
            community_id,
            Update::new().set("lastActive", last_active),
        )
    }

    /// Stores a new community owned by `creator`.
    pub fn create(&self, input: &NewCommunity, creator: &User) -> RepoResult<Community> {
        traced("create_community", (&input.slug, &creator.id), || {
            insert(
                self.store,
                &Community {
                    id: String::new(),
                    name: input.name.clone(),
                    slug: input.slug.clone(),
                    description: input.description.clone(),
                    website: input.website.clone(),
                    profile_photo: input.profile_photo.clone(),
                    cover_photo: input.cover_photo.clone(),
                    creator_id: Some(creator.id.clone()),
                    administrator_email: creator.email.clone(),
                    pending_administrator_email: None,
                    is_private: input.is_private,
                    member_count: 0,
                    redirect: false,
                    noindex: false,
                    watercooler_id: None,
                    pinned_thread_id: None,
                    created_at: now_ms(),
                    modified_at: None,
                    last_active: None,
                    deleted_at: None,
                    deleted_by: None,
                },
            )
        })
    }

    pub fn edit(&self, input: &CommunityEdit) -> RepoResult<Community> {
        let mut update = Update::new()
            .set("name", input.name.as_str())
            .set("slug", input.slug.as_str())
            .set("description", input.description.clone())
            .set("website", input.website.clone())
            .set("modifiedAt", now_ms());
        if let Some(watercooler_id) = &input.watercooler_id {
            update = update.set("watercoolerId", watercooler_id.as_str());
        }
        if let Some(photo) = &input.profile_photo {
            update = update.set("profilePhoto", photo.as_str());
        }
        if let Some(photo) = &input.cover_photo {
            update = update.set("coverPhoto", photo.as_str());
        }
        self.set_fields("edit_community", &input.community_id, update)
    }

    pub fn toggle_redirect(&self, community_id: &str) -> RepoResult<Community> {
        self.toggle("toggle_community_redirect", community_id, "redirect")
    }

    pub fn toggle_noindex(&self, community_id: &str) -> RepoResult<Community> {
        self.toggle("toggle_community_noindex", community_id, "noindex")
    }

    pub fn set_watercooler_id(
        &self,
        community_id: &str,
        watercooler_id: Option<&str>,
    ) -> RepoResult<Community> {
        self.set_fields(
            "set_community_watercooler_id",
            community_id,
            Update::new().set("watercoolerId", watercooler_id),
        )
    }

    pub fn delete(&self, community_id: &str, user_id: &str) -> RepoResult<Community> {
        self.set_fields(
            "delete_community",
            community_id,
            Update::new()
                .set("deletedBy", user_id)
                .set("deletedAt", now_ms())
                .set("slug", Uuid::new_v4().to_string()),
        )
    }

    pub fn set_pinned_thread(
        &self,
        community_id: &str,
        thread_id: Option<&str>,
    ) -> RepoResult<Community> {
        self.set_fields(
            "set_community_pinned_thread",
            community_id,
            Update::new().set("pinnedThreadId", thread_id),
        )
    }

    pub fn user_is_member_of_any_channel(&self, community_id: &str, user_id: &str) -> RepoResult<bool> {
        traced("user_is_member_of_any_channel", (community_id, user_id), || {
            let channels = self.store.find_all(
                Channel::COLLECTION,
                &Filter::eq("communityId", community_id).not_deleted(),
            )?;
            let rows = self.store.join_filtered(
                channels,
                "id",
                UsersChannels::COLLECTION,
                "channelId",
                &Filter::eq("userId", user_id).and(Filter::eq("isMember", true)),
            )?;
            Ok(!rows.is_empty())
        })
    }

    /// Newest live communities, at most 100.
    pub fn recent(&self) -> RepoResult<Vec<Community>> {
        traced("recent_communities", (), || {
            decode_all(self.store.find(
                Community::COLLECTION,
                &Filter::All.not_deleted(),
                &FindOptions::new()
                    .sort_desc("createdAt")
                    .limit(RECENT_COMMUNITIES_LIMIT),
            )?)
        })
    }

    pub fn thread_count(&self, community_id: &str) -> RepoResult<u64> {
        traced("community_thread_count", (community_id,), || {
            Ok(self.store.count(
                Thread::COLLECTION,
                &Filter::eq("communityId", community_id).not_deleted(),
            )?)
        })
    }

    /// Compares how many `collection` documents of a community have `field`
    /// inside the current window versus the window before it.
    pub fn growth(
        &self,
        collection: &str,
        range: Timeframe,
        field: &str,
        community_id: &str,
        extra: &Filter,
    ) -> RepoResult<Growth> {
        traced("community_growth", (collection, range, field, community_id), || {
            let now = now_ms();
            let current_start = now - range.current_ms();
            let previous_start = now - range.previous_ms();
            let scoped = Filter::eq("communityId", community_id).and(extra.clone());

            let current = self.store.count(
                collection,
                &scoped
                    .clone()
                    .and(Filter::gt(field, current_start))
                    .and(Filter::lt(field, now)),
            )?;
            let previous = self.store.count(
                collection,
                &scoped
                    .and(Filter::gt(field, previous_start))
                    .and(Filter::lt(field, current_start)),
            )?;
            Ok(Growth::new(current, previous))
        })
    }

    pub fn set_pending_administrator_email(
        &self,
        community_id: &str,
        email: &str,
    ) -> RepoResult<Community> {
        self.set_fields(
            "set_community_pending_administrator_email",
            community_id,
            Update::new().set("pendingAdministratorEmail", email),
        )
    }

    /// Confirms `email` as administrator email and clears the pending one.
    pub fn update_administrator_email(
        &self,
        community_id: &str,
        email: &str,
    ) -> RepoResult<Community> {
        self.set_fields(
            "update_community_administrator_email",
            community_id,
            Update::new()
                .set("administratorEmail", email)
                .unset("pendingAdministratorEmail"),
        )
    }

    pub fn reset_administrator_email(&self, community_id: &str) -> RepoResult<Community> {
        self.set_fields(
            "reset_community_administrator_email",
            community_id,
            Update::new()
                .set("administratorEmail", Value::Null)
                .unset("pendingAdministratorEmail"),
        )
    }

    pub fn increment_member_count(&self, community_id: &str) -> RepoResult<Community> {
        self.set_fields(
            "increment_community_member_count",
            community_id,
            Update::new().inc_floor("memberCount", 1, 0),
        )
    }

    pub fn decrement_member_count(&self, community_id: &str) -> RepoResult<Community> {
        self.set_fields(
            "decrement_community_member_count",
            community_id,
            Update::new().inc_floor("memberCount", -1, 0),
        )
    }

    pub fn set_member_count(&self, community_id: &str, count: i64) -> RepoResult<Community> {
        self.set_fields(
            "set_community_member_count",
            community_id,
            Update::new().set("memberCount", count.max(0)),
        )
    }

    fn toggle(&self, name: &str, community_id: &str, field: &str) -> RepoResult<Community> {
        traced(name, (community_id,), || {
            let Some(community) = self.store.get(Community::COLLECTION, community_id)? else {
                return Err(RepoError::not_found(Community::COLLECTION, community_id));
            };
            let current = community.get(field).and_then(Value::as_bool).unwrap_or(false);
            required(
                self.store.update_by_id(
                    Community::COLLECTION,
                    community_id,
                    &Update::new().set(field, !current),
                )?,
                community_id,
            )
        })
    }

    fn set_fields(&self, name: &str, community_id: &str, update: Update) -> RepoResult<Community> {
        traced(name, (community_id,), || {
            required(
                self.store
                    .update_by_id(Community::COLLECTION, community_id, &update)?,
                community_id,
            )
        })
    }

    /// Membership records of a user zipped with their live communities.
    fn joined_memberships(
        &self,
        user_id: &str,
        members_only: bool,
    ) -> RepoResult<Vec<Document>> {
        let mut filter = Filter::eq("userId", user_id);
        if members_only {
            filter = filter.and(Filter::eq("isMember", true));
        }
        let records = self.store.find_all(UsersCommunities::COLLECTION, &filter)?;
        let rows = self.store.join_filtered(
            records,
            "communityId",
            Community::COLLECTION,
            "id",
            &Filter::missing("deletedAt"),
        )?;
        Ok(rows
            .into_iter()
            .map(|row| row.without_left(&MEMBERSHIP_JOIN_FIELDS).zip())
            .collect())
    }
}
