//! Thread repository.
//!
//! # Invariants
//! - Feeds exclude deleted threads; community feeds also exclude the
//!   watercooler thread.
//! - The spam check deliberately includes deleted threads so that creating
//!   and deleting threads in a loop is still rate limited.
//! - Every content edit appends the previous content to `edits`.

use crate::doc::{self, Document};
use crate::model::channel::Channel;
use crate::model::community::Community;
use crate::model::membership::{UsersChannels, UsersCommunities};
use crate::model::message::Message;
use crate::model::reaction::ThreadReaction;
use crate::model::thread::{FeedSort, NewThread, ScoreWindow, Thread, ThreadContent, UsersThreads};
use crate::model::{now_ms, Entity, Page, Timeframe};
use crate::query::traced;
use crate::relate;
use crate::repo::channel_repo::active_role;
use crate::repo::{decode_all, decode_opt, insert, paged, required, RepoError, RepoResult};
use crate::store::{DocumentStore, Filter, FindOptions, Update};
use serde_json::{json, Value};
use std::collections::HashSet;

/// Threads created by one user inside this window trip the spam check.
pub const SPAM_CHECK_WINDOW_MS: i64 = 10 * 60 * 1000;
const DEFAULT_PAGE_SIZE: u64 = 10;

pub struct ThreadRepository<'a> {
    store: &'a DocumentStore<'a>,
}

fn not_watercooler() -> Filter {
    Filter::ne("watercooler", true)
}

impl<'a> ThreadRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    /// Thread by id, including deleted ones.
    pub fn get(&self, thread_id: &str) -> RepoResult<Option<Thread>> {
        traced("get_thread", (thread_id,), || {
            decode_opt(self.store.get(Thread::COLLECTION, thread_id)?)
        })
    }

    pub fn by_ids(&self, thread_ids: &[String]) -> RepoResult<Vec<Thread>> {
        traced("threads_by_ids", (thread_ids.len(),), || {
            decode_all(self.store.get_many(Thread::COLLECTION, thread_ids)?)
        })
    }

    /// Live thread by id.
    pub fn by_id(&self, thread_id: &str) -> RepoResult<Option<Thread>> {
        traced("thread_by_id", (thread_id,), || {
            decode_opt(self.store.find_one(
                Thread::COLLECTION,
                &Filter::eq("id", thread_id).not_deleted(),
            )?)
        })
    }

    pub fn by_channel_to_delete(&self, channel_id: &str) -> RepoResult<Vec<Thread>> {
        traced("threads_by_channel_to_delete", (channel_id,), || {
            decode_all(self.store.find_all(
                Thread::COLLECTION,
                &Filter::eq("channelId", channel_id).not_deleted(),
            )?)
        })
    }

    /// Most recently active threads of a channel, strictly older than
    /// `before_last_active` when given.
    pub fn by_channel(
        &self,
        channel_id: &str,
        first: u64,
        before_last_active: Option<i64>,
    ) -> RepoResult<Vec<Thread>> {
        traced("threads_by_channel", (channel_id, first, before_last_active), || {
            let mut filter = Filter::eq("channelId", channel_id).not_deleted();
            if let Some(before) = before_last_active {
                filter = filter.and(Filter::lt("lastActive", before));
            }
            decode_all(self.store.find(
                Thread::COLLECTION,
                &filter,
                &FindOptions::new().sort_desc("lastActive").limit(first),
            )?)
        })
    }

    /// Feed over several channels; trending ranks by score first.
    pub fn by_channels(
        &self,
        channel_ids: &[String],
        sort: FeedSort,
        page: Page,
    ) -> RepoResult<Vec<Thread>> {
        traced("threads_by_channels", (channel_ids.len(), sort, page), || {
            let mut options = FindOptions::new();
            if sort == FeedSort::Trending {
                options = options.sort_desc("score");
            }
            options = options.sort_desc("lastActive").sort_desc("createdAt");
            decode_all(self.store.find(
                Thread::COLLECTION,
                &Filter::is_in("channelId", channel_ids.iter().cloned())
                    .and(not_watercooler())
                    .not_deleted(),
                &paged(options, page),
            )?)
        })
    }

    pub fn by_community(&self, community_id: &str) -> RepoResult<Vec<Thread>> {
        traced("threads_by_community", (community_id,), || {
            decode_all(self.store.find(
                Thread::COLLECTION,
                &Filter::eq("communityId", community_id)
                    .and(not_watercooler())
                    .not_deleted(),
                &FindOptions::new().sort_desc("lastActive"),
            )?)
        })
    }

    /// Community threads created inside the current window of `range`.
    pub fn by_community_in_timeframe(
        &self,
        community_id: &str,
        range: Timeframe,
    ) -> RepoResult<Vec<Thread>> {
        traced("threads_by_community_in_timeframe", (community_id, range), || {
            decode_all(self.store.find_all(
                Thread::COLLECTION,
                &Filter::eq("communityId", community_id)
                    .and(created_within(range.current_ms()))
                    .and(not_watercooler())
                    .not_deleted(),
            )?)
        })
    }

    /// Live threads of `channel_ids` active inside the current window,
    /// grouped by channel id descending and newest activity first.
    pub fn in_channels_in_timeframe(
        &self,
        channel_ids: &[String],
        range: Timeframe,
    ) -> RepoResult<Vec<Thread>> {
        traced("threads_in_channels_in_timeframe", (channel_ids.len(), range), || {
            let now = now_ms();
            decode_all(self.store.find(
                Thread::COLLECTION,
                &Filter::is_in("channelId", channel_ids.iter().cloned())
                    .and(Filter::gte("lastActive", now - range.current_ms()))
                    .and(Filter::lte("lastActive", now))
                    .not_deleted(),
                &FindOptions::new()
                    .sort_desc("channelId")
                    .sort_desc("lastActive"),
            )?)
        })
    }

    pub fn participant_count(&self, thread_id: &str) -> RepoResult<u64> {
        traced("thread_participant_count", (thread_id,), || {
            Ok(self.store.count(
                UsersThreads::COLLECTION,
                &Filter::eq("threadId", thread_id).and(Filter::eq("isParticipant", true)),
            )?)
        })
    }

    /// Distinct senders of live messages inside `window`.
    pub fn participant_count_by_time(&self, thread_id: &str, window: ScoreWindow) -> RepoResult<u64> {
        traced("thread_participant_count_by_time", (thread_id, window), || {
            let messages = self.store.find_all(
                Message::COLLECTION,
                &Filter::eq("threadId", thread_id)
                    .and(within(window, "timestamp"))
                    .not_deleted(),
            )?;
            Ok(relate::distinct(relate::string_values(&messages, "senderId")).len() as u64)
        })
    }

    /// Live thread reactions created inside `window`.
    pub fn reaction_count_by_time(&self, thread_id: &str, window: ScoreWindow) -> RepoResult<u64> {
        traced("thread_reaction_count_by_time", (thread_id, window), || {
            Ok(self.store.count(
                ThreadReaction::COLLECTION,
                &Filter::eq("threadId", thread_id)
                    .and(within(window, "createdAt"))
                    .not_deleted(),
            )?)
        })
    }

    pub fn in_timeframe(&self, range: Timeframe) -> RepoResult<Vec<Thread>> {
        traced("threads_in_timeframe", (range,), || {
            decode_all(self.store.find_all(
                Thread::COLLECTION,
                &created_within(range.current_ms()).not_deleted(),
            )?)
        })
    }

    /// Threads the user created in the last `window_ms`, deleted ones
    /// included.
    pub fn by_user_as_spam_check(&self, user_id: &str, window_ms: i64) -> RepoResult<Vec<Thread>> {
        traced("threads_by_user_as_spam_check", (user_id, window_ms), || {
            decode_all(self.store.find_all(
                Thread::COLLECTION,
                &Filter::eq("creatorId", user_id).and(created_within(window_ms)),
            )?)
        })
    }

    /// Live threads of a user posted in public channels of public
    /// communities.
    pub fn public_by_user(&self, user_id: &str, page: Page) -> RepoResult<Vec<Thread>> {
        traced("public_threads_by_user", (user_id, page), || {
            let threads = self.store.find_all(
                Thread::COLLECTION,
                &Filter::eq("creatorId", user_id).not_deleted(),
            )?;
            self.public_page(threads, page)
        })
    }

    /// Threads created by `eval_user` that `current_user` may read.
    pub fn viewable_by_user(
        &self,
        eval_user: &str,
        current_user: &str,
        page: Page,
    ) -> RepoResult<Vec<Thread>> {
        traced("viewable_threads_by_user", (eval_user, current_user, page), || {
            let threads = self.store.find_all(
                Thread::COLLECTION,
                &Filter::eq("creatorId", eval_user).not_deleted(),
            )?;
            self.viewable_page(threads, current_user, page)
        })
    }

    /// Live public threads the user participates in.
    pub fn public_participant_threads(&self, user_id: &str, page: Page) -> RepoResult<Vec<Thread>> {
        traced("public_participant_threads_by_user", (user_id, page), || {
            let threads = self.participant_threads(user_id)?;
            self.public_page(threads, page)
        })
    }

    /// Threads `eval_user` participates in that `current_user` may read.
    pub fn viewable_participant_threads(
        &self,
        eval_user: &str,
        current_user: &str,
        page: Page,
    ) -> RepoResult<Vec<Thread>> {
        traced(
            "viewable_participant_threads_by_user",
            (eval_user, current_user, page),
            || {
                let threads = self.participant_threads(eval_user)?;
                self.viewable_page(threads, current_user, page)
            },
        )
    }

    pub fn watercooler(&self, community_id: &str) -> RepoResult<Option<Thread>> {
        traced("watercooler_thread", (community_id,), || {
            decode_opt(self.store.find_one(
                Thread::COLLECTION,
                &Filter::eq("communityId", community_id).and(Filter::eq("watercooler", true)),
            )?)
        })
    }

    /// Stores a published thread authored by `user_id`.
    pub fn publish(&self, input: &NewThread, user_id: &str) -> RepoResult<Thread> {
        traced("publish_thread", (&input.channel_id, user_id), || {
            let now = now_ms();
            insert(
                self.store,
                &Thread {
                    id: String::new(),
                    channel_id: input.channel_id.clone(),
                    community_id: input.community_id.clone(),
                    creator_id: user_id.to_string(),
                    content: input.content.clone(),
                    kind: input.kind.clone(),
                    is_published: true,
                    is_locked: false,
                    locked_by: None,
                    locked_at: None,
                    watercooler: input.watercooler,
                    edits: Vec::new(),
                    edited_by: None,
                    message_count: 0,
                    reaction_count: 0,
                    score: None,
                    score_updated_at: None,
                    created_at: now,
                    last_active: now,
                    modified_at: None,
                    deleted_at: None,
                    deleted_by: None,
                },
            )
        })
    }

    /// Locks the thread on behalf of `user_id`, or unlocks it.
    pub fn set_lock(&self, thread_id: &str, locked: bool, user_id: &str) -> RepoResult<Thread> {
        let update = if locked {
            Update::new()
                .set("isLocked", true)
                .set("lockedBy", user_id)
                .set("lockedAt", now_ms())
        } else {
            Update::new()
                .set("isLocked", false)
                .unset("lockedBy")
                .unset("lockedAt")
        };
        self.update("set_thread_lock", thread_id, update)
    }

    pub fn set_last_active(&self, thread_id: &str, last_active: i64) -> RepoResult<Thread> {
        self.update(
            "set_thread_last_active",
            thread_id,
            Update::new().set("lastActive", last_active),
        )
    }

    /// Tombstones the thread.
    pub fn delete(&self, thread_id: &str, user_id: &str) -> RepoResult<Thread> {
        self.update(
            "delete_thread",
            thread_id,
            Update::new()
                .set("deletedBy", user_id)
                .set("deletedAt", now_ms()),
        )
    }

    /// Replaces the content and records the previous one in `edits`.
    ///
    /// With `mark_modified == false` the edit is not surfaced as a user edit
    /// (`modifiedAt` stays null), which is used for post-publish uploads.
    pub fn edit(
        &self,
        thread_id: &str,
        content: &ThreadContent,
        user_id: &str,
        mark_modified: bool,
    ) -> RepoResult<Thread> {
        traced("edit_thread", (thread_id, user_id, mark_modified), || {
            let Some(current) = self.store.get(Thread::COLLECTION, thread_id)? else {
                return Err(RepoError::not_found(Thread::COLLECTION, thread_id));
            };
            let previous_editor = current
                .get("editedBy")
                .filter(|value| !value.is_null())
                .or_else(|| current.get("creatorId"))
                .cloned()
                .unwrap_or(Value::Null);
            let snapshot = json!({
                "content": current.get("content").cloned().unwrap_or(Value::Null),
                "timestamp": now_ms(),
                "editedBy": previous_editor,
            });
            let content = serde_json::to_value(content)
                .map_err(|err| RepoError::InvalidInput(err.to_string()))?;
            let modified_at = if mark_modified { Value::from(now_ms()) } else { Value::Null };

            let update = Update::new()
                .push("edits", snapshot)
                .set("content", content)
                .set("modifiedAt", modified_at)
                .set("editedBy", user_id);
            required(
                self.store.update_by_id(Thread::COLLECTION, thread_id, &update)?,
                thread_id,
            )
        })
    }

    /// Rewrites the body after embedded images were uploaded.
    pub fn update_with_images(&self, thread_id: &str, body: &str) -> RepoResult<Thread> {
        self.update(
            "update_thread_with_images",
            thread_id,
            Update::new().set("content.body", body),
        )
    }

    pub fn move_to_channel(&self, thread_id: &str, channel_id: &str) -> RepoResult<Thread> {
        self.update(
            "move_thread",
            thread_id,
            Update::new().set("channelId", channel_id),
        )
    }

    pub fn increment_message_count(&self, thread_id: &str) -> RepoResult<Thread> {
        self.update(
            "increment_thread_message_count",
            thread_id,
            Update::new().inc_floor("messageCount", 1, 0),
        )
    }

    pub fn decrement_message_count(&self, thread_id: &str) -> RepoResult<Thread> {
        self.update(
            "decrement_thread_message_count",
            thread_id,
            Update::new().inc_floor("messageCount", -1, 0),
        )
    }

    pub fn increment_reaction_count(&self, thread_id: &str) -> RepoResult<Thread> {
        self.update(
            "increment_thread_reaction_count",
            thread_id,
            Update::new().inc_floor("reactionCount", 1, 0),
        )
    }

    pub fn decrement_reaction_count(&self, thread_id: &str) -> RepoResult<Thread> {
        self.update(
            "decrement_thread_reaction_count",
            thread_id,
            Update::new().inc_floor("reactionCount", -1, 0),
        )
    }

    /// Stores a ranking score computed by the scoring job.
    pub fn store_score(&self, thread_id: &str, score: f64) -> RepoResult<Thread> {
        self.update(
            "store_thread_score",
            thread_id,
            Update::new()
                .set("score", score)
                .set("scoreUpdatedAt", now_ms()),
        )
    }

    fn update(&self, name: &str, thread_id: &str, update: Update) -> RepoResult<Thread> {
        traced(name, (thread_id,), || {
            required(
                self.store.update_by_id(Thread::COLLECTION, thread_id, &update)?,
                thread_id,
            )
        })
    }

    /// Live threads the user is flagged as participant of.
    fn participant_threads(&self, user_id: &str) -> RepoResult<Vec<Document>> {
        let records = self.store.find_all(
            UsersThreads::COLLECTION,
            &Filter::eq("userId", user_id).and(Filter::eq("isParticipant", true)),
        )?;
        let rows = self.store.join_filtered(
            records,
            "threadId",
            Thread::COLLECTION,
            "id",
            &Filter::missing("deletedAt"),
        )?;
        Ok(rows.into_iter().map(|row| row.right).collect())
    }

    fn public_page(&self, threads: Vec<Document>, page: Page) -> RepoResult<Vec<Thread>> {
        let public_channels = self.ids_where(
            Channel::COLLECTION,
            relate::string_values(&threads, "channelId"),
            Filter::eq("isPrivate", false),
        )?;
        let public_communities = self.ids_where(
            Community::COLLECTION,
            relate::string_values(&threads, "communityId"),
            Filter::eq("isPrivate", false),
        )?;
        let visible = threads
            .into_iter()
            .filter(|thread| {
                field_in(thread, "channelId", &public_channels)
                    && field_in(thread, "communityId", &public_communities)
            })
            .collect();
        page_in_feed_order(visible, page)
    }

    fn viewable_page(
        &self,
        threads: Vec<Document>,
        current_user: &str,
        page: Page,
    ) -> RepoResult<Vec<Thread>> {
        let mut channels = self.ids_where(
            Channel::COLLECTION,
            relate::string_values(&threads, "channelId"),
            Filter::eq("isPrivate", false),
        )?;
        let member_channels = self.store.find_all(
            UsersChannels::COLLECTION,
            &Filter::eq("userId", current_user).and(active_role()),
        )?;
        channels.extend(relate::string_values(&member_channels, "channelId"));

        let mut communities = self.ids_where(
            Community::COLLECTION,
            relate::string_values(&threads, "communityId"),
            Filter::eq("isPrivate", false),
        )?;
        let member_communities = self.store.find_all(
            UsersCommunities::COLLECTION,
            &Filter::eq("userId", current_user).and(Filter::eq("isMember", true)),
        )?;
        communities.extend(relate::string_values(&member_communities, "communityId"));

        let visible = threads
            .into_iter()
            .filter(|thread| {
                field_in(thread, "channelId", &channels)
                    && field_in(thread, "communityId", &communities)
            })
            .collect();
        page_in_feed_order(visible, page)
    }

    /// Ids among `ids` whose `collection` document also matches `filter`.
    fn ids_where(
        &self,
        collection: &str,
        ids: Vec<String>,
        filter: Filter,
    ) -> RepoResult<HashSet<String>> {
        let docs = self.store.find_all(
            collection,
            &Filter::is_in("id", relate::distinct(ids)).and(filter),
        )?;
        Ok(relate::string_values(&docs, "id").into_iter().collect())
    }
}

fn within(window: ScoreWindow, field: &str) -> Filter {
    let (from, until) = window.bounds(now_ms());
    let mut filter = Filter::All;
    if let Some(from) = from {
        filter = filter.and(Filter::gte(field, from));
    }
    if let Some(until) = until {
        filter = filter.and(Filter::lt(field, until));
    }
    filter
}

fn created_within(window_ms: i64) -> Filter {
    let now = now_ms();
    Filter::gte("createdAt", now - window_ms).and(Filter::lte("createdAt", now))
}

fn field_in(source: &Document, path: &str, allowed: &HashSet<String>) -> bool {
    doc::get_str(source, path).map_or(false, |value| allowed.contains(value))
}

/// Sorts by lastActive then createdAt, both descending, and pages.
fn page_in_feed_order(mut threads: Vec<Document>, page: Page) -> RepoResult<Vec<Thread>> {
    let key = |doc: &Document, field: &str| doc.get(field).and_then(Value::as_i64).unwrap_or(0);
    threads.sort_by(|a, b| {
        key(b, "lastActive")
            .cmp(&key(a, "lastActive"))
            .then_with(|| key(b, "createdAt").cmp(&key(a, "createdAt")))
    });
    let skip = usize::try_from(page.after).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.first.unwrap_or(DEFAULT_PAGE_SIZE)).unwrap_or(usize::MAX);
    decode_all(relate::paginate(threads, skip, Some(limit)))
}
