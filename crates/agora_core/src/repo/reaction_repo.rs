//! Message and thread reaction repositories.
//!
//! A user has at most one reaction record per message (or thread). Removing
//! a reaction tombstones the record and reacting again clears the tombstone.

use crate::model::reaction::{Reaction, ThreadReaction};
use crate::model::{now_ms, Entity};
use crate::query::traced;
use crate::relate::{self, Group};
use crate::repo::{decode_all, decode_opt, insert, required, RepoResult};
use crate::store::{DocumentStore, Filter, Update};

pub struct ReactionRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> ReactionRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    /// Live reactions grouped by message, in first-seen order.
    pub fn grouped_by_message(&self, message_ids: &[String]) -> RepoResult<Vec<Group<String, Vec<Reaction>>>> {
        traced("reactions_by_message", (message_ids.len(),), || {
            let reactions: Vec<Reaction> = decode_all(self.store.find_all(
                Reaction::COLLECTION,
                &Filter::is_in("messageId", relate::distinct(message_ids.to_vec())).not_deleted(),
            )?)?;
            Ok(relate::group(reactions, |reaction| reaction.message_id.clone()))
        })
    }

    /// Every reaction on the messages, tombstoned ones included.
    pub fn all_in_messages(&self, message_ids: &[String]) -> RepoResult<Vec<Reaction>> {
        traced("all_reactions_in_messages", (message_ids.len(),), || {
            decode_all(self.store.find_all(
                Reaction::COLLECTION,
                &Filter::is_in("messageId", message_ids.iter().cloned()),
            )?)
        })
    }

    pub fn get(&self, reaction_id: &str) -> RepoResult<Option<Reaction>> {
        traced("get_reaction", (reaction_id,), || {
            decode_opt(self.store.get(Reaction::COLLECTION, reaction_id)?)
        })
    }

    pub fn by_ids(&self, reaction_ids: &[String]) -> RepoResult<Vec<Reaction>> {
        traced("reactions_by_ids", (reaction_ids.len(),), || {
            decode_all(self.store.get_many(Reaction::COLLECTION, reaction_ids)?)
        })
    }

    /// The user's reaction record on a message, tombstoned or not.
    pub fn find_by_user_and_message(&self, user_id: &str, message_id: &str) -> RepoResult<Option<Reaction>> {
        traced("reaction_by_user_and_message", (user_id, message_id), || {
            decode_opt(self.store.find_one(
                Reaction::COLLECTION,
                &Filter::eq("messageId", message_id).and(Filter::eq("userId", user_id)),
            )?)
        })
    }

    pub fn create(&self, message_id: &str, kind: &str, user_id: &str) -> RepoResult<Reaction> {
        traced("create_reaction", (message_id, user_id), || {
            insert(
                self.store,
                &Reaction {
                    id: String::new(),
                    message_id: message_id.to_string(),
                    user_id: user_id.to_string(),
                    kind: kind.to_string(),
                    timestamp: now_ms(),
                    deleted_at: None,
                },
            )
        })
    }

    pub fn soft_delete(&self, reaction_id: &str) -> RepoResult<Reaction> {
        traced("soft_delete_reaction", (reaction_id,), || {
            required(
                self.store.update_by_id(
                    Reaction::COLLECTION,
                    reaction_id,
                    &Update::new().set("deletedAt", now_ms()),
                )?,
                reaction_id,
            )
        })
    }

    pub fn restore(&self, reaction_id: &str) -> RepoResult<Reaction> {
        traced("restore_reaction", (reaction_id,), || {
            required(
                self.store.update_by_id(
                    Reaction::COLLECTION,
                    reaction_id,
                    &Update::new().unset("deletedAt"),
                )?,
                reaction_id,
            )
        })
    }
}

pub struct ThreadReactionRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> ThreadReactionRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn grouped_by_thread(
        &self,
        thread_ids: &[String],
    ) -> RepoResult<Vec<Group<String, Vec<ThreadReaction>>>> {
        traced("thread_reactions_by_thread", (thread_ids.len(),), || {
            let reactions: Vec<ThreadReaction> = decode_all(self.store.find_all(
                ThreadReaction::COLLECTION,
                &Filter::is_in("threadId", relate::distinct(thread_ids.to_vec())).not_deleted(),
            )?)?;
            Ok(relate::group(reactions, |reaction| reaction.thread_id.clone()))
        })
    }

    pub fn has_reacted(&self, user_id: &str, thread_id: &str) -> RepoResult<bool> {
        traced("has_reacted_to_thread", (user_id, thread_id), || {
            let count = self.store.count(
                ThreadReaction::COLLECTION,
                &Filter::eq("threadId", thread_id)
                    .and(Filter::eq("userId", user_id))
                    .not_deleted(),
            )?;
            Ok(count > 0)
        })
    }

    /// The user's reaction record on a thread, tombstoned or not.
    pub fn find_by_user_and_thread(&self, user_id: &str, thread_id: &str) -> RepoResult<Option<ThreadReaction>> {
        traced("thread_reaction_by_user_and_thread", (user_id, thread_id), || {
            decode_opt(self.store.find_one(
                ThreadReaction::COLLECTION,
                &Filter::eq("threadId", thread_id).and(Filter::eq("userId", user_id)),
            )?)
        })
    }

    pub fn create(&self, thread_id: &str, kind: &str, user_id: &str) -> RepoResult<ThreadReaction> {
        traced("create_thread_reaction", (thread_id, user_id), || {
            insert(
                self.store,
                &ThreadReaction {
                    id: String::new(),
                    thread_id: thread_id.to_string(),
                    user_id: user_id.to_string(),
                    kind: kind.to_string(),
                    created_at: now_ms(),
                    deleted_at: None,
                },
            )
        })
    }

    pub fn soft_delete(&self, reaction_id: &str) -> RepoResult<ThreadReaction> {
        traced("soft_delete_thread_reaction", (reaction_id,), || {
            required(
                self.store.update_by_id(
                    ThreadReaction::COLLECTION,
                    reaction_id,
                    &Update::new().set("deletedAt", now_ms()),
                )?,
                reaction_id,
            )
        })
    }

    pub fn restore(&self, reaction_id: &str) -> RepoResult<ThreadReaction> {
        traced("restore_thread_reaction", (reaction_id,), || {
            required(
                self.store.update_by_id(
                    ThreadReaction::COLLECTION,
                    reaction_id,
                    &Update::new().unset("deletedAt"),
                )?,
                reaction_id,
            )
        })
    }
}
