//! Message repository.

use crate::model::message::{Message, MessageContent, MessageType, NewMessage};
use crate::model::{now_ms, Entity, GroupCount, Timeframe};
use crate::query::traced;
use crate::repo::{count_by, decode, decode_all, decode_opt, insert, required, RepoError, RepoResult};
use crate::store::{DocumentStore, Filter, FindOptions, Update};
use serde_json::{json, Value};

/// Cursor over a thread's messages, keyed by `timestamp`.
///
/// A page size of 0 means no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePage {
    /// Oldest first, strictly after `after`.
    Forward { first: u64, after: Option<i64> },
    /// Newest first, strictly before `before`.
    Backward { last: u64, before: Option<i64> },
}

pub struct MessageRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> MessageRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn get(&self, message_id: &str) -> RepoResult<Option<Message>> {
        traced("get_message", (message_id,), || {
            decode_opt(self.store.find_one(
                Message::COLLECTION,
                &Filter::eq("id", message_id).not_deleted(),
            )?)
        })
    }

    pub fn get_many(&self, message_ids: &[String]) -> RepoResult<Vec<Message>> {
        traced("get_many_messages", (message_ids.len(),), || {
            let messages: Vec<Message> =
                decode_all(self.store.get_many(Message::COLLECTION, message_ids)?)?;
            Ok(messages
                .into_iter()
                .filter(|message| message.deleted_at.is_none())
                .collect())
        })
    }

    pub fn page(&self, thread_id: &str, page: MessagePage) -> RepoResult<Vec<Message>> {
        traced("messages_page", (thread_id, page), || {
            let live = Filter::eq("threadId", thread_id).not_deleted();
            let (filter, options) = match page {
                MessagePage::Forward { first, after } => (
                    match after {
                        Some(after) => live.and(Filter::gt("timestamp", after)),
                        None => live,
                    },
                    page_size(FindOptions::new().sort_asc("timestamp"), first),
                ),
                MessagePage::Backward { last, before } => (
                    match before {
                        Some(before) => live.and(Filter::lt("timestamp", before)),
                        None => live,
                    },
                    page_size(FindOptions::new().sort_desc("timestamp"), last),
                ),
            };
            decode_all(self.store.find(Message::COLLECTION, &filter, &options)?)
        })
    }

    pub fn last_message(&self, thread_id: &str) -> RepoResult<Option<Message>> {
        traced("last_message", (thread_id,), || {
            let mut newest = self.store.find(
                Message::COLLECTION,
                &Filter::eq("threadId", thread_id).not_deleted(),
                &FindOptions::new().sort_desc("timestamp").limit(1),
            )?;
            decode_opt(newest.pop())
        })
    }

    /// Last message of every thread, aligned with `thread_ids`.
    pub fn last_message_of_threads(&self, thread_ids: &[String]) -> RepoResult<Vec<Option<Message>>> {
        thread_ids
            .iter()
            .map(|thread_id| self.last_message(thread_id))
            .collect()
    }

    pub fn media_messages(&self, thread_id: &str) -> RepoResult<Vec<Message>> {
        traced("media_messages_for_thread", (thread_id,), || {
            decode_all(self.store.find_all(
                Message::COLLECTION,
                &Filter::eq("threadId", thread_id)
                    .and(Filter::eq("messageType", "media"))
                    .not_deleted(),
            )?)
        })
    }

    /// Stores a message sent now by `user_id`.
    pub fn store(&self, input: &NewMessage, user_id: &str) -> RepoResult<Message> {
        traced("store_message", (&input.thread_id, user_id), || {
            if input.message_type != MessageType::Media && input.content.body.trim().is_empty() {
                return Err(RepoError::InvalidInput("message body is empty".to_string()));
            }
            insert(
                self.store,
                &Message {
                    id: String::new(),
                    thread_id: input.thread_id.clone(),
                    thread_type: input.thread_type,
                    message_type: input.message_type,
                    sender_id: user_id.to_string(),
                    content: input.content.clone(),
                    timestamp: now_ms(),
                    edits: Vec::new(),
                    modified_at: None,
                    deleted_at: None,
                    deleted_by: None,
                },
            )
        })
    }

    pub fn count(&self, thread_id: &str) -> RepoResult<u64> {
        traced("message_count", (thread_id,), || {
            Ok(self.store.count(
                Message::COLLECTION,
                &Filter::eq("threadId", thread_id).not_deleted(),
            )?)
        })
    }

    /// Live messages posted in the thread inside the current window.
    pub fn new_count_in_timeframe(&self, thread_id: &str, range: Timeframe) -> RepoResult<u64> {
        traced("new_message_count", (thread_id, range), || {
            let now = now_ms();
            Ok(self.store.count(
                Message::COLLECTION,
                &Filter::eq("threadId", thread_id)
                    .and(Filter::gt("timestamp", now - range.current_ms()))
                    .and(Filter::lte("timestamp", now))
                    .not_deleted(),
            )?)
        })
    }

    pub fn count_in_threads(&self, thread_ids: &[String]) -> RepoResult<Vec<GroupCount>> {
        traced("message_count_in_threads", (thread_ids.len(),), || {
            let messages = self.store.find_all(
                Message::COLLECTION,
                &Filter::is_in("threadId", thread_ids.iter().cloned()).not_deleted(),
            )?;
            Ok(count_by(messages, "threadId"))
        })
    }

    /// Tombstones one message; deleting twice keeps the first tombstone.
    pub fn delete(&self, message_id: &str, user_id: &str) -> RepoResult<Message> {
        traced("delete_message", (message_id, user_id), || {
            let Some(current) = self.store.get(Message::COLLECTION, message_id)? else {
                return Err(RepoError::not_found(Message::COLLECTION, message_id));
            };
            if current.contains_key("deletedAt") {
                return decode(current);
            }
            required(
                self.store.update_by_id(
                    Message::COLLECTION,
                    message_id,
                    &Update::new()
                        .set("deletedBy", user_id)
                        .set("deletedAt", now_ms()),
                )?,
                message_id,
            )
        })
    }

    /// Tombstones every live message of a thread and returns them.
    pub fn delete_in_thread(&self, thread_id: &str, user_id: &str) -> RepoResult<Vec<Message>> {
        traced("delete_messages_in_thread", (thread_id, user_id), || {
            decode_all(self.store.update_many(
                Message::COLLECTION,
                &Filter::eq("threadId", thread_id).not_deleted(),
                &Update::new()
                    .set("deletedBy", user_id)
                    .set("deletedAt", now_ms()),
            )?)
        })
    }

    pub fn user_has_messages_in_thread(&self, thread_id: &str, user_id: &str) -> RepoResult<bool> {
        traced("user_has_messages_in_thread", (thread_id, user_id), || {
            let count = self.store.count(
                Message::COLLECTION,
                &Filter::eq("threadId", thread_id)
                    .and(Filter::eq("senderId", user_id))
                    .not_deleted(),
            )?;
            Ok(count > 0)
        })
    }

    /// Live messages `user_id` sent in any of `thread_ids`.
    pub fn sent_in_threads(&self, thread_ids: &[String], user_id: &str) -> RepoResult<Vec<Message>> {
        traced("messages_sent_in_threads", (thread_ids.len(), user_id), || {
            decode_all(self.store.find_all(
                Message::COLLECTION,
                &Filter::is_in("threadId", thread_ids.iter().cloned())
                    .and(Filter::eq("senderId", user_id))
                    .not_deleted(),
            )?)
        })
    }

    /// Replaces the content; the previous content is appended to `edits`
    /// stamped with the time it was written.
    pub fn edit(&self, message_id: &str, content: &MessageContent) -> RepoResult<Message> {
        traced("edit_message", (message_id,), || {
            let Some(current) = self.store.get(Message::COLLECTION, message_id)? else {
                return Err(RepoError::not_found(Message::COLLECTION, message_id));
            };
            let written_at = current
                .get("modifiedAt")
                .filter(|value| !value.is_null())
                .or_else(|| current.get("timestamp"))
                .cloned()
                .unwrap_or(Value::Null);
            let snapshot = json!({
                "content": current.get("content").cloned().unwrap_or(Value::Null),
                "timestamp": written_at,
            });
            required(
                self.store.update_by_id(
                    Message::COLLECTION,
                    message_id,
                    &Update::new()
                        .push("edits", snapshot)
                        .set("content", json!({ "body": content.body }))
                        .set("modifiedAt", now_ms()),
                )?,
                message_id,
            )
        })
    }
}

fn page_size(options: FindOptions, size: u64) -> FindOptions {
    match size {
        0 => options,
        size => options.limit(size),
    }
}
