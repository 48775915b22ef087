//! Side-effect job outbox.
//!
//! # Responsibility
//! - Describe asynchronous follow-ups produced by mutations (reputation,
//!   notification fan-out, search indexing).
//! - Persist them so a worker can process them later.
//!
//! # Invariants
//! - A job is written once and only its `processedAt` marker changes.
//! - Only processed jobs are ever purged.
//! - Pending jobs are returned in enqueue order.

use crate::doc::Document;
use crate::model::now_ms;
use crate::store::{DocumentStore, Filter, FindOptions, StoreResult, Update};
use log::info;
use serde_json::{json, Value};
use std::cell::RefCell;

pub const JOBS_COLLECTION: &str = "jobs";

pub const REPUTATION_EVENT_QUEUE: &str = "process reputation event";
pub const REACTION_NOTIFICATION_QUEUE: &str = "reaction notification";
pub const THREAD_REACTION_NOTIFICATION_QUEUE: &str = "thread reaction notification";
pub const MESSAGE_NOTIFICATION_QUEUE: &str = "message notification";
pub const DIRECT_MESSAGE_NOTIFICATION_QUEUE: &str = "direct message notification";
pub const CHANNEL_NOTIFICATION_QUEUE: &str = "channel notification";
pub const COMMUNITY_NOTIFICATION_QUEUE: &str = "community notification";
pub const SEARCH_INDEX_QUEUE: &str = "search index";

/// Search index mutation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SearchEvent {
    Created,
    Edited,
    Moved,
    Deleted,
}

impl SearchEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Edited => "edited",
            Self::Moved => "moved",
            Self::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    ReputationEvent {
        user_id: String,
        kind: String,
        entity_id: String,
    },
    ReactionNotification {
        reaction: Document,
        user_id: String,
    },
    ThreadReactionNotification {
        thread_reaction: Document,
        user_id: String,
    },
    MessageNotification {
        message: Document,
    },
    DirectMessageNotification {
        message: Document,
        user_id: String,
    },
    ChannelNotification {
        channel: Document,
        user_id: String,
    },
    CommunityNotification {
        community_id: String,
        user_id: String,
    },
    SearchIndex {
        id: String,
        kind: &'static str,
        event: SearchEvent,
    },
}

impl Job {
    pub fn reputation(user_id: &str, kind: &str, entity_id: &str) -> Self {
        Self::ReputationEvent {
            user_id: user_id.to_string(),
            kind: kind.to_string(),
            entity_id: entity_id.to_string(),
        }
    }

    pub fn search(id: &str, kind: &'static str, event: SearchEvent) -> Self {
        Self::SearchIndex {
            id: id.to_string(),
            kind,
            event,
        }
    }

    pub fn queue(&self) -> &'static str {
        match self {
            Self::ReputationEvent { .. } => REPUTATION_EVENT_QUEUE,
            Self::ReactionNotification { .. } => REACTION_NOTIFICATION_QUEUE,
            Self::ThreadReactionNotification { .. } => THREAD_REACTION_NOTIFICATION_QUEUE,
            Self::MessageNotification { .. } => MESSAGE_NOTIFICATION_QUEUE,
            Self::DirectMessageNotification { .. } => DIRECT_MESSAGE_NOTIFICATION_QUEUE,
            Self::ChannelNotification { .. } => CHANNEL_NOTIFICATION_QUEUE,
            Self::CommunityNotification { .. } => COMMUNITY_NOTIFICATION_QUEUE,
            Self::SearchIndex { .. } => SEARCH_INDEX_QUEUE,
        }
    }

    /// Wire payload as stored in the outbox.
    pub fn payload(&self) -> Value {
        match self {
            Self::ReputationEvent {
                user_id,
                kind,
                entity_id,
            } => json!({ "userId": user_id, "type": kind, "entityId": entity_id }),
            Self::ReactionNotification { reaction, user_id } => {
                json!({ "reaction": reaction, "userId": user_id })
            }
            Self::ThreadReactionNotification {
                thread_reaction,
                user_id,
            } => json!({ "threadReaction": thread_reaction, "userId": user_id }),
            Self::MessageNotification { message } => json!({ "message": message }),
            Self::DirectMessageNotification { message, user_id } => {
                json!({ "message": message, "userId": user_id })
            }
            Self::ChannelNotification { channel, user_id } => {
                json!({ "channel": channel, "userId": user_id })
            }
            Self::CommunityNotification {
                community_id,
                user_id,
            } => json!({ "communityId": community_id, "userId": user_id }),
            Self::SearchIndex { id, kind, event } => {
                json!({ "id": id, "type": kind, "event": event.as_str() })
            }
        }
    }
}

/// Destination for side-effect jobs.
pub trait JobQueue {
    fn enqueue(&self, job: Job) -> StoreResult<()>;
}

/// Outbox persisted in the `jobs` collection.
pub struct StoreJobQueue<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> StoreJobQueue<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    /// Unprocessed jobs of `queue`, oldest first.
    pub fn pending(&self, queue: &str) -> StoreResult<Vec<Document>> {
        self.store.find(
            JOBS_COLLECTION,
            &Filter::eq("queue", queue).and(Filter::missing("processedAt")),
            &FindOptions::new(),
        )
    }

    /// Unprocessed jobs across all queues, oldest first.
    pub fn all_pending(&self) -> StoreResult<Vec<Document>> {
        self.store
            .find_all(JOBS_COLLECTION, &Filter::missing("processedAt"))
    }

    /// Marks a job processed; returns `false` for unknown ids.
    pub fn mark_processed(&self, id: &str) -> StoreResult<bool> {
        let updated = self.store.update_by_id(
            JOBS_COLLECTION,
            id,
            &Update::new().set("processedAt", now_ms()),
        )?;
        Ok(updated.is_some())
    }

    /// Deletes jobs processed before `before_ms`; returns how many.
    pub fn purge_processed(&self, before_ms: i64) -> StoreResult<usize> {
        let purged = self.store.delete_many(
            JOBS_COLLECTION,
            &Filter::exists("processedAt").and(Filter::lt("processedAt", before_ms)),
        )?;
        info!("event=jobs_purged module=jobs purged={purged} before_ms={before_ms}");
        Ok(purged)
    }
}

impl JobQueue for StoreJobQueue<'_> {
    fn enqueue(&self, job: Job) -> StoreResult<()> {
        let queue = job.queue();
        let mut doc = Document::new();
        doc.insert("queue".to_string(), Value::from(queue));
        doc.insert("payload".to_string(), job.payload());
        doc.insert("createdAt".to_string(), Value::from(now_ms()));

        let stored = self.store.insert_one(JOBS_COLLECTION, doc)?;
        info!(
            "event=job_enqueued module=jobs queue=\"{queue}\" job_id={}",
            stored.get("id").and_then(Value::as_str).unwrap_or_default()
        );
        Ok(())
    }
}

/// In-memory queue that records enqueued jobs.
#[derive(Debug, Default)]
pub struct MemoryJobQueue {
    jobs: RefCell<Vec<Job>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.borrow().clone()
    }

    /// Jobs recorded for `queue`, in enqueue order.
    pub fn jobs_in(&self, queue: &str) -> Vec<Job> {
        self.jobs
            .borrow()
            .iter()
            .filter(|job| job.queue() == queue)
            .cloned()
            .collect()
    }

    pub fn take(&self) -> Vec<Job> {
        self.jobs.borrow_mut().drain(..).collect()
    }
}

impl JobQueue for MemoryJobQueue {
    fn enqueue(&self, job: Job) -> StoreResult<()> {
        self.jobs.borrow_mut().push(job);
        Ok(())
    }
}
