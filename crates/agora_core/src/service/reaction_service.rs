//! Message and thread reactions.
//!
//! # Invariants
//! - A user holds at most one reaction per message and per thread; toggling
//!   tombstones or restores that record instead of adding another.
//! - Thread `reactionCount` moves with every active/inactive transition.
//! - Reactors are never notified about their own content.

use crate::jobs::{Job, JobQueue};
use crate::model::message::Message;
use crate::model::reaction::{Reaction, ThreadReaction};
use crate::model::reputation::{
    REACTION_CREATED, REACTION_DELETED, THREAD_REACTION_CREATED, THREAD_REACTION_DELETED,
};
use crate::model::thread::Thread;
use crate::repo::message_repo::MessageRepository;
use crate::repo::reaction_repo::{ReactionRepository, ThreadReactionRepository};
use crate::repo::thread_repo::ThreadRepository;
use crate::service::{found, payload, ServiceResult};
use crate::store::DocumentStore;
use log::info;

pub struct ReactionService<'a, Q: JobQueue> {
    store: &'a DocumentStore<'a>,
    jobs: &'a Q,
}

impl<'a, Q: JobQueue> ReactionService<'a, Q> {
    pub fn new(store: &'a DocumentStore<'a>, jobs: &'a Q) -> Self {
        Self { store, jobs }
    }

    /// Adds, removes or re-adds the user's reaction to a message and
    /// returns the message.
    pub fn toggle_reaction(&self, message_id: &str, kind: &str, user_id: &str) -> ServiceResult<Message> {
        let message = found(MessageRepository::new(self.store).get(message_id)?, message_id)?;
        let reactions = ReactionRepository::new(self.store);

        match reactions.find_by_user_and_message(user_id, message_id)? {
            Some(existing) if existing.deleted_at.is_none() => {
                reactions.soft_delete(&existing.id)?;
                self.reputation(&message, REACTION_DELETED)?;
                info!(
                    "event=reaction_toggled module=service status=removed message_id={message_id} user_id={user_id}"
                );
            }
            Some(existing) => {
                let restored = reactions.restore(&existing.id)?;
                self.reaction_added(&message, &restored, user_id)?;
            }
            None => {
                let created = reactions.create(message_id, kind, user_id)?;
                self.reaction_added(&message, &created, user_id)?;
            }
        }
        Ok(message)
    }

    /// Reacts to a thread; an active reaction is returned unchanged.
    pub fn add_thread_reaction(&self, thread_id: &str, kind: &str, user_id: &str) -> ServiceResult<ThreadReaction> {
        let thread = found(ThreadRepository::new(self.store).by_id(thread_id)?, thread_id)?;
        let reactions = ThreadReactionRepository::new(self.store);

        let reaction = match reactions.find_by_user_and_thread(user_id, thread_id)? {
            Some(active) if active.deleted_at.is_none() => return Ok(active),
            Some(inactive) => reactions.restore(&inactive.id)?,
            None => reactions.create(thread_id, kind, user_id)?,
        };
        ThreadRepository::new(self.store).increment_reaction_count(thread_id)?;

        self.jobs.enqueue(Job::reputation(
            &thread.creator_id,
            THREAD_REACTION_CREATED,
            &thread.id,
        ))?;
        if thread.creator_id != user_id {
            self.jobs.enqueue(Job::ThreadReactionNotification {
                thread_reaction: payload(&reaction)?,
                user_id: user_id.to_string(),
            })?;
        }
        info!(
            "event=thread_reaction_added module=service status=ok thread_id={thread_id} user_id={user_id}"
        );
        Ok(reaction)
    }

    /// Withdraws the user's thread reaction; `None` when there was none.
    pub fn remove_thread_reaction(&self, thread_id: &str, user_id: &str) -> ServiceResult<Option<ThreadReaction>> {
        let thread: Thread = found(ThreadRepository::new(self.store).by_id(thread_id)?, thread_id)?;
        let reactions = ThreadReactionRepository::new(self.store);

        let Some(active) = reactions
            .find_by_user_and_thread(user_id, thread_id)?
            .filter(|reaction| reaction.deleted_at.is_none())
        else {
            return Ok(None);
        };
        let removed = reactions.soft_delete(&active.id)?;
        ThreadRepository::new(self.store).decrement_reaction_count(thread_id)?;
        self.jobs.enqueue(Job::reputation(
            &thread.creator_id,
            THREAD_REACTION_DELETED,
            &thread.id,
        ))?;
        Ok(Some(removed))
    }

    fn reaction_added(&self, message: &Message, reaction: &Reaction, user_id: &str) -> ServiceResult<()> {
        self.reputation(message, REACTION_CREATED)?;
        if message.sender_id != user_id {
            self.jobs.enqueue(Job::ReactionNotification {
                reaction: payload(reaction)?,
                user_id: user_id.to_string(),
            })?;
        }
        info!(
            "event=reaction_toggled module=service status=added message_id={} user_id={user_id}",
            message.id
        );
        Ok(())
    }

    // Direct messages carry no reputation.
    fn reputation(&self, message: &Message, kind: &str) -> ServiceResult<()> {
        if message.is_story() {
            self.jobs
                .enqueue(Job::reputation(&message.sender_id, kind, &message.id))?;
        }
        Ok(())
    }
}
