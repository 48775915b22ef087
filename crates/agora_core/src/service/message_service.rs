//! Sending, editing and deleting messages.
//!
//! # Invariants
//! - A story message bumps its thread's `lastActive` and `messageCount`, and
//!   makes the sender a participant.
//! - A direct message bumps the conversation's `threadLastActive` and the
//!   sender's `lastSeen`.
//! - Deleting an already deleted message changes nothing.
//! - Only story messages are indexed for search.

use crate::jobs::{Job, JobQueue, SearchEvent};
use crate::model::message::{Message, MessageContent, NewMessage, ThreadType};
use crate::model::reputation::{MESSAGE_CREATED, MESSAGE_DELETED};
use crate::repo::community_repo::CommunityRepository;
use crate::repo::direct_message_repo::DirectMessageRepository;
use crate::repo::message_repo::MessageRepository;
use crate::repo::participant_repo::ParticipantRepository;
use crate::repo::RepoError;
use crate::repo::thread_repo::ThreadRepository;
use crate::service::{found, payload, ServiceError, ServiceResult};
use crate::store::DocumentStore;
use log::info;

const SEARCH_KIND: &str = "message";

pub struct MessageService<'a, Q: JobQueue> {
    store: &'a DocumentStore<'a>,
    jobs: &'a Q,
}

impl<'a, Q: JobQueue> MessageService<'a, Q> {
    pub fn new(store: &'a DocumentStore<'a>, jobs: &'a Q) -> Self {
        Self { store, jobs }
    }

    pub fn send(&self, input: &NewMessage, user_id: &str) -> ServiceResult<Message> {
        match input.thread_type {
            ThreadType::Story => self.send_to_thread(input, user_id),
            ThreadType::DirectMessageThread => self.send_direct(input, user_id),
        }
    }

    fn send_to_thread(&self, input: &NewMessage, user_id: &str) -> ServiceResult<Message> {
        let threads = ThreadRepository::new(self.store);
        let thread = found(threads.by_id(&input.thread_id)?, &input.thread_id)?;
        if thread.is_locked {
            return Err(ServiceError::forbidden("thread is locked"));
        }

        let message = MessageRepository::new(self.store).store(input, user_id)?;
        threads.set_last_active(&thread.id, message.timestamp)?;
        threads.increment_message_count(&thread.id)?;
        ParticipantRepository::new(self.store).create_participant(&thread.id, user_id)?;
        CommunityRepository::new(self.store).set_last_active(&thread.community_id, message.timestamp)?;

        self.jobs.enqueue(Job::MessageNotification {
            message: payload(&message)?,
        })?;
        self.jobs
            .enqueue(Job::search(&message.id, SEARCH_KIND, SearchEvent::Created))?;
        self.jobs
            .enqueue(Job::reputation(user_id, MESSAGE_CREATED, &message.id))?;
        info!(
            "event=message_sent module=service kind=story thread_id={} message_id={}",
            thread.id, message.id
        );
        Ok(message)
    }

    fn send_direct(&self, input: &NewMessage, user_id: &str) -> ServiceResult<Message> {
        let conversations = DirectMessageRepository::new(self.store);
        let conversation = found(conversations.get(&input.thread_id)?, &input.thread_id)?;
        if !conversations.is_member(&conversation.id, user_id)? {
            return Err(ServiceError::forbidden("not a member of this conversation"));
        }

        let message = MessageRepository::new(self.store).store(input, user_id)?;
        conversations.set_last_active(&conversation.id)?;
        conversations.set_last_seen(&conversation.id, user_id)?;

        self.jobs.enqueue(Job::DirectMessageNotification {
            message: payload(&message)?,
            user_id: user_id.to_string(),
        })?;
        info!(
            "event=message_sent module=service kind=direct thread_id={} message_id={}",
            conversation.id, message.id
        );
        Ok(message)
    }

    /// Replaces the body of a live message; only its sender may edit it.
    pub fn edit(&self, message_id: &str, content: &MessageContent, user_id: &str) -> ServiceResult<Message> {
        let messages = MessageRepository::new(self.store);
        let current = found(messages.get(message_id)?, message_id)?;
        if current.sender_id != user_id {
            return Err(ServiceError::forbidden("only the sender can edit a message"));
        }
        if content.body.trim().is_empty() {
            return Err(RepoError::InvalidInput("message body is empty".to_string()).into());
        }

        let edited = messages.edit(message_id, content)?;
        if edited.is_story() {
            self.jobs
                .enqueue(Job::search(&edited.id, SEARCH_KIND, SearchEvent::Edited))?;
        }
        Ok(edited)
    }

    /// Tombstones a message on behalf of `user_id`.
    pub fn delete(&self, message_id: &str, user_id: &str) -> ServiceResult<Message> {
        let messages = MessageRepository::new(self.store);
        let was_live = messages.get(message_id)?.is_some();
        let deleted = messages.delete(message_id, user_id)?;
        if !was_live {
            return Ok(deleted);
        }

        if deleted.is_story() {
            ThreadRepository::new(self.store).decrement_message_count(&deleted.thread_id)?;
            self.jobs.enqueue(Job::reputation(
                &deleted.sender_id,
                MESSAGE_DELETED,
                &deleted.id,
            ))?;
            self.jobs
                .enqueue(Job::search(&deleted.id, SEARCH_KIND, SearchEvent::Deleted))?;
        }
        info!("event=message_deleted module=service message_id={message_id} user_id={user_id}");
        Ok(deleted)
    }
}
