//! Thread lifecycle: publish, edit, move, delete.

use crate::jobs::{Job, JobQueue, SearchEvent};
use crate::model::thread::{NewThread, Thread, ThreadContent};
use crate::model::reputation::{THREAD_CREATED, THREAD_DELETED};
use crate::repo::channel_repo::ChannelRepository;
use crate::repo::community_repo::CommunityRepository;
use crate::repo::message_repo::MessageRepository;
use crate::repo::participant_repo::ParticipantRepository;
use crate::repo::thread_repo::ThreadRepository;
use crate::service::{found, ServiceError, ServiceResult};
use crate::store::DocumentStore;
use log::info;

const SEARCH_KIND: &str = "thread";

pub struct ThreadService<'a, Q: JobQueue> {
    store: &'a DocumentStore<'a>,
    jobs: &'a Q,
}

impl<'a, Q: JobQueue> ThreadService<'a, Q> {
    pub fn new(store: &'a DocumentStore<'a>, jobs: &'a Q) -> Self {
        Self { store, jobs }
    }

    /// Publishes a thread; the creator becomes its first participant.
    pub fn publish(&self, input: &NewThread, user_id: &str) -> ServiceResult<Thread> {
        let channel = found(ChannelRepository::new(self.store).by_id(&input.channel_id)?, &input.channel_id)?;
        if channel.community_id != input.community_id {
            return Err(ServiceError::forbidden("channel belongs to another community"));
        }
        if channel.archived_at.is_some() {
            return Err(ServiceError::forbidden("channel is archived"));
        }

        let thread = ThreadRepository::new(self.store).publish(input, user_id)?;
        ParticipantRepository::new(self.store).create_participant(&thread.id, user_id)?;
        CommunityRepository::new(self.store).set_last_active(&thread.community_id, thread.created_at)?;

        self.jobs
            .enqueue(Job::search(&thread.id, SEARCH_KIND, SearchEvent::Created))?;
        self.jobs
            .enqueue(Job::reputation(user_id, THREAD_CREATED, &thread.id))?;
        info!(
            "event=thread_published module=service thread_id={} channel_id={}",
            thread.id, thread.channel_id
        );
        Ok(thread)
    }

    pub fn edit(&self, thread_id: &str, content: &ThreadContent, user_id: &str) -> ServiceResult<Thread> {
        let threads = ThreadRepository::new(self.store);
        found(threads.by_id(thread_id)?, thread_id)?;
        let edited = threads.edit(thread_id, content, user_id, true)?;
        self.jobs
            .enqueue(Job::search(thread_id, SEARCH_KIND, SearchEvent::Edited))?;
        Ok(edited)
    }

    /// Moves a thread to another channel of the same community.
    pub fn move_to_channel(&self, thread_id: &str, channel_id: &str) -> ServiceResult<Thread> {
        let threads = ThreadRepository::new(self.store);
        let thread = found(threads.by_id(thread_id)?, thread_id)?;
        let channel = found(ChannelRepository::new(self.store).by_id(channel_id)?, channel_id)?;
        if channel.community_id != thread.community_id {
            return Err(ServiceError::forbidden("threads cannot move across communities"));
        }
        let moved = threads.move_to_channel(thread_id, channel_id)?;
        self.jobs
            .enqueue(Job::search(thread_id, SEARCH_KIND, SearchEvent::Moved))?;
        Ok(moved)
    }

    /// Tombstones a thread together with its messages and silences it.
    pub fn delete(&self, thread_id: &str, user_id: &str) -> ServiceResult<Thread> {
        let threads = ThreadRepository::new(self.store);
        let thread = found(threads.by_id(thread_id)?, thread_id)?;

        let deleted = threads.delete(thread_id, user_id)?;
        ParticipantRepository::new(self.store).turn_off_for_thread(thread_id)?;
        let messages = MessageRepository::new(self.store).delete_in_thread(thread_id, user_id)?;
        for message in messages.iter().filter(|message| message.is_story()) {
            self.jobs
                .enqueue(Job::search(&message.id, "message", SearchEvent::Deleted))?;
        }

        self.jobs.enqueue(Job::reputation(
            &thread.creator_id,
            THREAD_DELETED,
            &thread.id,
        ))?;
        self.jobs
            .enqueue(Job::search(thread_id, SEARCH_KIND, SearchEvent::Deleted))?;
        info!(
            "event=thread_deleted module=service thread_id={thread_id} messages_deleted={}",
            messages.len()
        );
        Ok(deleted)
    }
}
