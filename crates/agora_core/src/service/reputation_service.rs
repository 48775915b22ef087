//! Reputation job processing.
//!
//! A reputation job names the user, the event type and the entity that
//! caused it. Message and reaction events reference a message; thread
//! events reference a thread. The community is resolved through the thread.

use crate::doc::{self, Document};
use crate::jobs::{StoreJobQueue, REPUTATION_EVENT_QUEUE};
use crate::model::message::Message;
use crate::model::reputation::{
    score_for, ReputationEvent, MESSAGE_CREATED, MESSAGE_DELETED, REACTION_CREATED,
    REACTION_DELETED,
};
use crate::model::thread::Thread;
use crate::model::Entity;
use crate::repo::decode_opt;
use crate::repo::membership_repo::CommunityMembershipRepository;
use crate::repo::reputation_repo::ReputationRepository;
use crate::repo::thread_repo::ThreadRepository;
use crate::service::ServiceResult;
use crate::store::DocumentStore;
use log::{info, warn};

pub struct ReputationService<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> ReputationService<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    /// Applies one reputation event.
    ///
    /// Returns `None` when the event scores nothing or its entity no longer
    /// resolves to a community (direct messages, purged threads).
    pub fn process(&self, user_id: &str, kind: &str, entity_id: &str) -> ServiceResult<Option<ReputationEvent>> {
        let score = score_for(kind);
        if score == 0 {
            warn!("event=reputation_skipped module=service reason=unknown_type type=\"{kind}\"");
            return Ok(None);
        }
        let Some(community_id) = self.community_of(kind, entity_id)? else {
            info!(
                "event=reputation_skipped module=service reason=no_community type=\"{kind}\" entity_id={entity_id}"
            );
            return Ok(None);
        };

        CommunityMembershipRepository::new(self.store).update_reputation(&community_id, user_id, score)?;
        let event = ReputationRepository::new(self.store).save_event(user_id, &community_id, kind, score)?;
        info!(
            "event=reputation_applied module=service user_id={user_id} community_id={community_id} score={score}"
        );
        Ok(Some(event))
    }

    /// Processes every pending reputation job and marks it done; returns how
    /// many were handled.
    pub fn process_pending(&self, queue: &StoreJobQueue<'_>) -> ServiceResult<usize> {
        let pending = queue.pending(REPUTATION_EVENT_QUEUE)?;
        let mut handled = 0;
        for job in pending {
            let job_id = doc::get_str(&job, "id").unwrap_or_default();
            self.process(
                payload_str(&job, "userId"),
                payload_str(&job, "type"),
                payload_str(&job, "entityId"),
            )?;
            queue.mark_processed(job_id)?;
            handled += 1;
        }
        Ok(handled)
    }

    fn community_of(&self, kind: &str, entity_id: &str) -> ServiceResult<Option<String>> {
        let thread_id = match kind {
            MESSAGE_CREATED | MESSAGE_DELETED | REACTION_CREATED | REACTION_DELETED => {
                let message: Option<Message> =
                    decode_opt(self.store.get(Message::COLLECTION, entity_id)?)?;
                match message {
                    Some(message) if message.is_story() => message.thread_id,
                    _ => return Ok(None),
                }
            }
            _ => entity_id.to_string(),
        };
        let thread: Option<Thread> = ThreadRepository::new(self.store).get(&thread_id)?;
        Ok(thread.map(|thread| thread.community_id))
    }
}

fn payload_str<'d>(job: &'d Document, field: &str) -> &'d str {
    doc::get_str(job, &format!("payload.{field}")).unwrap_or_default()
}
