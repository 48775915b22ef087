//! Notification fan-out.
//!
//! # Responsibility
//! - Bundle events that repeat in one context within a short window into
//!   a single notification.
//! - Mark each recipient's delivery record as new and push it to live
//!   subscribers.
//!
//! # Invariants
//! - Actors and entities are deduplicated by id when bundling.
//! - The actors of the incoming event never receive it; earlier actors of a
//!   bundled notification still do.
//! - Direct message notifications go to
//!   [`crate::pubsub::DIRECT_MESSAGE_NOTIFICATION_ADDED`], all others to
//!   [`crate::pubsub::NOTIFICATION_ADDED`].

use crate::doc;
use crate::model::notification::{NewNotification, Notification, NotificationRef, UserNotification};
use crate::pubsub::{Event, PubSub, DIRECT_MESSAGE_NOTIFICATION_ADDED, NOTIFICATION_ADDED};
use crate::repo::notification_repo::{NotificationRepository, UsersNotificationsRepository};
use crate::repo::participant_repo::ParticipantRepository;
use crate::repo::RepoError;
use crate::service::ServiceResult;
use crate::store::DocumentStore;
use log::{debug, info};

/// Window in which repeated events are bundled.
pub const TIME_BUFFER_MS: i64 = 3 * 60 * 1000;

pub struct NotificationService<'a> {
    store: &'a DocumentStore<'a>,
    bus: &'a PubSub,
    buffer_ms: i64,
}

impl<'a> NotificationService<'a> {
    pub fn new(store: &'a DocumentStore<'a>, bus: &'a PubSub) -> Self {
        Self {
            store,
            bus,
            buffer_ms: TIME_BUFFER_MS,
        }
    }

    pub fn with_buffer_ms(mut self, buffer_ms: i64) -> Self {
        self.buffer_ms = buffer_ms;
        self
    }

    /// Stores or bundles `input` and delivers it to `recipients`.
    pub fn notify(&self, input: &NewNotification, recipients: &[String]) -> ServiceResult<Notification> {
        let notifications = NotificationRepository::new(self.store);
        let notification = match notifications.find_recent(&input.event, &input.context.id, self.buffer_ms)? {
            Some(mut existing) => {
                append_unique(&mut existing.actors, &input.actors);
                append_unique(&mut existing.entities, &input.entities);
                debug!(
                    "event=notification_bundled module=service notification_id={} event_type={}",
                    existing.id, existing.event
                );
                notifications.update(&existing)?
            }
            None => notifications.store(input)?,
        };

        let deliveries = UsersNotificationsRepository::new(self.store);
        let topic = if notification.is_direct_message() {
            DIRECT_MESSAGE_NOTIFICATION_ADDED
        } else {
            NOTIFICATION_ADDED
        };
        let mut delivered = 0;
        for recipient in recipients {
            if input.actors.iter().any(|actor| &actor.id == recipient) {
                continue;
            }
            let delivery = deliveries.mark_as_new(&notification.id, recipient)?;
            let joined = UserNotification {
                notification: notification.clone(),
                delivery,
            };
            let body = doc::to_document(&joined).map_err(RepoError::InvalidData)?;
            self.bus.publish(topic, Event::Notification(body));
            delivered += 1;
        }
        info!(
            "event=notification_sent module=service notification_id={} topic={topic} recipients={delivered}",
            notification.id
        );
        Ok(notification)
    }

    /// Users following a thread, minus `exclude_user_id`.
    pub fn thread_recipients(&self, thread_id: &str, exclude_user_id: &str) -> ServiceResult<Vec<String>> {
        Ok(ParticipantRepository::new(self.store)
            .notified_user_ids(thread_id)?
            .into_iter()
            .filter(|user_id| user_id != exclude_user_id)
            .collect())
    }
}

fn append_unique(target: &mut Vec<NotificationRef>, additions: &[NotificationRef]) {
    for addition in additions {
        if !target.iter().any(|existing| existing.id == addition.id) {
            target.push(addition.clone());
        }
    }
}
