//! Notifications and per-recipient delivery records.
//!
//! # Invariants
//! - A recipient has at most one `usersNotifications` record per
//!   notification; re-notifying resets it to unseen instead of adding one.
//! - Direct message notifications are marked seen separately from the rest.

use crate::doc::Document;
use crate::model::notification::{NewNotification, Notification, UserNotification, UsersNotifications};
use crate::model::{now_ms, Entity, Page};
use crate::query::traced;
use crate::relate;
use crate::repo::{decode, decode_all, decode_opt, encode, insert, paged, required, RepoResult};
use crate::store::{DocumentStore, Filter, FindOptions, Update};

pub struct NotificationRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> NotificationRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    /// Most recent notification for `event` in `context_id` modified within
    /// the last `buffer_ms`.
    pub fn find_recent(&self, event: &str, context_id: &str, buffer_ms: i64) -> RepoResult<Option<Notification>> {
        traced("check_for_existing_notification", (event, context_id, buffer_ms), || {
            let now = now_ms();
            let filter = Filter::eq("event", event)
                .and(Filter::eq("context.id", context_id))
                .and(Filter::gte("modifiedAt", now - buffer_ms))
                .and(Filter::lte("modifiedAt", now));
            let recent = self.store.find(
                Notification::COLLECTION,
                &filter,
                &FindOptions::new().sort_desc("modifiedAt").limit(1),
            )?;
            decode_opt(recent.into_iter().next())
        })
    }

    pub fn store(&self, input: &NewNotification) -> RepoResult<Notification> {
        traced("store_notification", (&input.event, &input.context.id), || {
            let now = now_ms();
            insert(
                self.store,
                &Notification {
                    id: String::new(),
                    event: input.event.clone(),
                    context: input.context.clone(),
                    actors: input.actors.clone(),
                    entities: input.entities.clone(),
                    created_at: now,
                    modified_at: now,
                },
            )
        })
    }

    /// Saves the actors, entities and context of `notification` and bumps
    /// `modifiedAt`.
    pub fn update(&self, notification: &Notification) -> RepoResult<Notification> {
        traced("update_notification", (&notification.id,), || {
            let mut fields = encode(notification)?;
            fields.remove("id");
            fields.remove("createdAt");
            fields.insert("modifiedAt".to_string(), now_ms().into());
            let updated = self.store.update_by_id(
                Notification::COLLECTION,
                &notification.id,
                &Update::new().merge(fields),
            )?;
            required(updated, &notification.id)
        })
    }

    pub fn get(&self, notification_id: &str) -> RepoResult<Option<Notification>> {
        traced("get_notification", (notification_id,), || {
            decode_opt(self.store.get(Notification::COLLECTION, notification_id)?)
        })
    }

    pub fn get_many(&self, notification_ids: &[String]) -> RepoResult<Vec<Notification>> {
        traced("get_notifications", (notification_ids.len(),), || {
            decode_all(self.store.get_many(Notification::COLLECTION, notification_ids)?)
        })
    }
}

pub struct UsersNotificationsRepository<'a> {
    store: &'a DocumentStore<'a>,
}

fn delivery_filter(notification_id: &str, user_id: &str) -> Filter {
    Filter::eq("userId", user_id).and(Filter::eq("notificationId", notification_id))
}

impl<'a> UsersNotificationsRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn mark_seen(&self, notification_id: &str, user_id: &str) -> RepoResult<bool> {
        traced("mark_single_notification_seen", (notification_id, user_id), || {
            let updated = self.store.update_many(
                UsersNotifications::COLLECTION,
                &delivery_filter(notification_id, user_id),
                &Update::new().set("isSeen", true),
            )?;
            Ok(!updated.is_empty())
        })
    }

    pub fn mark_many_seen(&self, user_id: &str, notification_ids: &[String]) -> RepoResult<usize> {
        traced("mark_notifications_seen", (user_id, notification_ids.len()), || {
            let updated = self.store.update_many(
                UsersNotifications::COLLECTION,
                &Filter::eq("userId", user_id)
                    .and(Filter::is_in("notificationId", notification_ids.iter().cloned())),
                &Update::new().set("isSeen", true),
            )?;
            Ok(updated.len())
        })
    }

    /// Marks every unseen notification seen except direct messages.
    pub fn mark_all_seen(&self, user_id: &str) -> RepoResult<usize> {
        traced("mark_all_notifications_seen", (user_id,), || {
            self.mark_unseen_where(user_id, |notification| !notification.is_direct_message())
        })
    }

    pub fn mark_direct_messages_seen(&self, user_id: &str) -> RepoResult<usize> {
        traced("mark_direct_message_notifications_seen", (user_id,), || {
            self.mark_unseen_where(user_id, Notification::is_direct_message)
        })
    }

    pub fn store(&self, notification_id: &str, user_id: &str) -> RepoResult<UsersNotifications> {
        traced("store_users_notifications", (notification_id, user_id), || {
            let now = now_ms();
            insert(
                self.store,
                &UsersNotifications {
                    id: String::new(),
                    notification_id: notification_id.to_string(),
                    user_id: user_id.to_string(),
                    is_seen: false,
                    is_read: false,
                    created_at: now,
                    entity_added_at: now,
                },
            )
        })
    }

    /// Resets the recipient's record to unread, creating it for recipients
    /// who joined after the notification was first sent.
    pub fn mark_as_new(&self, notification_id: &str, user_id: &str) -> RepoResult<UsersNotifications> {
        traced("mark_users_notifications_as_new", (notification_id, user_id), || {
            let updated = self.store.update_one(
                UsersNotifications::COLLECTION,
                &delivery_filter(notification_id, user_id),
                &Update::new()
                    .set("isRead", false)
                    .set("isSeen", false)
                    .set("entityAddedAt", now_ms()),
            )?;
            match decode_opt(updated)? {
                Some(record) => Ok(record),
                None => self.store(notification_id, user_id),
            }
        })
    }

    /// Seen delivery records of every user, oldest first; input for cleanup.
    pub fn seen(&self, page: Page) -> RepoResult<Vec<UsersNotifications>> {
        traced("seen_users_notifications", (page,), || {
            decode_all(self.store.find(
                UsersNotifications::COLLECTION,
                &Filter::eq("isSeen", true),
                &paged(FindOptions::new().sort_asc("createdAt"), page),
            )?)
        })
    }

    /// Hard-deletes delivery records by id.
    pub fn delete_many(&self, record_ids: &[String]) -> RepoResult<usize> {
        traced("delete_users_notifications", (record_ids.len(),), || {
            if record_ids.is_empty() {
                return Ok(0);
            }
            Ok(self.store.delete_many(
                UsersNotifications::COLLECTION,
                &Filter::is_in("id", record_ids.iter().cloned()),
            )?)
        })
    }

    /// Notifications of a user, most recently added first.
    pub fn for_user(&self, user_id: &str, page: Page) -> RepoResult<Vec<UserNotification>> {
        traced("users_notifications", (user_id, page), || {
            let records = self.store.find(
                UsersNotifications::COLLECTION,
                &Filter::eq("userId", user_id),
                &paged(FindOptions::new().sort_desc("entityAddedAt"), page),
            )?;
            self.with_notifications(records)
        })
    }

    fn with_notifications(&self, records: Vec<Document>) -> RepoResult<Vec<UserNotification>> {
        let rows = self
            .store
            .join(records, "notificationId", Notification::COLLECTION, "id")?;
        rows.into_iter()
            .map(|row| {
                Ok(UserNotification {
                    notification: decode(row.right)?,
                    delivery: decode(row.left)?,
                })
            })
            .collect()
    }

    fn mark_unseen_where(
        &self,
        user_id: &str,
        mut predicate: impl FnMut(&Notification) -> bool,
    ) -> RepoResult<usize> {
        let unseen = self.store.find_all(
            UsersNotifications::COLLECTION,
            &Filter::eq("userId", user_id).and(Filter::eq("isSeen", false)),
        )?;
        let ids: Vec<String> = self
            .with_notifications(unseen)?
            .into_iter()
            .filter(|row| predicate(&row.notification))
            .map(|row| row.notification.id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = relate::distinct(ids);
        self.mark_many_seen(user_id, &ids)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::notification::{Notification, NotificationRef, DIRECT_MESSAGE_THREAD_CONTEXT};
    use serde_json::Value;

    #[test]
    fn direct_message_context_is_detected() {
        let notification = Notification {
            id: "n1".to_string(),
            event: "MESSAGE_CREATED".to_string(),
            context: NotificationRef::new("dm1", DIRECT_MESSAGE_THREAD_CONTEXT, Value::Null),
            actors: Vec::new(),
            entities: Vec::new(),
            created_at: 0,
            modified_at: 0,
        };
        assert!(notification.is_direct_message());
    }
}
