//! Thread participation (`usersThreads`).
//!
//! A record either marks a participant (creator or author of a message) or
//! a user who only follows the thread for notifications.

use crate::doc;
use crate::model::thread::UsersThreads;
use crate::model::user::User;
use crate::model::{now_ms, Entity};
use crate::query::traced;
use crate::relate::{self, Group};
use crate::repo::{decode_all, decode_opt, insert, RepoResult};
use crate::store::{DocumentStore, Filter, Update};

const RECORD_FIELDS: [&str; 4] = ["createdAt", "id", "threadId", "userId"];

pub struct ParticipantRepository<'a> {
    store: &'a DocumentStore<'a>,
}

fn record_filter(thread_id: &str, user_id: &str) -> Filter {
    Filter::eq("threadId", thread_id).and(Filter::eq("userId", user_id))
}

impl<'a> ParticipantRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    /// Marks the user as a participant.
    ///
    /// A user who muted the thread before participating stays muted.
    pub fn create_participant(&self, thread_id: &str, user_id: &str) -> RepoResult<UsersThreads> {
        traced("create_participant_in_thread", (thread_id, user_id), || {
            if let Some(record) = self.record(thread_id, user_id)? {
                if record.is_participant {
                    return Ok(record);
                }
                let muted = self.store.find_one(
                    UsersThreads::COLLECTION,
                    &record_filter(thread_id, user_id)
                        .and(Filter::eq("receiveNotifications", false)),
                )?;
                let updated = self.store.update_by_id(
                    UsersThreads::COLLECTION,
                    &record.id,
                    &Update::new()
                        .set("isParticipant", true)
                        .set("receiveNotifications", muted.is_none()),
                )?;
                return Ok(decode_opt(updated)?.unwrap_or(record));
            }
            self.insert_record(thread_id, user_id, true, true)
        })
    }

    pub fn delete_participant(&self, thread_id: &str, user_id: &str) -> RepoResult<usize> {
        traced("delete_participant_in_thread", (thread_id, user_id), || {
            Ok(self
                .store
                .delete_many(UsersThreads::COLLECTION, &record_filter(thread_id, user_id))?)
        })
    }

    /// Follows a thread for notifications without becoming a participant.
    pub fn create_notified_user(&self, thread_id: &str, user_id: &str) -> RepoResult<UsersThreads> {
        traced("create_notified_user_in_thread", (thread_id, user_id), || {
            self.insert_record(thread_id, user_id, false, true)
        })
    }

    /// Participants of a thread as user documents.
    pub fn participants(&self, thread_id: &str) -> RepoResult<Vec<User>> {
        traced("participants_in_thread", (thread_id,), || {
            let records = self.store.find_all(
                UsersThreads::COLLECTION,
                &Filter::eq("threadId", thread_id).and(Filter::eq("isParticipant", true)),
            )?;
            let rows = self.store.join(records, "userId", User::COLLECTION, "id")?;
            decode_all(
                rows.into_iter()
                    .map(|row| row.without_left(&RECORD_FIELDS).zip())
                    .collect(),
            )
        })
    }

    /// Participants grouped per thread, groups in first-seen order.
    pub fn participants_in_threads(&self, thread_ids: &[String]) -> RepoResult<Vec<Group<String, Vec<User>>>> {
        traced("participants_in_threads", (thread_ids.len(),), || {
            let records = self.store.find_all(
                UsersThreads::COLLECTION,
                &Filter::is_in("threadId", thread_ids.iter().cloned())
                    .and(Filter::eq("isParticipant", true)),
            )?;
            let rows = self.store.join(records, "userId", User::COLLECTION, "id")?;
            let groups = relate::group(rows, |row| {
                doc::get_str(&row.left, "threadId")
                    .unwrap_or_default()
                    .to_string()
            });
            groups
                .into_iter()
                .map(|entry| {
                    let users = entry
                        .reduction
                        .into_iter()
                        .map(|row| row.without_left(&RECORD_FIELDS).zip())
                        .collect();
                    Ok(Group {
                        group: entry.group,
                        reduction: decode_all(users)?,
                    })
                })
                .collect()
        })
    }

    pub fn record(&self, thread_id: &str, user_id: &str) -> RepoResult<Option<UsersThreads>> {
        traced("thread_notification_status_for_user", (thread_id, user_id), || {
            decode_opt(
                self.store
                    .find_one(UsersThreads::COLLECTION, &record_filter(thread_id, user_id))?,
            )
        })
    }

    /// Records for `(user_id, thread_id)` pairs; pairs without a record are
    /// skipped.
    pub fn records(&self, pairs: &[(String, String)]) -> RepoResult<Vec<UsersThreads>> {
        traced("threads_notification_status_for_users", (pairs.len(),), || {
            if pairs.is_empty() {
                return Ok(Vec::new());
            }
            let filter = Filter::any_of(
                pairs
                    .iter()
                    .map(|(user_id, thread_id)| record_filter(thread_id, user_id))
                    .collect(),
            );
            decode_all(self.store.find_all(UsersThreads::COLLECTION, &filter)?)
        })
    }

    /// Sets the notification flag, creating a follower record when the user
    /// has none (for example after a mention).
    pub fn set_notifications(&self, thread_id: &str, user_id: &str, enabled: bool) -> RepoResult<UsersThreads> {
        traced("update_thread_notification_status", (thread_id, user_id, enabled), || {
            let updated = self.store.update_one(
                UsersThreads::COLLECTION,
                &record_filter(thread_id, user_id),
                &Update::new().set("receiveNotifications", enabled),
            )?;
            match decode_opt(updated)? {
                Some(record) => Ok(record),
                None => self.insert_record(thread_id, user_id, false, enabled),
            }
        })
    }

    pub fn turn_off_for_thread(&self, thread_id: &str) -> RepoResult<Vec<UsersThreads>> {
        traced("turn_off_all_thread_notifications", (thread_id,), || {
            decode_all(self.store.update_many(
                UsersThreads::COLLECTION,
                &Filter::eq("threadId", thread_id),
                &Update::new().set("receiveNotifications", false),
            )?)
        })
    }

    pub fn disable_for_user(&self, user_id: &str) -> RepoResult<Vec<UsersThreads>> {
        traced("disable_all_thread_notifications_for_user", (user_id,), || {
            decode_all(self.store.update_many(
                UsersThreads::COLLECTION,
                &Filter::eq("userId", user_id),
                &Update::new().set("receiveNotifications", false),
            )?)
        })
    }

    /// Stamps when the user last viewed the thread.
    pub fn set_last_seen(&self, thread_id: &str, user_id: &str, last_seen: i64) -> RepoResult<UsersThreads> {
        traced("set_user_thread_last_seen", (thread_id, user_id, last_seen), || {
            let updated = self.store.update_one(
                UsersThreads::COLLECTION,
                &record_filter(thread_id, user_id),
                &Update::new().set("lastSeen", last_seen),
            )?;
            if let Some(record) = decode_opt(updated)? {
                return Ok(record);
            }
            insert(
                self.store,
                &UsersThreads {
                    id: String::new(),
                    thread_id: thread_id.to_string(),
                    user_id: user_id.to_string(),
                    is_participant: false,
                    receive_notifications: false,
                    created_at: now_ms(),
                    last_seen: Some(last_seen),
                },
            )
        })
    }

    /// Users receiving notifications for a thread.
    pub fn notified_user_ids(&self, thread_id: &str) -> RepoResult<Vec<String>> {
        traced("thread_notification_recipients", (thread_id,), || {
            let records = self.store.find_all(
                UsersThreads::COLLECTION,
                &Filter::eq("threadId", thread_id).and(Filter::eq("receiveNotifications", true)),
            )?;
            Ok(relate::string_values(&records, "userId"))
        })
    }

    fn insert_record(
        &self,
        thread_id: &str,
        user_id: &str,
        is_participant: bool,
        receive_notifications: bool,
    ) -> RepoResult<UsersThreads> {
        insert(
            self.store,
            &UsersThreads {
                id: String::new(),
                thread_id: thread_id.to_string(),
                user_id: user_id.to_string(),
                is_participant,
                receive_notifications,
                created_at: now_ms(),
                last_seen: None,
            },
        )
    }
}
