//! Direct message threads (`directMessageThreads`) and their members
//! (`usersDirectMessageThreads`).
//!
//! # Invariants
//! - Deleted threads are hidden from every read.
//! - Member records are removed outright when a member leaves.
//! - Only one thread exists per exact set of participants; callers check
//!   [`DirectMessageRepository::existing_thread_for`] before creating one.

use crate::model::direct_message::{DirectMessageMember, DirectMessageThread, UsersDirectMessageThreads};
use crate::model::user::User;
use crate::model::{now_ms, Entity, Page};
use crate::query::traced;
use crate::relate;
use crate::repo::{decode, decode_all, decode_opt, insert, paged, required, RepoResult};
use crate::store::{DocumentStore, Filter, FindOptions, Update};
use std::collections::BTreeSet;

pub struct DirectMessageRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> DirectMessageRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn get(&self, thread_id: &str) -> RepoResult<Option<DirectMessageThread>> {
        traced("get_direct_message_thread", (thread_id,), || {
            decode_opt(self.store.find_one(
                DirectMessageThread::COLLECTION,
                &Filter::eq("id", thread_id).not_deleted(),
            )?)
        })
    }

    pub fn get_many(&self, thread_ids: &[String]) -> RepoResult<Vec<DirectMessageThread>> {
        traced("get_direct_message_threads", (thread_ids.len(),), || {
            decode_all(self.store.find_all(
                DirectMessageThread::COLLECTION,
                &Filter::is_in("id", thread_ids.iter().cloned()).not_deleted(),
            )?)
        })
    }

    /// Threads the user belongs to, most recently active first.
    pub fn by_user(&self, user_id: &str, page: Page) -> RepoResult<Vec<DirectMessageThread>> {
        traced("direct_message_threads_by_user", (user_id, page), || {
            let records = self.store.find_all(
                UsersDirectMessageThreads::COLLECTION,
                &Filter::eq("userId", user_id).not_deleted(),
            )?;
            let thread_ids = relate::string_values(&records, "threadId");
            if thread_ids.is_empty() {
                return Ok(Vec::new());
            }
            decode_all(self.store.find(
                DirectMessageThread::COLLECTION,
                &Filter::is_in("id", thread_ids).not_deleted(),
                &paged(FindOptions::new().sort_desc("threadLastActive"), page),
            )?)
        })
    }

    pub fn create(&self, is_group: bool) -> RepoResult<DirectMessageThread> {
        traced("create_direct_message_thread", (is_group,), || {
            let now = now_ms();
            insert(
                self.store,
                &DirectMessageThread {
                    id: String::new(),
                    name: None,
                    is_group,
                    created_at: now,
                    thread_last_active: now,
                    deleted_at: None,
                },
            )
        })
    }

    pub fn set_last_active(&self, thread_id: &str) -> RepoResult<DirectMessageThread> {
        traced("set_direct_message_thread_last_active", (thread_id,), || {
            let updated = self.store.update_by_id(
                DirectMessageThread::COLLECTION,
                thread_id,
                &Update::new().set("threadLastActive", now_ms()),
            )?;
            required(updated, thread_id)
        })
    }

    /// Thread whose members are exactly `participants`, if one exists.
    pub fn existing_thread_for(&self, participants: &[String]) -> RepoResult<Option<String>> {
        traced("check_for_existing_dm_thread", (participants.len(),), || {
            let wanted: BTreeSet<&str> = participants.iter().map(String::as_str).collect();
            if wanted.is_empty() {
                return Ok(None);
            }
            let records = self.store.find_all(
                UsersDirectMessageThreads::COLLECTION,
                &Filter::is_in("userId", participants.iter().cloned()),
            )?;
            let candidates: Vec<String> = relate::distinct(relate::string_values(&records, "threadId"));
            if candidates.is_empty() {
                return Ok(None);
            }
            let members = self.store.find_all(
                UsersDirectMessageThreads::COLLECTION,
                &Filter::is_in("threadId", candidates),
            )?;
            let by_thread = relate::group_by_field(members, "threadId");
            let found = by_thread.into_iter().find(|entry| {
                let users = relate::string_values(&entry.reduction, "userId");
                let users: BTreeSet<&str> = users.iter().map(String::as_str).collect();
                users == wanted
            });
            Ok(found.and_then(|entry| entry.group.as_str().map(str::to_string)))
        })
    }

    /// Adds a member; `set_active` stamps `lastActive` and `lastSeen` for the
    /// sender of the first message.
    pub fn create_member(&self, thread_id: &str, user_id: &str, set_active: bool) -> RepoResult<UsersDirectMessageThreads> {
        traced("create_member_in_direct_message_thread", (thread_id, user_id, set_active), || {
            let now = now_ms();
            insert(
                self.store,
                &UsersDirectMessageThreads {
                    id: String::new(),
                    thread_id: thread_id.to_string(),
                    user_id: user_id.to_string(),
                    created_at: now,
                    last_active: set_active.then_some(now),
                    last_seen: set_active.then_some(now),
                    receive_notifications: true,
                    deleted_at: None,
                },
            )
        })
    }

    pub fn remove_member(&self, thread_id: &str, user_id: &str) -> RepoResult<usize> {
        traced("remove_member_in_direct_message_thread", (thread_id, user_id), || {
            Ok(self
                .store
                .delete_many(UsersDirectMessageThreads::COLLECTION, &member_filter(thread_id, user_id))?)
        })
    }

    pub fn remove_members(&self, thread_id: &str) -> RepoResult<usize> {
        traced("remove_members_in_direct_message_thread", (thread_id,), || {
            Ok(self.store.delete_many(
                UsersDirectMessageThreads::COLLECTION,
                &Filter::eq("threadId", thread_id),
            )?)
        })
    }

    pub fn set_last_seen(&self, thread_id: &str, user_id: &str) -> RepoResult<Option<UsersDirectMessageThreads>> {
        traced("set_user_last_seen_in_direct_message_thread", (thread_id, user_id), || {
            decode_opt(self.store.update_one(
                UsersDirectMessageThreads::COLLECTION,
                &member_filter(thread_id, user_id),
                &Update::new().set("lastSeen", now_ms()),
            )?)
        })
    }

    pub fn set_notifications(
        &self,
        thread_id: &str,
        user_id: &str,
        enabled: bool,
    ) -> RepoResult<Option<UsersDirectMessageThreads>> {
        traced("update_direct_message_thread_notification_status", (thread_id, user_id, enabled), || {
            decode_opt(self.store.update_one(
                UsersDirectMessageThreads::COLLECTION,
                &member_filter(thread_id, user_id),
                &Update::new().set("receiveNotifications", enabled),
            )?)
        })
    }

    pub fn members(&self, thread_id: &str) -> RepoResult<Vec<DirectMessageMember>> {
        self.members_in(&[thread_id.to_string()])
    }

    pub fn members_in(&self, thread_ids: &[String]) -> RepoResult<Vec<DirectMessageMember>> {
        traced("members_in_direct_message_threads", (thread_ids.len(),), || {
            let records = self.store.find_all(
                UsersDirectMessageThreads::COLLECTION,
                &Filter::is_in("threadId", thread_ids.iter().cloned()),
            )?;
            let rows = self.store.join(records, "userId", User::COLLECTION, "id")?;
            rows.into_iter()
                .map(|row| {
                    Ok(DirectMessageMember {
                        record: decode(row.left)?,
                        user: decode(row.right)?,
                    })
                })
                .collect()
        })
    }

    pub fn is_member(&self, thread_id: &str, user_id: &str) -> RepoResult<bool> {
        traced("is_member_of_direct_message_thread", (thread_id, user_id), || {
            Ok(self
                .store
                .count(UsersDirectMessageThreads::COLLECTION, &member_filter(thread_id, user_id))?
                > 0)
        })
    }

    pub fn records(&self, thread_id: &str) -> RepoResult<Vec<UsersDirectMessageThreads>> {
        traced("direct_message_thread_records", (thread_id,), || {
            decode_all(self.store.find_all(
                UsersDirectMessageThreads::COLLECTION,
                &Filter::eq("threadId", thread_id),
            )?)
        })
    }
}

fn member_filter(thread_id: &str, user_id: &str) -> Filter {
    Filter::eq("threadId", thread_id).and(Filter::eq("userId", user_id))
}
