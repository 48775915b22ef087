//! User repository.
//!
//! # Invariants
//! - User documents are never removed. Deletion scrubs identifying fields
//!   and banning clears public profile fields.
//! - Lookups by id return scrubbed users too so authorship stays resolvable.

use crate::doc::Document;
use crate::model::membership::UsersChannels;
use crate::model::thread::Thread;
use crate::model::user::{NewUser, User, UserEdit};
use crate::model::{now_ms, Entity, GroupCount, Page};
use crate::query::traced;
use crate::relate;
use crate::repo::channel_repo::active_role;
use crate::repo::{decode_all, decode_opt, insert, paged, required, RepoError, RepoResult};
use crate::store::{DocumentStore, Filter, FindOptions, Update};
use serde_json::Value;

const SCRUBBED_FIELDS: [&str; 16] = [
    "username",
    "email",
    "providerId",
    "fbProviderId",
    "googleProviderId",
    "githubProviderId",
    "githubUsername",
    "profilePhoto",
    "description",
    "website",
    "timezone",
    "lastSeen",
    "modifiedAt",
    "firstName",
    "lastName",
    "pendingEmail",
];

pub struct UserRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> UserRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn by_id(&self, user_id: &str) -> RepoResult<Option<User>> {
        traced("user_by_id", (user_id,), || {
            decode_opt(self.store.get(User::COLLECTION, user_id)?)
        })
    }

    pub fn by_ids(&self, user_ids: &[String]) -> RepoResult<Vec<User>> {
        traced("users_by_ids", (user_ids.len(),), || {
            decode_all(self.store.get_many(User::COLLECTION, user_ids)?)
        })
    }

    pub fn by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.by_index("email", email)
    }

    pub fn all_by_email(&self, email: &str) -> RepoResult<Vec<User>> {
        traced("users_by_email", (email,), || {
            decode_all(self.store.find_all(User::COLLECTION, &Filter::eq("email", email))?)
        })
    }

    pub fn by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.by_index("username", username)
    }

    pub fn by_usernames(&self, usernames: &[String]) -> RepoResult<Vec<User>> {
        traced("users_by_usernames", (usernames.len(),), || {
            decode_all(self.store.find_all(
                User::COLLECTION,
                &Filter::is_in("username", usernames.iter().cloned()),
            )?)
        })
    }

    /// First user whose `field` equals `value`.
    pub fn by_index(&self, field: &str, value: &str) -> RepoResult<Option<User>> {
        traced("user_by_index", (field, value), || {
            decode_opt(self.store.find_one(User::COLLECTION, &Filter::eq(field, value))?)
        })
    }

    /// Registers a user; timestamps are set here.
    pub fn store(&self, input: &NewUser) -> RepoResult<User> {
        traced("store_user", (&input.username,), || {
            let now = now_ms();
            insert(
                self.store,
                &User {
                    id: String::new(),
                    name: input.name.clone(),
                    first_name: None,
                    last_name: None,
                    username: input.username.clone(),
                    email: input.email.clone(),
                    pending_email: None,
                    description: None,
                    website: None,
                    profile_photo: input.profile_photo.clone(),
                    cover_photo: None,
                    timezone: None,
                    provider_id: input.provider_id.clone(),
                    fb_provider_id: None,
                    google_provider_id: None,
                    github_provider_id: None,
                    github_username: None,
                    is_online: false,
                    last_seen: Some(now),
                    created_at: Some(now),
                    modified_at: None,
                    terms_last_accepted_at: Some(now),
                    deleted_at: None,
                    banned_at: None,
                    banned_by: None,
                    banned_reason: None,
                },
            )
        })
    }

    /// Links an auth provider id, plus optional extra profile fields.
    pub fn save_provider(
        &self,
        user_id: &str,
        provider_field: &str,
        provider_id: &str,
        extra: Document,
    ) -> RepoResult<User> {
        if !provider_field.ends_with("ProviderId") && provider_field != "providerId" {
            return Err(RepoError::InvalidInput(format!(
                "unknown provider field `{provider_field}`"
            )));
        }
        self.update(
            "save_user_provider",
            user_id,
            Update::new().set(provider_field, provider_id).merge(extra),
        )
    }

    /// Returns the user with `provider_field == provider_id`, creating one
    /// when none exists and `allow_signup` is set.
    pub fn create_or_find(
        &self,
        input: &NewUser,
        provider_field: &str,
        allow_signup: bool,
    ) -> RepoResult<Option<User>> {
        if let Some(provider_id) = &input.provider_id {
            if let Some(user) = self.by_index(provider_field, provider_id)? {
                return Ok(Some(user));
            }
        }
        if !allow_signup {
            return Ok(None);
        }
        let user = self.store(input)?;
        match &input.provider_id {
            Some(provider_id) if provider_field != "providerId" => self
                .save_provider(&user.id, provider_field, provider_id, Document::new())
                .map(Some),
            _ => Ok(Some(user)),
        }
    }

    pub fn edit(&self, user_id: &str, input: &UserEdit) -> RepoResult<User> {
        let mut update = Update::new().set("modifiedAt", now_ms());
        let fields = [
            ("name", input.name.as_deref()),
            ("description", input.description.as_deref()),
            ("website", input.website.as_deref()),
            ("username", input.username.as_deref()),
            ("profilePhoto", input.profile_photo.as_deref()),
            ("coverPhoto", input.cover_photo.as_deref()),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                update = update.set(field, value);
            }
        }
        if let Some(timezone) = input.timezone {
            update = update.set("timezone", timezone);
        }
        self.update("edit_user", user_id, update)
    }

    pub fn set_online(&self, user_id: &str, is_online: bool) -> RepoResult<User> {
        self.update(
            "set_user_online",
            user_id,
            Update::new()
                .set("isOnline", is_online)
                .set("lastSeen", now_ms()),
        )
    }

    pub fn set_pending_email(&self, user_id: &str, email: &str) -> RepoResult<User> {
        self.update(
            "set_user_pending_email",
            user_id,
            Update::new().set("pendingEmail", email),
        )
    }

    /// Confirms `email` and drops the pending one.
    pub fn update_email(&self, user_id: &str, email: &str) -> RepoResult<User> {
        self.update(
            "update_user_email",
            user_id,
            Update::new().set("email", email).unset("pendingEmail"),
        )
    }

    /// Scrubs personal data and renames the user to `Deleted`.
    pub fn delete(&self, user_id: &str) -> RepoResult<User> {
        let mut update = Update::new()
            .set("name", "Deleted")
            .set("deletedAt", now_ms());
        for field in SCRUBBED_FIELDS {
            update = update.set(field, Value::Null);
        }
        self.update("delete_user", user_id, update)
    }

    pub fn ban(&self, user_id: &str, reason: &str, banned_by: &str) -> RepoResult<User> {
        self.update(
            "ban_user",
            user_id,
            Update::new()
                .set("bannedAt", now_ms())
                .set("bannedBy", banned_by)
                .set("bannedReason", reason)
                .set("username", Value::Null)
                .set("coverPhoto", Value::Null)
                .set("profilePhoto", Value::Null),
        )
    }

    /// Number of threads created by each of `user_ids`, aligned with input.
    pub fn thread_counts(&self, user_ids: &[String]) -> RepoResult<Vec<GroupCount>> {
        traced("users_thread_count", (user_ids.len(),), || {
            user_ids
                .iter()
                .map(|user_id| {
                    let count = self
                        .store
                        .count(Thread::COLLECTION, &Filter::eq("creatorId", user_id.as_str()))?;
                    Ok(GroupCount {
                        group: user_id.clone(),
                        count,
                    })
                })
                .collect()
        })
    }

    /// Live threads across every channel the user belongs to, most recently
    /// active first.
    pub fn everything(&self, user_id: &str, page: Page) -> RepoResult<Vec<Thread>> {
        traced("user_everything_feed", (user_id, page), || {
            let records = self.store.find_all(
                UsersChannels::COLLECTION,
                &Filter::eq("userId", user_id).and(active_role()),
            )?;
            let channel_ids = relate::string_values(&records, "channelId");
            if channel_ids.is_empty() {
                return Ok(Vec::new());
            }
            decode_all(self.store.find(
                Thread::COLLECTION,
                &Filter::is_in("channelId", channel_ids).not_deleted(),
                &paged(FindOptions::new().sort_desc("lastActive"), page),
            )?)
        })
    }

    fn update(&self, name: &str, user_id: &str, update: Update) -> RepoResult<User> {
        traced(name, (user_id,), || {
            required(self.store.update_by_id(User::COLLECTION, user_id, &update)?, user_id)
        })
    }
}
