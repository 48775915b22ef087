//! Channel, community and user settings.
//!
//! # Invariants
//! - Settings documents are created lazily with defaults; reads of missing
//!   settings return the defaults instead of an error.
//! - A join token exists only while token join is enabled.
//! - Slack bot links store `null` for an empty target channel.

use crate::model::channel::ChannelSettings;
use crate::model::community::{CommunitySettings, SlackConnection};
use crate::model::user::{UsersSettings, EMAIL_NOTIFICATION_TYPES};
use crate::model::{now_ms, Entity, Page, Timeframe};
use crate::query::traced;
use crate::relate;
use crate::repo::{decode_all, decode_opt, insert, paged, required, RepoError, RepoResult};
use crate::store::{DocumentStore, Filter, FindOptions, Update};
use serde_json::Value;
use uuid::Uuid;

const SLACK_SETTING_FIELDS: [&str; 9] = [
    "connectedAt",
    "connectedBy",
    "teamName",
    "teamId",
    "scope",
    "token",
    "invitesSentAt",
    "invitesMemberCount",
    "invitesCustomMessage",
];

fn enable_token_join() -> Update {
    Update::new()
        .set("joinSettings.tokenJoinEnabled", true)
        .set("joinSettings.token", Uuid::new_v4().to_string())
}

fn disable_token_join() -> Update {
    Update::new()
        .set("joinSettings.tokenJoinEnabled", false)
        .set("joinSettings.token", Value::Null)
}

fn reset_join_token() -> Update {
    Update::new().set("joinSettings.token", Uuid::new_v4().to_string())
}

pub struct ChannelSettingsRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> ChannelSettingsRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn get_or_create(&self, channel_id: &str) -> RepoResult<ChannelSettings> {
        traced("get_or_create_channel_settings", (channel_id,), || {
            if let Some(settings) = self.find(channel_id)? {
                return Ok(settings);
            }
            insert(self.store, &ChannelSettings::defaults(channel_id))
        })
    }

    /// Settings per channel in input order; missing ones are defaults and
    /// are not persisted.
    pub fn many(&self, channel_ids: &[String]) -> RepoResult<Vec<ChannelSettings>> {
        traced("channels_settings", (channel_ids.len(),), || {
            let stored: Vec<ChannelSettings> = decode_all(self.store.find_all(
                ChannelSettings::COLLECTION,
                &Filter::is_in("channelId", channel_ids.iter().cloned()),
            )?)?;
            Ok(channel_ids
                .iter()
                .map(|channel_id| {
                    stored
                        .iter()
                        .find(|settings| &settings.channel_id == channel_id)
                        .cloned()
                        .unwrap_or_else(|| ChannelSettings::defaults(channel_id))
                })
                .collect())
        })
    }

    pub fn enable_token_join(&self, channel_id: &str) -> RepoResult<ChannelSettings> {
        traced("enable_channel_token_join", (channel_id,), || {
            self.apply(channel_id, enable_token_join())
        })
    }

    pub fn disable_token_join(&self, channel_id: &str) -> RepoResult<ChannelSettings> {
        traced("disable_channel_token_join", (channel_id,), || {
            self.apply(channel_id, disable_token_join())
        })
    }

    pub fn reset_join_token(&self, channel_id: &str) -> RepoResult<ChannelSettings> {
        traced("reset_channel_join_token", (channel_id,), || {
            self.apply(channel_id, reset_join_token())
        })
    }

    /// Points the bot notification for `event_type` at a Slack channel.
    pub fn update_slack_bot_link(
        &self,
        channel_id: &str,
        slack_channel_id: Option<&str>,
        event_type: &str,
    ) -> RepoResult<ChannelSettings> {
        traced("update_channel_slack_bot_links", (channel_id, slack_channel_id, event_type), || {
            let target = slack_channel_id
                .filter(|id| !id.is_empty())
                .map_or(Value::Null, Value::from);
            self.apply(
                channel_id,
                Update::new().set(format!("slackSettings.botLinks.{event_type}"), target),
            )
        })
    }

    fn find(&self, channel_id: &str) -> RepoResult<Option<ChannelSettings>> {
        decode_opt(
            self.store
                .find_one(ChannelSettings::COLLECTION, &Filter::eq("channelId", channel_id))?,
        )
    }

    fn apply(&self, channel_id: &str, update: Update) -> RepoResult<ChannelSettings> {
        self.get_or_create(channel_id)?;
        let updated = self.store.update_one(
            ChannelSettings::COLLECTION,
            &Filter::eq("channelId", channel_id),
            &update,
        )?;
        required(updated, channel_id)
    }
}

pub struct CommunitySettingsRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> CommunitySettingsRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn get_or_create(&self, community_id: &str) -> RepoResult<CommunitySettings> {
        traced("get_or_create_community_settings", (community_id,), || {
            if let Some(settings) = self.find(community_id)? {
                return Ok(settings);
            }
            insert(self.store, &CommunitySettings::defaults(community_id))
        })
    }

    /// Stored settings, or defaults when none exist yet.
    pub fn get(&self, community_id: &str) -> RepoResult<CommunitySettings> {
        traced("community_settings", (community_id,), || {
            Ok(self
                .find(community_id)?
                .unwrap_or_else(|| CommunitySettings::defaults(community_id)))
        })
    }

    /// Settings per community in input order, defaults for missing ones.
    pub fn many(&self, community_ids: &[String]) -> RepoResult<Vec<CommunitySettings>> {
        traced("communities_settings", (community_ids.len(),), || {
            let stored: Vec<CommunitySettings> = decode_all(self.store.find_all(
                CommunitySettings::COLLECTION,
                &Filter::is_in("communityId", community_ids.iter().cloned()),
            )?)?;
            Ok(community_ids
                .iter()
                .map(|community_id| {
                    stored
                        .iter()
                        .find(|settings| &settings.community_id == community_id)
                        .cloned()
                        .unwrap_or_else(|| CommunitySettings::defaults(community_id))
                })
                .collect())
        })
    }

    pub fn enable_branded_login(&self, community_id: &str) -> RepoResult<CommunitySettings> {
        traced("enable_community_branded_login", (community_id,), || {
            self.apply(community_id, Update::new().set("brandedLogin.isEnabled", true))
        })
    }

    pub fn disable_branded_login(&self, community_id: &str) -> RepoResult<CommunitySettings> {
        traced("disable_community_branded_login", (community_id,), || {
            self.apply(community_id, Update::new().set("brandedLogin.isEnabled", false))
        })
    }

    pub fn update_branded_login_message(
        &self,
        community_id: &str,
        message: Option<&str>,
    ) -> RepoResult<CommunitySettings> {
        traced("update_community_branded_login_message", (community_id,), || {
            self.apply(
                community_id,
                Update::new().set("brandedLogin.message", message.map(str::to_string)),
            )
        })
    }

    /// Replaces the Slack state with a fresh connection.
    pub fn update_slack_settings_after_connection(
        &self,
        community_id: &str,
        connection: &SlackConnection,
    ) -> RepoResult<CommunitySettings> {
        traced(
            "update_slack_settings_after_connection",
            (community_id, &connection.team_id),
            || {
                let update = cleared_slack_settings()
                    .set("slackSettings.connectedAt", now_ms())
                    .set("slackSettings.connectedBy", connection.connected_by.as_str())
                    .set("slackSettings.teamName", connection.team_name.as_str())
                    .set("slackSettings.teamId", connection.team_id.as_str())
                    .set("slackSettings.scope", connection.scope.as_str())
                    .set("slackSettings.token", connection.token.as_str());
                self.apply(community_id, update)
            },
        )
    }

    pub fn mark_initial_slack_invitations_sent(
        &self,
        community_id: &str,
        custom_message: Option<&str>,
    ) -> RepoResult<CommunitySettings> {
        traced("mark_initial_slack_invitations_sent", (community_id,), || {
            self.apply(
                community_id,
                Update::new()
                    .set("slackSettings.invitesSentAt", now_ms())
                    .set(
                        "slackSettings.invitesCustomMessage",
                        custom_message.map(str::to_string),
                    ),
            )
        })
    }

    pub fn reset_slack_settings(&self, community_id: &str) -> RepoResult<CommunitySettings> {
        traced("reset_slack_settings", (community_id,), || {
            self.apply(community_id, cleared_slack_settings())
        })
    }

    pub fn enable_token_join(&self, community_id: &str) -> RepoResult<CommunitySettings> {
        traced("enable_community_token_join", (community_id,), || {
            self.apply(community_id, enable_token_join())
        })
    }

    pub fn disable_token_join(&self, community_id: &str) -> RepoResult<CommunitySettings> {
        traced("disable_community_token_join", (community_id,), || {
            self.apply(community_id, disable_token_join())
        })
    }

    pub fn reset_join_token(&self, community_id: &str) -> RepoResult<CommunitySettings> {
        traced("reset_community_join_token", (community_id,), || {
            self.apply(community_id, reset_join_token())
        })
    }

    fn find(&self, community_id: &str) -> RepoResult<Option<CommunitySettings>> {
        decode_opt(self.store.find_one(
            CommunitySettings::COLLECTION,
            &Filter::eq("communityId", community_id),
        )?)
    }

    fn apply(&self, community_id: &str, update: Update) -> RepoResult<CommunitySettings> {
        self.get_or_create(community_id)?;
        let updated = self.store.update_one(
            CommunitySettings::COLLECTION,
            &Filter::eq("communityId", community_id),
            &update,
        )?;
        required(updated, community_id)
    }
}

fn cleared_slack_settings() -> Update {
    SLACK_SETTING_FIELDS
        .iter()
        .fold(Update::new(), |update, field| {
            update.set(format!("slackSettings.{field}"), Value::Null)
        })
}

pub struct UsersSettingsRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> UsersSettingsRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn create_defaults(&self, user_id: &str) -> RepoResult<UsersSettings> {
        traced("create_new_users_settings", (user_id,), || {
            insert(self.store, &UsersSettings::defaults(user_id))
        })
    }

    pub fn get(&self, user_id: &str) -> RepoResult<Option<UsersSettings>> {
        traced("users_settings", (user_id,), || {
            decode_opt(
                self.store
                    .find_one(UsersSettings::COLLECTION, &Filter::eq("userId", user_id))?,
            )
        })
    }

    /// Turns one email notification type on or off.
    pub fn set_email(&self, user_id: &str, kind: &str, enabled: bool) -> RepoResult<UsersSettings> {
        traced("update_users_notification_settings", (user_id, kind, enabled), || {
            if !EMAIL_NOTIFICATION_TYPES.contains(&kind) {
                return Err(RepoError::InvalidInput(format!(
                    "unknown notification type `{kind}`"
                )));
            }
            self.apply(
                user_id,
                Update::new().set(format!("notifications.types.{kind}.email"), enabled),
            )
        })
    }

    /// Users who receive the digest email for `timeframe`, ordered by user id.
    ///
    /// Daily digests go to `dailyDigest` subscribers; every other timeframe
    /// is served by the weekly digest.
    pub fn user_ids_for_digest(&self, timeframe: Timeframe, page: Page) -> RepoResult<Vec<String>> {
        traced("user_ids_for_digest", (timeframe, page), || {
            let kind = match timeframe {
                Timeframe::Daily => "dailyDigest",
                _ => "weeklyDigest",
            };
            let settings = self.store.find(
                UsersSettings::COLLECTION,
                &Filter::eq(format!("notifications.types.{kind}.email"), true),
                &paged(FindOptions::new().sort_asc("userId"), page),
            )?;
            Ok(relate::string_values(&settings, "userId"))
        })
    }

    pub fn unsubscribe(&self, user_id: &str, kind: &str) -> RepoResult<UsersSettings> {
        self.set_email(user_id, kind, false)
    }

    pub fn disable_all(&self, user_id: &str) -> RepoResult<UsersSettings> {
        traced("disable_all_users_email_settings", (user_id,), || {
            let update = EMAIL_NOTIFICATION_TYPES.iter().fold(Update::new(), |update, kind| {
                update.set(format!("notifications.types.{kind}.email"), false)
            });
            self.apply(user_id, update)
        })
    }

    fn apply(&self, user_id: &str, update: Update) -> RepoResult<UsersSettings> {
        if self.get(user_id)?.is_none() {
            self.create_defaults(user_id)?;
        }
        let updated = self.store.update_one(
            UsersSettings::COLLECTION,
            &Filter::eq("userId", user_id),
            &update,
        )?;
        required(updated, user_id)
    }
}
