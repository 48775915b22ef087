//! Banning and deleting user accounts.
//!
//! Both flows strip every channel and community role of the user and
//! decrement the member totals they counted towards. Thread and email
//! notifications are switched off.

use crate::model::user::User;
use crate::repo::channel_repo::ChannelRepository;
use crate::repo::community_repo::CommunityRepository;
use crate::repo::membership_repo::{ChannelMembershipRepository, CommunityMembershipRepository};
use crate::repo::participant_repo::ParticipantRepository;
use crate::repo::settings_repo::UsersSettingsRepository;
use crate::repo::user_repo::UserRepository;
use crate::service::{found, ServiceResult};
use crate::store::DocumentStore;
use log::info;

pub struct ModerationService<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> ModerationService<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn ban_user(&self, user_id: &str, reason: &str, banned_by: &str) -> ServiceResult<User> {
        let users = UserRepository::new(self.store);
        found(users.by_id(user_id)?, user_id)?;
        let banned = users.ban(user_id, reason, banned_by)?;
        self.detach(user_id)?;
        info!("event=user_banned module=service user_id={user_id} banned_by={banned_by}");
        Ok(banned)
    }

    /// Scrubs the account; authored content stays attributed to it.
    pub fn delete_user(&self, user_id: &str) -> ServiceResult<User> {
        let users = UserRepository::new(self.store);
        found(users.by_id(user_id)?, user_id)?;
        let deleted = users.delete(user_id)?;
        self.detach(user_id)?;
        info!("event=user_deleted module=service user_id={user_id}");
        Ok(deleted)
    }

    fn detach(&self, user_id: &str) -> ServiceResult<()> {
        let channels = ChannelRepository::new(self.store);
        for record in ChannelMembershipRepository::new(self.store).remove_all_for_user(user_id)? {
            channels.decrement_member_count(&record.channel_id)?;
        }
        let communities = CommunityRepository::new(self.store);
        for record in CommunityMembershipRepository::new(self.store).remove_all_for_user(user_id)? {
            communities.decrement_member_count(&record.community_id)?;
        }
        ParticipantRepository::new(self.store).disable_for_user(user_id)?;
        UsersSettingsRepository::new(self.store).disable_all(user_id)?;
        Ok(())
    }
}
