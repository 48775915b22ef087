//! Community and channel membership flows.
//!
//! # Responsibility
//! - Create communities and channels together with their owner records.
//! - Move users between roles and keep `memberCount` equal to the number of
//!   member records.
//!
//! # Invariants
//! - Owners cannot leave; blocked users cannot rejoin on their own.
//! - Joining a community also joins its default channels.
//! - Leaving a community also leaves every channel of it.

use crate::jobs::{Job, JobQueue, SearchEvent};
use crate::model::channel::{Channel, NewChannel};
use crate::model::community::{Community, CommunityEdit, NewCommunity};
use crate::model::membership::{UsersChannels, UsersCommunities};
use crate::model::user::User;
use crate::repo::channel_repo::ChannelRepository;
use crate::repo::community_repo::CommunityRepository;
use crate::repo::membership_repo::{ChannelMembershipRepository, CommunityMembershipRepository};
use crate::repo::settings_repo::{ChannelSettingsRepository, CommunitySettingsRepository};
use crate::service::{found, payload, ServiceError, ServiceResult};
use crate::store::DocumentStore;
use log::info;

pub struct MembershipService<'a, Q: JobQueue> {
    store: &'a DocumentStore<'a>,
    jobs: &'a Q,
}

impl<'a, Q: JobQueue> MembershipService<'a, Q> {
    pub fn new(store: &'a DocumentStore<'a>, jobs: &'a Q) -> Self {
        Self { store, jobs }
    }

    /// Creates a community owned by `creator` with its `general` channel.
    pub fn create_community(&self, input: &NewCommunity, creator: &User) -> ServiceResult<Community> {
        let communities = CommunityRepository::new(self.store);
        if communities.by_slug(&input.slug)?.is_some() {
            return Err(ServiceError::forbidden(format!(
                "community slug `{}` is taken",
                input.slug
            )));
        }

        let community = communities.create(input, creator)?;
        CommunityMembershipRepository::new(self.store).create_owner(&community.id, &creator.id)?;
        communities.increment_member_count(&community.id)?;
        CommunitySettingsRepository::new(self.store).get_or_create(&community.id)?;

        let general = ChannelRepository::new(self.store).create_general(&community.id)?;
        self.bootstrap_channel(&general, &creator.id)?;

        self.jobs
            .enqueue(Job::search(&community.id, "community", SearchEvent::Created))?;
        info!(
            "event=community_created module=service community_id={} creator_id={}",
            community.id, creator.id
        );
        Ok(found(communities.by_id(&community.id)?, &community.id)?)
    }

    /// Edits a community on behalf of a team member.
    pub fn edit_community(&self, input: &CommunityEdit, user_id: &str) -> ServiceResult<Community> {
        let communities = CommunityRepository::new(self.store);
        let current = found(communities.by_id(&input.community_id)?, &input.community_id)?;
        let permissions =
            CommunityMembershipRepository::new(self.store).permissions(&current.id, user_id)?;
        if !permissions.is_team() {
            return Err(ServiceError::forbidden("only the community team can edit it"));
        }
        if input.slug != current.slug && communities.by_slug(&input.slug)?.is_some() {
            return Err(ServiceError::forbidden(format!(
                "community slug `{}` is taken",
                input.slug
            )));
        }

        let edited = communities.edit(input)?;
        self.jobs
            .enqueue(Job::search(&edited.id, "community", SearchEvent::Edited))?;
        Ok(edited)
    }

    /// Tombstones a community; only its owner may do so.
    pub fn delete_community(&self, community_id: &str, user_id: &str) -> ServiceResult<Community> {
        let communities = CommunityRepository::new(self.store);
        found(communities.by_id(community_id)?, community_id)?;
        let permissions =
            CommunityMembershipRepository::new(self.store).permissions(community_id, user_id)?;
        if !permissions.is_owner {
            return Err(ServiceError::forbidden("only the owner can delete a community"));
        }

        let deleted = communities.delete(community_id, user_id)?;
        self.jobs
            .enqueue(Job::search(community_id, "community", SearchEvent::Deleted))?;
        info!("event=community_deleted module=service community_id={community_id} user_id={user_id}");
        Ok(deleted)
    }

    /// Creates a channel owned by `user_id`.
    pub fn create_channel(&self, input: &NewChannel, user_id: &str) -> ServiceResult<Channel> {
        found(
            CommunityRepository::new(self.store).by_id(&input.community_id)?,
            &input.community_id,
        )?;
        let permissions =
            CommunityMembershipRepository::new(self.store).permissions(&input.community_id, user_id)?;
        if !permissions.is_team() {
            return Err(ServiceError::forbidden("only the community team can create channels"));
        }

        let channel = ChannelRepository::new(self.store).create(input)?;
        self.bootstrap_channel(&channel, user_id)?;
        Ok(found(ChannelRepository::new(self.store).by_id(&channel.id)?, &channel.id)?)
    }

    fn bootstrap_channel(&self, channel: &Channel, owner_id: &str) -> ServiceResult<()> {
        ChannelMembershipRepository::new(self.store).create_owner(&channel.id, owner_id)?;
        ChannelRepository::new(self.store).increment_member_count(&channel.id)?;
        ChannelSettingsRepository::new(self.store).get_or_create(&channel.id)?;
        self.jobs.enqueue(Job::ChannelNotification {
            channel: payload(channel)?,
            user_id: owner_id.to_string(),
        })?;
        Ok(())
    }

    /// Joins a public community, or files a join request for a private one.
    pub fn join_community(&self, community_id: &str, user_id: &str) -> ServiceResult<UsersCommunities> {
        let community = found(CommunityRepository::new(self.store).by_id(community_id)?, community_id)?;
        let memberships = CommunityMembershipRepository::new(self.store);
        if let Some(record) = memberships.record(community_id, user_id)? {
            if record.is_blocked {
                return Err(ServiceError::forbidden("user is blocked in this community"));
            }
            if record.is_member {
                return Ok(record);
            }
        }

        if community.is_private {
            return Ok(memberships.create_pending(community_id, user_id)?);
        }
        let record = memberships.create_member(community_id, user_id)?;
        CommunityRepository::new(self.store).increment_member_count(community_id)?;
        self.join_default_channels(community_id, user_id)?;
        self.jobs.enqueue(Job::CommunityNotification {
            community_id: community_id.to_string(),
            user_id: user_id.to_string(),
        })?;
        info!("event=community_joined module=service community_id={community_id} user_id={user_id}");
        Ok(record)
    }

    /// Leaves a community and every channel in it.
    pub fn leave_community(&self, community_id: &str, user_id: &str) -> ServiceResult<UsersCommunities> {
        let memberships = CommunityMembershipRepository::new(self.store);
        let record = found(memberships.record(community_id, user_id)?, community_id)?;
        if record.is_owner {
            return Err(ServiceError::forbidden("owners cannot leave their community"));
        }
        if !record.is_member {
            return Ok(record);
        }

        let left = found(memberships.remove_member(community_id, user_id)?, community_id)?;
        CommunityRepository::new(self.store).decrement_member_count(community_id)?;
        let channel_ids =
            ChannelRepository::new(self.store).member_ids_by_user_and_community(community_id, user_id)?;
        for channel_id in &channel_ids {
            ChannelMembershipRepository::new(self.store).remove_member(channel_id, user_id)?;
            ChannelRepository::new(self.store).decrement_member_count(channel_id)?;
        }
        info!(
            "event=community_left module=service community_id={community_id} user_id={user_id} channels_left={}",
            channel_ids.len()
        );
        Ok(left)
    }

    pub fn block_in_community(&self, community_id: &str, user_id: &str) -> ServiceResult<UsersCommunities> {
        let memberships = CommunityMembershipRepository::new(self.store);
        let record = found(memberships.record(community_id, user_id)?, community_id)?;
        if record.is_owner {
            return Err(ServiceError::forbidden("owners cannot be blocked"));
        }
        let blocked = found(memberships.block(community_id, user_id)?, community_id)?;
        if record.is_member {
            CommunityRepository::new(self.store).decrement_member_count(community_id)?;
        }
        Ok(blocked)
    }

    pub fn unblock_in_community(&self, community_id: &str, user_id: &str) -> ServiceResult<UsersCommunities> {
        let memberships = CommunityMembershipRepository::new(self.store);
        let unblocked = found(memberships.unblock(community_id, user_id)?, community_id)?;
        CommunityRepository::new(self.store).increment_member_count(community_id)?;
        self.join_default_channels(community_id, user_id)?;
        Ok(unblocked)
    }

    pub fn approve_pending_in_community(&self, community_id: &str, user_id: &str) -> ServiceResult<UsersCommunities> {
        let approved = found(
            CommunityMembershipRepository::new(self.store).approve_pending(community_id, user_id)?,
            community_id,
        )?;
        CommunityRepository::new(self.store).increment_member_count(community_id)?;
        self.join_default_channels(community_id, user_id)?;
        self.jobs.enqueue(Job::CommunityNotification {
            community_id: community_id.to_string(),
            user_id: user_id.to_string(),
        })?;
        Ok(approved)
    }

    /// Joins a channel; private channels get a pending request instead.
    pub fn join_channel(&self, channel_id: &str, user_id: &str) -> ServiceResult<UsersChannels> {
        let channel = found(ChannelRepository::new(self.store).by_id(channel_id)?, channel_id)?;
        if channel.archived_at.is_some() {
            return Err(ServiceError::forbidden("channel is archived"));
        }
        let community_role = CommunityMembershipRepository::new(self.store)
            .permissions(&channel.community_id, user_id)?;
        if !community_role.is_member {
            return Err(ServiceError::forbidden("join the community first"));
        }

        let memberships = ChannelMembershipRepository::new(self.store);
        let previous = memberships.record(channel_id, user_id)?;
        if let Some(record) = &previous {
            if record.is_blocked {
                return Err(ServiceError::forbidden("user is blocked in this channel"));
            }
            if record.is_member {
                return Ok(record.clone());
            }
        }
        if channel.is_private {
            return Ok(memberships.create_or_update_pending(channel_id, user_id)?);
        }

        let record = found(memberships.create_member(channel_id, user_id)?, channel_id)?;
        ChannelRepository::new(self.store).increment_member_count(channel_id)?;
        info!("event=channel_joined module=service channel_id={channel_id} user_id={user_id}");
        Ok(record)
    }

    pub fn leave_channel(&self, channel_id: &str, user_id: &str) -> ServiceResult<UsersChannels> {
        let memberships = ChannelMembershipRepository::new(self.store);
        let record = found(memberships.record(channel_id, user_id)?, channel_id)?;
        if record.is_owner {
            return Err(ServiceError::forbidden("owners cannot leave their channel"));
        }
        if !record.is_member {
            return Ok(record);
        }
        let left = found(memberships.remove_member(channel_id, user_id)?, channel_id)?;
        ChannelRepository::new(self.store).decrement_member_count(channel_id)?;
        Ok(left)
    }

    pub fn block_in_channel(&self, channel_id: &str, user_id: &str) -> ServiceResult<UsersChannels> {
        let memberships = ChannelMembershipRepository::new(self.store);
        let record = found(memberships.record(channel_id, user_id)?, channel_id)?;
        if record.is_owner {
            return Err(ServiceError::forbidden("owners cannot be blocked"));
        }
        let blocked = found(memberships.block(channel_id, user_id)?, channel_id)?;
        if record.is_member {
            ChannelRepository::new(self.store).decrement_member_count(channel_id)?;
        }
        Ok(blocked)
    }

    pub fn approve_pending_in_channel(&self, channel_id: &str, user_id: &str) -> ServiceResult<UsersChannels> {
        let approved = found(
            ChannelMembershipRepository::new(self.store).approve_pending(channel_id, user_id)?,
            channel_id,
        )?;
        ChannelRepository::new(self.store).increment_member_count(channel_id)?;
        Ok(approved)
    }

    /// Approves every pending request and recounts the members.
    pub fn approve_all_pending_in_channel(&self, channel_id: &str) -> ServiceResult<Channel> {
        ChannelMembershipRepository::new(self.store).approve_all_pending(channel_id)?;
        self.recount_channel(channel_id)
    }

    /// Sets `memberCount` from the member records.
    pub fn recount_channel(&self, channel_id: &str) -> ServiceResult<Channel> {
        let channels = ChannelRepository::new(self.store);
        let ids = [channel_id.to_string()];
        let count = channels
            .member_counts(&ids)?
            .into_iter()
            .find(|entry| entry.group == channel_id)
            .map_or(0, |entry| entry.count);
        Ok(channels.set_member_count(channel_id, i64::try_from(count).unwrap_or(i64::MAX))?)
    }

    /// Sets `memberCount` from the member records.
    pub fn recount_community(&self, community_id: &str) -> ServiceResult<Community> {
        let communities = CommunityRepository::new(self.store);
        let ids = [community_id.to_string()];
        let count = communities
            .member_counts(&ids)?
            .into_iter()
            .find(|entry| entry.group == community_id)
            .map_or(0, |entry| entry.count);
        Ok(communities.set_member_count(community_id, i64::try_from(count).unwrap_or(i64::MAX))?)
    }

    fn join_default_channels(&self, community_id: &str, user_id: &str) -> ServiceResult<Vec<String>> {
        let memberships = ChannelMembershipRepository::new(self.store);
        let channel_ids = memberships.unjoined_default_channels(community_id, user_id)?;
        for channel_id in &channel_ids {
            if memberships.create_member(channel_id, user_id)?.is_some() {
                ChannelRepository::new(self.store).increment_member_count(channel_id)?;
            }
        }
        Ok(channel_ids)
    }
}
