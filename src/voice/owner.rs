//! Things members can do with rooms through `.v` commands.

use tracing::instrument;

use super::lifecycle::RoomManager;
use super::naming::MAX_CHANNEL_NAME;
use crate::error::UserError;
use crate::serenity::{ChannelId, GuildId, Permissions, UserId};
use crate::TempVoiceError;

/// Snapshot of a room for `.v info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub channel: ChannelId,
    pub name: String,
    pub owner: UserId,
    /// Sorted co-owner ids.
    pub coowners: Vec<UserId>,
    pub members: usize,
}

impl RoomManager {
    /// The room `user` owns, or a [UserError::NoOwnedRoom].
    async fn owned_room_id(&self, guild: GuildId, user: UserId) -> Result<ChannelId, UserError> {
        self.room_owned_by(guild, user)
            .await
            .map(|(channel, _)| channel)
            .ok_or(UserError::NoOwnedRoom)
    }

    /// Disconnect `target` from voice.
    ///
    /// Members with the Move Members permission can disconnect anyone,
    /// everyone else only people in a room they own or co-own.
    #[instrument(skip(self, target_name))]
    pub async fn reject(
        &self,
        guild: GuildId,
        author: UserId,
        author_can_move: bool,
        target: UserId,
        target_name: &str,
    ) -> Result<ChannelId, TempVoiceError> {
        let provider = self.provider();
        let channel = provider.voice_channel_of(guild, target).await.ok_or_else(|| {
            UserError::TargetNotInVoice {
                user: target_name.to_string(),
            }
        })?;

        if !author_can_move {
            let moderates = self
                .room(channel)
                .await
                .is_some_and(|room| room.is_moderator(author));
            if !moderates {
                return Err(UserError::NotYourRoom.into());
            }
        }

        provider.disconnect_member(guild, target).await?;
        tracing::info!("Disconnected {target_name} from {channel}.");
        Ok(channel)
    }

    /// Rename the author's room. Returns the name that was applied.
    #[instrument(skip(self))]
    pub async fn rename_room(
        &self,
        guild: GuildId,
        author: UserId,
        name: &str,
    ) -> Result<String, TempVoiceError> {
        let name: String = name.trim().chars().take(MAX_CHANNEL_NAME).collect();
        if name.is_empty() {
            return Err(UserError::EmptyRoomName.into());
        }

        let channel = self.owned_room_id(guild, author).await?;
        self.provider().rename_channel(channel, &name).await?;
        Ok(name)
    }

    /// Lock or unlock the author's room for `@everyone`.
    #[instrument(skip(self))]
    pub async fn set_room_locked(
        &self,
        guild: GuildId,
        author: UserId,
        locked: bool,
    ) -> Result<ChannelId, TempVoiceError> {
        let channel = self.owned_room_id(guild, author).await?;
        self.provider()
            .set_everyone_permission(guild, channel, Permissions::CONNECT, !locked)
            .await?;
        Ok(channel)
    }

    /// Hide or show the author's room for `@everyone`.
    #[instrument(skip(self))]
    pub async fn set_room_hidden(
        &self,
        guild: GuildId,
        author: UserId,
        hidden: bool,
    ) -> Result<ChannelId, TempVoiceError> {
        let channel = self.owned_room_id(guild, author).await?;
        self.provider()
            .set_everyone_permission(guild, channel, Permissions::VIEW_CHANNEL, !hidden)
            .await?;
        Ok(channel)
    }

    /// Let `member` moderate the author's room alongside them.
    #[instrument(skip(self))]
    pub async fn add_room_coowner(
        &self,
        guild: GuildId,
        author: UserId,
        member: UserId,
    ) -> Result<ChannelId, TempVoiceError> {
        let channel = self.owned_room_id(guild, author).await?;
        if member == author {
            return Err(UserError::AlreadyOwner.into());
        }
        self.add_coowner(channel, member).await;
        Ok(channel)
    }

    /// Take over the room the author is in, if its owner has left it.
    #[instrument(skip(self, author_name))]
    pub async fn claim_room(
        &self,
        guild: GuildId,
        author: UserId,
        author_name: &str,
    ) -> Result<ChannelId, TempVoiceError> {
        let provider = self.provider();
        let channel = provider
            .voice_channel_of(guild, author)
            .await
            .ok_or(UserError::NotInVoice)?;
        let room = self.room(channel).await.ok_or(UserError::NotTemporaryRoom)?;

        if room.owner == author {
            return Ok(channel);
        }

        let members = provider.voice_members(guild, channel).await.unwrap_or_default();
        if members.contains(&room.owner) {
            return Err(UserError::OwnerPresent.into());
        }

        self.set_owner(channel, author, author_name).await;
        tracing::info!("{author_name} claimed {channel} from {}.", room.owner_name);
        Ok(channel)
    }

    /// Hand the author's room to someone else.
    #[instrument(skip(self, new_owner_name))]
    pub async fn transfer_room(
        &self,
        guild: GuildId,
        author: UserId,
        new_owner: UserId,
        new_owner_name: &str,
    ) -> Result<ChannelId, TempVoiceError> {
        let channel = self.owned_room_id(guild, author).await?;
        self.set_owner(channel, new_owner, new_owner_name).await;
        Ok(channel)
    }

    /// Delete the author's room right away. Returns the deleted room's id.
    #[instrument(skip(self))]
    pub async fn close_room(&self, guild: GuildId, author: UserId) -> Result<ChannelId, TempVoiceError> {
        let channel = self.owned_room_id(guild, author).await?;
        self.cancel_deletion(channel).await;

        match self.provider().delete_channel(channel).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        self.forget(channel).await;
        tracing::info!("Closed room {channel}.");
        Ok(channel)
    }

    /// Describe the author's room.
    pub async fn room_summary(&self, guild: GuildId, author: UserId) -> Result<RoomSummary, TempVoiceError> {
        let (channel, room) = self
            .room_owned_by(guild, author)
            .await
            .ok_or(UserError::NoOwnedRoom)?;
        let provider = self.provider();

        let Some(info) = provider.channel_info(guild, channel).await else {
            // Deleted behind our back.
            self.forget(channel).await;
            return Err(UserError::NoOwnedRoom.into());
        };
        let members = provider.live_member_count(guild, channel).await.unwrap_or(0);

        let mut coowners: Vec<UserId> = room.coowners.into_iter().collect();
        coowners.sort();

        Ok(RoomSummary {
            channel,
            name: info.name,
            owner: room.owner,
            coowners,
            members,
        })
    }
}
