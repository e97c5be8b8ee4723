//! Everything the room lifecycle needs from Discord, behind a trait.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::serenity::{ChannelId, GuildId, Permissions, UserId};

/// Live attributes of a guild channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    /// Category the channel sits in.
    pub parent: Option<ChannelId>,
}

/// Allowed and denied bits of one permission overwrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overwrite {
    pub allow: Permissions,
    pub deny: Permissions,
}

impl Overwrite {
    /// Explicitly allow or deny `permission`, leaving every other bit as it was.
    pub fn with(self, permission: Permissions, allowed: bool) -> Self {
        if allowed {
            Self {
                allow: self.allow | permission,
                deny: self.deny - permission,
            }
        } else {
            Self {
                allow: self.allow - permission,
                deny: self.deny | permission,
            }
        }
    }
}

/// Reads and mutates guild channels and voice connections.
///
/// Reads come from live state and are never cached by callers.
#[async_trait]
pub trait ChannelProvider: Send + Sync + std::fmt::Debug {
    /// Whether `category` exists in the guild and is a category.
    async fn category_exists(&self, guild: GuildId, category: ChannelId) -> bool;

    /// Create a voice channel, optionally nested in `parent`.
    async fn create_voice_channel(
        &self,
        guild: GuildId,
        name: &str,
        parent: Option<ChannelId>,
    ) -> Result<ChannelId, ProviderError>;

    /// Move a connected member into `channel`.
    async fn move_member(
        &self,
        guild: GuildId,
        user: UserId,
        channel: ChannelId,
    ) -> Result<(), ProviderError>;

    /// Disconnect a member from voice.
    async fn disconnect_member(&self, guild: GuildId, user: UserId) -> Result<(), ProviderError>;

    /// Delete a channel. Fails with [ProviderError::NotFound] if it is already gone.
    async fn delete_channel(&self, channel: ChannelId) -> Result<(), ProviderError>;

    async fn rename_channel(&self, channel: ChannelId, name: &str) -> Result<(), ProviderError>;

    /// Allow or deny `permission` for `@everyone` on `channel`.
    /// The rest of the existing `@everyone` overwrite is kept.
    async fn set_everyone_permission(
        &self,
        guild: GuildId,
        channel: ChannelId,
        permission: Permissions,
        allowed: bool,
    ) -> Result<(), ProviderError>;

    /// Members connected to `channel`, `None` if the channel doesn't exist.
    async fn voice_members(&self, guild: GuildId, channel: ChannelId) -> Option<Vec<UserId>>;

    /// Voice channel `user` is connected to.
    async fn voice_channel_of(&self, guild: GuildId, user: UserId) -> Option<ChannelId>;

    async fn channel_info(&self, guild: GuildId, channel: ChannelId) -> Option<ChannelInfo>;

    /// Number of members connected to `channel`, `None` if the channel doesn't exist.
    async fn live_member_count(&self, guild: GuildId, channel: ChannelId) -> Option<usize> {
        self.voice_members(guild, channel)
            .await
            .map(|members| members.len())
    }
}
