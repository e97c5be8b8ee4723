//! [ChannelProvider] over serenity's cache and HTTP client.

use async_trait::async_trait;
use serenity::{
    ChannelType, CreateChannel, EditChannel, PermissionOverwrite, PermissionOverwriteType,
    Permissions,
};
use tracing::instrument;

use crate::error::ProviderError;
use crate::serenity;
use crate::serenity::{ChannelId, GuildId, UserId};
use crate::voice::{ChannelInfo, ChannelProvider, Overwrite};

/// Discord's JSON error code for "Unknown Channel".
const UNKNOWN_CHANNEL: isize = 10003;
/// Discord's JSON error code for "Unknown Member".
const UNKNOWN_MEMBER: isize = 10007;

impl From<serenity::Error> for ProviderError {
    fn from(error: serenity::Error) -> Self {
        if let serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)) = &error {
            let code = response.error.code;
            if response.status_code.as_u16() == 404 || code == UNKNOWN_CHANNEL || code == UNKNOWN_MEMBER {
                return ProviderError::NotFound {
                    what: response.error.message.clone(),
                };
            }
        }
        ProviderError::Discord(error)
    }
}

/// Reads from the gateway cache, writes through the HTTP API.
/// Serenity's [Context](serenity::Context) is cheap to clone.
#[derive(Clone)]
pub struct DiscordChannels {
    ctx: serenity::Context,
}

impl DiscordChannels {
    pub fn new(ctx: &serenity::Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// The cached `@everyone` overwrite of `channel`, empty if it has none.
    /// Rooms start with their category's overwrites copied over.
    fn everyone_overwrite(&self, guild: GuildId, channel: ChannelId) -> Overwrite {
        let Some(guild) = self.ctx.cache.guild(guild) else {
            return Overwrite::default();
        };
        let everyone = PermissionOverwriteType::Role(guild.id.everyone_role());
        guild
            .channels
            .get(&channel)
            .and_then(|channel| {
                channel
                    .permission_overwrites
                    .iter()
                    .find(|overwrite| overwrite.kind == everyone)
            })
            .map(|overwrite| Overwrite {
                allow: overwrite.allow,
                deny: overwrite.deny,
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for DiscordChannels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordChannels").finish_non_exhaustive()
    }
}

#[async_trait]
impl ChannelProvider for DiscordChannels {
    async fn category_exists(&self, guild: GuildId, category: ChannelId) -> bool {
        self.ctx.cache.guild(guild).is_some_and(|guild| {
            guild
                .channels
                .get(&category)
                .is_some_and(|channel| channel.kind == ChannelType::Category)
        })
    }

    #[instrument(skip(self))]
    async fn create_voice_channel(
        &self,
        guild: GuildId,
        name: &str,
        parent: Option<ChannelId>,
    ) -> Result<ChannelId, ProviderError> {
        let mut builder = CreateChannel::new(name).kind(ChannelType::Voice);
        if let Some(parent) = parent {
            builder = builder.category(parent);
        }
        let channel = guild.create_channel(&self.ctx, builder).await?;
        Ok(channel.id)
    }

    #[instrument(skip(self))]
    async fn move_member(
        &self,
        guild: GuildId,
        user: UserId,
        channel: ChannelId,
    ) -> Result<(), ProviderError> {
        guild.move_member(&self.ctx, user, channel).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn disconnect_member(&self, guild: GuildId, user: UserId) -> Result<(), ProviderError> {
        guild.disconnect_member(&self.ctx, user).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_channel(&self, channel: ChannelId) -> Result<(), ProviderError> {
        channel.delete(&self.ctx).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn rename_channel(&self, channel: ChannelId, name: &str) -> Result<(), ProviderError> {
        channel
            .edit(&self.ctx, EditChannel::new().name(name))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_everyone_permission(
        &self,
        guild: GuildId,
        channel: ChannelId,
        permission: Permissions,
        allowed: bool,
    ) -> Result<(), ProviderError> {
        let Overwrite { allow, deny } = self
            .everyone_overwrite(guild, channel)
            .with(permission, allowed);
        let overwrite = PermissionOverwrite {
            allow,
            deny,
            kind: PermissionOverwriteType::Role(guild.everyone_role()),
        };
        channel.create_permission(&self.ctx, overwrite).await?;
        Ok(())
    }

    async fn voice_members(&self, guild: GuildId, channel: ChannelId) -> Option<Vec<UserId>> {
        let guild = self.ctx.cache.guild(guild)?;
        if !guild.channels.contains_key(&channel) {
            return None;
        }
        let members = guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel))
            .map(|state| state.user_id)
            .collect();
        Some(members)
    }

    async fn voice_channel_of(&self, guild: GuildId, user: UserId) -> Option<ChannelId> {
        let guild = self.ctx.cache.guild(guild)?;
        guild.voice_states.get(&user).and_then(|state| state.channel_id)
    }

    async fn channel_info(&self, guild: GuildId, channel: ChannelId) -> Option<ChannelInfo> {
        let guild = self.ctx.cache.guild(guild)?;
        guild.channels.get(&channel).map(|channel| ChannelInfo {
            name: channel.name.clone(),
            parent: channel.parent_id,
        })
    }
}
