//! This module contains everything relating to [Data].

use std::collections::HashSet;
use std::sync::Arc;

use serenity::GuildId;
use serenity::UserId;

use crate::error::UserError;
use crate::serenity;
use crate::store::GuildConfig;
use crate::store::GuildConfigStore;
use crate::voice::RoomManager;
use crate::Context;
use crate::TempVoiceError;

/// The data kept between shards
#[derive(Debug)]
pub struct Data {
    /// List of users to send bug notifications
    pub notify_list: HashSet<UserId>,
    /// Hub and category of every guild, see [GuildConfig].
    pub guild_configs: Arc<dyn GuildConfigStore>,
    /// Tracks temporary rooms and their pending deletions.
    pub rooms: RoomManager,
}

/// Is able to get per-guild [Data] from a command [Context].
pub trait GetData {
    /// Returns the guild the command was used in. Errors if not in a guild.
    fn require_guild(&self) -> Result<GuildId, UserError>;
    /// Returns the [GuildConfig] of the current guild, if `/setup` was used.
    async fn guild_config(&self) -> Result<Option<GuildConfig>, TempVoiceError>;
    /// Returns the [RoomManager].
    fn rooms(&self) -> &RoomManager;
}

impl GetData for Context<'_> {
    fn require_guild(&self) -> Result<GuildId, UserError> {
        self.guild_id().ok_or(UserError::GuildOnly)
    }

    async fn guild_config(&self) -> Result<Option<GuildConfig>, TempVoiceError> {
        let guild = self.require_guild()?;
        let config = self.data().guild_configs.find(guild).await?;
        Ok(config)
    }

    fn rooms(&self) -> &RoomManager {
        &self.data().rooms
    }
}
