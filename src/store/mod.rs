//! Per-guild configuration written by `/setup` and read by the room lifecycle.

mod toml_store;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::error::StoreError;
use crate::serenity::{ChannelId, GuildId};
pub use toml_store::TomlStore;

/// A guild's temporary room setup. At most one exists per guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    pub guild_id: GuildId,
    /// Joining this channel creates a room. `None` disables rooms for the guild.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub_channel_id: Option<ChannelId>,
    /// Category new rooms are created in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<ChannelId>,
}

/// Exact-match lookup and whole-document upsert of [GuildConfig]s.
#[async_trait]
pub trait GuildConfigStore: Send + Sync + std::fmt::Debug {
    async fn find(&self, guild_id: GuildId) -> Result<Option<GuildConfig>, StoreError>;

    /// Insert the config, replacing any existing one for the same guild.
    async fn upsert(&self, config: GuildConfig) -> Result<(), StoreError>;
}
