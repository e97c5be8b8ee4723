//! Implements the `/setup` and `/config` commands.
//!
//! Administrators choose the hub voice channel and the category rooms are created in.

use serenity::{ChannelType, GuildChannel};
use tracing::instrument;

use crate::data::GetData;
use crate::error::UserError;
use crate::serenity;
use crate::store::GuildConfig;
use crate::Context;
use crate::TempVoiceError;

/// Choose the hub voice channel and the category for new rooms.
#[instrument(skip_all, fields(hub = %hub.id, category = %category.id))]
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn setup(
    ctx: Context<'_>,
    #[description = "Joining this voice channel creates a room"]
    #[channel_types("Voice")]
    hub: GuildChannel,
    #[description = "Category new rooms are created in"]
    #[channel_types("Category")]
    category: GuildChannel,
) -> Result<(), TempVoiceError> {
    let guild_id = ctx.require_guild()?;

    check_channel(guild_id, hub.id, hub.guild_id, hub.kind, ChannelType::Voice)?;
    check_channel(
        guild_id,
        category.id,
        category.guild_id,
        category.kind,
        ChannelType::Category,
    )?;

    let config = GuildConfig {
        guild_id,
        hub_channel_id: Some(hub.id),
        category_id: Some(category.id),
    };
    ctx.data().guild_configs.upsert(config).await?;
    tracing::info!("Saved config for {guild_id}.");

    ctx.say(format!(
        "Saved! Joining <#{}> now creates a room in **{}**.",
        hub.id, category.name
    ))
    .await?;
    Ok(())
}

/// Show the hub and category of this server.
#[instrument(skip_all)]
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn config(ctx: Context<'_>) -> Result<(), TempVoiceError> {
    let reply = match ctx.guild_config().await? {
        Some(GuildConfig {
            hub_channel_id: Some(hub),
            category_id,
            ..
        }) => {
            let category = category_id
                .map(|c| format!("<#{c}>"))
                .unwrap_or_else(|| "none".to_string());
            format!("Hub: <#{hub}>\nCategory: {category}")
        }
        _ => "Not set up yet. Use `setup <hub> <category>`.".to_string(),
    };
    ctx.say(reply).await?;
    Ok(())
}

/// Check that a channel argument is in this guild and of the right kind.
fn check_channel(
    guild: serenity::GuildId,
    channel: serenity::ChannelId,
    channel_guild: serenity::GuildId,
    kind: ChannelType,
    expected: ChannelType,
) -> Result<(), UserError> {
    if channel_guild != guild {
        return Err(UserError::ForeignChannel { channel });
    }
    if kind != expected {
        let expected = match expected {
            ChannelType::Voice => "voice channel",
            ChannelType::Category => "category",
            _ => "different kind of channel",
        };
        return Err(UserError::WrongChannelKind { channel, expected });
    }
    Ok(())
}
