//! Implements the `/v` command family for temporary rooms.
//!
//! `v reject @user` disconnects someone from voice, the rest manage the author's own room.

use itertools::Itertools;
use poise::CreateReply;
use serenity::CreateEmbed;
use serenity::Member;
use tracing::instrument;

use super::Command;
use crate::data::GetData;
use crate::serenity;
use crate::Context;
use crate::TempVoiceError;

/// Manage temporary voice rooms.
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    subcommands(
        "reject", "rename", "lock", "unlock", "hide", "unhide", "claim", "transfer", "addco",
        "info", "close", "commands"
    ),
    subcommand_required
)]
pub async fn v(_ctx: Context<'_>) -> Result<(), TempVoiceError> {
    Ok(())
}

/// Disconnect someone from voice.
#[instrument(skip_all, fields(target = %member.user.id))]
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn reject(
    ctx: Context<'_>,
    #[description = "Who to disconnect"] member: Member,
) -> Result<(), TempVoiceError> {
    let guild_id = ctx.require_guild()?;
    let can_move = author_can_move_members(&ctx).await;
    let name = member.display_name().to_string();

    ctx.rooms()
        .reject(guild_id, ctx.author().id, can_move, member.user.id, &name)
        .await?;

    ctx.say(format!("Disconnected **{name}** from voice.")).await?;
    Ok(())
}

/// Rename your room.
#[instrument(skip(ctx))]
#[poise::command(prefix_command, slash_command, guild_only, rename = "name")]
pub async fn rename(
    ctx: Context<'_>,
    #[description = "New room name"]
    #[rest]
    name: String,
) -> Result<(), TempVoiceError> {
    let guild_id = ctx.require_guild()?;
    let applied = ctx.rooms().rename_room(guild_id, ctx.author().id, &name).await?;
    ctx.say(format!("Room renamed to **{applied}**.")).await?;
    Ok(())
}

/// Stop others from joining your room.
#[instrument(skip(ctx))]
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn lock(ctx: Context<'_>) -> Result<(), TempVoiceError> {
    let guild_id = ctx.require_guild()?;
    ctx.rooms()
        .set_room_locked(guild_id, ctx.author().id, true)
        .await?;
    ctx.say("Room locked.").await?;
    Ok(())
}

/// Let others join your room again.
#[instrument(skip(ctx))]
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn unlock(ctx: Context<'_>) -> Result<(), TempVoiceError> {
    let guild_id = ctx.require_guild()?;
    ctx.rooms()
        .set_room_locked(guild_id, ctx.author().id, false)
        .await?;
    ctx.say("Room unlocked.").await?;
    Ok(())
}

/// Hide your room from the channel list.
#[instrument(skip(ctx))]
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn hide(ctx: Context<'_>) -> Result<(), TempVoiceError> {
    let guild_id = ctx.require_guild()?;
    ctx.rooms()
        .set_room_hidden(guild_id, ctx.author().id, true)
        .await?;
    ctx.say("Room hidden.").await?;
    Ok(())
}

/// Show your room in the channel list again.
#[instrument(skip(ctx))]
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn unhide(ctx: Context<'_>) -> Result<(), TempVoiceError> {
    let guild_id = ctx.require_guild()?;
    ctx.rooms()
        .set_room_hidden(guild_id, ctx.author().id, false)
        .await?;
    ctx.say("Room visible.").await?;
    Ok(())
}

/// Take over the room you're in if its owner left.
#[instrument(skip(ctx))]
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn claim(ctx: Context<'_>) -> Result<(), TempVoiceError> {
    let guild_id = ctx.require_guild()?;
    let author = ctx.author();
    let name = author_display_name(&ctx).await;

    ctx.rooms().claim_room(guild_id, author.id, &name).await?;
    ctx.say(format!("{author} is now the owner of this room.")).await?;
    Ok(())
}

/// Give your room to someone else.
#[instrument(skip_all, fields(new_owner = %member.user.id))]
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn transfer(
    ctx: Context<'_>,
    #[description = "The new owner"] member: Member,
) -> Result<(), TempVoiceError> {
    let guild_id = ctx.require_guild()?;
    ctx.rooms()
        .transfer_room(guild_id, ctx.author().id, member.user.id, member.display_name())
        .await?;
    ctx.say(format!("Ownership transferred to {}.", member.user))
        .await?;
    Ok(())
}

/// Let someone help moderate your room.
#[instrument(skip_all, fields(coowner = %member.user.id))]
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn addco(
    ctx: Context<'_>,
    #[description = "The new co-owner"] member: Member,
) -> Result<(), TempVoiceError> {
    let guild_id = ctx.require_guild()?;
    ctx.rooms()
        .add_room_coowner(guild_id, ctx.author().id, member.user.id)
        .await?;
    ctx.say(format!("{} added as co-owner.", member.user)).await?;
    Ok(())
}

/// Show details about your room.
#[instrument(skip(ctx))]
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn info(ctx: Context<'_>) -> Result<(), TempVoiceError> {
    let guild_id = ctx.require_guild()?;
    let summary = ctx.rooms().room_summary(guild_id, ctx.author().id).await?;
    let coowners = match summary.coowners.as_slice() {
        [] => "none".to_string(),
        ids => ids.iter().map(|id| format!("<@{id}>")).join(", "),
    };

    let embed = CreateEmbed::default()
        .title("Room Info")
        .field("Room", summary.name, false)
        .field("Owner", format!("<@{}>", summary.owner), false)
        .field("Co-owners", coowners, false)
        .field("Members", summary.members.to_string(), false);

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Delete your room now.
#[instrument(skip(ctx))]
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn close(ctx: Context<'_>) -> Result<(), TempVoiceError> {
    let guild_id = ctx.require_guild()?;
    ctx.rooms().close_room(guild_id, ctx.author().id).await?;
    ctx.say("Room closed.").await?;
    Ok(())
}

/// List every room command.
#[instrument(skip(ctx))]
#[poise::command(prefix_command, slash_command)]
pub async fn commands(ctx: Context<'_>) -> Result<(), TempVoiceError> {
    let embed = command_listing(ctx.prefix(), &v())
        .into_iter()
        .fold(CreateEmbed::default().title("Room Commands"), |embed, (usage, about)| {
            embed.field(usage, about, false)
        });
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Usage line and description of every subcommand of `parent`.
fn command_listing(prefix: &str, parent: &Command) -> Vec<(String, String)> {
    parent
        .subcommands
        .iter()
        .map(|sub| {
            let args = sub
                .parameters
                .iter()
                .map(|param| format!(" <{}>", param.name))
                .collect::<String>();
            let usage = format!("{prefix}{} {}{args}", parent.name, sub.name);
            let about = sub.description.clone().unwrap_or_default();
            (usage, about)
        })
        .collect()
}

/// Whether the author has the Move Members permission in this guild.
async fn author_can_move_members(ctx: &Context<'_>) -> bool {
    let Some(member) = ctx.author_member().await else {
        return false;
    };
    ctx.guild()
        .is_some_and(|guild| guild.member_permissions(&member).move_members())
}

/// The author's server nickname, or their account name outside of a server.
async fn author_display_name(ctx: &Context<'_>) -> String {
    match ctx.author_member().await {
        Some(member) => member.display_name().to_string(),
        None => ctx.author().name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_covers_every_subcommand() {
        let listing = command_listing(".", &v());
        let usages: Vec<&str> = listing.iter().map(|(usage, _)| usage.as_str()).collect();

        assert_eq!(listing.len(), v().subcommands.len());
        for expected in [
            ".v reject <member>",
            ".v name <name>",
            ".v lock",
            ".v hide",
            ".v unhide",
            ".v addco <member>",
            ".v claim",
            ".v commands",
        ] {
            assert!(usages.contains(&expected), "missing {expected} in {usages:?}");
        }
        assert!(listing.iter().all(|(_, about)| !about.is_empty()));
    }
}
