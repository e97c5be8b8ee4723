//! Gateway event handling

use poise::BoxFuture;
use poise::FrameworkContext;
use tracing::instrument;

use crate::serenity;
use crate::voice::VoiceTransition;
use crate::Data;
use crate::TempVoiceError;

/// Entry point for every gateway event, registered as poise's `event_handler`.
pub fn handle_event<'a>(
    ctx: &'a serenity::Context,
    event: &'a serenity::FullEvent,
    _framework: FrameworkContext<'a, Data, TempVoiceError>,
    data: &'a Data,
) -> BoxFuture<'a, Result<(), TempVoiceError>> {
    Box::pin(async move {
        match event {
            serenity::FullEvent::VoiceStateUpdate { old, new } => {
                voice_state_update(ctx, data, old.as_ref(), new).await;
            }
            serenity::FullEvent::GuildCreate { guild, .. } => {
                tracing::debug!("Guild available: {} ({})", guild.name, guild.id);
            }
            _ => {}
        }
        Ok(())
    })
}

/// Hand the voice change to the room lifecycle. Failures are logged there and never returned.
#[instrument(level = "debug", skip_all, fields(user = %new.user_id, channel = ?new.channel_id))]
async fn voice_state_update(
    ctx: &serenity::Context,
    data: &Data,
    old: Option<&serenity::VoiceState>,
    new: &serenity::VoiceState,
) {
    let cached_name = ctx
        .cache
        .user(new.user_id)
        .map(|user| user.display_name().to_string());
    let Some(transition) = VoiceTransition::from_states(old, new, cached_name.as_deref()) else {
        return;
    };
    data.rooms.handle_transition(&transition).await;
}
