//! Normalized voice state changes.

use crate::serenity;
use serenity::{ChannelId, GuildId, UserId, VoiceState};

/// The member whose voice state changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mover {
    pub id: UserId,
    /// Server nickname, falling back to the account name.
    pub display_name: String,
}

/// A member's voice connection going from `previous` to `next`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceTransition {
    pub guild_id: GuildId,
    pub member: Mover,
    pub previous: Option<ChannelId>,
    pub next: Option<ChannelId>,
}

/// What kind of change a [VoiceTransition] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Connected to `next` from nothing.
    Join(ChannelId),
    /// Disconnected from `previous`.
    Leave(ChannelId),
    /// Switched from one channel to another.
    Move { from: ChannelId, to: ChannelId },
    /// Same channel (mute, deafen, stream...) or not connected at all.
    Stay,
}

impl VoiceTransition {
    /// Build a transition from a gateway voice state update.
    /// `cached_name` is used when the update carries no member, e.g. the user's cached name.
    /// Returns `None` for updates outside of a guild.
    pub fn from_states(
        old: Option<&VoiceState>,
        new: &VoiceState,
        cached_name: Option<&str>,
    ) -> Option<Self> {
        let guild_id = new.guild_id.or_else(|| old.and_then(|o| o.guild_id))?;

        let display_name = match (&new.member, cached_name) {
            (Some(member), _) => member.display_name().to_string(),
            (None, Some(name)) => name.to_string(),
            (None, None) => new.user_id.to_string(),
        };

        Some(Self {
            guild_id,
            member: Mover {
                id: new.user_id,
                display_name,
            },
            previous: old.and_then(|o| o.channel_id),
            next: new.channel_id,
        })
    }

    pub fn kind(&self) -> TransitionKind {
        match (self.previous, self.next) {
            (None, Some(to)) => TransitionKind::Join(to),
            (Some(from), None) => TransitionKind::Leave(from),
            (Some(from), Some(to)) if from != to => TransitionKind::Move { from, to },
            _ => TransitionKind::Stay,
        }
    }
}
