//! How temporary rooms are named, and how an untracked channel is recognized as one.

use crate::serenity::ChannelId;

/// Every temporary room's name ends with this.
pub const ROOM_SUFFIX: &str = "'s Room";

/// Discord rejects channel names longer than this.
pub(super) const MAX_CHANNEL_NAME: usize = 100;

/// Name for a room owned by `owner`, e.g. `Alice's Room`.
///
/// Long names are shortened so the suffix always survives.
pub fn room_name(owner: &str) -> String {
    let budget = MAX_CHANNEL_NAME - ROOM_SUFFIX.chars().count();
    let owner: String = owner.trim().chars().take(budget).collect();
    format!("{owner}{ROOM_SUFFIX}")
}

/// Whether a channel nobody is tracking still looks like one of our rooms.
/// Rooms are always created inside a category, so channels without a parent never qualify.
pub fn looks_like_room(name: &str, parent: Option<ChannelId>) -> bool {
    parent.is_some() && name.ends_with(ROOM_SUFFIX)
}
