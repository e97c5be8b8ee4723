//! Bot commands.

mod setup;
mod voice;

use crate::{Data, TempVoiceError};

/// Convenient type alias for [poise::Command].
pub type Command = poise::Command<Data, TempVoiceError>;

/// Lists all the implemented commands
pub fn list() -> Vec<Command> {
    vec![setup::setup(), setup::config(), voice::v()]
}
