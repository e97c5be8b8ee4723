//! Error types used throughout the bot.

use poise::serenity_prelude as serenity;
use thiserror::Error;

/// The error type used by the framework and every command.
#[derive(Error, Debug)]
pub enum TempVoiceError {
    /// Expected errors caused by the user, shown back to them.
    #[error(transparent)]
    UserError(#[from] UserError),

    #[error(transparent)]
    ConfigError(#[from] ConfigError),

    #[error(transparent)]
    StoreError(#[from] StoreError),

    #[error(transparent)]
    ProviderError(#[from] ProviderError),

    #[error(transparent)]
    SerenityError(#[from] serenity::Error),

    #[error("Failed to start the health server: {0}")]
    HealthServer(#[source] std::io::Error),

    #[error("A command check failed: {}", .reason.as_deref().unwrap_or("no reason given"))]
    CheckFailed { reason: Option<String> },

    #[error("Command panicked: {}", .payload.as_deref().unwrap_or("<no payload>"))]
    Panic { payload: Option<String> },

    #[error("Command structure mismatch: {description}")]
    CommandStructureMismatch { description: String },
}

/// Errors that are the user's fault and are shown to them as a reply.
#[derive(Error, Debug)]
pub enum UserError {
    #[error("This command needs a subcommand: {subcmds}")]
    MissingSubcommand { subcmds: String },
    #[error("Couldn't understand the arguments{}.", .input.as_ref().map(|i| format!(" in `{i}`")).unwrap_or_default())]
    BadArgs { input: Option<String> },
    #[error("I'm missing permissions to do that: {missing_permissions}")]
    MissingBotPermissions {
        missing_permissions: serenity::Permissions,
    },
    #[error("You need these permissions: {}", .missing_permissions.map(|p| p.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    MissingUserPermissions {
        missing_permissions: Option<serenity::Permissions>,
    },
    #[error("This command only works in a server.")]
    GuildOnly,
    #[error("You are not in a voice channel.")]
    NotInVoice,
    #[error("{user} is not in a voice channel.")]
    TargetNotInVoice { user: String },
    #[error("<#{channel}> is not a {expected}.")]
    WrongChannelKind {
        channel: serenity::ChannelId,
        expected: &'static str,
    },
    #[error("<#{channel}> belongs to another server.")]
    ForeignChannel { channel: serenity::ChannelId },
    #[error("You don't own a room.")]
    NoOwnedRoom,
    #[error("This is not a temporary room.")]
    NotTemporaryRoom,
    #[error("The owner is still in the room.")]
    OwnerPresent,
    #[error("You can only do that for people in your own room.")]
    NotYourRoom,
    #[error("You already own this room.")]
    AlreadyOwner,
    #[error("Room names can't be empty.")]
    EmptyRoomName,
}

/// Errors while reading `config.toml`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file is missing. {action_msg}")]
    MissingConfig { action_msg: String },
    #[error("Config file is invalid: {reason}")]
    InvalidConfig { reason: String },
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// Errors from persisting guild configurations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Guild config file is invalid: {reason}")]
    Malformed { reason: String },
    #[error("Failed to serialize guild configs: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// Failures of a [ChannelProvider](crate::voice::ChannelProvider) call.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The channel or member no longer exists.
    #[error("{what} not found.")]
    NotFound { what: String },
    #[error(transparent)]
    Discord(serenity::Error),
}

impl ProviderError {
    /// Whether the target was already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }
}
