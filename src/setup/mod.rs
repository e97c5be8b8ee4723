//! Builds the [serenity::Client] and everything it needs at startup.

mod config;
mod framework;

use crate::serenity;
use crate::TempVoiceError;

pub use config::Config;

/// Constructs a [serenity::Client] with the temporary room framework attached.
pub(super) async fn client(config: Config) -> Result<serenity::Client, TempVoiceError> {
    // Get discord token from config file
    let token = config.token()?.clone();

    // Intents we wish to use
    // See https://discord.com/developers/docs/topics/gateway#gateway-intents
    // Voice states come with the non-privileged set, prefix commands need message content.
    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;

    let client = serenity::ClientBuilder::new(token, intents)
        .framework(framework::framework(config))
        .await?;

    Ok(client)
}
