//! A Discord bot that hands out temporary voice rooms.
//!
//! Joining the hub channel of a server creates a "<name>'s Room" voice channel and moves the member
//! into it. Rooms are deleted once they stay empty for a short grace period.

mod commands;
mod data;
mod error;
mod health;
mod lib;
mod log;
mod setup;
mod store;
mod voice;

pub use poise::serenity_prelude as serenity;

pub use data::Data;
pub use error::TempVoiceError;
pub use setup::Config;

/// Type alias for the poise [Context](poise::Context) used by every command.
pub type Context<'a> = poise::Context<'a, Data, TempVoiceError>;

#[tokio::main]
async fn main() -> Result<(), TempVoiceError> {
    let config = Config::read()?;

    // Keep the guard alive so file logs are flushed on exit.
    let _guard = log::install_tracing(&config);

    if let Some(address) = config.health_address()? {
        let listener = health::bind(address).await?;
        health::spawn(listener);
    }

    let mut client = setup::client(config).await?;
    client.start().await?;

    Ok(())
}
