//! Setup for [poise::Framework]

use std::sync::Arc;

use crate::commands;
use crate::lib::discord::DiscordChannels;
use crate::serenity;
use crate::store::GuildConfigStore;
use crate::store::TomlStore;
use crate::voice::RoomManager;
use crate::Config;
use crate::Data;
use crate::TempVoiceError;

/// Convenient type alias, only this [poise::Framework] type is used.
type Framework = poise::Framework<Data, TempVoiceError>;

/// Construct a [poise::Framework]
pub(super) fn framework(config: Config) -> Framework {
    poise::Framework::builder()
        .options(framework_options(&config))
        .setup(|ctx, rdy, fw| framework_setup(ctx, rdy, fw, config))
        .build()
}

/// Configure options for the [Framework]
fn framework_options(config: &Config) -> poise::FrameworkOptions<Data, TempVoiceError> {
    poise::FrameworkOptions {
        // Add commands to the framework
        commands: crate::commands::list(),
        // Handle framework errors
        on_error: |e| crate::log::handle_framework_error(e),
        // Voice state changes drive the room lifecycle
        event_handler: |ctx, event, fw, data| {
            crate::lib::events::handle_event(ctx, event, fw, data)
        },
        // Log when commands start
        pre_command: |ctx| {
            Box::pin(async move {
                let cmd_name = &ctx.command().qualified_name;
                let user = &ctx.author();
                tracing::info!("Started '{cmd_name}' command from {user}.")
            })
        },
        // Log when finishing commands
        post_command: |ctx| {
            Box::pin(async move {
                let cmd_name = &ctx.command().qualified_name;
                let user = &ctx.author();
                tracing::info!("Finished '{cmd_name}' command from {user}.")
            })
        },
        prefix_options: poise::PrefixFrameworkOptions {
            prefix: Some(config.command_prefix().to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Construct future that runs on startup
fn framework_setup<'a>(
    ctx: &'a serenity::Context,
    rdy: &'a serenity::Ready,
    fw: &'a Framework,
    config: Config,
) -> poise::BoxFuture<'a, Result<Data, TempVoiceError>> {
    Box::pin(async move {
        // Register the commands
        let commands = &commands::list();
        let app_commands = poise::builtins::create_application_commands(commands);

        serenity::Command::set_global_commands(&ctx, app_commands.clone()).await?;
        if let Some(dev_guild) = config.dev_guild() {
            // This is faster than global registers, useful for development.
            tracing::info!("Registering commands on dev guild.");
            dev_guild.set_commands(ctx, app_commands).await?;
        }

        let store: Arc<dyn GuildConfigStore> =
            Arc::new(TomlStore::open(config.guild_config_path()).await?);
        let provider = Arc::new(DiscordChannels::new(ctx));
        let rooms = RoomManager::new(provider, store.clone(), config.lifecycle());

        // Simple message that logs when the bot has initialized
        let bot_name = &rdy.user.name;
        tracing::info!("{bot_name} is ready!");

        let data = Data {
            notify_list: config.notify_list(fw),
            guild_configs: store,
            rooms,
        };

        Ok(data)
    })
}
