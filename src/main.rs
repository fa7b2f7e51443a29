use ::serenity::all::ClientBuilder;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use rusty_voice::music::sources::YtDlpResolver;
use rusty_voice::music::voice::SongbirdTransport;
use rusty_voice::{PlayerConfig, SessionManager};
use songbird::{SerenityInit, Songbird};
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;

use commands::general::ping::*;
use commands::music::{leave::*, play::*, queue::*, remove::*, skip::*, stop::*};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;
type CommandResult = Result<(), Error>;

// User data, which is stored and accessible in all command invocations
struct Data {
    sessions: SessionManager,
}

#[poise::command(slash_command, category = "General")]
async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}

#[poise::command(prefix_command, hide_in_help)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rusty_voice=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    let token = env::var("DISCORD_TOKEN").map_err(|_| "Missing DISCORD_TOKEN")?;
    let config = PlayerConfig::from_env();
    info!("Player configuration: {:?}", config);

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let voice = Songbird::serenity();
    let sessions = SessionManager::new(
        Arc::new(SongbirdTransport::new(
            Arc::clone(&voice),
            reqwest::Client::new(),
        )),
        Arc::new(YtDlpResolver::new()),
        config,
    );

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                // Default commands
                register(),
                help(),
                ping(),
                // Music commands
                play(),
                queue(),
                skip(),
                stop(),
                remove(),
                leave(),
            ],
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(Data { sessions })
            })
        })
        .build();

    let mut client = ClientBuilder::new(token, intents)
        .framework(framework)
        .register_songbird_with(voice)
        .await?;

    client.start().await.map_err(Into::into)
}
