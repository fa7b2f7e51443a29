use poise::CreateReply;
use poise::serenity_prelude::CreateEmbed;
use std::time::{Duration, Instant};

use crate::{CommandResult, Context};

/// Check that the bot is alive and how fast it answers
#[poise::command(slash_command, category = "General")]
pub async fn ping(ctx: Context<'_>) -> CommandResult {
    let sent = Instant::now();
    let handle = ctx.say("Pinging...").await?;
    let round_trip = sent.elapsed();

    let gateway = shard_latency(ctx)
        .await
        .map(|latency| format!("{} ms", latency.as_millis()))
        .unwrap_or_else(|| "not measured yet".to_string());

    let embed = CreateEmbed::new()
        .title("🏓 Pong!")
        .field("Round trip", format!("{} ms", round_trip.as_millis()), true)
        .field("Gateway", gateway, true)
        .color(0x00ff00);

    handle
        .edit(ctx, CreateReply::default().content("").embed(embed))
        .await?;
    Ok(())
}

/// Heartbeat latency of the shard this command arrived on. `None` until the
/// first heartbeat has been acknowledged.
async fn shard_latency(ctx: Context<'_>) -> Option<Duration> {
    let shard_manager = ctx.framework().shard_manager();
    let runners = shard_manager.runners.lock().await;
    runners.get(&ctx.serenity_context().shard_id)?.latency
}
