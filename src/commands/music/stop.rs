use super::*;

/// Stop the music and clear the queue, staying in the voice channel
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;

    ctx.data().sessions.stop(guild_id).await;

    reply_with(
        ctx,
        CreateReply::default().content("🛑 Stopped playback and cleared the queue"),
    )
    .await
}
