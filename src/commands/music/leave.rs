use super::*;

/// Leave the voice channel
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn leave(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let sessions = &ctx.data().sessions;

    if !sessions.has_session(guild_id) {
        return reply_with(ctx, error_reply("I'm not in a voice channel")).await;
    }

    sessions.destroy(guild_id).await;

    reply_with(ctx, CreateReply::default().content("👋 Left the voice channel")).await
}
