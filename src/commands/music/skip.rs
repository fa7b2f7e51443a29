use super::*;

/// Skip the currently playing song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;

    match ctx.data().sessions.skip(guild_id).await {
        Some(track) => {
            reply_with(
                ctx,
                CreateReply::default().embed(
                    CreateEmbed::new()
                        .title("⏭️ Skipped Track")
                        .description(track.title)
                        .color(0x00ff00),
                ),
            )
            .await
        }
        None => reply_with(ctx, error_reply("Nothing is playing right now")).await,
    }
}
