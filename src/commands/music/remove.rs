use super::*;

/// Remove a track from the queue by its position
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Position of the track to remove (1-based)"]
    #[min = 1]
    position: usize,
) -> CommandResult {
    let guild_id = guild_id(ctx)?;

    // Convert to 0-based index
    let index = position.saturating_sub(1);

    match ctx.data().sessions.remove(guild_id, index).await {
        Some(track) => {
            reply_with(
                ctx,
                CreateReply::default().embed(
                    CreateEmbed::new()
                        .title("🗑️ Removed from Queue")
                        .description(format!("`#{}` {}", position, track.title))
                        .color(0x00ff00),
                ),
            )
            .await
        }
        None => reply_with(ctx, error_reply(format!("There is no track at position {}", position))).await,
    }
}
