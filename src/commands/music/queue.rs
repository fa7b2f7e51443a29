use super::*;

/// View the current music queue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let sessions = &ctx.data().sessions;

    let current = sessions.now_playing(guild_id).await;
    let queue = sessions.get_queue(guild_id).await;

    let mut embed = CreateEmbed::new().title("🎵 Music Queue").color(0x00ff00);

    if let Some(track) = &current {
        embed = embed.field("Now Playing", format!("[{}]({})", track.title, track.url), false);
    }

    if queue.is_empty() {
        embed = embed.description("The queue is currently empty");
    } else {
        let listing: Vec<String> = queue
            .iter()
            .enumerate()
            .take(10)
            .map(|(index, track)| {
                format!(
                    "`{}.` {} `{}`",
                    index + 1,
                    track.title,
                    format_duration(track.duration)
                )
            })
            .collect();
        let total: Duration = queue.iter().map(|track| track.duration).sum();

        embed = embed.description(listing.join("\n")).field(
            "Queue Info",
            format!("`{} tracks` • Total Length: `{}`", queue.len(), format_duration(total)),
            false,
        );
    }

    reply_with(ctx, CreateReply::default().embed(embed)).await
}
