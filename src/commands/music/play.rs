use super::*;
use rusty_voice::PlayOutcome;
use tracing::{error, info};

/// Play a song from YouTube or a direct URL
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search query"] query: String,
) -> CommandResult {
    info!("Received play command with query: {}", query);
    let guild_id = guild_id(ctx)?;

    let Some(channel_id) = user_voice_channel(ctx, guild_id) else {
        return reply_with(ctx, error_reply("You need to be in a voice channel!")).await;
    };

    // Resolving and joining can take a while
    ctx.defer().await?;

    let sessions = &ctx.data().sessions;
    match sessions
        .play_query(guild_id, channel_id, &query, &ctx.author().name)
        .await
    {
        Ok((track, PlayOutcome::Started)) => {
            reply_with(
                ctx,
                CreateReply::default().embed(track_embed("🎵 Now Playing", &track)),
            )
            .await
        }
        Ok((track, PlayOutcome::Queued { position })) => {
            let embed = track_embed("📝 Added to Queue", &track)
                .field("Position", format!("`#{}`", position), true);
            reply_with(ctx, CreateReply::default().embed(embed)).await
        }
        Err(err) => {
            error!("Play request failed in guild {}: {}", guild_id, err);
            reply_with(ctx, error_reply(format!("Could not play that track: {}", err))).await
        }
    }
}
