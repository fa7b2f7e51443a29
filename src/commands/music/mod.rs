pub(crate) mod leave;
pub(crate) mod play;
pub(crate) mod queue;
pub(crate) mod remove;
pub(crate) mod skip;
pub(crate) mod stop;

use poise::CreateReply;
use poise::serenity_prelude::{ChannelId, CreateEmbed, GuildId};
use rusty_voice::Track;
use std::time::Duration;

use crate::{CommandResult, Context, Error};

/// Guild the command was invoked in, or an error for DMs.
fn guild_id(ctx: Context<'_>) -> Result<GuildId, Error> {
    ctx.guild_id()
        .ok_or_else(|| "This command only works in a server".into())
}

/// Voice channel the invoking user is currently in.
fn user_voice_channel(ctx: Context<'_>, guild_id: GuildId) -> Option<ChannelId> {
    let guild = ctx.serenity_context().cache.guild(guild_id)?;
    guild.voice_states.get(&ctx.author().id)?.channel_id
}

fn error_reply(description: impl Into<String>) -> CreateReply {
    CreateReply::default()
        .embed(
            CreateEmbed::new()
                .title("❌ Error")
                .description(description)
                .color(0xff0000),
        )
        .ephemeral(true)
}

fn track_embed(title: &str, track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(title)
        .description(format!("[{}]({})", track.title, track.url))
        .field("Duration", format!("`{}`", format_duration(track.duration)), true)
        .field("Requested by", &track.requested_by, true)
        .color(0x00ff00);

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }
    embed
}

async fn reply_with(ctx: Context<'_>, reply: CreateReply) -> CommandResult {
    ctx.send(reply).await?;
    Ok(())
}

/// Format a duration into a human-readable string (e.g., "3:45" or "1:23:45")
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    if total_seconds == 0 {
        return "Live".to_string();
    }

    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
