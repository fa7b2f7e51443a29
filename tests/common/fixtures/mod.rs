//! Sample guilds, channels and tracks used across the tests

use rusty_voice::{PlayerConfig, Track};
use serenity::model::id::{ChannelId, GuildId};
use std::time::Duration;

pub const GUILD_ONE: GuildId = GuildId::new(111_111_111);
pub const GUILD_TWO: GuildId = GuildId::new(222_222_222);

pub const CHANNEL_X: ChannelId = ChannelId::new(987_654_321);
pub const CHANNEL_Y: ChannelId = ChannelId::new(123_456_789);

/// Sample requester for testing
pub const SAMPLE_USER: &str = "charles";

pub fn track(title: &str) -> Track {
    Track::new(
        title,
        format!("https://www.youtube.com/watch?v={}", title),
        SAMPLE_USER,
    )
    .with_duration(Duration::from_secs(180))
}

/// Defaults, with a start timeout short enough for tests to hit.
pub fn test_config() -> PlayerConfig {
    PlayerConfig {
        start_timeout: Duration::from_millis(250),
        ..PlayerConfig::default()
    }
}

/// For tests that hold a start open on purpose.
pub fn patient_config() -> PlayerConfig {
    PlayerConfig {
        start_timeout: Duration::from_secs(10),
        ..PlayerConfig::default()
    }
}
