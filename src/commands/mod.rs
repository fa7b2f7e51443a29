//! This module aggregates all the command modules for the bot.

/// Commands related to music playback.
pub(crate) mod general;
pub(crate) mod music;
