//! Voice playback orchestration for the Rusty Discord bot.
//!
//! [`music::SessionManager`] is what command handlers talk to. It keeps one
//! session per guild and delegates the actual audio work to a
//! [`music::MediaTransport`] and query lookups to a [`music::TrackResolver`].

pub mod config;
pub mod music;

pub use config::PlayerConfig;
pub use music::{MusicError, MusicResult, PlayOutcome, PlayerState, SessionManager, Track};
