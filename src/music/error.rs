use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during music operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MusicError {
    /// The query could not be turned into a playable track.
    #[error("Failed to resolve track: {0}")]
    Resolution(String),

    /// The voice connection could not be established or the player attached.
    #[error("Failed to join voice channel: {0}")]
    Connection(String),

    /// The player refused to start the resource.
    #[error("Failed to start playback: {0}")]
    Playback(String),

    #[error("Timed out after {0:?} waiting for the voice transport")]
    Timeout(Duration),

    /// A third party removed the bot from the voice channel.
    #[error("Disconnected from voice channel")]
    Disconnected,

    /// The session was destroyed while the request was in flight.
    #[error("Session was destroyed before the request completed")]
    Cancelled,

    #[error("Session task is no longer running")]
    SessionClosed,
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;
