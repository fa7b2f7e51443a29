//! Per-guild playback sessions: a queue, a player and a voice connection for
//! each guild, driven by one task per guild.

mod engine;
pub mod error;
pub mod manager;
pub mod queue;
mod session;
/// Track resolvers.
pub mod sources;
mod store;
pub mod track;
pub mod transport;
/// Songbird backed voice transport (requires the `music` feature).
#[cfg(feature = "music")]
pub mod voice;

pub use error::{MusicError, MusicResult};
pub use manager::{PlayOutcome, SessionManager};
pub use queue::Queue;
pub use session::PlayerState;
pub use track::Track;
pub use transport::{
    Connection, ConnectionEvents, MediaTransport, Player, PlayerEvent, TrackEvents, TrackResolver,
};
