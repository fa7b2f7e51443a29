//! The per-guild aggregate: queue, voice link and the explicit playback stage.

use futures::future::BoxFuture;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::oneshot;
use tracing::debug;

use super::engine::Interrupt;
use super::error::MusicResult;
use super::manager::PlayOutcome;
use super::queue::Queue;
use super::track::Track;
use super::transport::{Connection, Player, PlayerEvent};

/// Observable playback state of a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// Nothing loaded.
    #[default]
    Idle,
    /// A track is being attached to the transport.
    Starting,
    /// A track is being rendered.
    Playing,
}

impl PlayerState {
    pub fn is_active(self) -> bool {
        self != PlayerState::Idle
    }
}

/// A connection together with the player attached to it. Holding both in one
/// value is what keeps a player from outliving its connection.
pub struct Link {
    pub(crate) id: u64,
    pub(crate) connection: Box<dyn Connection>,
    pub(crate) player: Box<dyn Player>,
}

impl Link {
    pub fn channel_id(&self) -> ChannelId {
        self.connection.channel_id()
    }

    /// Stop the player, then leave the channel.
    pub async fn close(mut self) {
        debug!("Closing voice link {} to channel {}", self.id, self.channel_id());
        self.player.stop().await;
        self.connection.close().await;
    }
}

/// What an in-flight start hands back to the session loop.
pub(crate) struct StartOutcome {
    /// The link, if one is still established once the attempt is over.
    pub link: Option<Link>,
    pub result: MusicResult<()>,
}

/// A start attempt that is still attaching.
pub(crate) struct PendingStart {
    pub track: Track,
    pub generation: u64,
    /// Id of the link the attempt reuses or is creating.
    pub link_id: u64,
    pub future: BoxFuture<'static, StartOutcome>,
    pub cancel: Option<oneshot::Sender<()>>,
    /// Set when the start came from a caller waiting on `play`.
    pub reply: Option<oneshot::Sender<MusicResult<PlayOutcome>>>,
    /// A player event for this generation that arrived before the start
    /// future returned. Applied as soon as the track is marked playing.
    pub early_event: Option<PlayerEvent>,
    /// Skip or stop requested before the track was playing.
    pub interrupt: Option<Interrupt>,
}

/// Explicit playback stage. The link lives inside the stage so that
/// "playing without a connection" cannot be expressed.
pub(crate) enum Stage {
    Idle { link: Option<Link> },
    /// The link, if any, is owned by the start future until it resolves.
    Starting(PendingStart),
    Playing {
        track: Track,
        generation: u64,
        link: Link,
    },
}

impl Stage {
    pub fn state(&self) -> PlayerState {
        match self {
            Stage::Idle { .. } => PlayerState::Idle,
            Stage::Starting(_) => PlayerState::Starting,
            Stage::Playing { .. } => PlayerState::Playing,
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        match self {
            Stage::Idle { .. } => None,
            Stage::Starting(pending) => Some(&pending.track),
            Stage::Playing { track, .. } => Some(track),
        }
    }
}

/// Everything one guild owns.
pub(crate) struct Session {
    pub guild_id: GuildId,
    pub queue: Queue,
    pub stage: Stage,
    /// Bumped for every start so late events from an old player are ignored.
    pub generation: u64,
    next_link_id: u64,
    /// Tracks that failed to start in a row during auto-advance.
    pub consecutive_failures: u32,
}

impl Session {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            queue: Queue::new(),
            stage: Stage::Idle { link: None },
            generation: 0,
            next_link_id: 0,
            consecutive_failures: 0,
        }
    }

    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn next_link_id(&mut self) -> u64 {
        self.next_link_id += 1;
        self.next_link_id
    }

    /// Idle, unconnected and nothing queued: the session holds no resources.
    pub fn is_reclaimable(&self) -> bool {
        matches!(self.stage, Stage::Idle { link: None }) && self.queue.is_empty()
    }

    /// Replace the stage with `Idle { link: None }`, returning the old one.
    pub fn take_stage(&mut self) -> Stage {
        std::mem::replace(&mut self.stage, Stage::Idle { link: None })
    }
}
