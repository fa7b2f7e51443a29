//! Contracts for the collaborators the session machinery drives but does not
//! implement: resolving queries into tracks, and the voice transport that
//! actually joins channels and renders audio.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::mpsc::UnboundedSender;

use super::engine::Command;
use super::error::MusicResult;
use super::track::Track;

/// Turns a URL or search query into a playable `Track`.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Fails with `MusicError::Resolution` for unplayable queries, network
    /// failures and empty search results.
    async fn resolve(&self, query: &str, requested_by: &str) -> MusicResult<Track>;
}

/// Establishes voice connections for guilds.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Join `channel_id` in `guild_id`. Transport-level disconnects of the
    /// returned connection must be reported through `events`.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: ConnectionEvents,
    ) -> MusicResult<Box<dyn Connection>>;

    /// Release whatever a `connect` call that was interrupted may have left
    /// behind for `guild_id`.
    async fn abandon(&self, _guild_id: GuildId) {}
}

/// A live voice connection to one channel.
#[async_trait]
pub trait Connection: Send {
    fn channel_id(&self) -> ChannelId;

    /// Create a player whose output is routed into this connection.
    async fn attach(&mut self) -> MusicResult<Box<dyn Player>>;

    async fn close(&mut self);
}

/// An audio-rendering unit bound to a connection.
#[async_trait]
pub trait Player: Send {
    /// Begin rendering `track`. Returns once the transport accepted the
    /// resource; the end of the track is reported later through `events`.
    async fn start(&mut self, track: &Track, events: TrackEvents) -> MusicResult<()>;

    async fn stop(&mut self);
}

/// What a player reports about the track it was started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Completed,
    Errored(String),
}

/// Handed to `Player::start`; delivers the outcome of exactly that start into
/// the owning guild's session loop. Events from a player that has since been
/// replaced are discarded by the session.
#[derive(Debug, Clone)]
pub struct TrackEvents {
    generation: u64,
    mailbox: UnboundedSender<Command>,
}

impl TrackEvents {
    pub(crate) fn new(generation: u64, mailbox: UnboundedSender<Command>) -> Self {
        Self { generation, mailbox }
    }

    pub fn completed(&self) {
        self.emit(PlayerEvent::Completed);
    }

    pub fn errored(&self, reason: impl Into<String>) {
        self.emit(PlayerEvent::Errored(reason.into()));
    }

    pub fn emit(&self, event: PlayerEvent) {
        // A closed mailbox means the session is gone and nobody is listening.
        let _ = self.mailbox.send(Command::PlayerEvent {
            generation: self.generation,
            event,
        });
    }
}

/// Handed to `MediaTransport::connect`; reports that the connection was torn
/// down from the outside.
#[derive(Debug, Clone)]
pub struct ConnectionEvents {
    link_id: u64,
    mailbox: UnboundedSender<Command>,
}

impl ConnectionEvents {
    pub(crate) fn new(link_id: u64, mailbox: UnboundedSender<Command>) -> Self {
        Self { link_id, mailbox }
    }

    pub fn disconnected(&self) {
        let _ = self.mailbox.send(Command::Disconnected {
            link_id: Some(self.link_id),
        });
    }
}
