use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::engine::Command;
use super::error::{MusicError, MusicResult};
use super::session::PlayerState;
use super::store::SessionStore;
use super::track::Track;
use super::transport::{MediaTransport, TrackResolver};
use crate::config::PlayerConfig;

/// What a `play` request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The track is now playing.
    Started,
    /// Something was already loaded; the track was queued at this 1-based
    /// position.
    Queued { position: usize },
}

/// Entry point for command handlers. Every operation is keyed by guild and
/// is applied by that guild's session loop in the order it was issued.
#[derive(Clone)]
pub struct SessionManager {
    store: SessionStore,
    resolver: Arc<dyn TrackResolver>,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn MediaTransport>,
        resolver: Arc<dyn TrackResolver>,
        config: PlayerConfig,
    ) -> Self {
        Self {
            store: SessionStore::new(transport, config),
            resolver,
        }
    }

    /// Append `track` to the guild's queue, creating the session if needed.
    /// Does not touch the player or connection. Returns the 1-based position.
    pub async fn enqueue(&self, guild_id: GuildId, track: Track) -> MusicResult<usize> {
        let (reply, response) = oneshot::channel();
        self.store
            .send_or_create(guild_id, Command::Enqueue { track, reply });
        response.await.map_err(|_| MusicError::SessionClosed)
    }

    /// True while a track is starting or playing.
    pub fn is_playing(&self, guild_id: GuildId) -> bool {
        self.state(guild_id).is_active()
    }

    pub fn state(&self, guild_id: GuildId) -> PlayerState {
        self.store.state(guild_id).unwrap_or_default()
    }

    /// Snapshot of the pending tracks; empty when the guild has no session.
    pub async fn get_queue(&self, guild_id: GuildId) -> Vec<Track> {
        self.request(guild_id, |reply| Command::GetQueue { reply })
            .await
            .unwrap_or_default()
    }

    /// The track currently starting or playing.
    pub async fn now_playing(&self, guild_id: GuildId) -> Option<Track> {
        self.request(guild_id, |reply| Command::NowPlaying { reply })
            .await
            .flatten()
    }

    /// Play `track` in `channel_id`, joining (or moving to) the channel first.
    ///
    /// When the guild is already starting or playing something the track is
    /// queued instead; the current track is never preempted.
    pub async fn play(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        track: Track,
    ) -> MusicResult<PlayOutcome> {
        let (reply, response) = oneshot::channel();
        self.store.send_or_create(
            guild_id,
            Command::Play {
                channel_id,
                track,
                reply,
            },
        );
        response.await.map_err(|_| MusicError::SessionClosed)?
    }

    /// Resolve `query` and play the result. A query that does not resolve
    /// leaves the guild's session untouched.
    pub async fn play_query(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        query: &str,
        requested_by: &str,
    ) -> MusicResult<(Track, PlayOutcome)> {
        debug!("Resolving {:?} for guild {}", query, guild_id);
        let track = self.resolver.resolve(query, requested_by).await?;
        let outcome = self.play(guild_id, channel_id, track.clone()).await?;
        Ok((track, outcome))
    }

    /// Stop the current track and move on to the next one.
    pub async fn skip(&self, guild_id: GuildId) -> Option<Track> {
        self.request(guild_id, |reply| Command::Skip { reply })
            .await
            .flatten()
    }

    /// Stop playback and clear the queue while staying in the channel.
    pub async fn stop(&self, guild_id: GuildId) {
        let _ = self.request(guild_id, |reply| Command::Stop { reply }).await;
    }

    /// Remove the queued track at `position` (0-based).
    pub async fn remove(&self, guild_id: GuildId, position: usize) -> Option<Track> {
        self.request(guild_id, |reply| Command::Remove { position, reply })
            .await
            .flatten()
    }

    /// Reclaim player, connection and queue. A no-op for guilds without a
    /// session.
    pub async fn destroy(&self, guild_id: GuildId) {
        if self
            .request(guild_id, |reply| Command::Destroy { reply })
            .await
            .is_none()
        {
            debug!("No session to destroy for guild {}", guild_id);
        }
    }

    /// The bot was removed from the guild's voice channel by someone else.
    pub fn disconnected(&self, guild_id: GuildId) {
        info!("Voice disconnect reported for guild {}", guild_id);
        let _ = self
            .store
            .send(guild_id, Command::Disconnected { link_id: None });
    }

    pub fn has_session(&self, guild_id: GuildId) -> bool {
        self.store.contains(guild_id)
    }

    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    /// Send a request to an existing session and wait for the answer. `None`
    /// when the guild has no session.
    async fn request<T>(
        &self,
        guild_id: GuildId,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Option<T> {
        let (reply, response) = oneshot::channel();
        self.store.send(guild_id, command(reply)).ok()?;
        response.await.ok()
    }
}
