//! `MediaTransport` on top of Songbird: one `Call` per guild, one Songbird
//! track per started `Track`.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::{Input, YoutubeDl};
use songbird::tracks::TrackHandle;
use songbird::{Call, CoreEvent, Event, EventContext, EventHandler, Songbird, TrackEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::{MusicError, MusicResult};
use super::track::Track;
use super::transport::{Connection, ConnectionEvents, MediaTransport, Player, TrackEvents};

/// Joins voice channels through a shared `Songbird` manager.
#[derive(Clone)]
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { manager, http }
    }
}

#[async_trait]
impl MediaTransport for SongbirdTransport {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: ConnectionEvents,
    ) -> MusicResult<Box<dyn Connection>> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| MusicError::Connection(e.to_string()))?;

        {
            let mut handler = call.lock().await;
            handler.add_global_event(
                Event::Core(CoreEvent::DriverDisconnect),
                DisconnectNotifier { events },
            );
        }

        info!("Joined voice channel {} in guild {}", channel_id, guild_id);
        Ok(Box::new(SongbirdConnection {
            guild_id,
            channel_id,
            manager: Arc::clone(&self.manager),
            call,
            http: self.http.clone(),
        }))
    }

    async fn abandon(&self, guild_id: GuildId) {
        if self.manager.get(guild_id).is_some() {
            debug!("Dropping half-joined call for guild {}", guild_id);
            let _ = self.manager.remove(guild_id).await;
        }
    }
}

struct SongbirdConnection {
    guild_id: GuildId,
    channel_id: ChannelId,
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
}

#[async_trait]
impl Connection for SongbirdConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn attach(&mut self) -> MusicResult<Box<dyn Player>> {
        Ok(Box::new(SongbirdPlayer {
            call: Arc::clone(&self.call),
            http: self.http.clone(),
            current: None,
        }))
    }

    async fn close(&mut self) {
        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!(
                "Failed to leave voice channel {} in guild {}: {}",
                self.channel_id, self.guild_id, e
            );
        }
    }
}

struct SongbirdPlayer {
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    current: Option<TrackHandle>,
}

#[async_trait]
impl Player for SongbirdPlayer {
    async fn start(&mut self, track: &Track, events: TrackEvents) -> MusicResult<()> {
        let input: Input = YoutubeDl::new(self.http.clone(), track.url.clone()).into();

        let handle = {
            let mut handler = self.call.lock().await;
            handler.play_input(input)
        };

        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndNotifier {
                    events: events.clone(),
                },
            )
            .map_err(|e| MusicError::Playback(e.to_string()))?;
        handle
            .add_event(Event::Track(TrackEvent::Error), TrackErrorNotifier { events })
            .map_err(|e| MusicError::Playback(e.to_string()))?;

        self.current = Some(handle);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(handle) = self.current.take() {
            let _ = handle.stop();
        }
    }
}

/// Reports the natural end of a Songbird track.
struct TrackEndNotifier {
    events: TrackEvents,
}

#[async_trait]
impl EventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(_) = ctx {
            self.events.completed();
        }
        None
    }
}

/// Reports a Songbird track that failed while loading or playing.
struct TrackErrorNotifier {
    events: TrackEvents,
}

#[async_trait]
impl EventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(states) = ctx {
            let reason = states
                .first()
                .map(|(state, _)| format!("{:?}", state.playing))
                .unwrap_or_else(|| "unknown track error".to_string());
            self.events.errored(reason);
        }
        None
    }
}

/// Reports that the voice driver lost its connection.
struct DisconnectNotifier {
    events: ConnectionEvents,
}

#[async_trait]
impl EventHandler for DisconnectNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::DriverDisconnect(_) = ctx {
            self.events.disconnected();
        }
        None
    }
}
