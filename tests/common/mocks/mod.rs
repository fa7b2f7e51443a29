//! Mock implementations for the voice transport and the track resolver

use async_trait::async_trait;
use mockall::mock;
use rusty_voice::music::{
    Connection, ConnectionEvents, MediaTransport, MusicError, MusicResult, Player, TrackEvents,
    TrackResolver,
};
use rusty_voice::Track;
use serenity::model::id::{ChannelId, GuildId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

mock! {
    pub Resolver {}

    #[async_trait]
    impl TrackResolver for Resolver {
        async fn resolve(&self, query: &str, requested_by: &str) -> MusicResult<Track>;
    }
}

/// One call the session machinery made into the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(ChannelId),
    Attach(ChannelId),
    Start(String),
    Stop,
    Close(ChannelId),
    Abandon(GuildId),
}

#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<Call>>,
    started: Mutex<Vec<(String, TrackEvents)>>,
    connections: Mutex<Vec<ConnectionEvents>>,
    failing_tracks: Mutex<HashSet<String>>,
    fail_connect: Mutex<Option<String>>,
    open_connections: AtomicUsize,
    max_open_connections: AtomicUsize,
}

impl Recorder {
    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }
}

/// A scripted `MediaTransport`. Records every call, lets tests hold connects
/// or starts open, and fires player/connection events on demand.
#[derive(Clone)]
pub struct FakeTransport {
    recorder: Arc<Recorder>,
    held_channels: watch::Sender<HashSet<ChannelId>>,
    attach_gate: watch::Sender<bool>,
    start_gate: watch::Sender<bool>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            recorder: Arc::new(Recorder::default()),
            held_channels: watch::channel(HashSet::new()).0,
            attach_gate: watch::channel(true).0,
            start_gate: watch::channel(true).0,
        }
    }
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Vec<Call> {
        self.recorder.log.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.log().iter().filter(|call| matches(call)).count()
    }

    pub fn connects(&self) -> usize {
        self.count(|call| matches!(call, Call::Connect(_)))
    }

    /// Titles passed to `Player::start`, in order.
    pub fn started(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|call| match call {
                Call::Start(title) => Some(title),
                _ => None,
            })
            .collect()
    }

    pub fn open_connections(&self) -> usize {
        self.recorder.open_connections.load(Ordering::SeqCst)
    }

    pub fn max_open_connections(&self) -> usize {
        self.recorder.max_open_connections.load(Ordering::SeqCst)
    }

    /// Make `Player::start` fail for this title.
    pub fn fail_track(&self, title: &str) {
        self.recorder
            .failing_tracks
            .lock()
            .unwrap()
            .insert(title.to_string());
    }

    pub fn fail_connects(&self, reason: &str) {
        *self.recorder.fail_connect.lock().unwrap() = Some(reason.to_string());
    }

    /// Connects to `channel_id` block until `release_connects`.
    pub fn hold_connects(&self, channel_id: ChannelId) {
        self.held_channels.send_modify(|held| {
            held.insert(channel_id);
        });
    }

    pub fn release_connects(&self, channel_id: ChannelId) {
        self.held_channels.send_modify(|held| {
            held.remove(&channel_id);
        });
    }

    /// Attach calls block until `release_attaches`.
    pub fn hold_attaches(&self) {
        self.attach_gate.send_replace(false);
    }

    pub fn release_attaches(&self) {
        self.attach_gate.send_replace(true);
    }

    /// Start calls block until `release_starts`.
    pub fn hold_starts(&self) {
        self.start_gate.send_replace(false);
    }

    pub fn release_starts(&self) {
        self.start_gate.send_replace(true);
    }

    fn events_for(&self, title: &str) -> TrackEvents {
        self.recorder
            .started
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(started, _)| started == title)
            .map(|(_, events)| events.clone())
            .unwrap_or_else(|| panic!("track {:?} was never started", title))
    }

    /// Report that the player finished `title`.
    pub fn complete(&self, title: &str) {
        self.events_for(title).completed();
    }

    /// Report that the player failed while rendering `title`.
    pub fn error(&self, title: &str, reason: &str) {
        self.events_for(title).errored(reason);
    }

    /// Report that the `nth` connection (0-based, in connect order) was
    /// dropped by someone else.
    pub fn drop_connection(&self, nth: usize) {
        let events = self
            .recorder
            .connections
            .lock()
            .unwrap()
            .get(nth)
            .cloned()
            .unwrap_or_else(|| panic!("connection {} was never made", nth));
        events.disconnected();
    }
}

#[async_trait]
impl MediaTransport for FakeTransport {
    async fn connect(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
        events: ConnectionEvents,
    ) -> MusicResult<Box<dyn Connection>> {
        self.recorder.record(Call::Connect(channel_id));

        let mut held = self.held_channels.subscribe();
        let _ = held.wait_for(|held| !held.contains(&channel_id)).await;

        if let Some(reason) = self.recorder.fail_connect.lock().unwrap().clone() {
            return Err(MusicError::Connection(reason));
        }

        let open = self.recorder.open_connections.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder
            .max_open_connections
            .fetch_max(open, Ordering::SeqCst);
        self.recorder.connections.lock().unwrap().push(events);

        Ok(Box::new(FakeConnection {
            channel_id,
            transport: self.clone(),
        }))
    }

    async fn abandon(&self, guild_id: GuildId) {
        self.recorder.record(Call::Abandon(guild_id));
    }
}

struct FakeConnection {
    channel_id: ChannelId,
    transport: FakeTransport,
}

#[async_trait]
impl Connection for FakeConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn attach(&mut self) -> MusicResult<Box<dyn Player>> {
        self.transport.recorder.record(Call::Attach(self.channel_id));

        let mut gate = self.transport.attach_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        Ok(Box::new(FakePlayer {
            transport: self.transport.clone(),
        }))
    }

    async fn close(&mut self) {
        self.transport.recorder.record(Call::Close(self.channel_id));
        self.transport
            .recorder
            .open_connections
            .fetch_sub(1, Ordering::SeqCst);
    }
}

struct FakePlayer {
    transport: FakeTransport,
}

#[async_trait]
impl Player for FakePlayer {
    async fn start(&mut self, track: &Track, events: TrackEvents) -> MusicResult<()> {
        let recorder = &self.transport.recorder;

        let mut gate = self.transport.start_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if recorder.failing_tracks.lock().unwrap().contains(&track.title) {
            return Err(MusicError::Playback(format!("{} is unplayable", track.title)));
        }

        recorder.record(Call::Start(track.title.clone()));
        recorder
            .started
            .lock()
            .unwrap()
            .push((track.title.clone(), events));
        Ok(())
    }

    async fn stop(&mut self) {
        self.transport.recorder.record(Call::Stop);
    }
}
