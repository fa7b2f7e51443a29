//! The playback engine: one supervising task per guild.
//!
//! Every request for a guild, and every event its transport reports, arrives
//! as a `Command` in that guild's mailbox and is handled to completion before
//! the next one is looked at. That single loop is the critical section for the
//! guild's queue, player and connection. Connecting and attaching run as a
//! future owned by the `Starting` stage, so the loop keeps draining its
//! mailbox (and can cancel the attempt) while the transport handshakes.

use futures::FutureExt;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use super::error::{MusicError, MusicResult};
use super::manager::PlayOutcome;
use super::session::{Link, PendingStart, PlayerState, Session, Stage, StartOutcome};
use super::store::SessionStore;
use super::track::Track;
use super::transport::{Connection, ConnectionEvents, MediaTransport, PlayerEvent, TrackEvents};

/// Messages handled by a guild's session loop.
#[derive(Debug)]
pub(crate) enum Command {
    Enqueue {
        track: Track,
        reply: oneshot::Sender<usize>,
    },
    Play {
        channel_id: ChannelId,
        track: Track,
        reply: oneshot::Sender<MusicResult<PlayOutcome>>,
    },
    GetQueue {
        reply: oneshot::Sender<Vec<Track>>,
    },
    NowPlaying {
        reply: oneshot::Sender<Option<Track>>,
    },
    Skip {
        reply: oneshot::Sender<Option<Track>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Remove {
        position: usize,
        reply: oneshot::Sender<Option<Track>>,
    },
    Destroy {
        reply: oneshot::Sender<()>,
    },
    /// `link_id` is `None` when the caller wants the session gone whatever
    /// link it holds.
    Disconnected {
        link_id: Option<u64>,
    },
    PlayerEvent {
        generation: u64,
        event: PlayerEvent,
    },
}

/// Interruption requested while a track was still starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupt {
    Skip,
    Stop,
}

pub(crate) struct Engine {
    session: Session,
    handle_id: u64,
    mailbox: mpsc::UnboundedReceiver<Command>,
    sender: mpsc::UnboundedSender<Command>,
    state: watch::Sender<PlayerState>,
    store: SessionStore,
    retired: bool,
    /// The queue ran dry while connected. The link is released once the
    /// commands already in the mailbox have been applied.
    leave_pending: bool,
}

impl Engine {
    pub(crate) fn new(
        guild_id: GuildId,
        handle_id: u64,
        mailbox: mpsc::UnboundedReceiver<Command>,
        sender: mpsc::UnboundedSender<Command>,
        state: watch::Sender<PlayerState>,
        store: SessionStore,
    ) -> Self {
        Self {
            session: Session::new(guild_id),
            handle_id,
            mailbox,
            sender,
            state,
            store,
            retired: false,
            leave_pending: false,
        }
    }

    pub(crate) async fn run(mut self) {
        let guild_id = self.session.guild_id;
        debug!("Session loop started for guild {}", guild_id);

        while !self.retired {
            tokio::select! {
                outcome = next_start_outcome(&mut self.session.stage) => {
                    self.on_start_finished(outcome).await;
                }
                command = self.mailbox.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
            self.leave_if_drained().await;
            self.settle();
        }

        debug!("Session loop finished for guild {}", guild_id);
    }

    /// Publish the current state and, if the session holds nothing, remove
    /// it from the store.
    fn settle(&mut self) {
        self.state.send_replace(self.session.stage.state());

        if !self.retired && self.session.is_reclaimable() {
            self.retired =
                self.store
                    .retire(self.session.guild_id, self.handle_id, &self.mailbox);
            if self.retired {
                info!("Session removed for guild {}", self.session.guild_id);
            }
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Enqueue { track, reply } => {
                let position = self.enqueue(track);
                let _ = reply.send(position);
            }
            Command::Play {
                channel_id,
                track,
                reply,
            } => self.play(channel_id, track, reply),
            Command::GetQueue { reply } => {
                let _ = reply.send(self.session.queue.snapshot());
            }
            Command::NowPlaying { reply } => {
                let _ = reply.send(self.session.stage.current_track().cloned());
            }
            Command::Skip { reply } => {
                let skipped = self.skip().await;
                self.leave_if_drained().await;
                self.settle();
                let _ = reply.send(skipped);
            }
            Command::Stop { reply } => {
                self.stop().await;
                self.settle();
                let _ = reply.send(());
            }
            Command::Remove { position, reply } => {
                let removed = self.session.queue.remove(position);
                if let Some(track) = &removed {
                    info!(
                        "Removed '{}' from position {} in guild {}",
                        track.title, position, self.session.guild_id
                    );
                }
                self.settle();
                let _ = reply.send(removed);
            }
            Command::Destroy { reply } => {
                self.teardown(MusicError::Cancelled).await;
                self.settle();
                let _ = reply.send(());
            }
            Command::Disconnected { link_id } => {
                if self.owns_link(link_id) {
                    info!(
                        "Removed from voice channel in guild {}, destroying session",
                        self.session.guild_id
                    );
                    self.teardown(MusicError::Disconnected).await;
                } else {
                    debug!(
                        "Ignoring disconnect of stale link {:?} in guild {}",
                        link_id, self.session.guild_id
                    );
                }
            }
            Command::PlayerEvent { generation, event } => {
                self.on_player_event(generation, event).await;
            }
        }
    }

    fn enqueue(&mut self, track: Track) -> usize {
        info!("Queueing '{}' in guild {}", track.title, self.session.guild_id);
        self.session.queue.push(track)
    }

    /// Start `track` if nothing is loaded, otherwise queue it behind what is.
    fn play(
        &mut self,
        channel_id: ChannelId,
        track: Track,
        reply: oneshot::Sender<MusicResult<PlayOutcome>>,
    ) {
        let link = match self.session.take_stage() {
            Stage::Idle { link } => link,
            busy => {
                self.session.stage = busy;
                let position = self.enqueue(track);
                let _ = reply.send(Ok(PlayOutcome::Queued { position }));
                return;
            }
        };

        self.session.consecutive_failures = 0;
        self.begin_start(track, channel_id, link, Some(reply));
    }

    fn begin_start(
        &mut self,
        track: Track,
        channel_id: ChannelId,
        link: Option<Link>,
        reply: Option<oneshot::Sender<MusicResult<PlayOutcome>>>,
    ) {
        let guild_id = self.session.guild_id;
        let generation = self.session.next_generation();
        let link_id = match &link {
            Some(existing) if existing.channel_id() == channel_id => existing.id,
            _ => self.session.next_link_id(),
        };

        info!(
            "Starting '{}' in channel {} for guild {}",
            track.title, channel_id, guild_id
        );

        let attempt = StartAttempt {
            guild_id,
            channel_id,
            track: track.clone(),
            link,
            connection: None,
            link_id,
            transport: Arc::clone(self.store.transport()),
            track_events: TrackEvents::new(generation, self.sender.clone()),
            connection_events: ConnectionEvents::new(link_id, self.sender.clone()),
            timeout: self.store.config().start_timeout,
        };
        let (cancel, cancelled) = oneshot::channel();

        self.session.stage = Stage::Starting(PendingStart {
            track,
            generation,
            link_id,
            future: attempt.run(cancelled).boxed(),
            cancel: Some(cancel),
            reply,
            early_event: None,
            interrupt: None,
        });
    }

    async fn on_start_finished(&mut self, outcome: StartOutcome) {
        let pending = match self.session.take_stage() {
            Stage::Starting(pending) => pending,
            other => {
                self.session.stage = other;
                error!(
                    "Start outcome arrived outside of Starting in guild {}",
                    self.session.guild_id
                );
                return;
            }
        };
        let guild_id = self.session.guild_id;
        let PendingStart {
            track,
            generation,
            reply,
            early_event,
            interrupt,
            ..
        } = pending;

        match (outcome.result, outcome.link) {
            (Ok(()), Some(mut link)) => {
                info!("Now playing '{}' in guild {}", track.title, guild_id);
                self.session.consecutive_failures = 0;

                match interrupt {
                    Some(kind) => {
                        link.player.stop().await;
                        self.session.stage = Stage::Idle { link: Some(link) };
                        if kind == Interrupt::Skip {
                            self.advance().await;
                            self.leave_if_drained().await;
                        }
                        self.settle();
                        if let Some(reply) = reply {
                            let _ = reply.send(Ok(PlayOutcome::Started));
                        }
                    }
                    None => {
                        self.session.stage = Stage::Playing {
                            track,
                            generation,
                            link,
                        };
                        self.settle();
                        if let Some(reply) = reply {
                            let _ = reply.send(Ok(PlayOutcome::Started));
                        }
                        if let Some(event) = early_event {
                            self.on_player_event(generation, event).await;
                        }
                    }
                }
            }
            (Err(err), Some(link)) => {
                warn!(
                    "Track '{}' failed to start in guild {}, skipping: {}",
                    track.title, guild_id, err
                );
                self.session.stage = Stage::Idle { link: Some(link) };

                if interrupt != Some(Interrupt::Stop) {
                    self.session.consecutive_failures += 1;
                    self.drop_queue_after_repeated_failures();
                    self.advance().await;
                    self.leave_if_drained().await;
                }

                self.settle();
                if let Some(reply) = reply {
                    let err = match err {
                        MusicError::Playback(_) => err,
                        other => MusicError::Playback(other.to_string()),
                    };
                    let _ = reply.send(Err(err));
                }
            }
            (result, None) => {
                let err = result
                    .err()
                    .unwrap_or_else(|| MusicError::Connection("no voice link".to_string()));
                warn!(
                    "Could not connect for '{}' in guild {}: {}",
                    track.title, guild_id, err
                );
                self.session.stage = Stage::Idle { link: None };
                self.settle();
                if let Some(reply) = reply {
                    let _ = reply.send(Err(err));
                }
            }
        }
    }

    fn drop_queue_after_repeated_failures(&mut self) {
        let limit = self.store.config().max_consecutive_failures;
        if limit > 0 && self.session.consecutive_failures >= limit {
            warn!(
                "{} tracks in a row failed to start in guild {}, dropping {} queued tracks",
                self.session.consecutive_failures,
                self.session.guild_id,
                self.session.queue.len()
            );
            self.session.queue.clear();
        }
    }

    async fn on_player_event(&mut self, generation: u64, event: PlayerEvent) {
        let current = match &self.session.stage {
            Stage::Playing { generation, .. } => Some((PlayerState::Playing, *generation)),
            Stage::Starting(pending) => Some((PlayerState::Starting, pending.generation)),
            Stage::Idle { .. } => None,
        };

        match current {
            Some((PlayerState::Playing, current)) if current == generation => {
                let Stage::Playing { track, link, .. } = self.session.take_stage() else {
                    return;
                };
                match event {
                    PlayerEvent::Completed => info!(
                        "Finished '{}' in guild {}",
                        track.title, self.session.guild_id
                    ),
                    PlayerEvent::Errored(reason) => warn!(
                        "Playback of '{}' failed in guild {}, skipping: {}",
                        track.title, self.session.guild_id, reason
                    ),
                }
                self.session.stage = Stage::Idle { link: Some(link) };
                self.advance().await;
            }
            Some((PlayerState::Starting, current)) if current == generation => {
                if let Stage::Starting(pending) = &mut self.session.stage {
                    pending.early_event = Some(event);
                }
            }
            _ => debug!(
                "Ignoring {:?} from stale player generation {} in guild {}",
                event, generation, self.session.guild_id
            ),
        }
    }

    /// Pick the next track, or leave the channel when there is none. Only
    /// meaningful from `Idle`.
    async fn advance(&mut self) {
        let link = match self.session.take_stage() {
            Stage::Idle { link } => link,
            other => {
                self.session.stage = other;
                return;
            }
        };

        match (self.session.queue.pop(), link) {
            (Some(next), Some(link)) => {
                let channel_id = link.channel_id();
                self.begin_start(next, channel_id, Some(link), None);
            }
            (Some(next), None) => {
                // No channel to play into. Leave the track for the next `play`.
                warn!(
                    "Cannot advance to '{}' in guild {} without a voice link",
                    next.title, self.session.guild_id
                );
                self.session.queue.restore_front(next);
            }
            (None, Some(link)) => {
                self.session.stage = Stage::Idle { link: Some(link) };
                self.leave_pending = true;
            }
            (None, None) => {}
        }
    }

    /// Leave the channel if the queue is still empty once every command
    /// already delivered has been handled. A track queued in the meantime is
    /// started on the existing link instead.
    async fn leave_if_drained(&mut self) {
        if !self.leave_pending || !self.mailbox.is_empty() {
            return;
        }
        self.leave_pending = false;

        if !matches!(self.session.stage, Stage::Idle { link: Some(_) }) {
            return;
        }
        if !self.session.queue.is_empty() {
            self.advance().await;
            return;
        }

        info!(
            "Queue drained for guild {}, leaving voice channel",
            self.session.guild_id
        );
        if let Stage::Idle { link: Some(link) } = self.session.take_stage() {
            link.close().await;
        }
    }

    async fn skip(&mut self) -> Option<Track> {
        match self.session.take_stage() {
            Stage::Playing { track, mut link, .. } => {
                info!("Skipping '{}' in guild {}", track.title, self.session.guild_id);
                link.player.stop().await;
                self.session.stage = Stage::Idle { link: Some(link) };
                self.advance().await;
                Some(track)
            }
            Stage::Starting(mut pending) => {
                info!(
                    "Skipping '{}' in guild {} once it has started",
                    pending.track.title, self.session.guild_id
                );
                pending.interrupt.get_or_insert(Interrupt::Skip);
                let track = pending.track.clone();
                self.session.stage = Stage::Starting(pending);
                Some(track)
            }
            idle => {
                self.session.stage = idle;
                None
            }
        }
    }

    /// Halt playback and clear the queue but stay in the channel.
    async fn stop(&mut self) {
        self.session.queue.clear();
        self.leave_pending = false;
        match self.session.take_stage() {
            Stage::Playing { track, mut link, .. } => {
                info!("Stopping '{}' in guild {}", track.title, self.session.guild_id);
                link.player.stop().await;
                self.session.stage = Stage::Idle { link: Some(link) };
            }
            Stage::Starting(mut pending) => {
                pending.interrupt = Some(Interrupt::Stop);
                self.session.stage = Stage::Starting(pending);
            }
            idle => self.session.stage = idle,
        }
    }

    /// Reclaim player, connection and queue regardless of state. A caller
    /// still waiting on a start receives `cause`.
    async fn teardown(&mut self, cause: MusicError) {
        let guild_id = self.session.guild_id;
        self.session.queue.clear();
        self.session.consecutive_failures = 0;
        self.leave_pending = false;

        match self.session.take_stage() {
            Stage::Idle { link } => {
                if let Some(link) = link {
                    link.close().await;
                }
            }
            Stage::Playing { link, .. } => link.close().await,
            Stage::Starting(mut pending) => {
                debug!(
                    "Cancelling start of '{}' in guild {}",
                    pending.track.title, guild_id
                );
                if let Some(cancel) = pending.cancel.take() {
                    let _ = cancel.send(());
                }
                // The attempt closes whatever it holds once it sees the cancel;
                // a link only comes back if it finished first.
                let outcome = (&mut pending.future).await;
                if let Some(link) = outcome.link {
                    link.close().await;
                }
                if let Some(reply) = pending.reply.take() {
                    let _ = reply.send(Err(cause));
                }
            }
        }

        info!("Session torn down for guild {}", guild_id);
    }

    fn owns_link(&self, link_id: Option<u64>) -> bool {
        let Some(link_id) = link_id else {
            return true;
        };
        match &self.session.stage {
            Stage::Idle { link } => link.as_ref().is_some_and(|link| link.id == link_id),
            Stage::Starting(pending) => pending.link_id == link_id,
            Stage::Playing { link, .. } => link.id == link_id,
        }
    }
}

/// Resolves once the in-flight start finishes; never, when nothing is starting.
async fn next_start_outcome(stage: &mut Stage) -> StartOutcome {
    match stage {
        Stage::Starting(pending) => (&mut pending.future).await,
        _ => std::future::pending().await,
    }
}

/// Everything one start needs, moved off the session so the loop stays free
/// while the transport works.
struct StartAttempt {
    guild_id: GuildId,
    channel_id: ChannelId,
    track: Track,
    link: Option<Link>,
    /// Connected but not attached yet.
    connection: Option<Box<dyn Connection>>,
    link_id: u64,
    transport: Arc<dyn MediaTransport>,
    track_events: TrackEvents,
    connection_events: ConnectionEvents,
    timeout: Duration,
}

impl StartAttempt {
    async fn run(mut self, mut cancelled: oneshot::Receiver<()>) -> StartOutcome {
        // Never two connections at once: the old one goes before the new one
        // is requested.
        if let Some(existing) = self
            .link
            .take_if(|existing| existing.channel_id() != self.channel_id)
        {
            info!(
                "Moving from channel {} to {} in guild {}",
                existing.channel_id(),
                self.channel_id,
                self.guild_id
            );
            existing.close().await;
        }

        let timeout = self.timeout;
        let result = tokio::select! {
            result = tokio::time::timeout(timeout, self.establish()) => {
                result.unwrap_or(Err(MusicError::Timeout(timeout)))
            }
            _ = &mut cancelled => Err(MusicError::Cancelled),
        };

        let half_open = match self.connection.take() {
            Some(mut connection) => {
                debug!(
                    "Closing unattached connection to channel {} in guild {}",
                    self.channel_id, self.guild_id
                );
                connection.close().await;
                true
            }
            None => false,
        };

        match &result {
            Err(MusicError::Cancelled) => match self.link.take() {
                Some(link) => link.close().await,
                None if !half_open => self.transport.abandon(self.guild_id).await,
                None => {}
            },
            Err(MusicError::Timeout(_)) => match self.link.as_mut() {
                Some(link) => link.player.stop().await,
                None if !half_open => self.transport.abandon(self.guild_id).await,
                None => {}
            },
            _ => {}
        }

        StartOutcome {
            link: self.link,
            result,
        }
    }

    /// Connect and attach unless a link is already held, then start the
    /// track on it. Whatever has been built so far stays on `self` when this
    /// future is dropped.
    async fn establish(&mut self) -> MusicResult<()> {
        if self.link.is_none() {
            let connection = self
                .transport
                .connect(self.guild_id, self.channel_id, self.connection_events.clone())
                .await?;
            let player = self.connection.insert(connection).attach().await?;
            if let Some(connection) = self.connection.take() {
                debug!("Joined channel {} in guild {}", self.channel_id, self.guild_id);
                self.link = Some(Link {
                    id: self.link_id,
                    connection,
                    player,
                });
            }
        }

        match self.link.as_mut() {
            Some(link) => link.player.start(&self.track, self.track_events.clone()).await,
            None => Err(MusicError::Connection("no voice link".to_string())),
        }
    }
}
