//! Session store: the only structure shared between guilds.
//!
//! Handles live in a sharded `DashMap`, so guilds only contend when they hash
//! to the same shard, and only for the duration of a non-blocking send. Every
//! send to a session goes through the map while the shard guard is held; a
//! session retires itself under the write guard after checking its mailbox is
//! empty. Together this means a command can never land in a mailbox whose loop
//! has already decided to exit.

use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::engine::{Command, Engine};
use super::session::PlayerState;
use super::transport::MediaTransport;
use crate::config::PlayerConfig;

/// The store's view of a running session loop.
pub(crate) struct SessionHandle {
    id: u64,
    mailbox: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<PlayerState>,
}

#[derive(Clone)]
pub(crate) struct SessionStore {
    sessions: Arc<DashMap<GuildId, SessionHandle>>,
    next_id: Arc<AtomicU64>,
    transport: Arc<dyn MediaTransport>,
    config: PlayerConfig,
}

impl SessionStore {
    pub fn new(transport: Arc<dyn MediaTransport>, config: PlayerConfig) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            transport,
            config,
        }
    }

    pub(crate) fn transport(&self) -> &Arc<dyn MediaTransport> {
        &self.transport
    }

    pub(crate) fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Deliver `command` to the guild's session, starting one if needed.
    pub(crate) fn send_or_create(&self, guild_id: GuildId, mut command: Command) {
        loop {
            let entry = self
                .sessions
                .entry(guild_id)
                .or_insert_with(|| self.spawn(guild_id));

            match entry.mailbox.send(command) {
                Ok(()) => return,
                Err(SendError(returned)) => {
                    // The loop died without retiring; replace it.
                    let stale = entry.id;
                    drop(entry);
                    warn!("Replacing dead session {} for guild {}", stale, guild_id);
                    self.sessions.remove_if(&guild_id, |_, handle| handle.id == stale);
                    command = returned;
                }
            }
        }
    }

    /// Deliver `command` to an existing session. Hands the command back when
    /// the guild has none.
    pub(crate) fn send(&self, guild_id: GuildId, command: Command) -> Result<(), Command> {
        let Some(entry) = self.sessions.get(&guild_id) else {
            return Err(command);
        };

        match entry.mailbox.send(command) {
            Ok(()) => Ok(()),
            Err(SendError(returned)) => {
                let stale = entry.id;
                drop(entry);
                self.sessions.remove_if(&guild_id, |_, handle| handle.id == stale);
                Err(returned)
            }
        }
    }

    /// Current playback state, `None` when the guild has no session.
    pub fn state(&self, guild_id: GuildId) -> Option<PlayerState> {
        self.sessions
            .get(&guild_id)
            .map(|handle| *handle.state.borrow())
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Remove the session `id` for `guild_id` if nothing is waiting in its
    /// mailbox. Returns whether it was removed.
    pub(crate) fn retire(
        &self,
        guild_id: GuildId,
        id: u64,
        mailbox: &mpsc::UnboundedReceiver<Command>,
    ) -> bool {
        self.sessions
            .remove_if(&guild_id, |_, handle| handle.id == id && mailbox.is_empty())
            .is_some()
    }

    fn spawn(&self, guild_id: GuildId) -> SessionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, mailbox) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PlayerState::Idle);

        debug!("Creating session {} for guild {}", id, guild_id);
        let engine = Engine::new(
            guild_id,
            id,
            mailbox,
            sender.clone(),
            state_tx,
            self.clone(),
        );
        tokio::spawn(engine.run());

        SessionHandle {
            id,
            mailbox: sender,
            state: state_rx,
        }
    }
}
