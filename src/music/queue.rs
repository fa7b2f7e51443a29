use std::collections::VecDeque;

use super::track::Track;

/// The pending tracks of one guild, in play order.
///
/// Only `push` appends and only `pop` consumes from the front; nothing else
/// reorders the entries.
#[derive(Debug, Default, Clone)]
pub struct Queue {
    tracks: VecDeque<Track>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a track to the back of the queue, returning its 1-based position
    pub fn push(&mut self, track: Track) -> usize {
        self.tracks.push_back(track);
        self.tracks.len()
    }

    /// Take the next track to play
    pub fn pop(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    /// Put back a track that was popped but could not be played
    pub(crate) fn restore_front(&mut self, track: Track) {
        self.tracks.push_front(track);
    }

    /// Remove a track at a specific position in the queue (0-based index)
    pub fn remove(&mut self, position: usize) -> Option<Track> {
        self.tracks.remove(position)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Copy of the queued tracks, front first
    pub fn snapshot(&self) -> Vec<Track> {
        self.tracks.iter().cloned().collect()
    }
}
