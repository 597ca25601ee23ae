//! Observable playback state mirroring the engine's queue, position and mode.
//!
//! This module provides the `PlaybackStore` container that owns the single
//! UI-facing `PlaybackState` value with synchronous reads and broadcast
//! change notifications.

use std::sync::Arc;

use {
    parking_lot::RwLock,
    serde::{Deserialize, Serialize},
    tokio::sync::broadcast::{Receiver, Sender, channel},
    tracing::debug,
};

use crate::library::models::{Playlist, Track};

/// How the queue continues after the current track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackMode {
    /// Repeat the whole queue (default).
    #[default]
    Repeat,
    /// Repeat the current track.
    RepeatOne,
    /// Stop after the last track of the queue.
    PlayQueueOnce,
}

impl PlaybackMode {
    /// The mode that follows this one in the toggle cycle.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            PlaybackMode::Repeat => PlaybackMode::RepeatOne,
            PlaybackMode::RepeatOne => PlaybackMode::PlayQueueOnce,
            PlaybackMode::PlayQueueOnce => PlaybackMode::Repeat,
        }
    }
}

/// UI-facing snapshot of playback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    /// Playlist currently loaded into the engine.
    pub queue: Option<Playlist>,
    /// Track the engine is positioned on.
    pub current_track: Option<Track>,
    /// Whether audio is currently playing.
    pub is_playing: bool,
    /// Active playback mode.
    pub playback_mode: PlaybackMode,
    /// Position within the current track in milliseconds.
    pub position_ms: u64,
    /// Whether the now-playing sheet is expanded.
    pub is_expanded: bool,
    /// Set when a queue change dropped the current track and the engine has
    /// not reported a replacement yet.
    pub is_current_track_stale: bool,
}

impl PlaybackState {
    /// Whether the current track, if any, belongs to the queue.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match (&self.current_track, &self.queue) {
            (None, _) => true,
            (Some(track), Some(queue)) => queue.contains(track),
            (Some(_), None) => false,
        }
    }

    fn current_track_missing(&self) -> bool {
        self.current_track.is_some() && !self.is_consistent()
    }
}

/// Playback state change notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackStateEvent {
    /// The queue was replaced or mutated.
    QueueChanged(Option<Playlist>),
    /// The current track changed.
    CurrentTrackChanged(Option<Track>),
    /// Playing flag changed.
    PlayingChanged(bool),
    /// Position was updated.
    PositionChanged(u64),
    /// Playback mode changed.
    PlaybackModeChanged(PlaybackMode),
    /// Now-playing sheet was expanded or collapsed.
    ExpandedChanged(bool),
    /// Everything except the playback mode was reset to defaults.
    Reset,
}

/// Thread-safe owner of the `PlaybackState`.
///
/// Every update is a partial replacement followed by a broadcast of the
/// corresponding delta.
#[derive(Debug, Clone)]
pub struct PlaybackStore {
    state: Arc<RwLock<PlaybackState>>,
    state_tx: Sender<PlaybackStateEvent>,
}

impl Default for PlaybackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackStore {
    /// Creates a store holding the default state.
    #[must_use]
    pub fn new() -> Self {
        let (state_tx, _) = channel(64);
        Self {
            state: Arc::new(RwLock::new(PlaybackState::default())),
            state_tx,
        }
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn get_state(&self) -> PlaybackState {
        self.state.read().clone()
    }

    /// Whether the playing flag is set.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state.read().is_playing
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> Receiver<PlaybackStateEvent> {
        self.state_tx.subscribe()
    }

    /// Replaces the queue and re-derives whether the current track is stale.
    ///
    /// Returns `true` if the current track is no longer part of the queue.
    pub fn replace_queue(&self, queue: Option<Playlist>) -> bool {
        let stale = {
            let mut state = self.state.write();
            state.queue = queue.clone();
            state.is_current_track_stale = state.current_track_missing();
            state.is_current_track_stale
        };
        if stale {
            debug!("Current track left the queue, marked stale");
        }
        self.emit(PlaybackStateEvent::QueueChanged(queue));
        stale
    }

    /// Sets the current track and resets the position to zero.
    pub fn set_current_track(&self, track: Option<Track>) {
        {
            let mut state = self.state.write();
            state.current_track = track.clone();
            state.position_ms = 0;
            state.is_current_track_stale = state.current_track_missing();
        }
        self.emit(PlaybackStateEvent::CurrentTrackChanged(track));
        self.emit(PlaybackStateEvent::PositionChanged(0));
    }

    /// Swaps queue and current track records in place, keeping the position.
    ///
    /// Used when the library delivers fresher records for the same media.
    pub fn refresh_records(&self, queue: Option<Playlist>, current_track: Option<Track>) {
        {
            let mut state = self.state.write();
            state.queue = queue.clone();
            state.current_track = current_track.clone();
            state.is_current_track_stale = state.current_track_missing();
        }
        self.emit(PlaybackStateEvent::QueueChanged(queue));
        self.emit(PlaybackStateEvent::CurrentTrackChanged(current_track));
    }

    /// Sets the playing flag.
    pub fn set_playing(&self, is_playing: bool) {
        self.state.write().is_playing = is_playing;
        self.emit(PlaybackStateEvent::PlayingChanged(is_playing));
    }

    /// Sets the position within the current track.
    pub fn set_position(&self, position_ms: u64) {
        self.state.write().position_ms = position_ms;
        self.emit(PlaybackStateEvent::PositionChanged(position_ms));
    }

    /// Sets the playback mode.
    pub fn set_playback_mode(&self, playback_mode: PlaybackMode) {
        self.state.write().playback_mode = playback_mode;
        self.emit(PlaybackStateEvent::PlaybackModeChanged(playback_mode));
    }

    /// Expands or collapses the now-playing sheet.
    pub fn set_expanded(&self, is_expanded: bool) {
        self.state.write().is_expanded = is_expanded;
        self.emit(PlaybackStateEvent::ExpandedChanged(is_expanded));
    }

    /// Resets the state to defaults, keeping the playback mode.
    pub fn reset_preserving_mode(&self) {
        {
            let mut state = self.state.write();
            *state = PlaybackState {
                playback_mode: state.playback_mode,
                ..PlaybackState::default()
            };
        }
        self.emit(PlaybackStateEvent::Reset);
    }

    fn emit(&self, event: PlaybackStateEvent) {
        let _ = self.state_tx.send(event);
    }
}
