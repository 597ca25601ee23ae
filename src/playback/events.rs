//! Messages consumed by the playback controller.

use crate::{
    library::models::{Playlist, Track},
    playback::engine::EngineEvent,
};

/// User intents coming from the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Play `track` from within `playlist`, loading it as the queue.
    SelectTrack { track: Track, playlist: Playlist },
    Play,
    Pause,
    SeekToNext,
    /// Go to the previous track, or restart the current one once past the
    /// jump-to-beginning threshold.
    SeekToPrevious,
    /// Seek within the current track, in milliseconds.
    SeekTo(u64),
    /// Clear the queue and forget the saved playback context.
    ResetPlayback,
    /// Cycle Repeat, RepeatOne, PlayQueueOnce.
    TogglePlaybackMode,
    /// Append to the end of the queue.
    AddToQueue(Vec<Track>),
    /// Insert right after the current track.
    PlayNext(Track),
    /// Remove the queue entry at this index.
    RemoveFromQueue(usize),
    /// Move a queue entry.
    ReorderQueue { from: usize, to: usize },
    /// Expand or collapse the now-playing sheet.
    SetExpanded(bool),
}

/// Everything the controller's queue carries.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerMessage {
    User(PlayerEvent),
    /// Callback from the engine bound in `generation`.
    Engine { generation: u64, event: EngineEvent },
    /// An engine was bound.
    EngineAttached,
    /// Seed the state from the saved snapshot.
    Restore,
    /// Play a file path or URI from the library once it can be resolved.
    OpenUri(String),
    /// A fresh library snapshot is available.
    LibraryChanged(Vec<Track>),
    /// Stop consuming.
    Shutdown,
}
