//! Contract of the external media playback engine.
//!
//! The engine owns decoding, output and the low-level queue. The rest of the
//! crate only talks to it through this trait and listens to the events it
//! emits.

use std::sync::Arc;

use crate::{library::models::MediaItem, state::PlaybackMode};

/// Native repeat setting of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    /// Stop at the end of the queue.
    #[default]
    Off,
    /// Repeat the current item.
    One,
    /// Wrap around at both ends of the queue.
    All,
}

impl From<PlaybackMode> for RepeatMode {
    fn from(mode: PlaybackMode) -> Self {
        match mode {
            PlaybackMode::Repeat => RepeatMode::All,
            PlaybackMode::RepeatOne => RepeatMode::One,
            PlaybackMode::PlayQueueOnce => RepeatMode::Off,
        }
    }
}

/// Notifications emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Audio started or stopped.
    IsPlayingChanged(bool),
    /// The engine moved to another item, or to none.
    MediaItemTransition(Option<MediaItem>),
}

/// Callback registered with the engine.
pub type EngineListener = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// Media playback engine with a mutable queue of media items.
///
/// Out-of-range indices are ignored by implementations.
pub trait PlaybackEngine: Send + Sync {
    /// Replaces the queue and positions on its first item.
    fn load_queue(&self, items: Vec<MediaItem>);

    /// Prepares the loaded queue for playback.
    fn prepare(&self);

    /// Starts or resumes playback.
    fn play(&self);

    /// Pauses playback.
    fn pause(&self);

    /// Seeks within the current item.
    fn seek_to(&self, position_ms: u64);

    /// Moves to the item at `index` and seeks within it.
    fn seek_to_item(&self, index: usize, position_ms: u64);

    /// Moves to the next item, honoring the repeat mode.
    fn next(&self);

    /// Moves to the previous item, or to the start of the current one when
    /// there is none.
    fn previous(&self);

    /// Whether `next` would move to another item.
    fn has_next(&self) -> bool;

    /// Inserts `item` at `index`.
    fn add_at(&self, index: usize, item: MediaItem);

    /// Appends `items` to the end of the queue.
    fn append(&self, items: Vec<MediaItem>);

    /// Removes the item at `index`.
    fn remove_at(&self, index: usize);

    /// Moves the item at `from` so it ends up at `to`.
    fn move_item(&self, from: usize, to: usize);

    /// Applies the native repeat setting.
    fn set_repeat_mode(&self, mode: RepeatMode);

    /// Current native repeat setting.
    fn repeat_mode(&self) -> RepeatMode;

    /// Whether the engine pauses for other audio sources.
    fn set_handle_audio_focus(&self, handle: bool);

    /// Empties the queue and stops playback.
    fn clear(&self);

    /// Live position within the current item in milliseconds.
    fn position(&self) -> u64;

    /// Index of the current item.
    fn current_index(&self) -> Option<usize>;

    /// The current item.
    fn current_item(&self) -> Option<MediaItem>;

    /// Number of queued items.
    fn item_count(&self) -> usize;

    /// Whether audio is playing.
    fn is_playing(&self) -> bool;

    /// Registers a listener for engine events.
    fn add_listener(&self, listener: EngineListener);
}
