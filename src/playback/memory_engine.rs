//! Deterministic in-process engine.
//!
//! Keeps a queue of media items with ExoPlayer-like index bookkeeping but
//! produces no audio. Position only moves through seeks or `set_position`.

use {parking_lot::Mutex, tracing::debug};

use crate::{
    library::models::MediaItem,
    playback::engine::{EngineEvent, EngineListener, PlaybackEngine, RepeatMode},
};

#[derive(Debug, Default)]
struct EngineState {
    items: Vec<MediaItem>,
    index: Option<usize>,
    playing: bool,
    prepared: bool,
    position_ms: u64,
    repeat_mode: RepeatMode,
    handle_audio_focus: bool,
}

impl EngineState {
    fn current_item(&self) -> Option<MediaItem> {
        self.index.and_then(|i| self.items.get(i)).cloned()
    }

    fn next_index(&self) -> Option<usize> {
        let index = self.index?;
        if index + 1 < self.items.len() {
            Some(index + 1)
        } else if self.repeat_mode == RepeatMode::All {
            Some(0)
        } else {
            None
        }
    }

    fn previous_index(&self) -> Option<usize> {
        let index = self.index?;
        if index > 0 {
            Some(index - 1)
        } else if self.repeat_mode == RepeatMode::All {
            Some(self.items.len() - 1)
        } else {
            None
        }
    }

    fn insert(&mut self, index: usize, items: Vec<MediaItem>) {
        let index = index.min(self.items.len());
        let count = items.len();
        self.items.splice(index..index, items);
        self.index = match self.index {
            None if !self.items.is_empty() => Some(0),
            Some(current) if index <= current => Some(current + count),
            other => other,
        };
    }
}

/// Engine used by tests and the headless binary.
pub struct InMemoryEngine {
    state: Mutex<EngineState>,
    listeners: Mutex<Vec<EngineListener>>,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEngine {
    /// Creates an empty, stopped engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState {
                handle_audio_focus: true,
                ..EngineState::default()
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Moves the live position, as real playback would.
    pub fn set_position(&self, position_ms: u64) {
        self.state.lock().position_ms = position_ms;
    }

    /// Queued items in order.
    #[must_use]
    pub fn media_items(&self) -> Vec<MediaItem> {
        self.state.lock().items.clone()
    }

    /// Whether `prepare` ran since the last queue load.
    #[must_use]
    pub fn is_prepared(&self) -> bool {
        self.state.lock().prepared
    }

    /// Whether audio focus handling is enabled.
    #[must_use]
    pub fn handles_audio_focus(&self) -> bool {
        self.state.lock().handle_audio_focus
    }

    /// Applies `change` and notifies listeners about what it changed.
    ///
    /// Listeners run after the state lock is released, so they may call back
    /// into the engine.
    fn mutate<R>(&self, navigation: bool, change: impl FnOnce(&mut EngineState) -> R) -> R {
        let (result, events) = {
            let mut state = self.state.lock();
            let before_item = state.current_item();
            let before_index = state.index;
            let before_playing = state.playing;

            let result = change(&mut state);

            let mut events = Vec::new();
            let after_item = state.current_item();
            if after_item != before_item || (navigation && state.index != before_index) {
                events.push(EngineEvent::MediaItemTransition(after_item));
            }
            if state.playing != before_playing {
                events.push(EngineEvent::IsPlayingChanged(state.playing));
            }
            (result, events)
        };

        if !events.is_empty() {
            let listeners = self.listeners.lock().clone();
            for event in events {
                debug!(?event, "Engine event");
                for listener in &listeners {
                    listener(event.clone());
                }
            }
        }
        result
    }
}

impl PlaybackEngine for InMemoryEngine {
    fn load_queue(&self, items: Vec<MediaItem>) {
        self.mutate(false, |state| {
            state.index = (!items.is_empty()).then_some(0);
            state.items = items;
            state.playing = false;
            state.prepared = false;
            state.position_ms = 0;
        });
    }

    fn prepare(&self) {
        self.mutate(false, |state| state.prepared = !state.items.is_empty());
    }

    fn play(&self) {
        self.mutate(false, |state| {
            if state.index.is_some() {
                state.prepared = true;
                state.playing = true;
            }
        });
    }

    fn pause(&self) {
        self.mutate(false, |state| state.playing = false);
    }

    fn seek_to(&self, position_ms: u64) {
        self.mutate(false, |state| {
            if state.index.is_some() {
                state.position_ms = position_ms;
            }
        });
    }

    fn seek_to_item(&self, index: usize, position_ms: u64) {
        self.mutate(true, |state| {
            if index < state.items.len() {
                state.index = Some(index);
                state.position_ms = position_ms;
            }
        });
    }

    fn next(&self) {
        self.mutate(true, |state| {
            if let Some(next) = state.next_index() {
                state.index = Some(next);
                state.position_ms = 0;
            }
        });
    }

    fn previous(&self) {
        self.mutate(true, |state| {
            if let Some(previous) = state.previous_index() {
                state.index = Some(previous);
            }
            state.position_ms = 0;
        });
    }

    fn has_next(&self) -> bool {
        self.state.lock().next_index().is_some()
    }

    fn add_at(&self, index: usize, item: MediaItem) {
        self.mutate(false, |state| state.insert(index, vec![item]));
    }

    fn append(&self, items: Vec<MediaItem>) {
        self.mutate(false, |state| {
            let end = state.items.len();
            state.insert(end, items);
        });
    }

    fn remove_at(&self, index: usize) {
        self.mutate(false, |state| {
            if index >= state.items.len() {
                return;
            }
            state.items.remove(index);
            state.index = match state.index {
                Some(_) if state.items.is_empty() => None,
                Some(current) if index < current => Some(current - 1),
                Some(current) if index == current => {
                    state.position_ms = 0;
                    Some(current.min(state.items.len() - 1))
                }
                other => other,
            };
            if state.index.is_none() {
                state.playing = false;
                state.position_ms = 0;
            }
        });
    }

    fn move_item(&self, from: usize, to: usize) {
        self.mutate(false, |state| {
            let len = state.items.len();
            if from >= len || to >= len || from == to {
                return;
            }
            let item = state.items.remove(from);
            state.items.insert(to, item);
            state.index = state.index.map(|current| {
                if current == from {
                    to
                } else if from < current && to >= current {
                    current - 1
                } else if from > current && to <= current {
                    current + 1
                } else {
                    current
                }
            });
        });
    }

    fn set_repeat_mode(&self, mode: RepeatMode) {
        self.state.lock().repeat_mode = mode;
    }

    fn repeat_mode(&self) -> RepeatMode {
        self.state.lock().repeat_mode
    }

    fn set_handle_audio_focus(&self, handle: bool) {
        self.state.lock().handle_audio_focus = handle;
    }

    fn clear(&self) {
        self.mutate(false, |state| {
            state.items.clear();
            state.index = None;
            state.playing = false;
            state.prepared = false;
            state.position_ms = 0;
        });
    }

    fn position(&self) -> u64 {
        self.state.lock().position_ms
    }

    fn current_index(&self) -> Option<usize> {
        self.state.lock().index
    }

    fn current_item(&self) -> Option<MediaItem> {
        self.state.lock().current_item()
    }

    fn item_count(&self) -> usize {
        self.state.lock().items.len()
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn add_listener(&self, listener: EngineListener) {
        self.listeners.lock().push(listener);
    }
}
