//! Late-bound handle to the playback engine.
//!
//! The engine becomes available asynchronously after startup. Until it is
//! attached every call through the adapter is a no-op, so callers never have
//! to special-case the binding window.
//!
//! Every attach and detach starts a new generation. Listeners registered
//! through the adapter only fire for the generation they were registered in,
//! so a replaced engine can no longer reach the controller.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering::SeqCst},
    },
    time::Duration,
};

use {
    parking_lot::RwLock,
    tokio::time::sleep,
    tracing::{debug, info},
};

use crate::{
    error::PlaybackError,
    library::models::MediaItem,
    playback::engine::{EngineEvent, EngineListener, PlaybackEngine, RepeatMode},
};

/// Optional, shareable reference to the engine.
#[derive(Clone, Default)]
pub struct EngineAdapter {
    engine: Arc<RwLock<Option<Arc<dyn PlaybackEngine>>>>,
    generation: Arc<AtomicU64>,
}

impl EngineAdapter {
    /// Creates an adapter with no engine bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the engine, replacing any previous one.
    pub fn attach(&self, engine: Arc<dyn PlaybackEngine>) {
        let mut slot = self.engine.write();
        *slot = Some(engine);
        let generation = self.generation.fetch_add(1, SeqCst) + 1;
        info!(generation, "Playback engine attached");
    }

    /// Unbinds the engine.
    pub fn detach(&self) {
        let mut slot = self.engine.write();
        if slot.take().is_some() {
            self.generation.fetch_add(1, SeqCst);
            info!("Playback engine detached");
        }
    }

    /// Whether `generation` is the one of the currently bound engine.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        let slot = self.engine.read();
        slot.is_some() && self.generation.load(SeqCst) == generation
    }

    /// Whether an engine is bound.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.engine.read().is_some()
    }

    /// Waits for an engine to be bound, checking every `interval`.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::EngineNotReady` after `max_attempts` failed
    /// checks.
    pub async fn wait_until_ready(
        &self,
        interval: Duration,
        max_attempts: u32,
    ) -> Result<(), PlaybackError> {
        for attempt in 1..=max_attempts {
            if self.is_ready() {
                return Ok(());
            }
            debug!(attempt, "Waiting for playback engine");
            sleep(interval).await;
        }
        if self.is_ready() {
            return Ok(());
        }
        Err(PlaybackError::EngineNotReady {
            attempts: max_attempts,
        })
    }

    /// Runs `f` against the bound engine.
    ///
    /// The lock is released before `f` runs, so engine callbacks may use the
    /// adapter again.
    fn with_engine<R>(&self, f: impl FnOnce(&dyn PlaybackEngine) -> R) -> Option<R> {
        let engine = self.engine.read().clone()?;
        Some(f(engine.as_ref()))
    }

    /// Replaces the engine queue.
    pub fn load_queue(&self, items: Vec<MediaItem>) {
        self.with_engine(|engine| engine.load_queue(items));
    }

    /// Prepares the engine queue.
    pub fn prepare(&self) {
        self.with_engine(|engine| engine.prepare());
    }

    /// Moves to `index` from its start and plays.
    pub fn play_at(&self, index: usize) {
        self.with_engine(|engine| {
            engine.seek_to_item(index, 0);
            engine.play();
        });
    }

    pub fn play(&self) {
        self.with_engine(|engine| engine.play());
    }

    pub fn pause(&self) {
        self.with_engine(|engine| engine.pause());
    }

    pub fn seek_to(&self, position_ms: u64) {
        self.with_engine(|engine| engine.seek_to(position_ms));
    }

    pub fn seek_to_item(&self, index: usize, position_ms: u64) {
        self.with_engine(|engine| engine.seek_to_item(index, position_ms));
    }

    pub fn next(&self) {
        self.with_engine(|engine| engine.next());
    }

    pub fn previous(&self) {
        self.with_engine(|engine| engine.previous());
    }

    /// Whether the engine has an item after the current one; `false` when
    /// unbound.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.with_engine(|engine| engine.has_next()).unwrap_or(false)
    }

    pub fn add_at(&self, index: usize, item: MediaItem) {
        self.with_engine(|engine| engine.add_at(index, item));
    }

    pub fn append(&self, items: Vec<MediaItem>) {
        self.with_engine(|engine| engine.append(items));
    }

    pub fn remove_at(&self, index: usize) {
        self.with_engine(|engine| engine.remove_at(index));
    }

    pub fn move_item(&self, from: usize, to: usize) {
        self.with_engine(|engine| engine.move_item(from, to));
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        self.with_engine(|engine| engine.set_repeat_mode(mode));
    }

    pub fn set_handle_audio_focus(&self, handle: bool) {
        self.with_engine(|engine| engine.set_handle_audio_focus(handle));
    }

    pub fn clear(&self) {
        self.with_engine(|engine| engine.clear());
    }

    #[must_use]
    pub fn position(&self) -> Option<u64> {
        self.with_engine(|engine| engine.position())
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.with_engine(|engine| engine.current_index()).flatten()
    }

    #[must_use]
    pub fn current_item(&self) -> Option<MediaItem> {
        self.with_engine(|engine| engine.current_item()).flatten()
    }

    #[must_use]
    pub fn item_count(&self) -> Option<usize> {
        self.with_engine(|engine| engine.item_count())
    }

    /// Whether the engine is playing; `false` when unbound.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.with_engine(|engine| engine.is_playing()).unwrap_or(false)
    }

    /// Registers `listener` on the bound engine for the current generation.
    ///
    /// The listener receives that generation with every event and goes
    /// silent once the engine is detached or replaced. Returns the
    /// generation, or `None` when unbound.
    pub fn add_listener(
        &self,
        listener: impl Fn(u64, EngineEvent) + Send + Sync + 'static,
    ) -> Option<u64> {
        let slot = self.engine.read();
        let engine = slot.as_ref()?;
        let generation = self.generation.load(SeqCst);
        let current = Arc::clone(&self.generation);
        let scoped: EngineListener = Arc::new(move |event| {
            if current.load(SeqCst) == generation {
                listener(generation, event);
            }
        });
        engine.add_listener(scoped);
        Some(generation)
    }
}
