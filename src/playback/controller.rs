//! Playback controller mapping user intents and engine callbacks onto engine
//! calls, state updates and snapshot writes.
//!
//! All inputs arrive as `ControllerMessage`s on one queue with a single
//! consumer, so the state store only ever has one writer at a time. The
//! position poller is the only other writer and it only touches the
//! position. Session restore and deferred URI opening run on the same loop.

use std::{collections::HashMap, sync::Arc};

use {
    async_channel::{Receiver, Sender, unbounded},
    parking_lot::{Mutex, RwLock},
    tracing::{debug, info, warn},
};

use crate::{
    config::SettingsManager,
    error::PlaybackError,
    library::{
        collection::Library,
        models::{MediaItem, Playlist, Track},
    },
    playback::{
        adapter::EngineAdapter,
        engine::{EngineEvent, PlaybackEngine},
        events::{ControllerMessage, PlayerEvent},
        poller::PositionPoller,
        snapshot::SavedPlayerState,
    },
    state::PlaybackStore,
};

/// Cloneable sender for controller messages.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: Sender<ControllerMessage>,
}

impl ControllerHandle {
    /// Posts a user intent.
    pub fn send(&self, event: PlayerEvent) {
        self.post(ControllerMessage::User(event));
    }

    /// Posts a callback from the engine bound in `generation`.
    pub fn engine_event(&self, generation: u64, event: EngineEvent) {
        self.post(ControllerMessage::Engine { generation, event });
    }

    /// Asks for the library track at `needle` (file path or URI) to be
    /// played within the whole library.
    ///
    /// The request waits until an engine is bound and the library is
    /// loaded. Needles the loaded library does not know are logged and
    /// dropped.
    pub fn open_uri(&self, needle: impl Into<String>) {
        self.post(ControllerMessage::OpenUri(needle.into()));
    }

    /// Posts a fresh library snapshot.
    pub fn library_changed(&self, tracks: Vec<Track>) {
        self.post(ControllerMessage::LibraryChanged(tracks));
    }

    /// Asks the consumer loop to stop.
    pub fn shutdown(&self) {
        self.post(ControllerMessage::Shutdown);
    }

    fn post(&self, message: ControllerMessage) {
        if self.tx.try_send(message).is_err() {
            debug!("Controller queue closed, message dropped");
        }
    }
}

/// Single consumer of user intents and engine callbacks.
pub struct PlaybackController {
    adapter: EngineAdapter,
    store: PlaybackStore,
    saved: Arc<SavedPlayerState>,
    settings: Arc<SettingsManager>,
    library: Arc<RwLock<Library>>,
    poller: PositionPoller,
    pending_uris: Mutex<Vec<String>>,
    tx: Sender<ControllerMessage>,
    rx: Receiver<ControllerMessage>,
}

impl PlaybackController {
    /// Creates a controller with no engine attached.
    ///
    /// # Arguments
    ///
    /// * `store` - State store the controller writes to.
    /// * `saved` - Durable snapshot of the playback context.
    /// * `settings` - Source of thresholds and intervals.
    /// * `library` - Shared library snapshot that opened URIs resolve against.
    #[must_use]
    pub fn new(
        store: PlaybackStore,
        saved: Arc<SavedPlayerState>,
        settings: Arc<SettingsManager>,
        library: Arc<RwLock<Library>>,
    ) -> Self {
        let adapter = EngineAdapter::new();
        let poller = PositionPoller::new(adapter.clone(), store.clone());
        let (tx, rx) = unbounded();

        Self {
            adapter,
            store,
            saved,
            settings,
            library,
            poller,
            pending_uris: Mutex::new(Vec::new()),
            tx,
            rx,
        }
    }

    /// Handle for posting messages to this controller.
    #[must_use]
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            tx: self.tx.clone(),
        }
    }

    #[must_use]
    pub fn adapter(&self) -> &EngineAdapter {
        &self.adapter
    }

    #[must_use]
    pub fn store(&self) -> &PlaybackStore {
        &self.store
    }

    /// Binds the engine once it becomes available, replacing any previous
    /// one.
    ///
    /// Engine callbacks are posted onto the controller queue rather than
    /// handled in the callback context. Callbacks from an engine that has
    /// since been detached or replaced are dropped.
    pub fn attach_engine(&self, engine: Arc<dyn PlaybackEngine>) {
        self.adapter.attach(engine);
        let handle = self.handle();
        self.adapter
            .add_listener(move |generation, event| handle.engine_event(generation, event));
        self.adapter
            .set_repeat_mode(self.store.get_state().playback_mode.into());
        self.adapter
            .set_handle_audio_focus(self.settings.get_settings().handle_audio_focus);
        self.handle().post(ControllerMessage::EngineAttached);
    }

    /// Unbinds the engine and stops position polling. Callbacks it already
    /// queued are dropped.
    pub fn detach_engine(&self) {
        self.poller.stop();
        self.adapter.detach();
    }

    /// Waits for the engine, then queues the restore of the saved playback
    /// context.
    ///
    /// The restore runs on the consumer loop, after everything queued
    /// before it.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::EngineNotReady` if no engine was attached in
    /// time.
    pub async fn restore_session(&self) -> Result<(), PlaybackError> {
        let (interval, max_attempts) = {
            let settings = self.settings.get_settings();
            (
                settings.engine_ready_poll_interval(),
                settings.engine_ready_max_attempts,
            )
        };
        self.adapter.wait_until_ready(interval, max_attempts).await?;
        self.handle().post(ControllerMessage::Restore);
        Ok(())
    }

    /// Consumes messages until shutdown.
    pub async fn run(&self) {
        info!("Playback controller running");
        while let Ok(message) = self.rx.recv().await {
            if !self.process_message(message) {
                break;
            }
        }
        self.poller.stop();
        info!("Playback controller stopped");
    }

    /// Handles every message already queued, without waiting.
    ///
    /// Returns the number of messages handled.
    pub fn process_pending(&self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            handled += 1;
            if !self.process_message(message) {
                break;
            }
        }
        handled
    }

    /// Handles one message. Returns `false` on shutdown.
    pub fn process_message(&self, message: ControllerMessage) -> bool {
        match message {
            ControllerMessage::User(event) => self.dispatch(event),
            ControllerMessage::Engine { generation, event } => {
                if self.adapter.is_current(generation) {
                    self.handle_engine_event(event);
                } else {
                    debug!(generation, ?event, "Callback from a detached engine dropped");
                }
            }
            ControllerMessage::EngineAttached => self.open_pending_uris(),
            ControllerMessage::Restore => {
                self.restore_saved_session();
                self.open_pending_uris();
            }
            ControllerMessage::OpenUri(needle) => {
                self.pending_uris.lock().push(needle);
                self.open_pending_uris();
            }
            ControllerMessage::LibraryChanged(tracks) => {
                self.reconcile_library(&tracks);
                self.open_pending_uris();
            }
            ControllerMessage::Shutdown => return false,
        }
        true
    }

    /// Applies one user intent.
    ///
    /// Intents that need the engine are dropped while it is not attached.
    pub fn dispatch(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::SetExpanded(is_expanded) => self.store.set_expanded(is_expanded),
            PlayerEvent::ResetPlayback => self.reset_playback(),
            PlayerEvent::TogglePlaybackMode => self.toggle_playback_mode(),
            event if !self.adapter.is_ready() => {
                debug!(?event, "Playback engine not ready, event dropped");
            }
            PlayerEvent::SelectTrack { track, playlist } => self.select_track(track, playlist),
            PlayerEvent::Play => {
                if self.adapter.current_item().is_some() {
                    self.adapter.play();
                }
            }
            PlayerEvent::Pause => self.adapter.pause(),
            PlayerEvent::SeekToNext => self.seek_to_next(),
            PlayerEvent::SeekToPrevious => self.seek_to_previous(),
            PlayerEvent::SeekTo(position_ms) => {
                if self.adapter.current_item().is_some() {
                    self.adapter.seek_to(position_ms);
                    self.store.set_position(position_ms);
                }
            }
            PlayerEvent::AddToQueue(tracks) => self.add_to_queue(tracks),
            PlayerEvent::PlayNext(track) => self.play_next(track),
            PlayerEvent::RemoveFromQueue(index) => self.remove_from_queue(index),
            PlayerEvent::ReorderQueue { from, to } => self.reorder_queue(from, to),
        }
    }

    /// Mirrors an engine callback into the state store.
    ///
    /// Callbacks are dropped while no engine is attached.
    pub fn handle_engine_event(&self, event: EngineEvent) {
        if !self.adapter.is_ready() {
            debug!(?event, "Playback engine not attached, callback dropped");
            return;
        }
        match event {
            EngineEvent::IsPlayingChanged(is_playing) => {
                self.store.set_playing(is_playing);
                if is_playing {
                    self.restart_poller();
                } else {
                    self.poller.stop();
                }
            }
            EngineEvent::MediaItemTransition(item) => {
                // A later transition for the engine's actual item is queued.
                if item != self.adapter.current_item() {
                    debug!("Superseded media transition ignored");
                    return;
                }

                let queue = self.store.get_state().queue;
                let track = match (&queue, &item) {
                    (Some(queue), Some(item)) => self.resolve_item(queue, item),
                    _ => None,
                };
                if item.is_some() && track.is_none() {
                    warn!("Engine moved to an item outside the queue");
                }

                self.store.set_current_track(track.clone());
                self.saved.set_track(track);
                self.restart_poller();
            }
        }
    }

    /// Swaps queue and current track records for the fresh ones in
    /// `tracks`, matched by URI. Records whose URI disappeared are kept.
    pub fn reconcile_library(&self, tracks: &[Track]) {
        let by_uri: HashMap<&str, &Track> =
            tracks.iter().map(|track| (track.uri.as_str(), track)).collect();

        let state = self.store.get_state();
        let queue = state.queue.as_ref().map(|queue| refreshed_playlist(queue, &by_uri));
        let current = state
            .current_track
            .as_ref()
            .map(|track| refreshed_track(track, &by_uri));
        if queue != state.queue || current != state.current_track {
            info!("Queue records refreshed from library");
            self.store.refresh_records(queue, current);
        }

        let snapshot = self.saved.get();
        let playlist = snapshot
            .playlist
            .as_ref()
            .map(|playlist| refreshed_playlist(playlist, &by_uri));
        let track = snapshot
            .track
            .as_ref()
            .map(|track| refreshed_track(track, &by_uri));
        if playlist != snapshot.playlist || track != snapshot.track {
            self.saved.set_selection(playlist, track);
        }
    }

    /// Seeds the state store and the engine from the saved snapshot.
    ///
    /// The snapshot already reflects every selection and mode change handled
    /// so far. A queue that became active before the restore is kept. The
    /// engine queue is only loaded when the engine has none, so a session
    /// that kept playing in the background is adopted as is.
    fn restore_saved_session(&self) {
        let snapshot = self.saved.get();

        if self.store.get_state().queue.is_some() {
            debug!("Queue already active, saved queue not restored");
        } else if let Some(playlist) = snapshot.playlist {
            let media = self
                .adapter
                .current_item()
                .or_else(|| snapshot.track.as_ref().map(Track::media_item));
            let index = media.as_ref().and_then(|item| playlist.index_of_media(item));
            let track = index.and_then(|i| playlist.track_list.get(i)).cloned();
            let media_items = playlist.media_items();

            info!(
                "Restored queue '{}' with {} tracks",
                playlist.display_name(),
                playlist.len()
            );
            self.store.replace_queue(Some(playlist));
            self.store.set_current_track(track);

            if self.adapter.item_count() == Some(0) {
                self.adapter.load_queue(media_items);
                if let Some(index) = index {
                    self.adapter.seek_to_item(index, 0);
                }
            }

            self.store.set_playing(self.adapter.is_playing());
            self.store.set_position(self.adapter.position().unwrap_or(0));
            if self.store.is_playing() {
                self.restart_poller();
            }
        }

        self.adapter.set_repeat_mode(snapshot.playback_mode.into());
        self.store.set_playback_mode(snapshot.playback_mode);
    }

    /// Plays the pending opened URIs once the engine is bound and the
    /// library is loaded.
    fn open_pending_uris(&self) {
        if self.pending_uris.lock().is_empty() {
            return;
        }
        if !self.adapter.is_ready() {
            debug!("Opening deferred until the engine is attached");
            return;
        }

        let selections: Vec<(Track, Playlist)> = {
            let library = self.library.read();
            if library.is_empty() {
                debug!("Opening deferred until the library is loaded");
                return;
            }
            let all_tracks = library.all_tracks();
            self.pending_uris
                .lock()
                .drain(..)
                .filter_map(|needle| {
                    let track = library.find_by_path_or_uri(&needle).cloned();
                    if track.is_none() {
                        warn!("Track not found in library: {needle}");
                    }
                    track
                })
                .map(|track| (track, all_tracks.clone()))
                .collect()
        };

        for (track, playlist) in selections {
            self.select_track(track, playlist);
        }
    }

    fn select_track(&self, track: Track, playlist: Playlist) {
        if self.store.get_state().queue.as_ref() != Some(&playlist) {
            self.adapter.load_queue(playlist.media_items());
            self.adapter.prepare();
        }

        let index = playlist.index_of(&track);
        match index {
            Some(index) => self.adapter.play_at(index),
            None => {
                warn!("Selected track is not part of the playlist");
                self.adapter.play();
            }
        }

        self.store.replace_queue(Some(playlist.clone()));
        let current = match index {
            Some(_) => Some(track),
            None => self.resolve_current(&playlist),
        };
        self.store.set_current_track(current.clone());
        self.saved.set_selection(Some(playlist), current);
    }

    fn seek_to_next(&self) {
        if self.adapter.has_next() {
            self.adapter.next();
        }
    }

    fn seek_to_previous(&self) {
        let (jump_to_beginning, threshold_ms) = {
            let settings = self.settings.get_settings();
            (
                settings.jump_to_beginning,
                settings.jump_to_beginning_threshold_ms,
            )
        };

        let position = self.adapter.position().unwrap_or(0);
        if jump_to_beginning && position >= threshold_ms {
            self.adapter.seek_to(0);
            self.store.set_position(0);
        } else {
            self.adapter.previous();
        }
    }

    fn reset_playback(&self) {
        self.adapter.clear();
        self.poller.stop();
        self.store.reset_preserving_mode();
        self.saved.clear_playback();
        info!("Playback reset");
    }

    fn toggle_playback_mode(&self) {
        let mode = self.store.get_state().playback_mode.next();
        self.adapter.set_repeat_mode(mode.into());
        self.store.set_playback_mode(mode);
        self.saved.set_playback_mode(mode);
        debug!(?mode, "Playback mode changed");
    }

    fn add_to_queue(&self, tracks: Vec<Track>) {
        let Some(mut queue) = self.store.get_state().queue else {
            debug!("No active queue, add ignored");
            return;
        };
        self.adapter
            .append(tracks.iter().map(Track::media_item).collect());
        queue.track_list.extend(tracks);
        self.replace_queue(queue);
    }

    fn play_next(&self, track: Track) {
        let Some(mut queue) = self.store.get_state().queue else {
            debug!("No active queue, play next ignored");
            return;
        };
        let index = self
            .adapter
            .current_index()
            .map_or(0, |current| current + 1)
            .min(queue.len());
        self.adapter.add_at(index, track.media_item());
        queue.track_list.insert(index, track);
        self.replace_queue(queue);
    }

    fn remove_from_queue(&self, index: usize) {
        let Some(mut queue) = self.store.get_state().queue else {
            return;
        };
        if index >= queue.len() {
            debug!(index, "Queue index out of range, remove ignored");
            return;
        }

        if self.adapter.current_index() == Some(index) {
            self.seek_to_next();
        }
        self.adapter.remove_at(index);
        queue.track_list.remove(index);
        self.replace_queue(queue);
    }

    fn reorder_queue(&self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let Some(mut queue) = self.store.get_state().queue else {
            return;
        };
        if from >= queue.len() || to >= queue.len() {
            debug!(from, to, "Queue index out of range, reorder ignored");
            return;
        }

        self.adapter.move_item(from, to);
        let track = queue.track_list.remove(from);
        queue.track_list.insert(to, track);
        self.replace_queue(queue);
    }

    /// Stores a mutated queue and, if that dropped the current track,
    /// takes the engine's current item as the new one right away.
    fn replace_queue(&self, queue: Playlist) {
        if self.store.replace_queue(Some(queue.clone())) {
            let current = self.resolve_current(&queue);
            debug!(resolved = current.is_some(), "Current track re-resolved from engine");
            self.store.set_current_track(current);
        }
    }

    fn resolve_current(&self, queue: &Playlist) -> Option<Track> {
        let item = self.adapter.current_item()?;
        self.resolve_item(queue, &item)
    }

    /// Maps an engine item back to a queue track, preferring the engine's
    /// current index over the first matching entry.
    fn resolve_item(&self, queue: &Playlist, item: &MediaItem) -> Option<Track> {
        if let Some(index) = self.adapter.current_index()
            && let Some(track) = queue.track_list.get(index)
            && track.media_item() == *item
        {
            return Some(track.clone());
        }
        queue
            .index_of_media(item)
            .and_then(|index| queue.track_list.get(index))
            .cloned()
    }

    fn restart_poller(&self) {
        let interval = self.settings.get_settings().position_poll_interval();
        self.poller.restart(interval);
    }
}

fn refreshed_track(track: &Track, by_uri: &HashMap<&str, &Track>) -> Track {
    by_uri
        .get(track.uri.as_str())
        .map_or_else(|| track.clone(), |fresh| (*fresh).clone())
}

fn refreshed_playlist(playlist: &Playlist, by_uri: &HashMap<&str, &Track>) -> Playlist {
    Playlist {
        name: playlist.name.clone(),
        track_list: playlist
            .track_list
            .iter()
            .map(|track| refreshed_track(track, by_uri))
            .collect(),
    }
}
