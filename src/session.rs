//! Per-process player session wiring.
//!
//! Assembles settings, the saved snapshot, the playback controller, the
//! library watcher and the playlist store, and runs their background tasks.

use std::sync::Arc;

use {
    anyhow::Result as AnyhowResult,
    parking_lot::{Mutex, RwLock},
    tokio::{sync::broadcast::error::RecvError, task::JoinHandle},
    tracing::{debug, info, warn},
};

use crate::{
    config::{SettingsError, SettingsManager, UserSettings, get_data_dir},
    error::{LibraryError, PlaybackError, ResultExt},
    library::{
        collection::Library,
        models::Playlist,
        playlists::{PlaylistStore, SqlitePlaylistStore, parse_m3u},
        source::{LibraryEvent, LibrarySource, LibraryWatcher},
    },
    playback::{
        controller::{ControllerHandle, PlaybackController},
        engine::PlaybackEngine,
        snapshot::{JsonSnapshotStore, SavedPlayerState, SnapshotStore},
    },
    state::PlaybackStore,
};

/// Everything one running player needs.
pub struct PlayerSession {
    settings: Arc<SettingsManager>,
    controller: Arc<PlaybackController>,
    watcher: Arc<LibraryWatcher>,
    playlists: Arc<dyn PlaylistStore>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PlayerSession {
    /// Assembles a session from its collaborators. Nothing runs until
    /// `start`.
    ///
    /// # Arguments
    ///
    /// * `settings` - User preferences.
    /// * `snapshots` - Durable storage for the playback context.
    /// * `source` - Library snapshot provider.
    /// * `playlists` - Saved playlist store.
    #[must_use]
    pub fn new(
        settings: Arc<SettingsManager>,
        snapshots: Arc<dyn SnapshotStore>,
        source: Arc<dyn LibrarySource>,
        playlists: Arc<dyn PlaylistStore>,
    ) -> Self {
        let saved = Arc::new(SavedPlayerState::new(snapshots));
        let watcher = Arc::new(LibraryWatcher::new(source, Arc::clone(&settings)));
        let controller = Arc::new(PlaybackController::new(
            PlaybackStore::new(),
            saved,
            Arc::clone(&settings),
            watcher.library(),
        ));

        Self {
            settings,
            controller,
            watcher,
            playlists,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Session backed by the XDG settings file, the JSON snapshot and the
    /// SQLite playlist database.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be read or the playlist
    /// database cannot be opened.
    pub async fn open_default(source: Arc<dyn LibrarySource>) -> AnyhowResult<Self> {
        let settings = Arc::new(SettingsManager::new().add_context("Loading settings")?);
        let playlists = SqlitePlaylistStore::open(&get_data_dir().join("playlists.db"))
            .await
            .add_context("Opening playlist database")?;

        Ok(Self::new(
            settings,
            Arc::new(JsonSnapshotStore::new()),
            source,
            Arc::new(playlists),
        ))
    }

    /// Starts the controller loop, the library watcher and the forwarding of
    /// library changes into the controller queue.
    pub fn start(&self) {
        let controller = Arc::clone(&self.controller);
        let run = tokio::spawn(async move { controller.run().await });

        let mut library_events = self.watcher.subscribe();
        let handle = self.controller.handle();
        let forward = tokio::spawn(async move {
            loop {
                match library_events.recv().await {
                    Ok(LibraryEvent::TracksChanged(tracks)) => handle.library_changed(tracks),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Library events lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let poll = Arc::clone(&self.watcher).spawn();
        self.tasks.lock().extend([run, forward, poll]);
        info!("Player session started");
    }

    /// Binds the engine once it has been constructed.
    pub fn attach_engine(&self, engine: Arc<dyn PlaybackEngine>) {
        self.controller.attach_engine(engine);
    }

    /// Waits for the engine and queues the restore of the saved playback
    /// context on the controller loop.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::EngineNotReady` if no engine was attached in
    /// time.
    pub async fn restore(&self) -> Result<(), PlaybackError> {
        self.controller.restore_session().await
    }

    /// Sender for user intents.
    #[must_use]
    pub fn handle(&self) -> ControllerHandle {
        self.controller.handle()
    }

    /// Observable playback state.
    #[must_use]
    pub fn store(&self) -> &PlaybackStore {
        self.controller.store()
    }

    /// Shared library snapshot.
    #[must_use]
    pub fn library(&self) -> Arc<RwLock<Library>> {
        self.watcher.library()
    }

    #[must_use]
    pub fn watcher(&self) -> &Arc<LibraryWatcher> {
        &self.watcher
    }

    #[must_use]
    pub fn playlists(&self) -> &Arc<dyn PlaylistStore> {
        &self.playlists
    }

    #[must_use]
    pub fn settings(&self) -> &Arc<SettingsManager> {
        &self.settings
    }

    /// Plays a file or content URI opened from outside the library browser.
    ///
    /// Playback starts once the engine is bound and the library is loaded.
    pub fn open_uri(&self, needle: &str) {
        self.controller.handle().open_uri(needle);
    }

    /// Applies new settings, re-sorting the library and reconfiguring the
    /// engine for whatever took effect.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the settings are invalid or cannot be
    /// saved.
    pub fn update_settings(&self, new_settings: UserSettings) -> Result<(), SettingsError> {
        let previous = self.settings.get_settings().clone();
        let result = self.settings.update_settings(new_settings);
        let current = self.settings.get_settings().clone();

        if previous.track_sort != current.track_sort
            || previous.track_sort_order != current.track_sort_order
        {
            debug!(sort = ?current.track_sort, "Re-sorting library");
            self.watcher
                .library()
                .write()
                .resort(current.track_sort, current.track_sort_order);
        }
        if previous.handle_audio_focus != current.handle_audio_focus {
            self.controller
                .adapter()
                .set_handle_audio_focus(current.handle_audio_focus);
        }
        result
    }

    /// Saves the current queue as a named playlist.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::InvalidData` if there is no queue, or the
    /// store error.
    pub async fn save_queue_as(&self, name: &str) -> Result<Playlist, LibraryError> {
        let Some(queue) = self.store().get_state().queue else {
            return Err(LibraryError::InvalidData {
                reason: "no active queue".to_string(),
            });
        };
        let playlist = Playlist::new(name, queue.track_list);
        self.playlists.create_playlist(&playlist).await?;
        Ok(playlist)
    }

    /// Imports an M3U playlist, keeping only entries found in the library.
    ///
    /// # Errors
    ///
    /// Returns the store error if the playlist cannot be saved.
    pub async fn import_m3u(&self, name: &str, content: &str) -> Result<Playlist, LibraryError> {
        let playlist = {
            let library = self.watcher.library();
            let library = library.read();
            parse_m3u(name, content, library.tracks())
        };
        if playlist.is_empty() {
            warn!("Imported playlist '{}' matched no library tracks", playlist.display_name());
        }
        self.playlists.create_playlist(&playlist).await?;
        Ok(playlist)
    }

    /// Stops the controller and all background tasks.
    pub async fn shutdown(&self) {
        self.controller.handle().shutdown();
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        let mut tasks = tasks.into_iter();
        if let Some(run) = tasks.next() {
            let _ = run.await;
        }
        for task in tasks {
            task.abort();
        }
        self.controller.detach_engine();
        info!("Player session stopped");
    }
}
