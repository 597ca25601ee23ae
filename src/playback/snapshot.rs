//! Durable player snapshot used to resume after restarts.
//!
//! Writes are best-effort: a failed write is logged and the next write
//! carries the complete cached snapshot again.

use std::{
    fs::{create_dir_all, read_to_string, rename, write},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst},
    },
};

use {
    parking_lot::Mutex,
    serde::{Deserialize, Serialize},
    serde_json::{from_str, to_string},
    tracing::debug,
};

use crate::{
    config::get_data_dir,
    error::{PersistenceError, ResultExt},
    library::models::{Playlist, Track},
    state::PlaybackMode,
};

/// Minimal state needed to resume the playback context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSnapshot {
    /// Last queue.
    pub playlist: Option<Playlist>,
    /// Last current track.
    pub track: Option<Track>,
    /// Last playback mode.
    pub playback_mode: PlaybackMode,
}

/// Durable key-value storage for the snapshot.
pub trait SnapshotStore: Send + Sync {
    /// Reads the stored snapshot, or the default if none was stored yet.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the stored snapshot cannot be read.
    fn load(&self) -> Result<PlayerSnapshot, PersistenceError>;

    /// Replaces the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the snapshot cannot be written.
    fn store(&self, snapshot: &PlayerSnapshot) -> Result<(), PersistenceError>;
}

/// Snapshot kept as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    /// Store at `$XDG_DATA_HOME/lotus/player_state.json`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_path(get_data_dir().join("player_state.json"))
    }

    /// Store at a custom path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Default for JsonSnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self) -> Result<PlayerSnapshot, PersistenceError> {
        if !self.path.exists() {
            debug!("No player state at {:?}", self.path);
            return Ok(PlayerSnapshot::default());
        }
        let contents = read_to_string(&self.path)?;
        Ok(from_str(&contents)?)
    }

    fn store(&self, snapshot: &PlayerSnapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            create_dir_all(parent)?;
        }
        // Readers only ever see a complete file.
        let temp_path = self.path.with_extension("json.tmp");
        write(&temp_path, to_string(snapshot)?)?;
        rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// Snapshot kept in memory, with optional write failures.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Option<PlayerSnapshot>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemorySnapshotStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `snapshot`, as after a previous session.
    #[must_use]
    pub fn with_snapshot(snapshot: PlayerSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, SeqCst);
    }

    /// Last successfully stored snapshot.
    #[must_use]
    pub fn stored(&self) -> Option<PlayerSnapshot> {
        self.snapshot.lock().clone()
    }

    /// Number of successful writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(SeqCst)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<PlayerSnapshot, PersistenceError> {
        Ok(self.snapshot.lock().clone().unwrap_or_default())
    }

    fn store(&self, snapshot: &PlayerSnapshot) -> Result<(), PersistenceError> {
        if self.fail_writes.load(SeqCst) {
            return Err(PersistenceError::IoError(std::io::Error::other(
                "simulated write failure",
            )));
        }
        *self.snapshot.lock() = Some(snapshot.clone());
        self.writes.fetch_add(1, SeqCst);
        Ok(())
    }
}

/// Cached snapshot in front of a `SnapshotStore`.
pub struct SavedPlayerState {
    store: Arc<dyn SnapshotStore>,
    cache: Mutex<PlayerSnapshot>,
}

impl SavedPlayerState {
    /// Loads the stored snapshot. An unreadable snapshot is logged and
    /// replaced by the default.
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        let cache = store
            .load()
            .or_warn("Loading saved player state")
            .unwrap_or_default();
        Self {
            store,
            cache: Mutex::new(cache),
        }
    }

    /// Current cached snapshot.
    #[must_use]
    pub fn get(&self) -> PlayerSnapshot {
        self.cache.lock().clone()
    }

    pub fn set_playlist(&self, playlist: Option<Playlist>) -> bool {
        self.update(|snapshot| snapshot.playlist = playlist)
    }

    pub fn set_track(&self, track: Option<Track>) -> bool {
        self.update(|snapshot| snapshot.track = track)
    }

    /// Sets queue and current track with a single write.
    pub fn set_selection(&self, playlist: Option<Playlist>, track: Option<Track>) -> bool {
        self.update(|snapshot| {
            snapshot.playlist = playlist;
            snapshot.track = track;
        })
    }

    pub fn set_playback_mode(&self, playback_mode: PlaybackMode) -> bool {
        self.update(|snapshot| snapshot.playback_mode = playback_mode)
    }

    /// Forgets queue and track, keeping the mode.
    pub fn clear_playback(&self) -> bool {
        self.set_selection(None, None)
    }

    /// Applies `change` to the cache and writes the whole snapshot.
    ///
    /// Returns whether the write succeeded.
    fn update(&self, change: impl FnOnce(&mut PlayerSnapshot)) -> bool {
        let mut cache = self.cache.lock();
        change(&mut cache);
        self.store
            .store(&cache)
            .or_warn("Saving player state")
            .is_some()
    }
}
