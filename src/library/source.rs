//! Library snapshot source and the polling watcher that keeps the in-memory
//! library current.

use std::{
    collections::{BTreeSet, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering::SeqCst},
    },
};

use {
    anyhow::Error,
    parking_lot::RwLock,
    tokio::{
        sync::broadcast::{Receiver, Sender, channel},
        task::{JoinHandle, spawn_blocking},
        time::sleep,
    },
    tracing::{debug, info},
};

use crate::{
    config::SettingsManager,
    error::{ErrorReporter, LibraryError},
    library::{collection::Library, models::Track, sort::sorted_tracks},
};

/// Provider of full, unordered snapshots of the playable audio on the device.
///
/// Calls may block; the watcher runs them on the blocking pool.
pub trait LibrarySource: Send + Sync {
    /// Every scannable track.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::SourceUnavailable` if the snapshot cannot be
    /// taken right now.
    fn get_tracks(&self) -> Result<Vec<Track>, LibraryError>;

    /// Every folder directly containing audio.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::SourceUnavailable` if the folders cannot be
    /// listed right now.
    fn get_folders_with_audio(&self) -> Result<BTreeSet<String>, LibraryError>;
}

/// Whether `fresh` differs from `current` by size or content.
#[must_use]
pub fn snapshot_changed(current: &[Track], fresh: &[Track]) -> bool {
    if current.len() != fresh.len() {
        return true;
    }
    let known: HashSet<&Track> = current.iter().collect();
    !fresh.iter().all(|track| known.contains(track))
}

/// Library change notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum LibraryEvent {
    /// A new snapshot replaced the library, already sorted.
    TracksChanged(Vec<Track>),
}

/// Polls a `LibrarySource` and republishes changed snapshots.
pub struct LibraryWatcher {
    source: Arc<dyn LibrarySource>,
    library: Arc<RwLock<Library>>,
    settings: Arc<SettingsManager>,
    events: Sender<LibraryEvent>,
}

impl LibraryWatcher {
    /// Creates a watcher over `source` with an empty library.
    ///
    /// # Arguments
    ///
    /// * `source` - Snapshot provider.
    /// * `settings` - Source of the refresh interval and track sort.
    #[must_use]
    pub fn new(source: Arc<dyn LibrarySource>, settings: Arc<SettingsManager>) -> Self {
        let (events, _) = channel(8);
        Self {
            source,
            library: Arc::new(RwLock::new(Library::default())),
            settings,
            events,
        }
    }

    /// Shared handle to the current library.
    #[must_use]
    pub fn library(&self) -> Arc<RwLock<Library>> {
        Arc::clone(&self.library)
    }

    /// Subscribes to library changes.
    pub fn subscribe(&self) -> Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    /// Takes one snapshot and applies it if it differs from the current one.
    ///
    /// Returns whether the library changed.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the source cannot be queried.
    pub async fn refresh(&self) -> Result<bool, LibraryError> {
        let source = Arc::clone(&self.source);
        let tracks = spawn_blocking(move || source.get_tracks())
            .await
            .map_err(|e| LibraryError::SourceUnavailable {
                reason: e.to_string(),
            })??;

        let changed = snapshot_changed(self.library.read().tracks(), &tracks);
        if !changed {
            debug!("Library snapshot unchanged ({} tracks)", tracks.len());
            return Ok(false);
        }

        let (sort, order) = {
            let settings = self.settings.get_settings();
            (settings.track_sort, settings.track_sort_order)
        };
        let sorted = sorted_tracks(tracks, sort, order);
        self.library.write().replace(sorted.clone());

        info!("Library changed, now {} tracks", sorted.len());
        let _ = self.events.send(LibraryEvent::TracksChanged(sorted));
        Ok(true)
    }

    /// Folders containing audio, as reported by the source.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the source cannot be queried.
    pub async fn folders_with_audio(&self) -> Result<BTreeSet<String>, LibraryError> {
        let source = Arc::clone(&self.source);
        spawn_blocking(move || source.get_folders_with_audio())
            .await
            .map_err(|e| LibraryError::SourceUnavailable {
                reason: e.to_string(),
            })?
    }

    /// Starts the polling loop. Failed polls are logged and retried on the
    /// next tick.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.refresh().await {
                    Err(e @ LibraryError::SourceUnavailable { .. }) => {
                        ErrorReporter::debug(&Error::new(e), "Refreshing library");
                    }
                    Err(e) => ErrorReporter::warn(&Error::new(e), "Refreshing library"),
                    Ok(_) => {}
                }
                let interval = self.settings.get_settings().library_refresh_interval();
                sleep(interval).await;
            }
        })
    }
}

/// Library source over a fixed, replaceable track list.
#[derive(Debug, Default)]
pub struct MemoryLibrarySource {
    tracks: RwLock<Vec<Track>>,
    unavailable: AtomicBool,
}

impl MemoryLibrarySource {
    /// Creates a source serving `tracks`.
    #[must_use]
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks: RwLock::new(tracks),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Replaces the served tracks.
    pub fn set_tracks(&self, tracks: Vec<Track>) {
        *self.tracks.write() = tracks;
    }

    /// Makes subsequent queries fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, SeqCst);
    }

    fn check_available(&self) -> Result<(), LibraryError> {
        if self.unavailable.load(SeqCst) {
            return Err(LibraryError::SourceUnavailable {
                reason: "storage not mounted".to_string(),
            });
        }
        Ok(())
    }
}

impl LibrarySource for MemoryLibrarySource {
    fn get_tracks(&self) -> Result<Vec<Track>, LibraryError> {
        self.check_available()?;
        Ok(self.tracks.read().clone())
    }

    fn get_folders_with_audio(&self) -> Result<BTreeSet<String>, LibraryError> {
        self.check_available()?;
        Ok(self
            .tracks
            .read()
            .iter()
            .filter_map(|track| track.folder().map(str::to_string))
            .collect())
    }
}
