//! Lotus - Playback state synchronization for a local music player
//!
//! Keeps a third-party playback engine's queue, current item and transport
//! state consistent with an observable playback state, persists the playback
//! context across sessions and reconciles it with a periodically refreshed
//! music library.

pub mod config;
pub mod error;
pub mod library;
pub mod playback;
pub mod session;
pub mod state;

// Re-export key types for convenience
pub use {
    config::{SettingsManager, UserSettings},
    error::{LibraryError, PersistenceError, PlaybackError},
    library::{Library, LibrarySource, MediaItem, Playlist, Track},
    playback::{
        ControllerHandle, EngineAdapter, InMemoryEngine, PlaybackController, PlaybackEngine,
        PlayerEvent, SavedPlayerState,
    },
    session::PlayerSession,
    state::{PlaybackMode, PlaybackState, PlaybackStateEvent, PlaybackStore},
};
