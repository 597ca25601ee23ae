//! Music library management system.
//!
//! This module provides the track and playlist models, sorting, the polled
//! library snapshot and the saved playlist store.

pub mod collection;
pub mod models;
pub mod playlists;
pub mod schema;
pub mod sort;
pub mod source;

pub use {
    collection::Library,
    models::{MediaItem, Playlist, Track},
    playlists::{PlaylistStore, SqlitePlaylistStore, parse_m3u},
    schema::{CURRENT_SCHEMA_VERSION, SchemaManager, create_connection_pool, create_memory_pool},
    sort::{PlaylistSort, SortOrder, TrackSort},
    source::{LibraryEvent, LibrarySource, LibraryWatcher, MemoryLibrarySource},
};
