//! Domain-specific error types using `thiserror`.
//!
//! This module defines the error enums for the playback, library and
//! persistence domains of the player.

use std::io::Error as IoError;

use {serde_json::Error as SerdeJsonError, sqlx::Error as SqlxError, thiserror::Error};

use crate::library::schema::SchemaError;

/// Playback-related errors.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The engine was not bound before the readiness wait gave up.
    #[error("Playback engine not ready after {attempts} attempts")]
    EngineNotReady { attempts: u32 },
}

/// Library and playlist store errors.
#[derive(Error, Debug)]
pub enum LibraryError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),
    /// Schema initialization error.
    #[error("Schema error: {0}")]
    SchemaError(#[from] SchemaError),
    /// Stored data could not be decoded.
    #[error("Invalid data: {reason}")]
    InvalidData { reason: String },
    /// A playlist with this name already exists.
    #[error("Playlist already exists: {name}")]
    DuplicatePlaylist { name: String },
    /// No playlist with this name exists.
    #[error("Playlist not found: {name}")]
    PlaylistNotFound { name: String },
    /// The library source could not be queried.
    #[error("Library source unavailable: {reason}")]
    SourceUnavailable { reason: String },
}

/// Errors writing or reading durable player state.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failed to read or write the state file.
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
    /// Failed to serialize or deserialize the state.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerdeJsonError),
}
