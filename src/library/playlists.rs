//! Saved user playlists.
//!
//! Playlists are keyed by their unique name. The store publishes the full
//! playlist list to subscribers after every successful mutation.

use std::{collections::HashSet, path::Path};

use {
    async_trait::async_trait,
    serde_json::{from_str, to_string},
    sqlx::SqlitePool,
    tokio::sync::broadcast::{Receiver, Sender, channel},
    tracing::debug,
};

use crate::{
    error::{LibraryError, ResultExt},
    library::{
        models::{Playlist, Track},
        schema::{SchemaManager, create_connection_pool, create_memory_pool},
    },
};

/// Persistence contract for saved playlists.
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// All saved playlists, newest first.
    async fn playlists(&self) -> Result<Vec<Playlist>, LibraryError>;

    /// Saves a new playlist with its tracks.
    ///
    /// # Errors
    ///
    /// `LibraryError::DuplicatePlaylist` if the name is taken.
    async fn create_playlist(&self, playlist: &Playlist) -> Result<(), LibraryError>;

    /// Renames a playlist, keeping its tracks.
    ///
    /// # Errors
    ///
    /// `LibraryError::DuplicatePlaylist` if `name` is taken,
    /// `LibraryError::PlaylistNotFound` if `playlist` is not saved.
    async fn rename_playlist(&self, playlist: &Playlist, name: &str) -> Result<(), LibraryError>;

    /// Deletes a playlist and its tracks.
    async fn delete_playlist(&self, playlist: &Playlist) -> Result<(), LibraryError>;

    /// Replaces the saved track list of `playlist`.
    ///
    /// # Errors
    ///
    /// `LibraryError::PlaylistNotFound` if `playlist` is not saved.
    async fn update_track_list(
        &self,
        playlist: &Playlist,
        track_list: &[Track],
    ) -> Result<(), LibraryError>;

    /// Subscribes to the playlist list published after each mutation.
    fn subscribe(&self) -> Receiver<Vec<Playlist>>;

    /// Appends the tracks not yet on `playlist`.
    ///
    /// Returns how many tracks were added; zero means every track was
    /// already present and nothing was written.
    async fn add_tracks(&self, playlist: &Playlist, tracks: &[Track]) -> Result<usize, LibraryError> {
        let mut seen: HashSet<&Track> = playlist.track_list.iter().collect();
        let new_tracks: Vec<Track> = tracks
            .iter()
            .filter(|track| seen.insert(*track))
            .cloned()
            .collect();

        if new_tracks.is_empty() {
            debug!("All tracks already on playlist {}", playlist.display_name());
            return Ok(0);
        }

        let added = new_tracks.len();
        let mut track_list = playlist.track_list.clone();
        track_list.extend(new_tracks);
        self.update_track_list(playlist, &track_list).await?;
        Ok(added)
    }

    /// Removes every occurrence of `tracks` and returns the updated playlist.
    async fn remove_tracks(
        &self,
        playlist: &Playlist,
        tracks: &[Track],
    ) -> Result<Playlist, LibraryError> {
        let track_list: Vec<Track> = playlist
            .track_list
            .iter()
            .filter(|track| !tracks.contains(track))
            .cloned()
            .collect();

        self.update_track_list(playlist, &track_list).await?;
        Ok(Playlist {
            name: playlist.name.clone(),
            track_list,
        })
    }
}

/// Playlist store backed by SQLite.
pub struct SqlitePlaylistStore {
    pool: SqlitePool,
    changes: Sender<Vec<Playlist>>,
}

impl SqlitePlaylistStore {
    /// Opens (creating if needed) the playlist database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the database cannot be opened or its schema
    /// initialized.
    pub async fn open(path: &Path) -> Result<Self, LibraryError> {
        let pool = create_connection_pool(path).await?;
        Self::with_pool(pool).await
    }

    /// Opens a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the database cannot be created.
    pub async fn in_memory() -> Result<Self, LibraryError> {
        let pool = create_memory_pool().await?;
        Self::with_pool(pool).await
    }

    /// Wraps an existing pool, initializing the schema.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if schema initialization fails.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, LibraryError> {
        SchemaManager::new(pool.clone()).initialize_schema().await?;
        let (changes, _) = channel(16);
        Ok(Self { pool, changes })
    }

    async fn exists(&self, name: &str) -> Result<bool, LibraryError> {
        let found: Option<String> = sqlx::query_scalar("SELECT name FROM playlists WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn tracks_of(&self, name: &str) -> Result<Vec<Track>, LibraryError> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT track_data FROM playlist_tracks WHERE playlist_name = ? ORDER BY position ASC",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                from_str(row).map_err(|e| LibraryError::InvalidData {
                    reason: format!("track row of playlist {name}: {e}"),
                })
            })
            .collect()
    }

    fn encode_tracks(track_list: &[Track]) -> Result<Vec<String>, LibraryError> {
        track_list
            .iter()
            .map(|track| {
                to_string(track).map_err(|e| LibraryError::InvalidData {
                    reason: format!("track {}: {e}", track.uri),
                })
            })
            .collect()
    }

    async fn publish(&self) {
        if self.changes.receiver_count() == 0 {
            return;
        }
        if let Some(playlists) = self.playlists().await.or_warn("Publishing playlists") {
            let _ = self.changes.send(playlists);
        }
    }
}

#[async_trait]
impl PlaylistStore for SqlitePlaylistStore {
    async fn playlists(&self) -> Result<Vec<Playlist>, LibraryError> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM playlists ORDER BY created_at DESC, rowid DESC")
                .fetch_all(&self.pool)
                .await?;

        let mut playlists = Vec::with_capacity(names.len());
        for name in names {
            let track_list = self.tracks_of(&name).await?;
            playlists.push(Playlist {
                name: Some(name),
                track_list,
            });
        }
        Ok(playlists)
    }

    async fn create_playlist(&self, playlist: &Playlist) -> Result<(), LibraryError> {
        let name = playlist.display_name();
        if self.exists(name).await? {
            return Err(LibraryError::DuplicatePlaylist {
                name: name.to_string(),
            });
        }

        let rows = Self::encode_tracks(&playlist.track_list)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO playlists (name) VALUES (?)")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        for (position, row) in rows.iter().enumerate() {
            sqlx::query(
                "INSERT INTO playlist_tracks (playlist_name, position, track_data) VALUES (?, ?, ?)",
            )
            .bind(name)
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .bind(row)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!("Created playlist {name} with {} tracks", rows.len());
        self.publish().await;
        Ok(())
    }

    async fn rename_playlist(&self, playlist: &Playlist, name: &str) -> Result<(), LibraryError> {
        let old_name = playlist.display_name();
        if self.exists(name).await? {
            return Err(LibraryError::DuplicatePlaylist {
                name: name.to_string(),
            });
        }
        if !self.exists(old_name).await? {
            return Err(LibraryError::PlaylistNotFound {
                name: old_name.to_string(),
            });
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE playlists SET name = ? WHERE name = ?")
            .bind(name)
            .bind(old_name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE playlist_tracks SET playlist_name = ? WHERE playlist_name = ?")
            .bind(name)
            .bind(old_name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("Renamed playlist {old_name} to {name}");
        self.publish().await;
        Ok(())
    }

    async fn delete_playlist(&self, playlist: &Playlist) -> Result<(), LibraryError> {
        let name = playlist.display_name();
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM playlist_tracks WHERE playlist_name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM playlists WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("Deleted playlist {name}");
        self.publish().await;
        Ok(())
    }

    async fn update_track_list(
        &self,
        playlist: &Playlist,
        track_list: &[Track],
    ) -> Result<(), LibraryError> {
        let name = playlist.display_name();
        if !self.exists(name).await? {
            return Err(LibraryError::PlaylistNotFound {
                name: name.to_string(),
            });
        }

        let rows = Self::encode_tracks(track_list)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM playlist_tracks WHERE playlist_name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        for (position, row) in rows.iter().enumerate() {
            sqlx::query(
                "INSERT INTO playlist_tracks (playlist_name, position, track_data) VALUES (?, ?, ?)",
            )
            .bind(name)
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .bind(row)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.publish().await;
        Ok(())
    }

    fn subscribe(&self) -> Receiver<Vec<Playlist>> {
        self.changes.subscribe()
    }
}

/// Builds a playlist from the contents of an M3U file.
///
/// Only absolute path entries are considered; entries that do not match a
/// library track path are skipped. The name keeps letters, digits and
/// whitespace only.
#[must_use]
pub fn parse_m3u(name: &str, content: &str, library: &[Track]) -> Playlist {
    let track_list = content
        .lines()
        .filter(|line| line.starts_with('/'))
        .filter_map(|path| library.iter().find(|track| track.path == path))
        .cloned()
        .collect();

    let name: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    Playlist {
        name: Some(name),
        track_list,
    }
}
