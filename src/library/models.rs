//! Data models for tracks and playlists.
//!
//! Tracks and playlists are immutable value records compared structurally,
//! which is what library snapshot diffing and queue comparison rely on.

use serde::{Deserialize, Serialize};

/// Loadable media reference handed to the playback engine.
///
/// Two media items refer to the same audio if and only if their URIs match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct MediaItem {
    /// Content URI the engine loads audio from.
    pub uri: String,
}

impl MediaItem {
    /// Creates a media item for the given URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// A single audio file known to the library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Track {
    /// Stable content URI.
    pub uri: String,
    /// Absolute file system path of the audio file.
    pub path: String,
    /// Track title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Album title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// Track artist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// Album artist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_artist: Option<String>,
    /// Genre.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// Release year as reported by the media store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    /// Track number as reported by the media store (may contain letters).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_number: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// File size in bytes.
    pub size: u64,
    /// Bitrate in bits per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    /// Last modification time as seconds since the Unix epoch.
    pub date_modified: i64,
}

impl Track {
    /// Returns the engine-loadable reference for this track.
    #[must_use]
    pub fn media_item(&self) -> MediaItem {
        MediaItem::new(self.uri.clone())
    }

    /// Directory containing the audio file, if the path has one.
    #[must_use]
    pub fn folder(&self) -> Option<&str> {
        let (folder, _) = self.path.rsplit_once('/')?;
        if folder.is_empty() { None } else { Some(folder) }
    }
}

/// Ordered collection of tracks.
///
/// An absent name marks an ad hoc grouping (the whole library, a filtered
/// view) as opposed to a saved user playlist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Playlist {
    /// Playlist name, `None` for unsaved groupings.
    pub name: Option<String>,
    /// Tracks in playback order.
    pub track_list: Vec<Track>,
}

impl Playlist {
    /// Creates a named playlist.
    pub fn new(name: impl Into<String>, track_list: Vec<Track>) -> Self {
        Self {
            name: Some(name.into()),
            track_list,
        }
    }

    /// Creates an unnamed playlist.
    #[must_use]
    pub fn ad_hoc(track_list: Vec<Track>) -> Self {
        Self {
            name: None,
            track_list,
        }
    }

    /// Position of the first occurrence of `track`.
    #[must_use]
    pub fn index_of(&self, track: &Track) -> Option<usize> {
        self.track_list.iter().position(|t| t == track)
    }

    /// Position of the first track loading from `item`.
    #[must_use]
    pub fn index_of_media(&self, item: &MediaItem) -> Option<usize> {
        self.track_list.iter().position(|t| t.uri == item.uri)
    }

    /// Whether `track` is part of this playlist.
    #[must_use]
    pub fn contains(&self, track: &Track) -> bool {
        self.track_list.contains(track)
    }

    /// Number of tracks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.track_list.len()
    }

    /// Whether the playlist has no tracks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.track_list.is_empty()
    }

    /// Name used as the storage key; unnamed playlists share "Unknown".
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    /// Media items for every track, in order.
    #[must_use]
    pub fn media_items(&self) -> Vec<MediaItem> {
        self.track_list.iter().map(Track::media_item).collect()
    }
}
