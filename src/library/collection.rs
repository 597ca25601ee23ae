//! In-memory view of the scanned library and its browsable groupings.

use std::collections::HashMap;

use crate::library::{
    models::{Playlist, Track},
    sort::{SortOrder, TrackSort, sorted_tracks},
};

/// Current library snapshot.
///
/// Holds the sorted track list produced by the last refresh and derives
/// album, artist, genre and folder groupings from it on demand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Library {
    tracks: Vec<Track>,
}

impl Library {
    /// Creates a library from an already sorted track list.
    #[must_use]
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// All tracks in display order.
    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Whether the library has no tracks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Replaces the track list.
    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
    }

    /// Re-sorts the track list.
    pub fn resort(&mut self, sort: TrackSort, order: SortOrder) {
        let tracks = std::mem::take(&mut self.tracks);
        self.tracks = sorted_tracks(tracks, sort, order);
    }

    /// The whole library as an unnamed playlist.
    #[must_use]
    pub fn all_tracks(&self) -> Playlist {
        Playlist::ad_hoc(self.tracks.clone())
    }

    /// One playlist per album, tracks in track-number order.
    #[must_use]
    pub fn albums(&self) -> Vec<Playlist> {
        self.grouped(|t| t.album.clone(), true)
    }

    /// One playlist per artist, tracks in track-number order.
    #[must_use]
    pub fn artists(&self) -> Vec<Playlist> {
        self.grouped(|t| t.artist.clone(), true)
    }

    /// One playlist per genre.
    #[must_use]
    pub fn genres(&self) -> Vec<Playlist> {
        self.grouped(|t| t.genre.clone(), false)
    }

    /// One playlist per containing folder.
    #[must_use]
    pub fn folders(&self) -> Vec<Playlist> {
        self.grouped(|t| t.folder().map(str::to_string), false)
    }

    /// Album grouping the track belongs to.
    #[must_use]
    pub fn album_of(&self, track: &Track) -> Option<Playlist> {
        self.albums().into_iter().find(|p| p.name == track.album)
    }

    /// Artist grouping the track belongs to.
    #[must_use]
    pub fn artist_of(&self, track: &Track) -> Option<Playlist> {
        self.artists().into_iter().find(|p| p.name == track.artist)
    }

    /// Finds a track by file path or content URI.
    #[must_use]
    pub fn find_by_path_or_uri(&self, needle: &str) -> Option<&Track> {
        self.tracks
            .iter()
            .find(|t| t.path == needle || t.uri == needle)
    }

    /// Groups tracks by `key`, keeping first-appearance order of groups.
    fn grouped<F>(&self, key: F, by_track_number: bool) -> Vec<Playlist>
    where
        F: Fn(&Track) -> Option<String>,
    {
        let mut positions: HashMap<Option<String>, usize> = HashMap::new();
        let mut groups: Vec<Playlist> = Vec::new();

        for track in &self.tracks {
            let name = key(track);
            let index = *positions.entry(name.clone()).or_insert_with(|| {
                groups.push(Playlist {
                    name,
                    track_list: Vec::new(),
                });
                groups.len() - 1
            });
            groups[index].track_list.push(track.clone());
        }

        if by_track_number {
            for group in &mut groups {
                let tracks = std::mem::take(&mut group.track_list);
                group.track_list = sorted_tracks(tracks, TrackSort::TrackNumber, SortOrder::Ascending);
            }
        }

        groups
    }
}
