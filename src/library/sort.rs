//! Sort orders for track lists and playlists.
//!
//! All sorts are stable. Absent keys order before present ones when
//! ascending and after them when descending.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::library::models::{Playlist, Track};

/// Direction of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortOrder {
    /// Smallest key first (default).
    #[default]
    Ascending,
    /// Largest key first.
    Descending,
}

/// Key used to sort track lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TrackSort {
    /// By title (default).
    #[default]
    Title,
    /// By album title.
    Album,
    /// By track artist.
    Artist,
    /// By the first ten characters of the genre.
    Genre,
    /// By release year.
    Year,
    /// By track number.
    TrackNumber,
    /// By file modification time.
    DateModified,
}

/// Key used to sort playlists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlaylistSort {
    /// By playlist name (default).
    #[default]
    Title,
    /// By number of tracks.
    TrackCount,
    /// By the artist of the first track.
    Artist,
    /// By the numeric year of the first track.
    Year,
}

/// Returns `tracks` sorted by `sort` in `order`.
#[must_use]
pub fn sorted_tracks(mut tracks: Vec<Track>, sort: TrackSort, order: SortOrder) -> Vec<Track> {
    sort_tracks(&mut tracks, sort, order);
    tracks
}

/// Sorts `tracks` in place.
pub fn sort_tracks(tracks: &mut [Track], sort: TrackSort, order: SortOrder) {
    tracks.sort_by(|a, b| directed(compare_tracks(a, b, sort), order));
}

/// Returns `playlists` sorted by `sort` in `order`.
#[must_use]
pub fn sorted_playlists(
    mut playlists: Vec<Playlist>,
    sort: PlaylistSort,
    order: SortOrder,
) -> Vec<Playlist> {
    playlists.sort_by(|a, b| directed(compare_playlists(a, b, sort), order));
    playlists
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Ascending => ordering,
        SortOrder::Descending => ordering.reverse(),
    }
}

fn compare_tracks(a: &Track, b: &Track, sort: TrackSort) -> Ordering {
    match sort {
        TrackSort::Title => a.title.cmp(&b.title),
        TrackSort::Album => a.album.cmp(&b.album),
        TrackSort::Artist => a.artist.cmp(&b.artist),
        TrackSort::Genre => genre_key(a).cmp(&genre_key(b)),
        TrackSort::Year => a.year.cmp(&b.year),
        TrackSort::TrackNumber => track_number_key(a).cmp(&track_number_key(b)),
        TrackSort::DateModified => a.date_modified.cmp(&b.date_modified),
    }
}

fn compare_playlists(a: &Playlist, b: &Playlist, sort: PlaylistSort) -> Ordering {
    let first_artist = |p: &Playlist| p.track_list.first().and_then(|t| t.artist.clone());
    let first_year = |p: &Playlist| {
        p.track_list
            .first()
            .and_then(|t| t.year.as_deref())
            .and_then(|year| year.trim().parse::<i32>().ok())
    };

    match sort {
        PlaylistSort::Title => a.name.cmp(&b.name),
        PlaylistSort::TrackCount => a.len().cmp(&b.len()),
        PlaylistSort::Artist => first_artist(a).cmp(&first_artist(b)),
        PlaylistSort::Year => first_year(a).cmp(&first_year(b)),
    }
}

fn genre_key(track: &Track) -> Option<String> {
    track
        .genre
        .as_ref()
        .map(|genre| genre.chars().take(10).collect())
}

/// Numeric key for a track number.
///
/// Plain numbers parse directly. Numbers containing letters ("A1" on vinyl
/// rips) are keyed by the concatenated character codes so they still sort
/// deterministically. Anything else ("3/12") has no key.
pub(crate) fn track_number_key(track: &Track) -> Option<i64> {
    let number = track.track_number.as_deref()?;
    if number.chars().any(char::is_alphabetic) {
        number
            .chars()
            .map(|c| u32::from(c).to_string())
            .collect::<String>()
            .parse()
            .ok()
    } else {
        number.parse().ok()
    }
}
