//! Centralized playback state with reactive updates to UI consumers.
//!
//! This module provides the observable state container that mirrors the
//! playback engine for the rest of the application.

pub mod playback_state;

pub use playback_state::{PlaybackMode, PlaybackState, PlaybackStateEvent, PlaybackStore};
