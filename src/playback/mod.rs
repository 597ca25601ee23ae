//! Playback state synchronization.
//!
//! Keeps the external playback engine's queue consistent with the observable
//! `PlaybackState`, persists the playback context and restores it on the
//! next session.

pub mod adapter;
pub mod controller;
pub mod engine;
pub mod events;
pub mod memory_engine;
pub mod poller;
pub mod snapshot;

#[cfg(test)]
mod controller_tests;

pub use {
    adapter::EngineAdapter,
    controller::{ControllerHandle, PlaybackController},
    engine::{EngineEvent, EngineListener, PlaybackEngine, RepeatMode},
    events::{ControllerMessage, PlayerEvent},
    memory_engine::InMemoryEngine,
    snapshot::{JsonSnapshotStore, MemorySnapshotStore, PlayerSnapshot, SavedPlayerState, SnapshotStore},
};
