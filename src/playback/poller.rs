//! Background task mirroring the engine position into the state store.

use std::time::Duration;

use {
    parking_lot::Mutex,
    tokio::{runtime::Handle, task::JoinHandle, time::sleep},
    tracing::debug,
};

use crate::{playback::adapter::EngineAdapter, state::PlaybackStore};

/// Owner of the single position polling task.
///
/// Starting always cancels the previous task first, so at most one loop is
/// live at a time.
pub struct PositionPoller {
    adapter: EngineAdapter,
    store: PlaybackStore,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PositionPoller {
    #[must_use]
    pub fn new(adapter: EngineAdapter, store: PlaybackStore) -> Self {
        Self {
            adapter,
            store,
            handle: Mutex::new(None),
        }
    }

    /// Cancels any running loop and starts a new one polling every
    /// `interval` for as long as the store reports playback.
    ///
    /// Does nothing outside a tokio runtime.
    pub fn restart(&self, interval: Duration) {
        self.stop();

        let Ok(runtime) = Handle::try_current() else {
            debug!("No runtime, position polling skipped");
            return;
        };

        let adapter = self.adapter.clone();
        let store = self.store.clone();
        let task = runtime.spawn(async move {
            while store.is_playing() {
                let Some(position) = adapter.position() else {
                    break;
                };
                store.set_position(position);
                sleep(interval).await;
            }
            debug!("Position polling finished");
        });
        *self.handle.lock() = Some(task);
    }

    /// Cancels the running loop, if any.
    pub fn stop(&self) {
        if let Some(task) = self.handle.lock().take() {
            task.abort();
        }
    }

    /// Whether a loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for PositionPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
