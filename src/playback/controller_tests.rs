//! Integration tests for the playback controller.
//!
//! These tests drive the controller against the in-memory engine and check
//! queue synchronization, snapshot persistence and session restore.

#[cfg(test)]
mod tests {
    use std::{
        path::PathBuf,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering::SeqCst},
        },
    };

    use {
        parking_lot::{Mutex, RwLock},
        tokio::time::{Duration, sleep, timeout},
    };

    use crate::{
        config::{SettingsManager, UserSettings},
        error::PlaybackError,
        library::{
            collection::Library,
            models::{MediaItem, Playlist, Track},
        },
        playback::{
            controller::PlaybackController,
            engine::{EngineEvent, PlaybackEngine, RepeatMode},
            events::PlayerEvent,
            memory_engine::InMemoryEngine,
            snapshot::{MemorySnapshotStore, PlayerSnapshot, SavedPlayerState},
        },
        state::{PlaybackMode, PlaybackState, PlaybackStore},
    };

    // Default timeout in milliseconds for test async operations
    const TEST_TIMEOUT_MS: u64 = 1000;

    fn track(id: u32) -> Track {
        Track {
            uri: format!("content://media/{id}"),
            path: format!("/music/{id}.mp3"),
            title: Some(format!("Track {id}")),
            duration_ms: 200_000,
            ..Track::default()
        }
    }

    fn playlist(ids: &[u32]) -> Playlist {
        Playlist::new("Queue", ids.iter().map(|&id| track(id)).collect())
    }

    fn test_settings(jump_to_beginning: bool) -> Arc<SettingsManager> {
        let settings = UserSettings {
            jump_to_beginning,
            position_poll_interval_ms: 5,
            engine_ready_poll_interval_ms: 1,
            engine_ready_max_attempts: 100,
            ..UserSettings::default()
        };
        Arc::new(SettingsManager::from_settings(
            settings,
            PathBuf::from("/nonexistent/settings.json"),
        ))
    }

    struct Fixture {
        controller: PlaybackController,
        engine: Arc<InMemoryEngine>,
        snapshots: Arc<MemorySnapshotStore>,
        library: Arc<RwLock<Library>>,
        engine_events: Arc<Mutex<Vec<EngineEvent>>>,
        transitions: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn with(snapshot: Option<PlayerSnapshot>, jump_to_beginning: bool, attach: bool) -> Self {
            let snapshots = Arc::new(match snapshot {
                Some(snapshot) => MemorySnapshotStore::with_snapshot(snapshot),
                None => MemorySnapshotStore::new(),
            });
            let saved = Arc::new(SavedPlayerState::new(snapshots.clone()));
            let library = Arc::new(RwLock::new(Library::default()));
            let controller = PlaybackController::new(
                PlaybackStore::new(),
                saved,
                test_settings(jump_to_beginning),
                library.clone(),
            );

            let engine = Arc::new(InMemoryEngine::new());
            let engine_events = Arc::new(Mutex::new(Vec::new()));
            let transitions = Arc::new(AtomicUsize::new(0));
            let (events_sink, transitions_sink) = (engine_events.clone(), transitions.clone());
            engine.add_listener(Arc::new(move |event| {
                if matches!(event, EngineEvent::MediaItemTransition(_)) {
                    transitions_sink.fetch_add(1, SeqCst);
                }
                events_sink.lock().push(event);
            }));
            if attach {
                controller.attach_engine(engine.clone());
            }

            Self {
                controller,
                engine,
                snapshots,
                library,
                engine_events,
                transitions,
            }
        }

        fn new() -> Self {
            Self::with(None, true, true)
        }

        fn send(&self, event: PlayerEvent) {
            self.controller.dispatch(event);
        }

        fn settle(&self) {
            self.controller.process_pending();
        }

        fn select(&self, id: u32, queue: &Playlist) {
            self.send(PlayerEvent::SelectTrack {
                track: track(id),
                playlist: queue.clone(),
            });
            self.settle();
        }

        fn state(&self) -> PlaybackState {
            self.controller.store().get_state()
        }

        fn queue_ids(&self) -> Vec<String> {
            self.state()
                .queue
                .map(|q| q.track_list.into_iter().map(|t| t.uri).collect())
                .unwrap_or_default()
        }

        fn engine_ids(&self) -> Vec<String> {
            self.engine.media_items().into_iter().map(|m| m.uri).collect()
        }

        fn reset_counters(&self) {
            self.engine_events.lock().clear();
            self.transitions.store(0, SeqCst);
        }
    }

    #[test]
    fn test_select_track_sets_queue_current_and_position() {
        let fixture = Fixture::new();
        let queue = playlist(&[1, 2, 3]);

        fixture.send(PlayerEvent::SelectTrack {
            track: track(2),
            playlist: queue.clone(),
        });

        let state = fixture.state();
        assert_eq!(state.queue, Some(queue.clone()));
        assert_eq!(state.current_track, Some(track(2)));
        assert_eq!(state.position_ms, 0);
        assert!(fixture.engine.is_prepared());
        assert!(fixture.engine.is_playing());
        assert_eq!(fixture.engine.current_index(), Some(1));

        fixture.settle();
        let state = fixture.state();
        assert_eq!(state.current_track, Some(track(2)));
        assert!(state.is_playing);

        let stored = fixture.snapshots.stored().unwrap();
        assert_eq!(stored.playlist, Some(queue));
        assert_eq!(stored.track, Some(track(2)));
    }

    #[test]
    fn test_select_within_same_queue_does_not_reload() {
        let fixture = Fixture::new();
        let queue = playlist(&[1, 2, 3]);
        fixture.select(1, &queue);
        fixture.reset_counters();

        fixture.select(3, &queue);
        assert!(
            !fixture
                .engine_events
                .lock()
                .contains(&EngineEvent::IsPlayingChanged(false)),
            "Engine queue was reloaded"
        );
        assert_eq!(fixture.engine.current_index(), Some(2));
        assert_eq!(fixture.state().current_track, Some(track(3)));
    }

    #[test]
    fn test_select_unknown_track_still_replaces_queue() {
        let fixture = Fixture::new();
        let queue = playlist(&[1, 2]);

        fixture.send(PlayerEvent::SelectTrack {
            track: track(9),
            playlist: queue.clone(),
        });

        let state = fixture.state();
        assert_eq!(state.queue, Some(queue));
        assert_eq!(state.current_track, Some(track(1)));
        assert!(state.is_consistent());
        assert_eq!(fixture.engine.current_index(), Some(0));
    }

    #[test]
    fn test_events_dropped_until_engine_attached() {
        let fixture = Fixture::with(None, true, false);

        fixture.send(PlayerEvent::SelectTrack {
            track: track(1),
            playlist: playlist(&[1, 2]),
        });
        fixture.send(PlayerEvent::Play);
        fixture.send(PlayerEvent::SeekTo(1000));
        fixture.send(PlayerEvent::RemoveFromQueue(0));
        assert_eq!(fixture.state().queue, None);
        assert_eq!(fixture.engine.item_count(), 0);

        // UI-only and mode events do not need the engine.
        fixture.send(PlayerEvent::SetExpanded(true));
        fixture.send(PlayerEvent::TogglePlaybackMode);
        let state = fixture.state();
        assert!(state.is_expanded);
        assert_eq!(state.playback_mode, PlaybackMode::RepeatOne);

        fixture.controller.attach_engine(fixture.engine.clone());
        fixture.select(1, &playlist(&[1, 2]));
        assert_eq!(fixture.state().current_track, Some(track(1)));
        assert_eq!(fixture.engine.repeat_mode(), RepeatMode::One);
    }

    #[test]
    fn test_play_and_pause() {
        let fixture = Fixture::new();

        fixture.send(PlayerEvent::Play);
        assert!(!fixture.engine.is_playing(), "Nothing to play yet");

        fixture.select(1, &playlist(&[1, 2]));
        fixture.send(PlayerEvent::Pause);
        fixture.settle();
        assert!(!fixture.state().is_playing);

        fixture.send(PlayerEvent::Play);
        fixture.settle();
        assert!(fixture.state().is_playing);
    }

    #[test]
    fn test_seek_to_next_requires_next_item() {
        let fixture = Fixture::new();
        fixture.send(PlayerEvent::TogglePlaybackMode);
        fixture.send(PlayerEvent::TogglePlaybackMode);
        assert_eq!(fixture.engine.repeat_mode(), RepeatMode::Off);

        let queue = playlist(&[1, 2]);
        fixture.select(2, &queue);
        fixture.reset_counters();

        fixture.send(PlayerEvent::SeekToNext);
        assert_eq!(fixture.engine.current_index(), Some(1));
        assert_eq!(fixture.transitions.load(SeqCst), 0);

        fixture.select(1, &queue);
        fixture.send(PlayerEvent::SeekToNext);
        fixture.settle();
        assert_eq!(fixture.state().current_track, Some(track(2)));
    }

    #[test]
    fn test_seek_to_previous_jumps_to_beginning_past_threshold() {
        let fixture = Fixture::new();
        fixture.select(2, &playlist(&[1, 2, 3]));

        fixture.engine.set_position(5000);
        fixture.send(PlayerEvent::SeekToPrevious);
        fixture.settle();
        assert_eq!(fixture.engine.position(), 0);
        assert_eq!(fixture.engine.current_index(), Some(1));
        let state = fixture.state();
        assert_eq!(state.position_ms, 0);
        assert_eq!(state.current_track, Some(track(2)));

        fixture.engine.set_position(1000);
        fixture.send(PlayerEvent::SeekToPrevious);
        fixture.settle();
        assert_eq!(fixture.engine.current_index(), Some(0));
        assert_eq!(fixture.state().current_track, Some(track(1)));
    }

    #[test]
    fn test_seek_to_previous_threshold_is_inclusive() {
        let fixture = Fixture::new();
        fixture.select(2, &playlist(&[1, 2, 3]));

        fixture.engine.set_position(3000);
        fixture.send(PlayerEvent::SeekToPrevious);
        fixture.settle();
        assert_eq!(fixture.engine.position(), 0);
        assert_eq!(fixture.state().current_track, Some(track(2)));

        fixture.engine.set_position(2999);
        fixture.send(PlayerEvent::SeekToPrevious);
        fixture.settle();
        assert_eq!(fixture.engine.current_index(), Some(0));
        assert_eq!(fixture.state().current_track, Some(track(1)));
    }

    #[test]
    fn test_seek_to_previous_without_jump_setting() {
        let fixture = Fixture::with(None, false, true);
        fixture.select(2, &playlist(&[1, 2, 3]));

        fixture.engine.set_position(5000);
        fixture.send(PlayerEvent::SeekToPrevious);
        fixture.settle();
        assert_eq!(fixture.state().current_track, Some(track(1)));
    }

    #[test]
    fn test_seek_to_updates_engine_and_state() {
        let fixture = Fixture::new();
        fixture.send(PlayerEvent::SeekTo(42_000));
        assert_eq!(fixture.state().position_ms, 0, "No current item");

        fixture.select(1, &playlist(&[1]));
        fixture.send(PlayerEvent::SeekTo(42_000));
        assert_eq!(fixture.engine.position(), 42_000);
        assert_eq!(fixture.state().position_ms, 42_000);
    }

    #[test]
    fn test_reset_playback_preserves_mode_and_clears_snapshot() {
        let fixture = Fixture::new();
        fixture.select(1, &playlist(&[1, 2]));
        fixture.send(PlayerEvent::TogglePlaybackMode);
        fixture.send(PlayerEvent::SetExpanded(true));

        fixture.send(PlayerEvent::ResetPlayback);
        let expected = PlaybackState {
            playback_mode: PlaybackMode::RepeatOne,
            ..PlaybackState::default()
        };
        assert_eq!(fixture.state(), expected);

        fixture.settle();
        assert_eq!(fixture.state(), expected);
        assert_eq!(fixture.engine.item_count(), 0);
        assert_eq!(
            fixture.snapshots.stored().unwrap(),
            PlayerSnapshot {
                playback_mode: PlaybackMode::RepeatOne,
                ..PlayerSnapshot::default()
            }
        );
    }

    #[test]
    fn test_toggle_playback_mode_cycles() {
        let fixture = Fixture::new();
        let expected = [
            (PlaybackMode::RepeatOne, RepeatMode::One),
            (PlaybackMode::PlayQueueOnce, RepeatMode::Off),
            (PlaybackMode::Repeat, RepeatMode::All),
        ];

        for (mode, repeat_mode) in expected {
            fixture.send(PlayerEvent::TogglePlaybackMode);
            assert_eq!(fixture.state().playback_mode, mode);
            assert_eq!(fixture.engine.repeat_mode(), repeat_mode);
            assert_eq!(fixture.snapshots.stored().unwrap().playback_mode, mode);
        }
    }

    #[test]
    fn test_add_to_queue_appends_in_order() {
        let fixture = Fixture::new();
        fixture.send(PlayerEvent::AddToQueue(vec![track(3)]));
        assert_eq!(fixture.engine.item_count(), 0, "No active queue");

        fixture.select(1, &playlist(&[1, 2]));
        fixture.send(PlayerEvent::AddToQueue(vec![track(3), track(4)]));

        let expected = playlist(&[1, 2, 3, 4]);
        assert_eq!(fixture.state().queue, Some(expected.clone()));
        assert_eq!(fixture.engine.media_items(), expected.media_items());
    }

    #[test]
    fn test_play_next_inserts_after_current() {
        let fixture = Fixture::new();
        fixture.select(2, &playlist(&[1, 2, 3]));

        fixture.send(PlayerEvent::PlayNext(track(4)));
        fixture.settle();

        let expected = playlist(&[1, 2, 4, 3]);
        assert_eq!(fixture.state().queue, Some(expected.clone()));
        assert_eq!(fixture.engine.media_items(), expected.media_items());
        assert_eq!(fixture.state().current_track, Some(track(2)));

        fixture.send(PlayerEvent::SeekToNext);
        fixture.settle();
        assert_eq!(fixture.state().current_track, Some(track(4)));
    }

    #[test]
    fn test_remove_playing_track_skips_to_next() {
        let fixture = Fixture::new();
        fixture.select(1, &playlist(&[1, 2, 3]));
        assert!(fixture.state().is_playing);
        fixture.reset_counters();

        fixture.send(PlayerEvent::RemoveFromQueue(0));

        assert_eq!(fixture.transitions.load(SeqCst), 1);
        let state = fixture.state();
        assert_eq!(state.queue, Some(playlist(&[2, 3])));
        assert_eq!(state.current_track, Some(track(2)));
        assert!(state.is_consistent());

        fixture.settle();
        assert_eq!(fixture.state().current_track, Some(track(2)));
        assert_eq!(fixture.engine_ids(), fixture.queue_ids());
        assert_eq!(fixture.snapshots.stored().unwrap().track, Some(track(2)));
    }

    #[test]
    fn test_remove_other_track_keeps_current() {
        let fixture = Fixture::new();
        fixture.select(3, &playlist(&[1, 2, 3]));
        fixture.reset_counters();

        fixture.send(PlayerEvent::RemoveFromQueue(0));
        fixture.settle();

        assert_eq!(fixture.transitions.load(SeqCst), 0);
        assert_eq!(fixture.state().current_track, Some(track(3)));
        assert_eq!(fixture.engine.current_index(), Some(1));
        assert_eq!(fixture.engine_ids(), fixture.queue_ids());
    }

    #[test]
    fn test_remove_last_remaining_track() {
        let fixture = Fixture::new();
        fixture.select(1, &playlist(&[1]));

        fixture.send(PlayerEvent::RemoveFromQueue(0));
        let state = fixture.state();
        assert_eq!(state.current_track, None);
        assert!(state.is_consistent());

        fixture.settle();
        assert!(!fixture.state().is_playing);
    }

    #[test]
    fn test_remove_out_of_range_is_ignored() {
        let fixture = Fixture::new();
        fixture.select(1, &playlist(&[1, 2]));

        fixture.send(PlayerEvent::RemoveFromQueue(5));
        assert_eq!(fixture.state().queue, Some(playlist(&[1, 2])));
        assert_eq!(fixture.engine.item_count(), 2);
    }

    #[test]
    fn test_reorder_round_trip() {
        let fixture = Fixture::new();
        let original = playlist(&[1, 2, 3, 4]);
        fixture.select(2, &original);

        fixture.send(PlayerEvent::ReorderQueue { from: 0, to: 3 });
        assert_eq!(fixture.state().queue, Some(playlist(&[2, 3, 4, 1])));
        assert_eq!(fixture.engine_ids(), fixture.queue_ids());

        fixture.send(PlayerEvent::ReorderQueue { from: 3, to: 0 });
        fixture.settle();
        assert_eq!(fixture.state().queue, Some(original.clone()));
        assert_eq!(fixture.engine.media_items(), original.media_items());
        assert_eq!(fixture.state().current_track, Some(track(2)));
        assert_eq!(fixture.engine.current_index(), Some(1));
    }

    #[test]
    fn test_reorder_same_index_is_ignored() {
        let fixture = Fixture::new();
        fixture.select(1, &playlist(&[1, 2]));
        fixture.reset_counters();

        fixture.send(PlayerEvent::ReorderQueue { from: 1, to: 1 });
        assert_eq!(fixture.state().queue, Some(playlist(&[1, 2])));
        assert!(fixture.engine_events.lock().is_empty());
    }

    #[test]
    fn test_current_track_always_in_queue() {
        let fixture = Fixture::new();
        let events = vec![
            PlayerEvent::SelectTrack {
                track: track(2),
                playlist: playlist(&[1, 2, 3]),
            },
            PlayerEvent::PlayNext(track(4)),
            PlayerEvent::SeekToNext,
            PlayerEvent::RemoveFromQueue(2),
            PlayerEvent::ReorderQueue { from: 0, to: 2 },
            PlayerEvent::AddToQueue(vec![track(5)]),
            PlayerEvent::SeekToPrevious,
            PlayerEvent::RemoveFromQueue(0),
            PlayerEvent::TogglePlaybackMode,
            PlayerEvent::SeekToNext,
            PlayerEvent::SeekToNext,
            PlayerEvent::RemoveFromQueue(1),
            PlayerEvent::ResetPlayback,
            PlayerEvent::SelectTrack {
                track: track(6),
                playlist: playlist(&[6]),
            },
            PlayerEvent::RemoveFromQueue(0),
        ];

        for event in events {
            let description = format!("{event:?}");
            fixture.send(event);
            assert!(fixture.state().is_consistent(), "after {description}");
            fixture.settle();
            assert!(fixture.state().is_consistent(), "after settling {description}");
            assert_eq!(fixture.engine_ids(), fixture.queue_ids(), "after {description}");
        }
    }

    #[test]
    fn test_transition_outside_queue_clears_current() {
        let fixture = Fixture::new();
        fixture.select(1, &playlist(&[1, 2]));

        fixture.engine.add_at(2, MediaItem::new("content://media/99"));
        fixture.engine.seek_to_item(2, 0);
        fixture.settle();

        let state = fixture.state();
        assert_eq!(state.current_track, None);
        assert!(state.is_consistent());
        assert_eq!(fixture.snapshots.stored().unwrap().track, None);
    }

    #[test]
    fn test_engine_transition_resets_position() {
        let fixture = Fixture::new();
        fixture.select(1, &playlist(&[1, 2]));
        fixture.send(PlayerEvent::SeekTo(30_000));

        fixture.engine.next();
        fixture.settle();

        let state = fixture.state();
        assert_eq!(state.current_track, Some(track(2)));
        assert_eq!(state.position_ms, 0);
        assert_eq!(fixture.snapshots.stored().unwrap().track, Some(track(2)));
    }

    #[test]
    fn test_failed_snapshot_write_is_not_fatal() {
        let fixture = Fixture::new();
        fixture.snapshots.set_fail_writes(true);
        fixture.select(1, &playlist(&[1, 2]));
        assert_eq!(fixture.state().current_track, Some(track(1)));
        assert_eq!(fixture.snapshots.stored(), None);

        fixture.snapshots.set_fail_writes(false);
        fixture.send(PlayerEvent::TogglePlaybackMode);
        let stored = fixture.snapshots.stored().unwrap();
        assert_eq!(stored.playlist, Some(playlist(&[1, 2])));
        assert_eq!(stored.track, Some(track(1)));
    }

    #[test]
    fn test_library_change_refreshes_records() {
        let fixture = Fixture::new();
        let queue = playlist(&[1, 2]);
        fixture.select(2, &queue);
        fixture.send(PlayerEvent::SeekTo(5000));

        let mut retitled = track(2);
        retitled.title = Some("Remastered".to_string());
        fixture
            .controller
            .handle()
            .library_changed(vec![track(1), retitled.clone(), track(3)]);
        fixture.settle();

        let state = fixture.state();
        assert_eq!(state.current_track, Some(retitled.clone()));
        assert_eq!(
            state.queue.unwrap().track_list,
            vec![track(1), retitled.clone()]
        );
        assert_eq!(state.position_ms, 5000);
        assert_eq!(fixture.snapshots.stored().unwrap().track, Some(retitled));
    }

    #[test]
    fn test_open_uri() {
        let fixture = Fixture::new();
        *fixture.library.write() = Library::new(vec![track(1), track(2), track(3)]);
        let handle = fixture.controller.handle();

        handle.open_uri("/music/2.mp3");
        fixture.settle();
        let state = fixture.state();
        assert_eq!(state.current_track, Some(track(2)));
        assert_eq!(state.queue, Some(fixture.library.read().all_tracks()));

        handle.open_uri("content://media/3");
        handle.open_uri("/music/404.mp3");
        fixture.settle();
        assert_eq!(fixture.state().current_track, Some(track(3)));
    }

    #[test]
    fn test_open_uri_waits_for_engine_and_library() {
        let fixture = Fixture::with(None, true, false);
        let handle = fixture.controller.handle();

        handle.open_uri("/music/2.mp3");
        fixture.settle();
        assert_eq!(fixture.state().queue, None);

        let tracks = vec![track(1), track(2), track(3)];
        *fixture.library.write() = Library::new(tracks.clone());
        handle.library_changed(tracks);
        fixture.settle();
        assert_eq!(fixture.state().queue, None, "Engine not attached yet");

        fixture.controller.attach_engine(fixture.engine.clone());
        fixture.settle();
        let state = fixture.state();
        assert_eq!(state.current_track, Some(track(2)));
        assert!(state.is_consistent());
        assert!(fixture.engine.is_playing());
        assert_eq!(fixture.engine.current_index(), Some(1));
    }

    #[test]
    fn test_detached_engine_callbacks_dropped() {
        let fixture = Fixture::new();
        fixture.select(1, &playlist(&[1, 2, 3]));

        // Queued while attached, handled after detaching.
        fixture.engine.next();
        fixture.controller.detach_engine();
        fixture.settle();

        // Emitted while detached.
        fixture.engine.next();
        fixture.settle();

        assert_eq!(fixture.state().current_track, Some(track(1)));
        assert_eq!(fixture.snapshots.stored().unwrap().track, Some(track(1)));

        fixture.controller.attach_engine(fixture.engine.clone());
        fixture.controller.attach_engine(fixture.engine.clone());
        fixture.settle();

        fixture.engine.pause();
        assert_eq!(fixture.controller.process_pending(), 1);
        assert!(!fixture.state().is_playing);
    }

    #[tokio::test]
    async fn test_run_loop_consumes_handle_messages() {
        let fixture = Fixture::new();
        let controller = Arc::new(fixture.controller);
        let handle = controller.handle();
        let runner = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.run().await })
        };

        handle.send(PlayerEvent::SelectTrack {
            track: track(1),
            playlist: playlist(&[1, 2]),
        });
        handle.send(PlayerEvent::SeekToNext);

        timeout(Duration::from_millis(TEST_TIMEOUT_MS), async {
            while controller.store().get_state().current_track != Some(track(2)) {
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("Controller did not follow the engine to the next track");

        handle.shutdown();
        timeout(Duration::from_millis(TEST_TIMEOUT_MS), runner)
            .await
            .expect("Controller did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_position_polling_follows_engine() {
        let fixture = Fixture::new();
        fixture.select(1, &playlist(&[1, 2]));

        fixture.engine.set_position(777);
        sleep(Duration::from_millis(40)).await;
        assert_eq!(fixture.state().position_ms, 777);

        fixture.send(PlayerEvent::Pause);
        fixture.settle();
        fixture.engine.set_position(888);
        sleep(Duration::from_millis(40)).await;
        assert_eq!(fixture.state().position_ms, 777);
    }

    #[tokio::test]
    async fn test_restore_session_seeds_empty_engine() {
        let fixture = Fixture::with(
            Some(PlayerSnapshot {
                playlist: Some(playlist(&[1, 2, 3])),
                track: Some(track(2)),
                playback_mode: PlaybackMode::RepeatOne,
            }),
            true,
            true,
        );

        fixture.controller.restore_session().await.unwrap();
        fixture.settle();

        assert_eq!(fixture.engine.item_count(), 3);
        assert_eq!(fixture.engine.current_index(), Some(1));
        assert_eq!(fixture.engine.repeat_mode(), RepeatMode::One);
        assert!(!fixture.engine.is_playing());

        let state = fixture.state();
        assert_eq!(state.queue, Some(playlist(&[1, 2, 3])));
        assert_eq!(state.current_track, Some(track(2)));
        assert_eq!(state.playback_mode, PlaybackMode::RepeatOne);
        assert!(!state.is_playing);
    }

    #[tokio::test]
    async fn test_restore_session_adopts_running_engine() {
        let queue = playlist(&[1, 2, 3]);
        let fixture = Fixture::with(
            Some(PlayerSnapshot {
                playlist: Some(queue.clone()),
                track: Some(track(1)),
                playback_mode: PlaybackMode::Repeat,
            }),
            true,
            true,
        );
        fixture.engine.load_queue(queue.media_items());
        fixture.engine.seek_to_item(2, 0);
        fixture.engine.play();
        fixture.engine.set_position(1500);
        fixture.settle();

        fixture.controller.restore_session().await.unwrap();
        fixture.settle();

        let state = fixture.state();
        assert_eq!(state.current_track, Some(track(3)));
        assert!(state.is_playing);
        assert_eq!(state.position_ms, 1500);
        assert_eq!(fixture.engine.item_count(), 3);
    }

    #[tokio::test]
    async fn test_restore_session_keeps_earlier_selection() {
        let fixture = Fixture::with(
            Some(PlayerSnapshot {
                playlist: Some(playlist(&[1, 2, 3])),
                track: Some(track(2)),
                playback_mode: PlaybackMode::RepeatOne,
            }),
            true,
            true,
        );
        let handle = fixture.controller.handle();
        handle.send(PlayerEvent::SelectTrack {
            track: track(5),
            playlist: playlist(&[4, 5]),
        });
        handle.send(PlayerEvent::AddToQueue(vec![track(6)]));

        fixture.controller.restore_session().await.unwrap();
        fixture.settle();

        let state = fixture.state();
        assert_eq!(state.queue, Some(playlist(&[4, 5, 6])));
        assert_eq!(state.current_track, Some(track(5)));
        assert_eq!(state.playback_mode, PlaybackMode::RepeatOne);
        assert_eq!(fixture.engine_ids(), fixture.queue_ids());
    }

    #[tokio::test]
    async fn test_restore_session_after_reset_resumes_nothing() {
        let first = Fixture::new();
        first.select(1, &playlist(&[1, 2]));
        first.send(PlayerEvent::ResetPlayback);
        let stored = first.snapshots.stored().unwrap();

        let second = Fixture::with(Some(stored), true, true);
        second.controller.restore_session().await.unwrap();
        second.settle();

        let state = second.state();
        assert_eq!(state.queue, None);
        assert_eq!(state.current_track, None);
        assert_eq!(second.engine.item_count(), 0);
    }

    #[tokio::test]
    async fn test_restore_session_waits_for_late_engine() {
        let fixture = Fixture::with(
            Some(PlayerSnapshot {
                playlist: Some(playlist(&[1])),
                track: Some(track(1)),
                playback_mode: PlaybackMode::Repeat,
            }),
            true,
            false,
        );
        let controller = Arc::new(fixture.controller);
        let engine = fixture.engine.clone();

        let binder = {
            let controller = controller.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(10)).await;
                controller.attach_engine(engine);
            })
        };

        controller.restore_session().await.unwrap();
        binder.await.unwrap();
        controller.process_pending();
        assert_eq!(controller.store().get_state().current_track, Some(track(1)));
        assert_eq!(fixture.engine.item_count(), 1);
    }

    #[tokio::test]
    async fn test_restore_session_gives_up_without_engine() {
        let fixture = Fixture::with(None, true, false);
        let result = fixture.controller.restore_session().await;
        assert!(matches!(
            result,
            Err(PlaybackError::EngineNotReady { attempts: 100 })
        ));
    }
}
