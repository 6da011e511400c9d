//! End-to-end engine behavior against in-memory host fakes.

mod common;

use common::{is_ended, is_loaded, is_started, FakeFetcher, Harness};
use core_runtime::{AudioState, LocalStateStore, StateStore, VisualizerEvent};
use core_visualizer::config::RenderConfig;
use core_visualizer::{VisualizerError, VisualizerOptions};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn manual_start() -> VisualizerOptions {
    VisualizerOptions::builder()
        .autostart(false)
        .build()
        .unwrap()
}

fn state_changes(events: &[VisualizerEvent]) -> Vec<(AudioState, AudioState)> {
    events
        .iter()
        .filter_map(|event| match event {
            VisualizerEvent::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_autostart_plays_and_renders() {
    let options = VisualizerOptions::builder()
        .source("https://cdn.example.com/a.mp3")
        .stagger(2)
        .build()
        .unwrap();
    let mut h = Harness::spawn(options);

    let started = h.wait_for(is_started).await;
    assert_eq!(
        started,
        VisualizerEvent::SourceStarted {
            uri: "https://cdn.example.com/a.mp3".into()
        }
    );
    assert_eq!(h.handle.current_state(), AudioState::Playing);

    let source = h.graph.latest_source().unwrap();
    assert!(source.is_started());
    assert_eq!(*source.analyser_fft.lock(), Some(2048));

    h.scheduler.run_frames(4);
    assert_eq!(h.surface.passes(), 2);
    assert_eq!(h.surface.rects(), 2 * 1024);

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.render.executed_frames, 2);
    assert_eq!(snapshot.render.last_bin_count, 1024);
    assert_eq!(snapshot.generation, 1);
}

#[tokio::test]
async fn test_full_lifecycle_restarts_with_fresh_source_and_zero_time() {
    let mut h = Harness::spawn(manual_start());

    h.handle.set_source("song.wav").await.unwrap();
    h.wait_for(is_loaded).await;
    assert_eq!(h.handle.current_state(), AudioState::Pending);
    assert!(h.surface.ops().is_empty(), "nothing renders before play");

    h.handle.play().await.unwrap();
    h.clock.advance(Duration::from_secs(2));
    h.handle.pause().await.unwrap();
    h.handle.play().await.unwrap();
    h.clock.advance(Duration::from_secs(1));

    assert!(h.graph.finish_playing());
    h.wait_for(is_ended).await;
    assert_eq!(h.handle.current_state(), AudioState::Ended);
    assert_eq!(h.scheduler.outstanding(), 0, "render loop stops at the end");

    h.handle.play().await.unwrap();
    assert_eq!(h.handle.current_state(), AudioState::Playing);

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.elapsed, Duration::ZERO);

    let sources = h.graph.sources();
    assert_eq!(sources.len(), 2, "restart builds a new node");
    assert!(sources[1].is_started());
    assert_eq!(h.fetcher.calls().len(), 1, "decoded buffer is reused");

    let transitions = state_changes(&h.history());
    assert_eq!(
        transitions,
        vec![
            (AudioState::Unset, AudioState::Loading),
            (AudioState::Loading, AudioState::Pending),
            (AudioState::Pending, AudioState::Playing),
            (AudioState::Playing, AudioState::Paused),
            (AudioState::Paused, AudioState::Playing),
            (AudioState::Playing, AudioState::Ended),
            (AudioState::Ended, AudioState::Playing),
        ]
    );
}

#[tokio::test]
async fn test_superseded_load_never_takes_effect() {
    let fetcher = Arc::new(FakeFetcher::default());
    let release_slow = fetcher.hold("slow.wav");
    let mut h = Harness::spawn_with(manual_start(), fetcher);

    h.handle.set_source("slow.wav").await.unwrap();
    h.handle.set_source("fast.wav").await.unwrap();

    let loaded = h.wait_for(is_loaded).await;
    assert!(matches!(loaded, VisualizerEvent::SourceLoaded { ref uri, .. } if uri == "fast.wav"));

    let _ = release_slow.send(());
    h.settle().await;

    let loads: Vec<_> = h.history().into_iter().filter(is_loaded).collect();
    assert_eq!(loads.len(), 1, "stale load emitted {:?}", loads);
    assert_eq!(h.graph.sources().len(), 1);

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.uri.as_deref(), Some("fast.wav"));
    assert_eq!(snapshot.generation, 2);
    assert_eq!(snapshot.state, AudioState::Pending);
}

#[tokio::test]
async fn test_queued_result_of_replaced_load_is_dropped() {
    let fetcher = Arc::new(FakeFetcher::default());
    let release_slow = fetcher.hold("slow.wav");
    let mut h = Harness::spawn_with(manual_start(), fetcher.clone());

    h.handle.set_source("slow.wav").await.unwrap();

    // The released load runs to completion before the engine sees the
    // replacement, so its result is queued behind the new source.
    let _ = release_slow.send(());
    h.handle.set_source("fast.wav").await.unwrap();
    assert!(fetcher.completed().contains(&"slow.wav".to_string()));

    let loaded = h.wait_for(is_loaded).await;
    assert!(matches!(loaded, VisualizerEvent::SourceLoaded { ref uri, .. } if uri == "fast.wav"));
    h.settle().await;

    let events = h.history();
    let loads: Vec<_> = events.iter().filter(|e| is_loaded(e)).collect();
    assert_eq!(loads.len(), 1, "stale load emitted {:?}", loads);
    assert!(!events
        .iter()
        .any(|e| matches!(e, VisualizerEvent::LoadFailed { .. })));
    assert_eq!(h.graph.sources().len(), 1);

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.uri.as_deref(), Some("fast.wav"));
    assert_eq!(snapshot.generation, 2);
    assert_eq!(snapshot.state, AudioState::Pending);
}

#[tokio::test]
async fn test_programmatic_stop_never_reports_ended() {
    let options = VisualizerOptions::builder().source("a.wav").build().unwrap();
    let mut h = Harness::spawn(options);
    h.wait_for(is_started).await;
    let first = h.graph.latest_source().unwrap();

    h.handle.set_source("b.wav").await.unwrap();
    h.wait_for(is_started).await;

    assert!(first.is_stopped());
    assert!(!first.has_ended_callback());
    assert!(!h.graph.finish(0), "replaced source keeps no ended callback");

    h.handle.shutdown().await.unwrap();
    let events = h.history();
    assert_eq!(events.iter().filter(|e| is_started(e)).count(), 2);
    assert!(!events.iter().any(is_ended), "unexpected ended: {:?}", events);
}

#[tokio::test]
async fn test_load_failure_returns_to_unset() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.mark_missing("https://x.io/missing.mp3");
    let mut h = Harness::spawn_with(manual_start(), fetcher);

    h.handle.set_source("https://x.io/missing.mp3").await.unwrap();
    let failed = h
        .wait_for(|e| matches!(e, VisualizerEvent::LoadFailed { .. }))
        .await;

    match failed {
        VisualizerEvent::LoadFailed { uri, message } => {
            assert_eq!(uri, "https://x.io/missing.mp3");
            assert!(message.contains("404"), "{}", message);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(h.handle.current_state(), AudioState::Unset);
    assert!(h.graph.sources().is_empty());
    assert!(matches!(
        h.handle.play().await,
        Err(VisualizerError::NoSourceLoaded)
    ));
}

#[tokio::test]
async fn test_out_of_range_volume_fails_before_playback() {
    let err = VisualizerOptions::builder()
        .source("a.wav")
        .volume(1.5)
        .build()
        .unwrap_err();
    assert!(matches!(err, VisualizerError::InvalidVolume(v) if v == 1.5));

    let options = VisualizerOptions::builder().source("a.wav").build().unwrap();
    let mut h = Harness::spawn(options);
    h.wait_for(is_started).await;

    let err = h.handle.set_volume(1.5).await.unwrap_err();
    assert!(err.is_configuration_error());
    assert_eq!(*h.graph.latest_source().unwrap().volume.lock(), 1.0);

    h.handle.set_volume(0.25).await.unwrap();
    assert_eq!(*h.graph.latest_source().unwrap().volume.lock(), 0.25);
}

#[tokio::test]
async fn test_elapsed_time_excludes_pauses() {
    let mut h = Harness::spawn(manual_start());
    h.handle.set_source("a.wav").await.unwrap();
    h.wait_for(is_loaded).await;

    h.handle.play().await.unwrap();
    h.clock.advance(Duration::from_secs(3));
    h.handle.pause().await.unwrap();

    let paused = h
        .wait_for(|e| matches!(e, VisualizerEvent::SourcePaused { .. }))
        .await;
    assert!(matches!(paused, VisualizerEvent::SourcePaused { elapsed_ms: 3000, .. }));
    assert_eq!(h.graph.suspends.load(Ordering::SeqCst), 1);

    h.clock.advance(Duration::from_secs(10));
    h.handle.resume().await.unwrap();
    let playing = h
        .wait_for(|e| matches!(e, VisualizerEvent::SourcePlaying { .. }))
        .await;
    assert!(matches!(playing, VisualizerEvent::SourcePlaying { elapsed_ms: 3000, .. }));

    h.clock.advance(Duration::from_secs(2));
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.elapsed, Duration::from_secs(5));
}

#[tokio::test]
async fn test_pause_stops_rendering_and_resume_restarts_it() {
    let options = VisualizerOptions::builder().source("a.wav").build().unwrap();
    let mut h = Harness::spawn(options);
    h.wait_for(is_started).await;

    h.scheduler.run_frames(2);
    h.handle.pause().await.unwrap();
    assert_eq!(h.scheduler.outstanding(), 0);
    assert_eq!(h.scheduler.run_frames(5), 0);
    assert_eq!(h.surface.passes(), 2);

    h.handle.resume().await.unwrap();
    h.scheduler.run_frames(1);
    assert_eq!(h.surface.passes(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_time_updates_only_while_playing() {
    let options = VisualizerOptions::builder()
        .source("a.wav")
        .time_update_interval(Duration::from_millis(500))
        .build()
        .unwrap();
    let mut h = Harness::spawn(options);
    h.wait_for(is_started).await;

    h.wait_for(|e| matches!(e, VisualizerEvent::TimeUpdate { .. }))
        .await;

    h.handle.pause().await.unwrap();
    h.drain();
    tokio::time::sleep(Duration::from_secs(10)).await;
    h.settle().await;

    let ticks = h
        .drain()
        .into_iter()
        .filter(|e| matches!(e, VisualizerEvent::TimeUpdate { .. }))
        .count();
    assert_eq!(ticks, 0, "notifier must be silent while paused");
}

#[tokio::test(start_paused = true)]
async fn test_time_update_period_scales_with_rate() {
    let options = VisualizerOptions::builder()
        .source("a.wav")
        .playback_rate(2.0)
        .build()
        .unwrap();
    let mut h = Harness::spawn(options);
    h.wait_for(is_started).await;
    h.drain();

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    h.settle().await;

    let ticks = h
        .drain()
        .into_iter()
        .filter(|e| matches!(e, VisualizerEvent::TimeUpdate { .. }))
        .count();
    assert_eq!(ticks, 4, "1s interval at rate 2.0 ticks every 500ms");
}

#[tokio::test]
async fn test_panicking_render_function_then_clean_rebuild() {
    let options = VisualizerOptions::builder().source("a.wav").build().unwrap();
    let mut h = Harness::spawn(options);
    h.wait_for(is_started).await;

    let explode = Arc::new(AtomicBool::new(true));
    let trigger = Arc::clone(&explode);
    let faulty = RenderConfig::default().with_bar_height(move |magnitude, _, _| {
        if trigger.load(Ordering::SeqCst) {
            panic!("user bar height failed");
        }
        magnitude as f32
    });
    h.handle.set_render_config(faulty).await.unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| h.scheduler.fire()));
    assert!(result.is_err(), "panic must propagate to the host");
    assert_eq!(h.scheduler.outstanding(), 0);
    assert_eq!(h.handle.current_state(), AudioState::Playing);

    explode.store(false, Ordering::SeqCst);
    h.surface.reset();
    h.handle
        .set_render_config(RenderConfig::default())
        .await
        .unwrap();

    assert_eq!(h.scheduler.outstanding(), 1);
    h.scheduler.run_frames(2);
    assert_eq!(h.surface.passes(), 2);
}

#[tokio::test]
async fn test_play_rearms_loop_after_panicking_render_function() {
    let options = VisualizerOptions::builder().source("a.wav").build().unwrap();
    let mut h = Harness::spawn(options);
    h.wait_for(is_started).await;

    let explode = Arc::new(AtomicBool::new(true));
    let trigger = Arc::clone(&explode);
    let faulty = RenderConfig::default().with_bar_height(move |magnitude, _, _| {
        if trigger.load(Ordering::SeqCst) {
            panic!("user bar height failed");
        }
        magnitude as f32
    });
    h.handle.set_render_config(faulty).await.unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| h.scheduler.fire()));
    assert!(result.is_err());
    assert_eq!(h.scheduler.outstanding(), 0);

    h.handle.play().await.unwrap();
    assert_eq!(h.handle.current_state(), AudioState::Playing);
    assert_eq!(h.scheduler.outstanding(), 1, "play re-arms the stalled loop");

    h.handle.play().await.unwrap();
    assert_eq!(h.scheduler.outstanding(), 1, "a running loop is not armed twice");

    explode.store(false, Ordering::SeqCst);
    h.surface.reset();
    h.scheduler.fire();
    assert_eq!(h.surface.passes(), 1);
    assert_eq!(h.handle.snapshot().await.unwrap().render.executed_frames, 1);
}

#[tokio::test]
async fn test_render_rebuild_keeps_exactly_one_loop() {
    let options = VisualizerOptions::builder().source("a.wav").build().unwrap();
    let mut h = Harness::spawn(options);
    h.wait_for(is_started).await;

    for stagger in [2, 3, 1] {
        h.handle
            .set_render_config(RenderConfig::default().with_stagger(stagger))
            .await
            .unwrap();
        assert_eq!(h.scheduler.outstanding(), 1);
    }

    h.surface.reset();
    h.scheduler.run_frames(3);
    assert_eq!(h.surface.passes(), 3);

    let err = h
        .handle
        .set_render_config(RenderConfig::default().with_stagger(0))
        .await
        .unwrap_err();
    assert!(matches!(err, VisualizerError::InvalidStagger(0)));
    assert_eq!(h.scheduler.outstanding(), 1);
}

#[tokio::test]
async fn test_resolution_change_rewires_source() {
    let options = VisualizerOptions::builder().source("a.wav").build().unwrap();
    let mut h = Harness::spawn(options);
    h.wait_for(is_started).await;

    h.handle.set_fft_size(512).await.unwrap();

    assert_eq!(h.graph.analysers().len(), 2);
    assert_eq!(*h.graph.latest_source().unwrap().analyser_fft.lock(), Some(512));

    h.surface.reset();
    h.scheduler.run_frames(1);
    assert_eq!(h.surface.rects(), 256);

    assert!(matches!(
        h.handle.set_fft_size(1000).await,
        Err(VisualizerError::InvalidResolution(1000))
    ));
}

#[tokio::test]
async fn test_attribute_writes_pass_through() {
    let options = VisualizerOptions::builder().source("a.wav").build().unwrap();
    let mut h = Harness::spawn(options);
    h.wait_for(is_started).await;
    let source = h.graph.latest_source().unwrap();
    h.history();

    h.handle.set_playback_rate(1.5).await.unwrap();
    h.handle.set_looping(true).await.unwrap();

    assert_eq!(*source.playback_rate.lock(), 1.5);
    assert!(*source.looping.lock());
    assert_eq!(h.handle.current_state(), AudioState::Playing);

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.settings.playback_rate, 1.5);
    assert!(snapshot.settings.looping);

    assert!(
        state_changes(&h.history()).is_empty(),
        "attribute writes never touch the state machine"
    );
}

#[tokio::test]
async fn test_request_transition() {
    let mut h = Harness::spawn(manual_start());

    assert!(matches!(
        h.handle.request_transition(AudioState::Loading).await,
        Err(VisualizerError::NoSourceLoaded)
    ));

    h.handle.set_source("a.wav").await.unwrap();
    h.wait_for(is_loaded).await;

    h.handle
        .request_transition(AudioState::Playing)
        .await
        .unwrap();
    assert_eq!(h.handle.current_state(), AudioState::Playing);

    let err = h
        .handle
        .request_transition(AudioState::Ended)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VisualizerError::InvalidTransition {
            from: AudioState::Playing,
            to: AudioState::Ended
        }
    ));

    h.handle
        .request_transition(AudioState::Loading)
        .await
        .unwrap();
    h.wait_for(is_loaded).await;
    assert_eq!(h.handle.current_state(), AudioState::Pending);
    assert_eq!(h.fetcher.calls().len(), 1, "same identifier reuses the buffer");
}

#[tokio::test]
async fn test_invalid_commands_in_wrong_state() {
    let mut h = Harness::spawn(manual_start());

    assert!(matches!(h.handle.play().await, Err(VisualizerError::NoSourceLoaded)));
    assert!(matches!(
        h.handle.pause().await,
        Err(VisualizerError::InvalidTransition { .. })
    ));

    h.handle.set_source("a.wav").await.unwrap();
    h.wait_for(is_loaded).await;
    assert!(matches!(
        h.handle.resume().await,
        Err(VisualizerError::InvalidTransition {
            from: AudioState::Pending,
            ..
        })
    ));

    h.handle.play().await.unwrap();
    h.handle.play().await.unwrap();
    assert_eq!(h.graph.sources().len(), 1);
}

#[tokio::test]
async fn test_host_owned_state_store() {
    let store = Arc::new(LocalStateStore::new());
    let scheduler = Arc::new(common::ManualFrameScheduler::default());
    let graph = Arc::new(common::FakeAudioGraph::new(10));
    let config = core_runtime::EngineConfig::builder()
        .fetcher(Arc::new(FakeFetcher::default()))
        .decoder(Arc::new(common::FakeDecoder))
        .audio_graph(graph)
        .frame_scheduler(scheduler)
        .surface(common::RecordingSurface::new(100.0, 100.0))
        .clock(Arc::new(common::ManualClock::default()))
        .state_store(store.clone())
        .build()
        .unwrap();
    let handle = core_visualizer::VisualizerEngine::spawn(config, manual_start()).unwrap();
    let mut events = handle.subscribe();

    handle.set_source("a.wav").await.unwrap();
    loop {
        if let VisualizerEvent::SourceLoaded { .. } = events.recv().await.unwrap() {
            break;
        }
    }

    assert_eq!(store.current(), AudioState::Pending);
    handle.play().await.unwrap();
    assert_eq!(store.current(), AudioState::Playing);
    assert_eq!(handle.current_state(), AudioState::Playing);
}

#[tokio::test]
async fn test_shutdown_closes_handle() {
    let options = VisualizerOptions::builder().source("a.wav").build().unwrap();
    let mut h = Harness::spawn(options);
    h.wait_for(is_started).await;

    h.handle.shutdown().await.unwrap();
    assert_eq!(h.scheduler.outstanding(), 0);
    assert!(h.graph.latest_source().unwrap().is_stopped());

    assert!(matches!(
        h.handle.play().await,
        Err(VisualizerError::EngineClosed)
    ));
}
