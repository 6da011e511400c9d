//! Hand-written host fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    Analyser, AnalyserOptions, AudioBuffer, AudioDecoder, AudioFetcher, AudioGraph, BridgeError,
    Clock, DrawingSurface, EndedCallback, FillStyle, FrameCallback, FrameHandle, FrameScheduler,
    SourceNode,
};
use bytes::Bytes;
use core_runtime::config::share_surface;
use core_runtime::{EngineConfig, EventStream, VisualizerEvent};
use core_visualizer::{VisualizerEngine, VisualizerHandle, VisualizerOptions};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

// ============================================================================
// Frame scheduler
// ============================================================================

/// Frames fire only when a test calls [`ManualFrameScheduler::fire`].
#[derive(Default)]
pub struct ManualFrameScheduler {
    next_id: Mutex<u64>,
    pending: Mutex<BTreeMap<u64, FrameCallback>>,
    cancelled: AtomicUsize,
}

impl ManualFrameScheduler {
    /// Fire every outstanding request once. Returns how many fired.
    pub fn fire(&self) -> usize {
        let due: Vec<FrameCallback> = std::mem::take(&mut *self.pending.lock())
            .into_values()
            .collect();
        let fired = due.len();
        for callback in due {
            callback(Duration::from_millis(16));
        }
        fired
    }

    /// Fire `n` display frames.
    pub fn run_frames(&self, n: usize) -> usize {
        (0..n).map(|_| self.fire()).sum()
    }

    pub fn outstanding(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let mut next_id = self.next_id.lock();
        *next_id += 1;
        self.pending.lock().insert(*next_id, callback);
        FrameHandle::new(*next_id)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if self.pending.lock().remove(&handle.id()).is_some() {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ============================================================================
// Drawing surface
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Clear,
    Fill(FillStyle),
    Rect { x: f32, y: f32, width: f32, height: f32 },
}

/// Records every call; clones share the log.
#[derive(Clone)]
pub struct RecordingSurface {
    width: f32,
    height: f32,
    ops: Arc<Mutex<Vec<SurfaceOp>>>,
}

impl RecordingSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ops: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.ops.lock().clone()
    }

    /// Number of full draw passes (each starts with a clear).
    pub fn passes(&self) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|op| matches!(op, SurfaceOp::Clear))
            .count()
    }

    pub fn rects(&self) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|op| matches!(op, SurfaceOp::Rect { .. }))
            .count()
    }

    pub fn reset(&self) {
        self.ops.lock().clear();
    }
}

impl DrawingSurface for RecordingSurface {
    fn width(&self) -> f32 {
        self.width
    }

    fn height(&self) -> f32 {
        self.height
    }

    fn clear_rect(&mut self, _x: f32, _y: f32, _width: f32, _height: f32) {
        self.ops.lock().push(SurfaceOp::Clear);
    }

    fn set_fill_style(&mut self, style: FillStyle) {
        self.ops.lock().push(SurfaceOp::Fill(style));
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.ops.lock().push(SurfaceOp::Rect {
            x,
            y,
            width,
            height,
        });
    }
}

// ============================================================================
// Audio graph
// ============================================================================

/// Analyser that reports the same magnitude in every bin.
pub struct FlatAnalyser {
    fft_size: usize,
    level: u8,
}

impl FlatAnalyser {
    pub fn new(fft_size: usize, level: u8) -> Self {
        Self { fft_size, level }
    }
}

impl Analyser for FlatAnalyser {
    fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn byte_frequency_data(&self, out: &mut [u8]) {
        out.fill(self.level);
    }
}

/// Observable state of one fake source node.
#[derive(Default)]
pub struct FakeSource {
    pub started: Mutex<bool>,
    pub stopped: Mutex<bool>,
    pub connected_to_destination: Mutex<bool>,
    /// `fft_size` of the analyser this node feeds.
    pub analyser_fft: Mutex<Option<usize>>,
    pub volume: Mutex<f32>,
    pub playback_rate: Mutex<f32>,
    pub looping: Mutex<bool>,
    on_ended: Mutex<Option<EndedCallback>>,
}

impl FakeSource {
    pub fn has_ended_callback(&self) -> bool {
        self.on_ended.lock().is_some()
    }

    pub fn is_started(&self) -> bool {
        *self.started.lock()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    fn fire_ended(&self) -> bool {
        let callback = self.on_ended.lock().take();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

struct FakeSourceNode {
    state: Arc<FakeSource>,
}

impl SourceNode for FakeSourceNode {
    fn connect_to_destination(&mut self) -> BridgeResult<()> {
        *self.state.connected_to_destination.lock() = true;
        Ok(())
    }

    fn connect_to_analyser(&mut self, analyser: &Arc<dyn Analyser>) -> BridgeResult<()> {
        *self.state.analyser_fft.lock() = Some(analyser.fft_size());
        Ok(())
    }

    fn disconnect(&mut self) {
        *self.state.connected_to_destination.lock() = false;
        *self.state.analyser_fft.lock() = None;
    }

    fn start(&mut self) -> BridgeResult<()> {
        *self.state.started.lock() = true;
        Ok(())
    }

    // Like a browser node: stopping fires whatever ended callback is still
    // registered.
    fn stop(&mut self) -> BridgeResult<()> {
        *self.state.stopped.lock() = true;
        self.state.fire_ended();
        Ok(())
    }

    fn set_on_ended(&mut self, callback: Option<EndedCallback>) {
        *self.state.on_ended.lock() = callback;
    }

    fn volume(&self) -> f32 {
        *self.state.volume.lock()
    }

    fn set_volume(&mut self, volume: f32) -> BridgeResult<()> {
        *self.state.volume.lock() = volume;
        Ok(())
    }

    fn playback_rate(&self) -> f32 {
        *self.state.playback_rate.lock()
    }

    fn set_playback_rate(&mut self, rate: f32) -> BridgeResult<()> {
        *self.state.playback_rate.lock() = rate;
        Ok(())
    }

    fn looping(&self) -> bool {
        *self.state.looping.lock()
    }

    fn set_looping(&mut self, looping: bool) -> BridgeResult<()> {
        *self.state.looping.lock() = looping;
        Ok(())
    }
}

/// Graph whose sources end only when a test says so.
pub struct FakeAudioGraph {
    level: u8,
    sources: Mutex<Vec<Arc<FakeSource>>>,
    analysers: Mutex<Vec<AnalyserOptions>>,
    pub suspends: AtomicUsize,
    pub resumes: AtomicUsize,
}

impl FakeAudioGraph {
    pub fn new(level: u8) -> Self {
        Self {
            level,
            sources: Mutex::new(Vec::new()),
            analysers: Mutex::new(Vec::new()),
            suspends: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
        }
    }

    pub fn sources(&self) -> Vec<Arc<FakeSource>> {
        self.sources.lock().clone()
    }

    pub fn latest_source(&self) -> Option<Arc<FakeSource>> {
        self.sources.lock().last().cloned()
    }

    pub fn analysers(&self) -> Vec<AnalyserOptions> {
        self.analysers.lock().clone()
    }

    /// Natural completion of the most recent source. Returns `false` if it
    /// had no ended callback registered.
    pub fn finish_playing(&self) -> bool {
        self.latest_source()
            .map(|source| source.fire_ended())
            .unwrap_or(false)
    }

    /// Natural completion of a specific source.
    pub fn finish(&self, index: usize) -> bool {
        let source = self.sources.lock().get(index).cloned();
        source.map(|source| source.fire_ended()).unwrap_or(false)
    }
}

impl AudioGraph for FakeAudioGraph {
    fn create_analyser(&self, options: AnalyserOptions) -> BridgeResult<Arc<dyn Analyser>> {
        self.analysers.lock().push(options);
        Ok(Arc::new(FlatAnalyser::new(options.fft_size, self.level)))
    }

    fn create_source(&self, _buffer: AudioBuffer) -> BridgeResult<Box<dyn SourceNode>> {
        let state = Arc::new(FakeSource::default());
        *state.volume.lock() = 1.0;
        *state.playback_rate.lock() = 1.0;
        self.sources.lock().push(Arc::clone(&state));
        Ok(Box::new(FakeSourceNode { state }))
    }

    fn suspend(&self) -> BridgeResult<()> {
        self.suspends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self) -> BridgeResult<()> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Clock
// ============================================================================

#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

// ============================================================================
// Fetch and decode
// ============================================================================

/// Serves a fixed payload for every identifier, except ones marked missing.
/// A test can hold an identifier's fetch until it releases the gate.
#[derive(Default)]
pub struct FakeFetcher {
    calls: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    missing: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
}

impl FakeFetcher {
    pub fn mark_missing(&self, uri: &str) {
        self.missing.lock().insert(uri.to_string());
    }

    /// Hold the next fetch of `uri` until the returned sender fires or drops.
    pub fn hold(&self, uri: &str) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.gates.lock().insert(uri.to_string(), gate);
        release
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Fetches that got past their gate and returned.
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().clone()
    }
}

#[async_trait]
impl AudioFetcher for FakeFetcher {
    async fn fetch(&self, uri: String) -> BridgeResult<Bytes> {
        self.calls.lock().push(uri.clone());

        let gate = self.gates.lock().remove(&uri);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.completed.lock().push(uri.clone());

        if self.missing.lock().contains(&uri) {
            return Err(BridgeError::fetch(uri, "HTTP 404 Not Found"));
        }
        Ok(Bytes::from_static(b"RIFF....WAVE"))
    }
}

/// Turns any non-empty payload into one second of silence.
pub struct FakeDecoder;

#[async_trait]
impl AudioDecoder for FakeDecoder {
    async fn decode(&self, data: Bytes, _hint: Option<String>) -> BridgeResult<AudioBuffer> {
        if data.is_empty() {
            return Err(BridgeError::Decode("empty payload".into()));
        }
        Ok(AudioBuffer::new(vec![0.0; 8_000], 8_000, 1))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub handle: VisualizerHandle,
    /// Consumed by [`Harness::wait_for`].
    pub events: EventStream,
    /// Every event since spawn, untouched by `wait_for`.
    pub history: EventStream,
    pub scheduler: Arc<ManualFrameScheduler>,
    pub graph: Arc<FakeAudioGraph>,
    pub surface: RecordingSurface,
    pub clock: Arc<ManualClock>,
    pub fetcher: Arc<FakeFetcher>,
}

impl Harness {
    pub fn spawn(options: VisualizerOptions) -> Self {
        Self::spawn_with(options, Arc::new(FakeFetcher::default()))
    }

    pub fn spawn_with(options: VisualizerOptions, fetcher: Arc<FakeFetcher>) -> Self {
        let scheduler = Arc::new(ManualFrameScheduler::default());
        let graph = Arc::new(FakeAudioGraph::new(200));
        let surface = RecordingSurface::new(1024.0, 256.0);
        let clock = Arc::new(ManualClock::default());

        let config = EngineConfig::builder()
            .fetcher(fetcher.clone())
            .decoder(Arc::new(FakeDecoder))
            .audio_graph(graph.clone())
            .frame_scheduler(scheduler.clone())
            .shared_surface(share_surface(surface.clone()))
            .clock(clock.clone())
            .build()
            .expect("engine config");

        let handle = VisualizerEngine::spawn(config, options).expect("engine spawn");
        let events = handle.subscribe();
        let history = handle.subscribe();

        Self {
            handle,
            events,
            history,
            scheduler,
            graph,
            surface,
            clock,
            fetcher,
        }
    }

    /// Wait for the first event matching `predicate`, skipping the rest.
    pub async fn wait_for<F>(&mut self, predicate: F) -> VisualizerEvent
    where
        F: Fn(&VisualizerEvent) -> bool,
    {
        let deadline = Duration::from_secs(5);
        tokio::time::timeout(deadline, async {
            loop {
                let event = self.events.recv().await.expect("event stream closed");
                if predicate(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    /// Let the engine task process everything already queued.
    pub async fn settle(&self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        // A round trip through the engine guarantees earlier commands ran.
        let _ = self.handle.snapshot().await;
    }

    /// Events queued on the waiting stream.
    pub fn drain(&mut self) -> Vec<VisualizerEvent> {
        self.events.drain()
    }

    /// Every event published since spawn (or since the last call).
    pub fn history(&mut self) -> Vec<VisualizerEvent> {
        self.history.drain()
    }
}

pub fn is_loaded(event: &VisualizerEvent) -> bool {
    matches!(event, VisualizerEvent::SourceLoaded { .. })
}

pub fn is_started(event: &VisualizerEvent) -> bool {
    matches!(event, VisualizerEvent::SourceStarted { .. })
}

pub fn is_ended(event: &VisualizerEvent) -> bool {
    matches!(event, VisualizerEvent::SourceEnded { .. })
}
