//! # Visualizer Engine
//!
//! The orchestrator: one tokio task that owns the playback state machine,
//! the loader, the timing tracker, the render loop and the wired source.
//!
//! ## Architecture
//!
//! ```text
//! VisualizerHandle ──┐
//! load task ─────────┼──> mpsc ──> engine task ──> AudioGraph / RenderLoop
//! ended callback ────┘                 │
//!                                      └──> EventBus (broadcast)
//! ```
//!
//! Everything that can change engine state arrives as a message, so state is
//! only ever touched from the engine task. The four triggers are:
//!
//! - **source change**: full teardown, then an asynchronous fetch/decode
//! - **state commands**: play, pause, resume, explicit transition requests
//! - **render reconfiguration**: rebuild the render loop, keep the position
//! - **attribute writes**: volume, rate and looping pass straight through
//!
//! ## Stale completions
//!
//! Every load carries a generation number and every wired source a serial.
//! A load result or natural-end signal whose number is not current is logged
//! and dropped. Tearing a source down removes its ended callback first, so a
//! programmatic stop never reports a natural end.
//!
//! ## Lifetime
//!
//! The engine task keeps only weak senders for its own callbacks. Dropping
//! every [`VisualizerHandle`] (or calling [`VisualizerHandle::shutdown`])
//! ends the task and releases the source.

use crate::config::{
    validate_fft_size, validate_playback_rate, validate_volume, PlaybackSettings, RenderConfig,
    VisualizerOptions,
};
use crate::error::{Result, VisualizerError};
use crate::loader::{attach, AudioSourceLoader, LoadedAudio, PlayableSource, SourceParams};
use crate::render::{RenderLoop, RenderStats};
use crate::state::PlaybackStateMachine;
use crate::timing::TimingTracker;
use bridge_traits::{Analyser, AnalyserOptions, AudioBuffer, AudioGraph, FrameScheduler};
use core_async::sync::{mpsc, oneshot};
use core_async::task::AbortHandle;
use core_runtime::config::{EngineConfig, SharedSurface};
use core_runtime::events::{AudioState, EventBus, EventStream, VisualizerEvent};
use core_runtime::logging::redact_uri;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    SetSource(String, Reply<()>),
    Play(Reply<()>),
    Pause(Reply<()>),
    Resume(Reply<()>),
    RequestTransition(AudioState, Reply<()>),
    SetRenderConfig(RenderConfig, Reply<()>),
    SetFftSize(usize, Reply<()>),
    SetPlaybackRate(f32, Reply<()>),
    SetVolume(f32, Reply<()>),
    SetLooping(bool, Reply<()>),
    Snapshot(Reply<EngineSnapshot>),
    Shutdown(Reply<()>),
}

enum EngineMessage {
    Command(Command),
    LoadFinished {
        generation: u64,
        result: Result<LoadedAudio>,
    },
    SourceEnded {
        serial: u64,
    },
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub state: AudioState,
    pub uri: Option<String>,
    pub elapsed: Duration,
    pub render: RenderStats,
    /// Number of loads started so far.
    pub generation: u64,
    pub settings: PlaybackSettings,
}

/// Entry point for starting the engine.
pub struct VisualizerEngine;

impl VisualizerEngine {
    /// Validate `config` and `options`, then start the engine task on the
    /// current tokio runtime.
    ///
    /// If `options.source` is set, loading starts immediately.
    pub fn spawn(config: EngineConfig, options: VisualizerOptions) -> Result<VisualizerHandle> {
        config.validate()?;
        options.validate()?;

        if !core_async::runtime::in_runtime() {
            return Err(VisualizerError::Runtime(core_runtime::Error::Internal(
                "the visualizer engine must be spawned from within a tokio runtime".to_string(),
            )));
        }

        let VisualizerOptions {
            source,
            settings,
            render: render_config,
        } = options;

        let analyser = create_analyser(config.audio_graph.as_ref(), &settings)?;
        let render = RenderLoop::new(
            Arc::clone(&config.frame_scheduler),
            Arc::clone(&analyser),
            config.surface.clone(),
            render_config.clone(),
        )?;

        let mut timing = TimingTracker::new(
            Arc::clone(&config.clock),
            settings.time_update_interval,
        );
        timing.set_rate(settings.playback_rate);

        let events = EventBus::new(config.event_buffer_size);
        let machine = PlaybackStateMachine::new(Arc::clone(&config.state_store));
        let (tx, rx) = mpsc::unbounded_channel();

        let engine = Engine {
            graph: Arc::clone(&config.audio_graph),
            scheduler: Arc::clone(&config.frame_scheduler),
            surface: config.surface.clone(),
            loader: Arc::new(AudioSourceLoader::new(
                Arc::clone(&config.fetcher),
                Arc::clone(&config.decoder),
            )),
            machine: machine.clone(),
            events: events.clone(),
            timing,
            settings,
            render_config,
            analyser,
            render,
            uri: None,
            source: None,
            generation: 0,
            serial: 0,
            load_task: None,
            play_when_ready: false,
            self_tx: tx.downgrade(),
        };

        info!(
            external_state = config.external_state,
            state = %machine.current(),
            "Starting visualizer engine"
        );
        core_async::spawn(engine.run(rx, source));

        Ok(VisualizerHandle {
            tx,
            events,
            machine,
        })
    }
}

fn create_analyser(
    graph: &dyn AudioGraph,
    settings: &PlaybackSettings,
) -> Result<Arc<dyn Analyser>> {
    graph
        .create_analyser(AnalyserOptions {
            fft_size: settings.fft_size,
            smoothing: settings.smoothing,
        })
        .map_err(|e| VisualizerError::GraphWiring(e.to_string()))
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable control surface for a running engine.
///
/// Setters validate their argument before anything is sent, so an
/// out-of-range value never reaches the engine.
#[derive(Clone)]
pub struct VisualizerHandle {
    tx: mpsc::UnboundedSender<EngineMessage>,
    events: EventBus,
    machine: PlaybackStateMachine,
}

impl VisualizerHandle {
    /// Replace the source. Resolves once loading has begun; completion is
    /// reported through [`VisualizerEvent::SourceLoaded`] or
    /// [`VisualizerEvent::LoadFailed`].
    pub async fn set_source(&self, uri: impl Into<String>) -> Result<()> {
        let uri = uri.into();
        self.request(|reply| Command::SetSource(uri, reply)).await
    }

    /// Start playback from `pending`, resume from `paused`, or restart from
    /// `ended`.
    pub async fn play(&self) -> Result<()> {
        self.request(Command::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(Command::Resume).await
    }

    /// Ask for a state change the way a host that owns the state would:
    /// `playing`, `paused` or `loading` (reload the current source).
    pub async fn request_transition(&self, to: AudioState) -> Result<()> {
        self.request(|reply| Command::RequestTransition(to, reply))
            .await
    }

    pub async fn set_render_config(&self, config: RenderConfig) -> Result<()> {
        config.validate()?;
        self.request(|reply| Command::SetRenderConfig(config, reply))
            .await
    }

    pub async fn set_fft_size(&self, fft_size: usize) -> Result<()> {
        let fft_size = validate_fft_size(fft_size)?;
        self.request(|reply| Command::SetFftSize(fft_size, reply))
            .await
    }

    pub async fn set_playback_rate(&self, rate: f32) -> Result<()> {
        let rate = validate_playback_rate(rate)?;
        self.request(|reply| Command::SetPlaybackRate(rate, reply))
            .await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        let volume = validate_volume(volume)?;
        self.request(|reply| Command::SetVolume(volume, reply)).await
    }

    pub async fn set_looping(&self, looping: bool) -> Result<()> {
        self.request(|reply| Command::SetLooping(looping, reply))
            .await
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        self.request(Command::Snapshot).await
    }

    /// Current state, read straight from the state store.
    pub fn current_state(&self) -> AudioState {
        self.machine.current()
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// Stop playback, release the source and end the engine task.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Command::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(EngineMessage::Command(make(reply)))
            .map_err(|_| VisualizerError::EngineClosed)?;
        response.await.map_err(|_| VisualizerError::EngineClosed)?
    }
}

impl std::fmt::Debug for VisualizerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualizerHandle")
            .field("state", &self.machine.current())
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

// ============================================================================
// Engine task
// ============================================================================

struct Engine {
    graph: Arc<dyn AudioGraph>,
    scheduler: Arc<dyn FrameScheduler>,
    surface: SharedSurface,
    loader: Arc<AudioSourceLoader>,
    machine: PlaybackStateMachine,
    events: EventBus,
    timing: TimingTracker,
    settings: PlaybackSettings,
    render_config: RenderConfig,
    analyser: Arc<dyn Analyser>,
    render: RenderLoop,
    uri: Option<String>,
    source: Option<PlayableSource>,
    /// Bumped by every load; results from older loads are dropped.
    generation: u64,
    /// Bumped by every attached source; ended signals from older ones are dropped.
    serial: u64,
    load_task: Option<AbortHandle>,
    play_when_ready: bool,
    self_tx: mpsc::WeakUnboundedSender<EngineMessage>,
}

impl Engine {
    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<EngineMessage>,
        initial_source: Option<String>,
    ) {
        if let Some(uri) = initial_source {
            let autostart = self.settings.autostart;
            if let Err(e) = self.begin_load(uri, autostart) {
                warn!(error = %e, "Failed to start initial load");
            }
        }

        loop {
            tokio::select! {
                biased;

                message = rx.recv() => {
                    let Some(message) = message else {
                        debug!("All handles dropped");
                        break;
                    };
                    if self.handle(message).is_break() {
                        break;
                    }
                }
                elapsed = self.timing.tick() => {
                    self.emit(VisualizerEvent::TimeUpdate {
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                }
            }
        }

        self.release();
        info!("Visualizer engine stopped");
    }

    fn handle(&mut self, message: EngineMessage) -> ControlFlow<()> {
        match message {
            EngineMessage::Command(command) => return self.handle_command(command),
            EngineMessage::LoadFinished { generation, result } => {
                self.on_load_finished(generation, result)
            }
            EngineMessage::SourceEnded { serial } => self.on_source_ended(serial),
        }
        ControlFlow::Continue(())
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            Command::SetSource(uri, reply) => {
                let autostart = self.settings.autostart;
                let _ = reply.send(self.begin_load(uri, autostart));
            }
            Command::Play(reply) => {
                let _ = reply.send(self.play());
            }
            Command::Pause(reply) => {
                let _ = reply.send(self.pause());
            }
            Command::Resume(reply) => {
                let _ = reply.send(self.resume());
            }
            Command::RequestTransition(to, reply) => {
                let _ = reply.send(self.request_transition(to));
            }
            Command::SetRenderConfig(config, reply) => {
                let _ = reply.send(self.set_render_config(config));
            }
            Command::SetFftSize(fft_size, reply) => {
                let _ = reply.send(self.set_fft_size(fft_size));
            }
            Command::SetPlaybackRate(rate, reply) => {
                let _ = reply.send(self.set_playback_rate(rate));
            }
            Command::SetVolume(volume, reply) => {
                let _ = reply.send(self.set_volume(volume));
            }
            Command::SetLooping(looping, reply) => {
                let _ = reply.send(self.set_looping(looping));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(Ok(self.snapshot()));
            }
            Command::Shutdown(reply) => {
                self.release();
                let _ = reply.send(Ok(()));
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // ------------------------------------------------------------------
    // Source change
    // ------------------------------------------------------------------

    #[instrument(skip_all, fields(uri = %redact_uri(&uri)))]
    fn begin_load(&mut self, uri: String, play_when_ready: bool) -> Result<()> {
        self.generation += 1;
        let generation = self.generation;

        if let Some(task) = self.load_task.take() {
            task.abort();
        }
        self.release_source();
        if self.uri.as_deref() != Some(uri.as_str()) {
            self.loader.forget();
        }

        self.uri = Some(uri.clone());
        self.play_when_ready = play_when_ready;
        self.transition(AudioState::Loading)?;

        let loader = Arc::clone(&self.loader);
        let tx = self.self_tx.clone();
        let task = core_async::spawn(async move {
            let result = loader.load(&uri).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(EngineMessage::LoadFinished { generation, result });
            }
        });
        self.load_task = Some(task.abort_handle());

        debug!(generation, play_when_ready, "Load started");
        Ok(())
    }

    fn on_load_finished(&mut self, generation: u64, result: Result<LoadedAudio>) {
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "Dropping result of superseded load"
            );
            return;
        }
        self.load_task = None;

        let loaded = match result {
            Ok(loaded) => loaded,
            Err(e) => return self.fail_load(e),
        };

        self.loader.remember(&loaded);
        let source = match self.attach_source(&loaded.uri, loaded.buffer.clone()) {
            Ok(source) => source,
            Err(e) => return self.fail_load(e),
        };
        self.source = Some(source);

        if let Err(e) = self.transition(AudioState::Pending) {
            warn!(error = %e, "Loaded source could not become ready");
            return;
        }
        info!(
            uri = %redact_uri(&loaded.uri),
            from_cache = loaded.from_cache,
            "Source ready"
        );
        self.emit(VisualizerEvent::SourceLoaded {
            uri: loaded.uri,
            duration_ms: loaded.buffer.duration().as_millis() as u64,
        });

        if self.play_when_ready {
            if let Err(e) = self.start_source() {
                warn!(error = %e, "Autostart failed");
            }
        }
    }

    fn fail_load(&mut self, error: VisualizerError) {
        let uri = self.uri.clone().unwrap_or_default();
        warn!(uri = %redact_uri(&uri), error = %error, "Source failed to load");

        if let Err(e) = self.transition(AudioState::Unset) {
            warn!(error = %e, "Could not leave loading state");
        }
        self.emit(VisualizerEvent::LoadFailed {
            uri,
            message: error.to_string(),
        });
    }

    fn attach_source(&mut self, uri: &str, buffer: AudioBuffer) -> Result<PlayableSource> {
        self.serial += 1;
        let serial = self.serial;
        let tx = self.self_tx.clone();

        attach(
            self.graph.as_ref(),
            uri,
            buffer,
            &self.analyser,
            self.source_params(),
            serial,
            Box::new(move || {
                if let Some(tx) = tx.upgrade() {
                    let _ = tx.send(EngineMessage::SourceEnded { serial });
                }
            }),
        )
    }

    fn source_params(&self) -> SourceParams {
        SourceParams {
            volume: self.settings.volume,
            playback_rate: self.settings.playback_rate,
            looping: self.settings.looping,
        }
    }

    // ------------------------------------------------------------------
    // State commands
    // ------------------------------------------------------------------

    fn play(&mut self) -> Result<()> {
        match self.machine.current() {
            AudioState::Pending => self.start_source(),
            AudioState::Paused => self.resume(),
            AudioState::Playing => {
                // Re-arms a loop whose frame unwound out of a user closure.
                self.render.start();
                Ok(())
            }
            AudioState::Ended => self.restart(),
            AudioState::Unset => Err(VisualizerError::NoSourceLoaded),
            AudioState::Loading => Err(VisualizerError::InvalidTransition {
                from: AudioState::Loading,
                to: AudioState::Playing,
            }),
        }
    }

    /// Start the wired source from the top: `pending -> playing` or
    /// `ended -> playing`.
    fn start_source(&mut self) -> Result<()> {
        self.ensure_allowed(AudioState::Playing)?;
        let source = self.source.as_mut().ok_or(VisualizerError::NoSourceLoaded)?;
        source.start()?;
        self.graph.resume()?;

        self.timing.reset();
        self.timing.start();
        self.render.start();
        self.transition(AudioState::Playing)?;

        let uri = self.uri.clone().unwrap_or_default();
        info!(uri = %redact_uri(&uri), "Playback started");
        self.emit(VisualizerEvent::SourceStarted { uri });
        Ok(())
    }

    /// `ended -> playing` with a fresh node, reusing the decoded buffer when
    /// the source has not changed.
    fn restart(&mut self) -> Result<()> {
        let uri = self.uri.clone().ok_or(VisualizerError::NoSourceLoaded)?;
        let Some(buffer) = self.loader.cached(&uri) else {
            debug!("No decoded buffer to restart from; reloading");
            return self.begin_load(uri, true);
        };

        self.release_source();
        let source = self.attach_source(&uri, buffer)?;
        self.source = Some(source);
        self.start_source()
    }

    fn pause(&mut self) -> Result<()> {
        self.ensure_allowed(AudioState::Paused)?;
        self.graph.suspend()?;
        self.timing.pause();
        self.render.stop();
        self.transition(AudioState::Paused)?;

        let elapsed_ms = self.timing.elapsed().as_millis() as u64;
        self.emit(VisualizerEvent::SourcePaused {
            uri: self.uri.clone().unwrap_or_default(),
            elapsed_ms,
        });
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        let from = self.machine.current();
        if from != AudioState::Paused {
            return Err(VisualizerError::InvalidTransition {
                from,
                to: AudioState::Playing,
            });
        }

        self.graph.resume()?;
        self.timing.resume();
        self.render.start();
        self.transition(AudioState::Playing)?;

        let elapsed_ms = self.timing.elapsed().as_millis() as u64;
        self.emit(VisualizerEvent::SourcePlaying {
            uri: self.uri.clone().unwrap_or_default(),
            elapsed_ms,
        });
        Ok(())
    }

    fn request_transition(&mut self, to: AudioState) -> Result<()> {
        match to {
            AudioState::Playing => self.play(),
            AudioState::Paused => self.pause(),
            AudioState::Loading => {
                let uri = self.uri.clone().ok_or(VisualizerError::NoSourceLoaded)?;
                let autostart = self.settings.autostart;
                self.begin_load(uri, autostart)
            }
            other => Err(VisualizerError::InvalidTransition {
                from: self.machine.current(),
                to: other,
            }),
        }
    }

    fn on_source_ended(&mut self, serial: u64) {
        let current = self.source.as_ref().map(PlayableSource::serial);
        if current != Some(serial) {
            debug!(serial, ?current, "Dropping ended signal from replaced source");
            return;
        }
        if self.machine.current() != AudioState::Playing {
            debug!(serial, state = %self.machine.current(), "Ignoring ended signal");
            return;
        }

        self.render.stop();
        self.timing.reset();
        if let Err(e) = self.transition(AudioState::Ended) {
            warn!(error = %e, "Could not mark source as ended");
            return;
        }

        let uri = self.uri.clone().unwrap_or_default();
        info!(uri = %redact_uri(&uri), "Playback ended");
        self.emit(VisualizerEvent::SourceEnded { uri });
    }

    // ------------------------------------------------------------------
    // Render reconfiguration
    // ------------------------------------------------------------------

    fn set_render_config(&mut self, config: RenderConfig) -> Result<()> {
        config.validate()?;
        self.render_config = config;
        self.rebuild_render()
    }

    fn set_fft_size(&mut self, fft_size: usize) -> Result<()> {
        let fft_size = validate_fft_size(fft_size)?;
        if fft_size == self.settings.fft_size {
            return Ok(());
        }

        let settings = PlaybackSettings {
            fft_size,
            ..self.settings.clone()
        };
        let analyser = create_analyser(self.graph.as_ref(), &settings)?;
        if let Some(source) = self.source.as_mut() {
            source.rewire(&analyser)?;
        }

        self.settings = settings;
        self.analyser = analyser;
        debug!(fft_size, "Analysis resolution changed");
        self.rebuild_render()
    }

    /// Replace the render loop. The old loop is stopped before the new one
    /// exists; the new one starts only while playing.
    fn rebuild_render(&mut self) -> Result<()> {
        self.render.stop();
        self.render = RenderLoop::new(
            Arc::clone(&self.scheduler),
            Arc::clone(&self.analyser),
            self.surface.clone(),
            self.render_config.clone(),
        )?;

        if self.machine.current() == AudioState::Playing {
            self.render.start();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Attribute passthrough
    // ------------------------------------------------------------------

    fn set_playback_rate(&mut self, rate: f32) -> Result<()> {
        let rate = validate_playback_rate(rate)?;
        if let Some(source) = self.source.as_mut() {
            source.set_playback_rate(rate)?;
        }
        self.settings.playback_rate = rate;
        self.timing.set_rate(rate);
        self.rebuild_render()
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        let volume = validate_volume(volume)?;
        if let Some(source) = self.source.as_mut() {
            source.set_volume(volume)?;
        }
        self.settings.volume = volume;
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) -> Result<()> {
        if let Some(source) = self.source.as_mut() {
            source.set_looping(looping)?;
        }
        self.settings.looping = looping;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            state: self.machine.current(),
            uri: self.uri.clone(),
            elapsed: self.timing.elapsed(),
            render: self.render.stats(),
            generation: self.generation,
            settings: self.settings.clone(),
        }
    }

    fn ensure_allowed(&self, to: AudioState) -> Result<()> {
        let from = self.machine.current();
        if self.machine.can_transition(to) {
            Ok(())
        } else {
            Err(VisualizerError::InvalidTransition { from, to })
        }
    }

    fn transition(&mut self, to: AudioState) -> Result<()> {
        let transition = self.machine.transition(to)?;
        debug!(%transition, "State changed");
        self.emit(VisualizerEvent::StateChanged {
            from: transition.from,
            to: transition.to,
        });
        Ok(())
    }

    fn emit(&self, event: VisualizerEvent) {
        // No subscribers is not an error.
        let _ = self.events.emit(event);
    }

    /// Tear down the wired source and stop everything driven by it.
    fn release_source(&mut self) {
        self.render.stop();
        self.timing.reset();
        if let Some(mut source) = self.source.take() {
            source.teardown();
        }
    }

    fn release(&mut self) {
        if let Some(task) = self.load_task.take() {
            task.abort();
        }
        self.release_source();
    }
}
