//! # Engine Configuration
//!
//! Bundles the host capabilities the visualizer engine is constructed from.
//!
//! ## Overview
//!
//! [`EngineConfig::builder`] collects the bridges one by one and
//! [`build`](EngineConfigBuilder::build) fails fast, with an actionable
//! [`Error::CapabilityMissing`], when a required one was not provided.
//!
//! ## Required capabilities
//!
//! - `AudioGraph` - playback primitives and the analysis tap
//! - `DrawingSurface` - the 2D output device
//! - `AudioFetcher`, `AudioDecoder`, `FrameScheduler` - required unless the
//!   `desktop-shims` feature supplies the `bridge-desktop` defaults
//!
//! ## Optional capabilities
//!
//! - `Clock` - defaults to [`SystemClock`]
//! - `StateStore` - defaults to an engine-owned [`LocalStateStore`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::EngineConfig;
//! use std::sync::Arc;
//!
//! let config = EngineConfig::builder()
//!     .audio_graph(Arc::new(MyAudioGraph::new()))
//!     .surface(MyCanvas::new(800, 200))
//!     .frame_scheduler(Arc::new(MyVsync))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::store::{LocalStateStore, StateStore};
use bridge_traits::{
    AudioDecoder, AudioFetcher, AudioGraph, Clock, DrawingSurface, FrameScheduler, SystemClock,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Drawing surface shared between the engine and the frames it schedules.
pub type SharedSurface = Arc<Mutex<Box<dyn DrawingSurface>>>;

/// Wrap a surface for sharing.
pub fn share_surface<S>(surface: S) -> SharedSurface
where
    S: DrawingSurface + 'static,
{
    Arc::new(Mutex::new(Box::new(surface)))
}

/// Host capabilities the engine runs against.
#[derive(Clone)]
pub struct EngineConfig {
    pub fetcher: Arc<dyn AudioFetcher>,
    pub decoder: Arc<dyn AudioDecoder>,
    pub audio_graph: Arc<dyn AudioGraph>,
    pub frame_scheduler: Arc<dyn FrameScheduler>,
    pub surface: SharedSurface,
    pub clock: Arc<dyn Clock>,
    /// Canonical state storage; engine-owned unless the host supplied one
    pub state_store: Arc<dyn StateStore>,
    /// Whether `state_store` was supplied by the host
    pub external_state: bool,
    /// Capacity of the event bus channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("fetcher", &"AudioFetcher { ... }")
            .field("decoder", &"AudioDecoder { ... }")
            .field("audio_graph", &"AudioGraph { ... }")
            .field("frame_scheduler", &"FrameScheduler { ... }")
            .field("surface", &"DrawingSurface { ... }")
            .field("state", &self.state_store.current())
            .field("external_state", &self.external_state)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > 65_536 {
            return Err(Error::Config(
                "Event buffer size exceeds maximum of 65,536 events".to_string(),
            ));
        }

        Ok(())
    }
}

fn audio_graph_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioGraph".to_string(),
        message: "AudioGraph implementation is required for playback and frequency analysis. \
                 Inject the host's audio context (Web Audio, cpal-backed mixer, etc.)."
            .to_string(),
    }
}

fn surface_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "DrawingSurface".to_string(),
        message: "DrawingSurface implementation is required to render bars. \
                 Inject a canvas, framebuffer or recording surface."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn fetcher_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioFetcher".to_string(),
        message: "AudioFetcher implementation is required to load sources. \
                 Desktop: enable the 'desktop-shims' feature to use the default DesktopFetcher. \
                 Web: inject a fetch()-based implementation."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn decoder_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioDecoder".to_string(),
        message: "AudioDecoder implementation is required to decode sources. \
                 Desktop: enable the 'desktop-shims' feature to use the default SymphoniaDecoder. \
                 Web: inject a decodeAudioData()-based implementation."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn frame_scheduler_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "FrameScheduler".to_string(),
        message: "FrameScheduler implementation is required to drive the render loop. \
                 Desktop: enable the 'desktop-shims' feature to use the default IntervalFrameScheduler. \
                 Web: inject a requestAnimationFrame()-based implementation."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_fetcher() -> Result<Arc<dyn AudioFetcher>> {
    use bridge_desktop::DesktopFetcher;

    let fetcher = DesktopFetcher::new().map_err(|e| {
        Error::Internal(format!("Failed to initialize default AudioFetcher: {}", e))
    })?;
    Ok(Arc::new(fetcher))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_fetcher() -> Result<Arc<dyn AudioFetcher>> {
    Err(fetcher_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_decoder() -> Result<Arc<dyn AudioDecoder>> {
    Ok(Arc::new(bridge_desktop::SymphoniaDecoder::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_decoder() -> Result<Arc<dyn AudioDecoder>> {
    Err(decoder_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_frame_scheduler() -> Result<Arc<dyn FrameScheduler>> {
    Ok(Arc::new(bridge_desktop::IntervalFrameScheduler::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_frame_scheduler() -> Result<Arc<dyn FrameScheduler>> {
    Err(frame_scheduler_missing_error())
}

/// Builder for [`EngineConfig`].
pub struct EngineConfigBuilder {
    fetcher: Option<Arc<dyn AudioFetcher>>,
    decoder: Option<Arc<dyn AudioDecoder>>,
    audio_graph: Option<Arc<dyn AudioGraph>>,
    frame_scheduler: Option<Arc<dyn FrameScheduler>>,
    surface: Option<SharedSurface>,
    clock: Option<Arc<dyn Clock>>,
    state_store: Option<Arc<dyn StateStore>>,
    event_buffer_size: usize,
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self {
            fetcher: None,
            decoder: None,
            audio_graph: None,
            frame_scheduler: None,
            surface: None,
            clock: None,
            state_store: None,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl EngineConfigBuilder {
    /// Byte fetcher for source identifiers.
    ///
    /// Defaults to `bridge_desktop::DesktopFetcher` with `desktop-shims`.
    pub fn fetcher(mut self, fetcher: Arc<dyn AudioFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Decoder turning fetched bytes into PCM.
    ///
    /// Defaults to `bridge_desktop::SymphoniaDecoder` with `desktop-shims`.
    pub fn decoder(mut self, decoder: Arc<dyn AudioDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Playback graph (required).
    pub fn audio_graph(mut self, graph: Arc<dyn AudioGraph>) -> Self {
        self.audio_graph = Some(graph);
        self
    }

    /// Display-frame scheduler.
    ///
    /// Defaults to `bridge_desktop::IntervalFrameScheduler` with
    /// `desktop-shims`.
    pub fn frame_scheduler(mut self, scheduler: Arc<dyn FrameScheduler>) -> Self {
        self.frame_scheduler = Some(scheduler);
        self
    }

    /// Drawing surface (required).
    pub fn surface<S>(mut self, surface: S) -> Self
    where
        S: DrawingSurface + 'static,
    {
        self.surface = Some(share_surface(surface));
        self
    }

    /// Drawing surface the host keeps a handle to.
    pub fn shared_surface(mut self, surface: SharedSurface) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Host-owned canonical state storage.
    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    /// Build the config, filling platform defaults where available.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required bridge is absent
    /// - [`Error::Config`] when a setting is out of range
    pub fn build(self) -> Result<EngineConfig> {
        let audio_graph = self.audio_graph.ok_or_else(audio_graph_missing_error)?;
        let surface = self.surface.ok_or_else(surface_missing_error)?;

        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => provide_default_fetcher()?,
        };

        let decoder = match self.decoder {
            Some(decoder) => decoder,
            None => provide_default_decoder()?,
        };

        let frame_scheduler = match self.frame_scheduler {
            Some(scheduler) => scheduler,
            None => provide_default_frame_scheduler()?,
        };

        let external_state = self.state_store.is_some();
        let state_store = self
            .state_store
            .unwrap_or_else(|| Arc::new(LocalStateStore::new()));

        let config = EngineConfig {
            fetcher,
            decoder,
            audio_graph,
            frame_scheduler,
            surface,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
            state_store,
            external_state,
            event_buffer_size: self.event_buffer_size,
        };

        config.validate()?;

        Ok(config)
    }
}
