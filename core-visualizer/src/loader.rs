//! # Audio Source Loader
//!
//! Fetch, decode and wire a source into the playback graph.
//!
//! ## Pipeline
//!
//! 1. [`AudioSourceLoader::load`] fetches and decodes the identifier, or
//!    returns the remembered buffer when the identifier matches the last
//!    successful load.
//! 2. [`attach`] turns the buffer into a [`PlayableSource`]: a fresh source
//!    node connected to the output and the analyser, with the natural-end
//!    callback registered exactly once.
//!
//! Source nodes are one-shot. Restarting after a natural end builds a new
//! [`PlayableSource`] from the remembered buffer.
//!
//! ## Teardown
//!
//! [`PlayableSource::teardown`] removes the ended callback before stopping the
//! node, so a programmatic stop can never look like a natural end. It runs on
//! drop as well.

use crate::error::{Result, VisualizerError};
use bridge_traits::fetch::extension_hint;
use bridge_traits::{
    Analyser, AudioBuffer, AudioDecoder, AudioFetcher, AudioGraph, EndedCallback, SourceNode,
};
use core_runtime::logging::redact_uri;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A decoded source, ready to be attached.
#[derive(Debug, Clone)]
pub struct LoadedAudio {
    pub uri: String,
    pub buffer: AudioBuffer,
    /// `true` when no fetch or decode happened.
    pub from_cache: bool,
}

/// Fetches and decodes sources; remembers the last decoded buffer.
pub struct AudioSourceLoader {
    fetcher: Arc<dyn AudioFetcher>,
    decoder: Arc<dyn AudioDecoder>,
    last: Mutex<Option<(String, AudioBuffer)>>,
}

impl AudioSourceLoader {
    pub fn new(fetcher: Arc<dyn AudioFetcher>, decoder: Arc<dyn AudioDecoder>) -> Self {
        Self {
            fetcher,
            decoder,
            last: Mutex::new(None),
        }
    }

    /// Remembered buffer for `uri`, if it was the last source loaded.
    pub fn cached(&self, uri: &str) -> Option<AudioBuffer> {
        self.last
            .lock()
            .as_ref()
            .filter(|(cached_uri, _)| cached_uri == uri)
            .map(|(_, buffer)| buffer.clone())
    }

    /// Remember a buffer the engine accepted. Replaces any previous one.
    pub fn remember(&self, loaded: &LoadedAudio) {
        *self.last.lock() = Some((loaded.uri.clone(), loaded.buffer.clone()));
    }

    pub fn forget(&self) {
        self.last.lock().take();
    }

    /// Fetch and decode `uri`.
    ///
    /// Does not update the remembered buffer: a load may be superseded before
    /// it completes, and only the engine knows whether its result is current.
    #[instrument(skip_all, fields(uri = %redact_uri(uri)))]
    pub async fn load(&self, uri: &str) -> Result<LoadedAudio> {
        if let Some(buffer) = self.cached(uri) {
            debug!("Reusing decoded buffer");
            return Ok(LoadedAudio {
                uri: uri.to_string(),
                buffer,
                from_cache: true,
            });
        }

        let bytes = self
            .fetcher
            .fetch(uri.to_string())
            .await
            .map_err(|e| VisualizerError::fetch_failed(uri, e))?;
        debug!(bytes = bytes.len(), "Fetched source");

        let buffer = self
            .decoder
            .decode(bytes, extension_hint(uri))
            .await
            .map_err(|e| VisualizerError::decode_failed(uri, e))?;

        info!(
            duration_ms = buffer.duration().as_millis() as u64,
            sample_rate = buffer.sample_rate(),
            channels = buffer.channels(),
            "Decoded source"
        );

        Ok(LoadedAudio {
            uri: uri.to_string(),
            buffer,
            from_cache: false,
        })
    }
}

impl fmt::Debug for AudioSourceLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self.last.lock();
        f.debug_struct("AudioSourceLoader")
            .field("cached", &last.as_ref().map(|(uri, _)| redact_uri(uri)))
            .finish_non_exhaustive()
    }
}

/// Passthrough attributes applied to every new source node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceParams {
    pub volume: f32,
    pub playback_rate: f32,
    pub looping: bool,
}

/// Build a [`PlayableSource`] from `buffer`, connected to the output and to
/// `analyser`, with `on_ended` registered.
///
/// `serial` identifies this instance in natural-end notifications.
pub fn attach(
    graph: &dyn AudioGraph,
    uri: &str,
    buffer: AudioBuffer,
    analyser: &Arc<dyn Analyser>,
    params: SourceParams,
    serial: u64,
    on_ended: EndedCallback,
) -> Result<PlayableSource> {
    let node = graph.create_source(buffer).map_err(wiring)?;
    let mut source = PlayableSource {
        uri: uri.to_string(),
        serial,
        node,
        started: false,
        torn_down: false,
    };

    // Dropping `source` on any error below disconnects the half-wired node.
    source.node.set_volume(params.volume).map_err(wiring)?;
    source
        .node
        .set_playback_rate(params.playback_rate)
        .map_err(wiring)?;
    source.node.set_looping(params.looping).map_err(wiring)?;
    source.node.connect_to_destination().map_err(wiring)?;
    source.node.connect_to_analyser(analyser).map_err(wiring)?;
    source.node.set_on_ended(Some(on_ended));

    debug!(serial, "Source attached");
    Ok(source)
}

fn wiring(err: bridge_traits::BridgeError) -> VisualizerError {
    VisualizerError::GraphWiring(err.to_string())
}

/// A wired, one-shot source node.
pub struct PlayableSource {
    uri: String,
    serial: u64,
    node: Box<dyn SourceNode>,
    started: bool,
    torn_down: bool,
}

impl PlayableSource {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Begin playback. Calling it again is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.started || self.torn_down {
            return Ok(());
        }
        self.node.start()?;
        self.started = true;
        Ok(())
    }

    /// Reconnect to a replacement analyser.
    pub fn rewire(&mut self, analyser: &Arc<dyn Analyser>) -> Result<()> {
        self.node.disconnect();
        self.node.connect_to_destination().map_err(wiring)?;
        self.node.connect_to_analyser(analyser).map_err(wiring)?;
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        Ok(self.node.set_volume(volume)?)
    }

    pub fn set_playback_rate(&mut self, rate: f32) -> Result<()> {
        Ok(self.node.set_playback_rate(rate)?)
    }

    pub fn set_looping(&mut self, looping: bool) -> Result<()> {
        Ok(self.node.set_looping(looping)?)
    }

    /// Detach the ended callback, stop and disconnect. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.node.set_on_ended(None);
        if self.started {
            if let Err(e) = self.node.stop() {
                warn!(serial = self.serial, error = %e, "Failed to stop source");
            }
        }
        self.node.disconnect();
        debug!(serial = self.serial, "Source torn down");
    }
}

impl Drop for PlayableSource {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for PlayableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayableSource")
            .field("uri", &redact_uri(&self.uri))
            .field("serial", &self.serial)
            .field("started", &self.started)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
