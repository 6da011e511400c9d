//! Playback graph and analysis contracts.
//!
//! These mirror the shape of a browser audio graph: a long-lived graph that
//! owns the output device, one-shot source nodes created from a decoded
//! buffer, and an analyser node that exposes frequency magnitudes. The engine
//! never touches samples itself; it only wires nodes and reads the analyser.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Decoded PCM audio ready to be turned into source nodes.
///
/// Cloning is cheap: samples are shared, which lets the engine keep the last
/// decoded buffer around and restart the same source without decoding again.
#[derive(Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Create a buffer from interleaved samples in `[-1.0, 1.0]`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Playback duration at a rate of 1.0.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns `true` if two buffers share the same sample storage.
    pub fn shares_samples_with(&self, other: &AudioBuffer) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}

/// Decoder capability: encoded bytes in, playable buffer out.
#[async_trait]
pub trait AudioDecoder: Send + Sync {
    /// Decode a complete encoded file. `hint` is a lowercase file extension
    /// when one could be derived from the source identifier.
    async fn decode(&self, data: Bytes, hint: Option<String>) -> Result<AudioBuffer>;
}

/// Settings for an analyser node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserOptions {
    /// Analysis resolution; a power of two in `[32, 32768]`.
    pub fft_size: usize,
    /// Averaging constant between successive analyses, in `[0, 1]`.
    pub smoothing: f32,
}

impl Default for AnalyserOptions {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
        }
    }
}

/// Frequency-domain probe attached to the playback graph.
pub trait Analyser: Send + Sync {
    /// Resolution the analyser was created with.
    fn fft_size(&self) -> usize;

    /// Number of usable frequency bins.
    fn frequency_bin_count(&self) -> usize {
        self.fft_size() / 2
    }

    /// Copy the current magnitudes (0..=255 per bin) into `out`. Writes at most
    /// `out.len()` bins.
    fn byte_frequency_data(&self, out: &mut [u8]);
}

/// Natural-completion callback registered on a source node.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

/// A one-shot playable node created from a decoded buffer.
///
/// Once stopped, disconnected, or ended the node cannot be started again; a
/// new node must be created from the buffer.
pub trait SourceNode: Send {
    /// Route the node to the output device.
    fn connect_to_destination(&mut self) -> Result<()>;

    /// Route the node into an analyser.
    fn connect_to_analyser(&mut self, analyser: &Arc<dyn Analyser>) -> Result<()>;

    /// Detach the node from everything it is connected to. Idempotent.
    fn disconnect(&mut self);

    /// Begin playback from the start of the buffer.
    fn start(&mut self) -> Result<()>;

    /// Stop playback. Implementations fire the registered ended callback if
    /// one is still registered, exactly like a natural completion would.
    fn stop(&mut self) -> Result<()>;

    /// Register (`Some`) or remove (`None`) the natural-completion callback.
    fn set_on_ended(&mut self, callback: Option<EndedCallback>);

    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32) -> Result<()>;

    fn playback_rate(&self) -> f32;
    fn set_playback_rate(&mut self, rate: f32) -> Result<()>;

    fn looping(&self) -> bool;
    fn set_looping(&mut self, looping: bool) -> Result<()>;
}

/// The host's playback graph.
pub trait AudioGraph: Send + Sync {
    /// Create an analyser with the given resolution.
    fn create_analyser(&self, options: AnalyserOptions) -> Result<Arc<dyn Analyser>>;

    /// Create an unconnected source node for `buffer`.
    fn create_source(&self, buffer: AudioBuffer) -> Result<Box<dyn SourceNode>>;

    /// Suspend output without releasing nodes.
    fn suspend(&self) -> Result<()>;

    /// Resume output after [`AudioGraph::suspend`].
    fn resume(&self) -> Result<()>;
}
