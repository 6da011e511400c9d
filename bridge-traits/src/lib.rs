//! # Host Bridge Traits
//!
//! Capability contracts the visualizer engine consumes but never implements
//! itself.
//!
//! ## Overview
//!
//! The engine only sequences work: it asks the host to fetch bytes, decode
//! them, wire a playable node into an audio graph, sample frequency data,
//! draw rectangles and call it back before the next repaint. Each of those is
//! a trait here, implemented per platform (`bridge-desktop` for native hosts,
//! test fakes in the engine's integration tests).
//!
//! ## Traits
//!
//! ### Loading
//! - [`AudioFetcher`](fetch::AudioFetcher) - Byte fetch for a source identifier
//! - [`AudioDecoder`](audio::AudioDecoder) - Encoded bytes to a playable buffer
//!
//! ### Playback & analysis
//! - [`AudioGraph`](audio::AudioGraph) - Creates source nodes and analysers, suspends/resumes output
//! - [`SourceNode`](audio::SourceNode) - One-shot playable node with a completion callback
//! - [`Analyser`](audio::Analyser) - Frequency-domain probe with fixed resolution
//!
//! ### Output
//! - [`DrawingSurface`](draw::DrawingSurface) - 2D rectangle surface
//! - [`FrameScheduler`](frame::FrameScheduler) - "Run before next repaint" with cancellation
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Monotonic time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! convert platform errors into it and keep the source identifier in the
//! message where one exists.
//!
//! ## Thread Safety
//!
//! Capabilities shared by the engine and the render loop require
//! `Send + Sync`. Source nodes and drawing surfaces are exclusively owned and
//! only require `Send`.

pub mod audio;
pub mod draw;
pub mod error;
pub mod fetch;
pub mod frame;
pub mod time;

pub use error::BridgeError;

pub use audio::{
    Analyser, AnalyserOptions, AudioBuffer, AudioDecoder, AudioGraph, EndedCallback, SourceNode,
};
pub use draw::{Color, DrawingSurface, FillStyle, GradientStop};
pub use fetch::{AudioFetcher, SourceKind};
pub use frame::{FrameCallback, FrameHandle, FrameScheduler};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
