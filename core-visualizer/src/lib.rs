//! # Audio Visualizer Engine
//!
//! Keeps a decoded audio source, its playback state, an elapsed-time tracker
//! and a frame-synchronized bar renderer consistent with each other.
//!
//! ## Overview
//!
//! - [`state`]: the playback state machine (`unset`, `loading`, `pending`,
//!   `playing`, `paused`, `ended`)
//! - [`loader`]: fetch and decode a source, wire it into the playback graph
//! - [`timing`]: elapsed time across pause/resume and the periodic notifier
//! - [`render`]: the self-rescheduling, staggered bar renderer
//! - [`engine`]: the orchestrator task and its [`VisualizerHandle`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::EngineConfig;
//! use core_visualizer::{VisualizerEngine, VisualizerOptions};
//!
//! let config = EngineConfig::builder()
//!     .audio_graph(graph)
//!     .surface(canvas)
//!     .build()?;
//! let options = VisualizerOptions::builder()
//!     .source("https://cdn.example.com/track.mp3")
//!     .stagger(2)
//!     .build()?;
//!
//! let handle = VisualizerEngine::spawn(config, options)?;
//! let mut events = handle.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.description());
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod render;
pub mod state;
pub mod timing;

pub use config::{
    BarColor, BarGeometry, BarWidth, Param, PlaybackSettings, RenderConfig, VisualizerOptions,
    VisualizerOptionsBuilder,
};
pub use engine::{EngineSnapshot, VisualizerEngine, VisualizerHandle};
pub use error::{Result, VisualizerError};
pub use loader::{AudioSourceLoader, LoadedAudio, PlayableSource, SourceParams};
pub use render::{RenderLoop, RenderStats};
pub use state::{PlaybackStateMachine, Transition};
pub use timing::TimingTracker;

pub use core_runtime::events::{AudioState, EventStream, VisualizerEvent};
