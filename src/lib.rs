//! Workspace facade crate.
//!
//! Re-exports the visualizer engine and the crates a host needs to drive it,
//! so applications can depend on `audioviz-workspace` and pick features
//! instead of wiring each crate individually.
//!
//! - `engine`: the engine, its runtime plumbing and the host bridge traits
//! - `desktop-shims` (default): adds the native fetch, decode and frame
//!   scheduling adapters, which become the engine's defaults

#[cfg(feature = "engine")]
pub use bridge_traits;
#[cfg(feature = "engine")]
pub use core_runtime;
#[cfg(feature = "engine")]
pub use core_visualizer;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

#[cfg(feature = "engine")]
pub use core_visualizer::{
    AudioState, EngineSnapshot, RenderConfig, VisualizerEngine, VisualizerError,
    VisualizerEvent, VisualizerHandle, VisualizerOptions,
};
