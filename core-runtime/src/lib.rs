//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the visualizer engine:
//! - Logging and tracing infrastructure
//! - Engine capability configuration
//! - Canonical playback state storage
//! - Event bus carrying state, lifecycle and time notifications
//!
//! ## Overview
//!
//! Nothing in this crate knows how playback is sequenced. It provides the
//! plumbing the engine reports through and the bundle of host capabilities
//! the engine is constructed from.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod store;

pub use config::{EngineConfig, EngineConfigBuilder, SharedSurface};
pub use error::{Error, Result};
pub use events::{AudioState, EventBus, EventStream, VisualizerEvent};
pub use store::{LocalStateStore, StateStore};
