//! # Visualizer Error Types
//!
//! Errors surfaced by the engine and its handle.
//!
//! Stale completions (a load or natural end from a superseded source) are
//! never errors; the engine logs and drops them.

use bridge_traits::BridgeError;
use core_runtime::events::AudioState;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while configuring or driving the visualizer.
#[derive(Error, Debug)]
pub enum VisualizerError {
    // ========================================================================
    // Load Failures
    // ========================================================================
    /// The source bytes could not be fetched.
    #[error("Failed to fetch source {uri}: {message}")]
    FetchFailed { uri: String, message: String },

    /// The fetched bytes could not be decoded.
    #[error("Failed to decode source {uri}: {message}")]
    DecodeFailed { uri: String, message: String },

    /// The decoded buffer could not be connected to output and analysis.
    #[error("Failed to wire source into the audio graph: {0}")]
    GraphWiring(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    #[error("Invalid analysis resolution: {0} (must be a power of two between 32 and 32768)")]
    InvalidResolution(usize),

    #[error("Invalid stagger: {0} (must be at least 1)")]
    InvalidStagger(u32),

    #[error("Invalid playback rate: {0} (must be finite and greater than 0)")]
    InvalidPlaybackRate(f32),

    #[error("Invalid bar spacing: {0} (must be finite and not negative)")]
    InvalidSpacing(f32),

    #[error("Invalid smoothing: {0} (must be between 0.0 and 1.0)")]
    InvalidSmoothing(f32),

    #[error("Invalid time update interval: {0:?} (must be greater than zero)")]
    InvalidNotifyInterval(Duration),

    // ========================================================================
    // Control Errors
    // ========================================================================
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: AudioState, to: AudioState },

    #[error("No source loaded")]
    NoSourceLoaded,

    /// The engine task has shut down.
    #[error("Visualizer engine is closed")]
    EngineClosed,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

impl VisualizerError {
    /// Map a bridge failure raised while fetching `uri`.
    pub fn fetch_failed(uri: &str, err: BridgeError) -> Self {
        let message = match err {
            BridgeError::Fetch { message, .. } => message,
            other => other.to_string(),
        };
        Self::FetchFailed {
            uri: uri.to_string(),
            message,
        }
    }

    /// Map a bridge failure raised while decoding `uri`.
    pub fn decode_failed(uri: &str, err: BridgeError) -> Self {
        let message = match err {
            BridgeError::Decode(message) => message,
            other => other.to_string(),
        };
        Self::DecodeFailed {
            uri: uri.to_string(),
            message,
        }
    }

    /// Returns `true` for fetch, decode and wiring failures.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            VisualizerError::FetchFailed { .. }
                | VisualizerError::DecodeFailed { .. }
                | VisualizerError::GraphWiring(_)
        )
    }

    /// Returns `true` when a caller supplied an out-of-range setting.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            VisualizerError::InvalidVolume(_)
                | VisualizerError::InvalidResolution(_)
                | VisualizerError::InvalidStagger(_)
                | VisualizerError::InvalidPlaybackRate(_)
                | VisualizerError::InvalidSpacing(_)
                | VisualizerError::InvalidSmoothing(_)
                | VisualizerError::InvalidNotifyInterval(_)
        )
    }
}

/// Result type for visualizer operations.
pub type Result<T> = std::result::Result<T, VisualizerError>;
