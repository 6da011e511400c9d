//! # Playback State Machine
//!
//! Validates transitions and writes the canonical [`AudioState`] into a
//! [`StateStore`]. The machine itself holds no state; whoever owns the store
//! (the engine or the host) owns the value, and every check re-reads it.
//!
//! ```text
//! unset   -> loading   source set or replaced
//! loading -> pending   decoded and wired
//! loading -> unset     fetch or decode failed
//! pending -> playing   play command or autostart
//! playing -> paused    pause command
//! paused  -> playing   resume command
//! playing -> ended     natural completion
//! ended   -> playing   re-trigger with a rebuilt source
//! any     -> loading   source identifier changed
//! ```

use crate::error::{Result, VisualizerError};
use core_runtime::events::AudioState;
use core_runtime::store::StateStore;
use std::fmt;
use std::sync::Arc;

/// A state change that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: AudioState,
    pub to: AudioState,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Returns `true` if `from -> to` is a legal transition.
pub fn is_allowed(from: AudioState, to: AudioState) -> bool {
    use AudioState::*;

    match (from, to) {
        // A source change restarts the pipeline from anywhere, including
        // mid-load.
        (_, Loading) => true,
        (Loading, Pending) | (Loading, Unset) => true,
        (Pending, Playing) => true,
        (Playing, Paused) | (Paused, Playing) => true,
        (Playing, Ended) | (Ended, Playing) => true,
        _ => false,
    }
}

/// Single authority over the playback state.
#[derive(Clone)]
pub struct PlaybackStateMachine {
    store: Arc<dyn StateStore>,
}

impl PlaybackStateMachine {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn current(&self) -> AudioState {
        self.store.current()
    }

    pub fn can_transition(&self, to: AudioState) -> bool {
        is_allowed(self.current(), to)
    }

    /// Apply `current -> to` if it is legal.
    pub fn transition(&self, to: AudioState) -> Result<Transition> {
        let from = self.current();
        if !is_allowed(from, to) {
            return Err(VisualizerError::InvalidTransition { from, to });
        }

        self.store.store(to);
        Ok(Transition { from, to })
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }
}

impl fmt::Debug for PlaybackStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackStateMachine")
            .field("current", &self.current())
            .finish()
    }
}
