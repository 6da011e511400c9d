//! Canonical playback state storage.
//!
//! The engine never caches the playback state itself; every decision reads
//! [`StateStore::current`] and every transition goes through
//! [`StateStore::store`]. By default the engine owns a [`LocalStateStore`].
//! A host that wants to own the value (a UI framework's controlled property,
//! for instance) injects its own implementation through
//! [`EngineConfigBuilder::state_store`](crate::config::EngineConfigBuilder::state_store).

use crate::events::AudioState;
use parking_lot::RwLock;

/// Storage for the single authoritative [`AudioState`].
pub trait StateStore: Send + Sync {
    /// Current canonical state.
    fn current(&self) -> AudioState;

    /// Replace the canonical state.
    fn store(&self, state: AudioState);
}

/// Engine-owned state storage.
#[derive(Debug, Default)]
pub struct LocalStateStore {
    state: RwLock<AudioState>,
}

impl LocalStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an explicit initial state.
    pub fn with_state(state: AudioState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }
}

impl StateStore for LocalStateStore {
    fn current(&self) -> AudioState {
        *self.state.read()
    }

    fn store(&self, state: AudioState) {
        *self.state.write() = state;
    }
}
