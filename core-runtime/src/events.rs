//! # Event Bus System
//!
//! Broadcasts everything the visualizer engine reports to the outside world:
//! state transitions, source lifecycle, periodic elapsed time and load
//! failures.
//!
//! ## Overview
//!
//! - **[`VisualizerEvent`]**: the strongly-typed notification enum
//! - **[`EventBus`]**: a `tokio::sync::broadcast` sender shared by the engine
//! - **[`EventStream`]**: a receiver wrapper with optional filtering
//!
//! ```text
//! ┌─────────────────┐     emit      ┌───────────┐    subscribe   ┌────────────┐
//! │ Engine actor    ├──────────────>│ EventBus  ├───────────────>│ Host UI    │
//! └─────────────────┘               │ (broadcast│                └────────────┘
//!                                   │  channel) ├───────────────>┌────────────┐
//!                                   └───────────┘                │ Test probe │
//!                                                                └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AudioState, EventBus, EventStream, VisualizerEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut stream = EventStream::new(bus.subscribe())
//!     .filter(|event| matches!(event, VisualizerEvent::StateChanged { .. }));
//!
//! bus.emit(VisualizerEvent::StateChanged {
//!     from: AudioState::Unset,
//!     to: AudioState::Loading,
//! })
//! .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Playback state changed");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events and can keep
//!   receiving. Time updates are the usual casualty.
//! - **`RecvError::Closed`**: the engine shut down.
//!
//! `emit` fails when nobody is subscribed; the engine ignores that error.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Playback state vocabulary
// ============================================================================

/// Playback state of the visualizer.
///
/// Exactly one value is active at a time. `Unset` and `Loading` are
/// non-interactive: play/pause commands are rejected while they are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioState {
    #[default]
    Unset,
    Loading,
    Pending,
    Paused,
    Playing,
    Ended,
}

impl AudioState {
    /// Returns `true` if play/pause commands are meaningful in this state.
    pub fn is_interactive(&self) -> bool {
        !matches!(self, AudioState::Unset | AudioState::Loading)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioState::Unset => "unset",
            AudioState::Loading => "loading",
            AudioState::Pending => "pending",
            AudioState::Paused => "paused",
            AudioState::Playing => "playing",
            AudioState::Ended => "ended",
        }
    }
}

impl fmt::Display for AudioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Visualizer Events
// ============================================================================

/// Notification published by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum VisualizerEvent {
    /// The playback state changed.
    StateChanged { from: AudioState, to: AudioState },
    /// A source finished decoding and is wired into the graph.
    SourceLoaded {
        uri: String,
        /// Decoded duration at a rate of 1.0 (milliseconds).
        duration_ms: u64,
    },
    /// A freshly created source node started playing.
    SourceStarted { uri: String },
    /// Playback was paused.
    SourcePaused { uri: String, elapsed_ms: u64 },
    /// Playback resumed after a pause.
    SourcePlaying { uri: String, elapsed_ms: u64 },
    /// The source played to its natural end.
    SourceEnded { uri: String },
    /// Periodic elapsed-time notification while playing.
    TimeUpdate { elapsed_ms: u64 },
    /// Fetching or decoding the source failed.
    LoadFailed { uri: String, message: String },
}

impl VisualizerEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            VisualizerEvent::StateChanged { .. } => "Playback state changed",
            VisualizerEvent::SourceLoaded { .. } => "Source loaded",
            VisualizerEvent::SourceStarted { .. } => "Source started",
            VisualizerEvent::SourcePaused { .. } => "Source paused",
            VisualizerEvent::SourcePlaying { .. } => "Source playing",
            VisualizerEvent::SourceEnded { .. } => "Source ended",
            VisualizerEvent::TimeUpdate { .. } => "Elapsed time updated",
            VisualizerEvent::LoadFailed { .. } => "Source failed to load",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            VisualizerEvent::LoadFailed { .. } => EventSeverity::Error,
            VisualizerEvent::SourceLoaded { .. } | VisualizerEvent::SourceEnded { .. } => {
                EventSeverity::Info
            }
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Error,
}

// ============================================================================
// Event Bus
// ============================================================================

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<VisualizerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: VisualizerEvent) -> Result<usize, SendError<VisualizerEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<VisualizerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&VisualizerEvent) -> bool + Send + Sync>;

pub struct EventStream {
    receiver: Receiver<VisualizerEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<VisualizerEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&VisualizerEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &VisualizerEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    pub async fn recv(&mut self) -> Result<VisualizerEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. Returns `None` when no matching event is queued.
    pub fn try_recv(&mut self) -> Option<Result<VisualizerEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drain every matching event that is currently queued.
    pub fn drain(&mut self) -> Vec<VisualizerEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
