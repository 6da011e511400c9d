//! Display-frame scheduling contract.
//!
//! Equivalent of "request an animation frame": the callback runs once, before
//! the next repaint, unless it is cancelled first.

use std::time::Duration;

/// Identifies one pending frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(&self) -> u64 {
        self.0
    }
}

/// Callback invoked with the frame timestamp (time since the scheduler
/// started).
pub type FrameCallback = Box<dyn FnOnce(Duration) + Send + 'static>;

/// Host frame scheduler.
pub trait FrameScheduler: Send + Sync {
    /// Run `callback` once before the next repaint. The callback must never
    /// run inside `request_frame` itself.
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;

    /// Cancel a pending request. Cancelling a handle that already fired or was
    /// already cancelled is a no-op.
    fn cancel_frame(&self, handle: FrameHandle);
}
