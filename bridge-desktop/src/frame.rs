//! Timer-driven display frames
//!
//! Desktop hosts without a compositor callback get frames from a fixed-rate
//! clock: every request fires on the next period boundary, so all callbacks
//! requested within one period share a timestamp, like a vsync tick.

use bridge_traits::frame::{FrameCallback, FrameHandle, FrameScheduler};
use core_async::runtime::Handle;
use core_async::sync::CancellationToken;
use core_async::time::{sleep_until, Duration, Instant};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, trace};

/// 60 Hz.
pub const DEFAULT_FRAME_PERIOD: Duration = Duration::from_micros(16_667);

struct SchedulerInner {
    period: Duration,
    origin: Instant,
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, CancellationToken>>,
}

impl SchedulerInner {
    /// First period boundary strictly after `now`.
    fn next_boundary(&self, now: Instant) -> Instant {
        let elapsed = now.saturating_duration_since(self.origin);
        let period = self.period.as_nanos().max(1);
        let ticks = elapsed.as_nanos() / period + 1;
        let offset = u64::try_from(ticks * period).unwrap_or(u64::MAX);
        self.origin + Duration::from_nanos(offset)
    }
}

/// [`FrameScheduler`] backed by tokio timers.
#[derive(Clone)]
pub struct IntervalFrameScheduler {
    inner: Arc<SchedulerInner>,
    runtime: Option<Handle>,
}

impl IntervalFrameScheduler {
    /// 60 Hz scheduler.
    pub fn new() -> Self {
        Self::with_period(DEFAULT_FRAME_PERIOD)
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                period,
                origin: Instant::now(),
                next_id: AtomicU64::new(1),
                pending: Mutex::new(HashMap::new()),
            }),
            runtime: Handle::try_current().ok(),
        }
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }

    /// Number of requests that have neither fired nor been cancelled.
    pub fn pending_frames(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

impl Default for IntervalFrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler for IntervalFrameScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = FrameHandle::new(id);

        let Some(runtime) = Handle::try_current().ok().or_else(|| self.runtime.clone()) else {
            error!(frame = id, "No tokio runtime available; frame dropped");
            return handle;
        };

        let token = CancellationToken::new();
        self.inner.pending.lock().insert(id, token.clone());

        let inner = Arc::clone(&self.inner);
        let deadline = inner.next_boundary(Instant::now());

        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!(frame = id, "Frame cancelled before firing");
                }
                _ = sleep_until(deadline) => {
                    if inner.pending.lock().remove(&id).is_some() {
                        callback(deadline.saturating_duration_since(inner.origin));
                    }
                }
            }
        });

        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if let Some(token) = self.inner.pending.lock().remove(&handle.id()) {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_callback(counter: &Arc<AtomicUsize>) -> FrameCallback {
        let counter = Arc::clone(counter);
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_fires_on_next_boundary() {
        let scheduler = IntervalFrameScheduler::with_period(Duration::from_millis(10));
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.request_frame(counting_callback(&fired));
        assert_eq!(scheduler.pending_frames(), 1);

        tokio::time::sleep(Duration::from_millis(15)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_frames(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_frame_never_fires() {
        let scheduler = IntervalFrameScheduler::with_period(Duration::from_millis(10));
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = scheduler.request_frame(counting_callback(&fired));
        scheduler.cancel_frame(handle);
        scheduler.cancel_frame(handle);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_frames(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timestamps_are_period_aligned() {
        let scheduler = IntervalFrameScheduler::with_period(Duration::from_millis(10));
        let stamps = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let stamps = Arc::clone(&stamps);
            scheduler.request_frame(Box::new(move |ts| stamps.lock().push(ts)));
        }

        tokio::time::sleep(Duration::from_millis(12)).await;

        let stamps = stamps.lock();
        assert_eq!(stamps.len(), 2);
        assert_eq!(stamps[0], stamps[1]);
        assert_eq!(stamps[0].as_millis() % 10, 0);
    }

    #[test]
    fn test_next_boundary() {
        let scheduler = IntervalFrameScheduler::with_period(Duration::from_millis(10));
        let origin = scheduler.inner.origin;

        assert_eq!(
            scheduler.inner.next_boundary(origin),
            origin + Duration::from_millis(10)
        );
        assert_eq!(
            scheduler.inner.next_boundary(origin + Duration::from_millis(25)),
            origin + Duration::from_millis(30)
        );
    }
}
