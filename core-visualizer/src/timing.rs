//! # Timing Tracker
//!
//! Elapsed playback time across pause/resume/reload, plus the periodic
//! elapsed-time notifier.
//!
//! Elapsed time comes from the injected [`Clock`]:
//!
//! - start:  `start := now`
//! - pause:  `offset := now - start`
//! - resume: `start := now - offset`
//! - reset:  everything back to zero (fresh load, natural end)
//!
//! The notifier is a tokio interval that only exists while running. Once
//! stopped it is dropped, so no tick can fire afterwards.

use bridge_traits::Clock;
use core_async::time::{delayed_interval, Duration, Interval};
use std::fmt;
use std::sync::Arc;

/// Elapsed-time bookkeeping for one source.
pub struct TimingTracker {
    clock: Arc<dyn Clock>,
    start: Duration,
    offset: Duration,
    running: bool,
    interval: Duration,
    rate: f32,
    notifier: Option<Interval>,
}

impl TimingTracker {
    /// `interval` is the notification period at a playback rate of 1.0.
    pub fn new(clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            clock,
            start: Duration::ZERO,
            offset: Duration::ZERO,
            running: false,
            interval,
            rate: 1.0,
            notifier: None,
        }
    }

    /// Begin counting from the current offset.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.start = self.clock.now().saturating_sub(self.offset);
        self.running = true;
        self.arm_notifier();
    }

    /// Freeze the elapsed time.
    pub fn pause(&mut self) {
        if !self.running {
            return;
        }
        self.offset = self.clock.now().saturating_sub(self.start);
        self.running = false;
        self.notifier = None;
    }

    /// Continue from the frozen offset.
    pub fn resume(&mut self) {
        self.start();
    }

    /// Stop and zero everything.
    pub fn reset(&mut self) {
        self.start = Duration::ZERO;
        self.offset = Duration::ZERO;
        self.running = false;
        self.notifier = None;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn elapsed(&self) -> Duration {
        if self.running {
            self.clock.now().saturating_sub(self.start)
        } else {
            self.offset
        }
    }

    /// Notification period after scaling by the playback rate.
    pub fn notify_period(&self) -> Duration {
        let rate = if self.rate.is_finite() && self.rate > 0.0 {
            self.rate as f64
        } else {
            1.0
        };
        Duration::from_secs_f64(self.interval.as_secs_f64() / rate)
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate;
        self.rearm_if_running();
    }

    /// Wait for the next notifier tick and return the elapsed time at that
    /// point. Never completes while stopped, so it can sit in a `select!`
    /// branch unconditionally.
    pub async fn tick(&mut self) -> Duration {
        match self.notifier.as_mut() {
            Some(notifier) => {
                notifier.tick().await;
                self.elapsed()
            }
            None => std::future::pending().await,
        }
    }

    fn arm_notifier(&mut self) {
        let period = self.notify_period();
        self.notifier = (!period.is_zero()).then(|| delayed_interval(period));
    }

    fn rearm_if_running(&mut self) {
        if self.running {
            self.arm_notifier();
        }
    }
}

impl fmt::Debug for TimingTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingTracker")
            .field("elapsed", &self.elapsed())
            .field("running", &self.running)
            .field("notify_period", &self.notify_period())
            .finish()
    }
}
