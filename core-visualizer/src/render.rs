//! # Render Loop
//!
//! Self-rescheduling per-display-frame bar renderer.
//!
//! While running, the loop keeps exactly one frame request outstanding with
//! the host [`FrameScheduler`]. Every callback counts as a scheduled frame;
//! only every `stagger`-th one samples the analyser and redraws. The callback
//! re-arms unconditionally, so the loop sustains itself until [`RenderLoop::stop`].
//!
//! A loop instance is bound to one analyser, one surface and one
//! [`RenderConfig`]. Reconfiguration builds a new instance; the engine stops
//! the old one first so only one loop ever draws.
//!
//! ## Cancellation
//!
//! `stop` bumps an epoch and cancels the pending request. A callback that was
//! already in flight compares its epoch and returns without drawing or
//! re-arming. Both `stop` and `start` are idempotent.
//!
//! ## User functions
//!
//! Bar width, height, color and draw functions run on the frame callback's
//! thread with the loop state locked. A panic unwinds out of the callback
//! untouched; the pending handle is cleared before any user code runs, so
//! the loop reads as stopped and can be restarted or rebuilt.

use crate::config::{BarGeometry, RenderConfig};
use crate::error::Result;
use bridge_traits::{Analyser, FrameCallback, FrameHandle, FrameScheduler};
use core_runtime::config::SharedSurface;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Frame counters for one loop instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStats {
    /// Frame callbacks received while running.
    pub scheduled_frames: u64,
    /// Callbacks that ran a full draw pass.
    pub executed_frames: u64,
    /// Bars drawn by the most recent pass.
    pub last_bin_count: usize,
}

struct LoopState {
    epoch: u64,
    pending: Option<FrameHandle>,
    /// Callbacks since the last `start`; drives the stagger.
    frame_count: u64,
    stats: RenderStats,
    bins: Vec<u8>,
}

struct LoopInner {
    scheduler: Arc<dyn FrameScheduler>,
    analyser: Arc<dyn Analyser>,
    surface: SharedSurface,
    config: RenderConfig,
    state: Mutex<LoopState>,
}

/// Bar renderer bound to one analyser and one render configuration.
pub struct RenderLoop {
    inner: Arc<LoopInner>,
}

impl RenderLoop {
    /// Create a stopped loop. Fails if `config` is out of range.
    pub fn new(
        scheduler: Arc<dyn FrameScheduler>,
        analyser: Arc<dyn Analyser>,
        surface: SharedSurface,
        config: RenderConfig,
    ) -> Result<Self> {
        config.validate()?;

        let bins = vec![0u8; analyser.frequency_bin_count()];
        Ok(Self {
            inner: Arc::new(LoopInner {
                scheduler,
                analyser,
                surface,
                config,
                state: Mutex::new(LoopState {
                    epoch: 0,
                    pending: None,
                    frame_count: 0,
                    stats: RenderStats::default(),
                    bins,
                }),
            }),
        })
    }

    /// Arm the first frame. No-op if already running.
    pub fn start(&self) {
        let mut state = self.inner.state.lock();
        if state.pending.is_some() {
            return;
        }

        state.epoch += 1;
        state.frame_count = 0;
        let epoch = state.epoch;
        let handle = self
            .inner
            .scheduler
            .request_frame(frame_callback(Arc::downgrade(&self.inner), epoch));
        state.pending = Some(handle);

        debug!(
            epoch,
            stagger = self.inner.config.stagger,
            bins = state.bins.len(),
            "Render loop started"
        );
    }

    /// Cancel the pending frame. No-op if already stopped.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        state.epoch += 1;
        if let Some(handle) = state.pending.take() {
            self.inner.scheduler.cancel_frame(handle);
            debug!(
                scheduled = state.stats.scheduled_frames,
                executed = state.stats.executed_frames,
                "Render loop stopped"
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    pub fn stats(&self) -> RenderStats {
        self.inner.state.lock().stats
    }

    pub fn config(&self) -> &RenderConfig {
        &self.inner.config
    }

    /// Number of bars drawn per pass.
    pub fn bin_count(&self) -> usize {
        self.inner.state.lock().bins.len()
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RenderLoop")
            .field("running", &state.pending.is_some())
            .field("stats", &state.stats)
            .field("config", &self.inner.config)
            .finish()
    }
}

fn frame_callback(inner: Weak<LoopInner>, epoch: u64) -> FrameCallback {
    Box::new(move |timestamp| {
        if let Some(inner) = inner.upgrade() {
            inner.on_frame(epoch, timestamp);
        }
    })
}

impl LoopInner {
    fn on_frame(self: &Arc<Self>, epoch: u64, timestamp: Duration) {
        let mut state = self.state.lock();
        if state.epoch != epoch || state.pending.is_none() {
            trace!(epoch, "Dropping stale frame callback");
            return;
        }
        state.pending = None;

        state.frame_count += 1;
        state.stats.scheduled_frames += 1;

        if state.frame_count % u64::from(self.config.stagger) == 0 {
            let drawn = self.draw(&mut state.bins);
            state.stats.executed_frames += 1;
            state.stats.last_bin_count = drawn;
            trace!(?timestamp, bins = drawn, "Frame drawn");
        }

        let handle = self
            .scheduler
            .request_frame(frame_callback(Arc::downgrade(self), epoch));
        state.pending = Some(handle);
    }

    /// One full pass: sample, clear, then draw every bin left to right.
    fn draw(&self, bins: &mut [u8]) -> usize {
        self.analyser.byte_frequency_data(bins);

        let mut surface = self.surface.lock();
        surface.clear();
        let surface_width = surface.width();
        let surface_height = surface.height();

        let config = &self.config;
        let buffer_length = bins.len();
        let bar_width = config.bar_width.resolve(surface_width, buffer_length);

        let mut x = 0.0;
        for (index, &magnitude) in bins.iter().enumerate() {
            let bar_height = (config.bar_height)(magnitude, buffer_length, index);
            let fill = config.bar_color.resolve(bar_height, buffer_length, index);
            surface.set_fill_style(fill);

            let geometry = BarGeometry {
                surface_width,
                surface_height,
                bar_width,
                bar_height,
                buffer_length,
                x,
                index,
            };
            (config.draw_bar)(&mut **surface, &geometry);

            x += bar_width + config.spacing;
        }

        buffer_length
    }
}
