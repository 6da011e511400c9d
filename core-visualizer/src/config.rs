//! # Visualizer Configuration
//!
//! Source-independent playback settings and the render parameters the bar
//! loop evaluates every executed frame.
//!
//! ## Overview
//!
//! - [`PlaybackSettings`]: serializable settings (autostart, volume, rate,
//!   analysis resolution, ...)
//! - [`RenderConfig`]: stagger, spacing and the four customization points
//!   (bar width, bar height, bar color, bar drawing)
//! - [`VisualizerOptions`]: both of the above plus an optional initial
//!   source, built through [`VisualizerOptionsBuilder`]
//!
//! Every setter is checked when the options are built; out-of-range values
//! fail with a [`VisualizerError`] instead of being clamped.
//!
//! ## Constant-or-function parameters
//!
//! Bar width and bar color are a [`Param`]: either a constant or a function
//! that is called again on every use.
//!
//! ```
//! use core_visualizer::config::{BarColor, BarWidth, RenderConfig};
//! use bridge_traits::{Color, FillStyle};
//!
//! let config = RenderConfig::default()
//!     .with_bar_width(BarWidth::constant(4.0))
//!     .with_bar_color(BarColor::computed(|height, _, _| {
//!         let lightness = 30.0 + height / 255.0 * 40.0;
//!         FillStyle::Solid(Color::hsl(200.0, 80.0, lightness))
//!     }))
//!     .with_stagger(2);
//!
//! assert_eq!(config.bar_width.resolve(800.0, 1024), 4.0);
//! ```

use crate::error::{Result, VisualizerError};
use bridge_traits::{Color, DrawingSurface, FillStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32_768;

// ============================================================================
// Constant-or-function parameters
// ============================================================================

/// A parameter that is either fixed or recomputed at every use.
pub enum Param<T, F: ?Sized> {
    Constant(T),
    Computed(Arc<F>),
}

impl<T: Clone, F: ?Sized> Clone for Param<T, F> {
    fn clone(&self) -> Self {
        match self {
            Param::Constant(value) => Param::Constant(value.clone()),
            Param::Computed(f) => Param::Computed(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug, F: ?Sized> fmt::Debug for Param<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Param::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// `(surface_width, buffer_length) -> bar_width`
pub type BarWidthFn = dyn Fn(f32, usize) -> f32 + Send + Sync;

/// `(raw_magnitude, buffer_length, index) -> bar_height`
pub type BarHeightFn = dyn Fn(u8, usize, usize) -> f32 + Send + Sync;

/// `(bar_height, buffer_length, index) -> fill`
pub type BarColorFn = dyn Fn(f32, usize, usize) -> FillStyle + Send + Sync;

/// Draws one bar; the fill style is already set on the surface.
pub type DrawBarFn = dyn Fn(&mut dyn DrawingSurface, &BarGeometry) + Send + Sync;

pub type BarWidth = Param<f32, BarWidthFn>;
pub type BarColor = Param<FillStyle, BarColorFn>;

impl Param<f32, BarWidthFn> {
    pub fn constant(width: f32) -> Self {
        Param::Constant(width)
    }

    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(f32, usize) -> f32 + Send + Sync + 'static,
    {
        Param::Computed(Arc::new(f))
    }

    pub fn resolve(&self, surface_width: f32, buffer_length: usize) -> f32 {
        match self {
            Param::Constant(width) => *width,
            Param::Computed(f) => f(surface_width, buffer_length),
        }
    }
}

impl Param<FillStyle, BarColorFn> {
    pub fn constant(fill: impl Into<FillStyle>) -> Self {
        Param::Constant(fill.into())
    }

    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(f32, usize, usize) -> FillStyle + Send + Sync + 'static,
    {
        Param::Computed(Arc::new(f))
    }

    pub fn resolve(&self, bar_height: f32, buffer_length: usize, index: usize) -> FillStyle {
        match self {
            Param::Constant(fill) => fill.clone(),
            Param::Computed(f) => f(bar_height, buffer_length, index),
        }
    }
}

/// Everything the draw primitive knows about one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarGeometry {
    pub surface_width: f32,
    pub surface_height: f32,
    pub bar_width: f32,
    pub bar_height: f32,
    pub buffer_length: usize,
    /// Left edge of the bar
    pub x: f32,
    pub index: usize,
}

// ============================================================================
// Defaults
// ============================================================================

/// Bars fill the surface width exactly (before spacing).
pub fn default_bar_width(surface_width: f32, buffer_length: usize) -> f32 {
    if buffer_length == 0 {
        return 0.0;
    }
    surface_width / buffer_length as f32
}

/// Half of the raw magnitude.
pub fn default_bar_height(magnitude: u8, _buffer_length: usize, _index: usize) -> f32 {
    magnitude as f32 / 2.0
}

/// Hue ramp across the spectrum: bin `i` of `n` gets hue `i * 360 / n`.
pub fn default_bar_color(_bar_height: f32, buffer_length: usize, index: usize) -> FillStyle {
    let hue = if buffer_length == 0 {
        0.0
    } else {
        index as f32 * 360.0 / buffer_length as f32
    };
    FillStyle::Solid(Color::hsl(hue, 100.0, 50.0))
}

/// Filled rectangle anchored at the bottom edge.
pub fn default_draw_bar(surface: &mut dyn DrawingSurface, bar: &BarGeometry) {
    surface.fill_rect(
        bar.x,
        bar.surface_height - bar.bar_height,
        bar.bar_width,
        bar.bar_height,
    );
}

fn default_fft_size() -> usize {
    2048
}

fn default_smoothing() -> f32 {
    0.8
}

fn default_volume() -> f32 {
    1.0
}

fn default_playback_rate() -> f32 {
    1.0
}

fn default_autostart() -> bool {
    true
}

fn default_time_update_interval() -> Duration {
    Duration::from_secs(1)
}

// ============================================================================
// Validation
// ============================================================================

pub fn validate_volume(volume: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&volume) {
        Ok(volume)
    } else {
        Err(VisualizerError::InvalidVolume(volume))
    }
}

pub fn validate_fft_size(fft_size: usize) -> Result<usize> {
    if fft_size.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
        Ok(fft_size)
    } else {
        Err(VisualizerError::InvalidResolution(fft_size))
    }
}

pub fn validate_playback_rate(rate: f32) -> Result<f32> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(VisualizerError::InvalidPlaybackRate(rate))
    }
}

pub fn validate_smoothing(smoothing: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&smoothing) {
        Ok(smoothing)
    } else {
        Err(VisualizerError::InvalidSmoothing(smoothing))
    }
}

pub fn validate_stagger(stagger: u32) -> Result<u32> {
    if stagger >= 1 {
        Ok(stagger)
    } else {
        Err(VisualizerError::InvalidStagger(stagger))
    }
}

pub fn validate_spacing(spacing: f32) -> Result<f32> {
    if spacing.is_finite() && spacing >= 0.0 {
        Ok(spacing)
    } else {
        Err(VisualizerError::InvalidSpacing(spacing))
    }
}

pub fn validate_notify_interval(interval: Duration) -> Result<Duration> {
    if interval.is_zero() {
        Err(VisualizerError::InvalidNotifyInterval(interval))
    } else {
        Ok(interval)
    }
}

// ============================================================================
// Playback settings
// ============================================================================

/// Serializable playback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Start playing as soon as a source is ready.
    ///
    /// Default: true.
    #[serde(default = "default_autostart")]
    pub autostart: bool,

    /// Default: false.
    #[serde(default)]
    pub looping: bool,

    /// Output gain in `[0, 1]`.
    ///
    /// Default: 1.0.
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Default: 1.0.
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f32,

    /// Analysis resolution; `fft_size / 2` bars are drawn.
    ///
    /// Default: 2048.
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,

    /// Analyser averaging constant in `[0, 1]`.
    ///
    /// Default: 0.8.
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,

    /// Period of elapsed-time notifications at a playback rate of 1.0.
    ///
    /// Default: 1 second.
    #[serde(default = "default_time_update_interval")]
    pub time_update_interval: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            autostart: default_autostart(),
            looping: false,
            volume: default_volume(),
            playback_rate: default_playback_rate(),
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            time_update_interval: default_time_update_interval(),
        }
    }
}

impl PlaybackSettings {
    pub fn validate(&self) -> Result<()> {
        validate_volume(self.volume)?;
        validate_playback_rate(self.playback_rate)?;
        validate_fft_size(self.fft_size)?;
        validate_smoothing(self.smoothing)?;
        validate_notify_interval(self.time_update_interval)?;
        Ok(())
    }

    /// Number of frequency bins the analyser yields.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

// ============================================================================
// Render configuration
// ============================================================================

/// Render parameters, read by the bar loop on every executed frame.
#[derive(Clone)]
pub struct RenderConfig {
    /// Draw on every Nth display frame.
    pub stagger: u32,
    pub bar_width: BarWidth,
    pub bar_height: Arc<BarHeightFn>,
    pub bar_color: BarColor,
    /// Gap between adjacent bars.
    pub spacing: f32,
    pub draw_bar: Arc<DrawBarFn>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            stagger: 1,
            bar_width: BarWidth::computed(default_bar_width),
            bar_height: Arc::new(default_bar_height),
            bar_color: BarColor::computed(default_bar_color),
            spacing: 1.0,
            draw_bar: Arc::new(default_draw_bar),
        }
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("stagger", &self.stagger)
            .field("bar_width", &self.bar_width)
            .field("bar_color", &self.bar_color)
            .field("spacing", &self.spacing)
            .finish_non_exhaustive()
    }
}

impl RenderConfig {
    pub fn with_stagger(mut self, stagger: u32) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn with_bar_width(mut self, width: BarWidth) -> Self {
        self.bar_width = width;
        self
    }

    pub fn with_bar_height<F>(mut self, f: F) -> Self
    where
        F: Fn(u8, usize, usize) -> f32 + Send + Sync + 'static,
    {
        self.bar_height = Arc::new(f);
        self
    }

    pub fn with_bar_color(mut self, color: BarColor) -> Self {
        self.bar_color = color;
        self
    }

    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_draw_bar<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn DrawingSurface, &BarGeometry) + Send + Sync + 'static,
    {
        self.draw_bar = Arc::new(f);
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_stagger(self.stagger)?;
        validate_spacing(self.spacing)?;
        Ok(())
    }
}

// ============================================================================
// Options
// ============================================================================

/// Complete engine options.
#[derive(Debug, Clone, Default)]
pub struct VisualizerOptions {
    /// Source to load as soon as the engine starts.
    pub source: Option<String>,
    pub settings: PlaybackSettings,
    pub render: RenderConfig,
}

impl VisualizerOptions {
    pub fn builder() -> VisualizerOptionsBuilder {
        VisualizerOptionsBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        self.render.validate()
    }
}

/// Builder for [`VisualizerOptions`]; [`build`](Self::build) validates.
#[derive(Debug, Default)]
pub struct VisualizerOptionsBuilder {
    options: VisualizerOptions,
}

impl VisualizerOptionsBuilder {
    pub fn source(mut self, uri: impl Into<String>) -> Self {
        self.options.source = Some(uri.into());
        self
    }

    pub fn settings(mut self, settings: PlaybackSettings) -> Self {
        self.options.settings = settings;
        self
    }

    pub fn autostart(mut self, autostart: bool) -> Self {
        self.options.settings.autostart = autostart;
        self
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.options.settings.looping = looping;
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.options.settings.volume = volume;
        self
    }

    pub fn playback_rate(mut self, rate: f32) -> Self {
        self.options.settings.playback_rate = rate;
        self
    }

    pub fn fft_size(mut self, fft_size: usize) -> Self {
        self.options.settings.fft_size = fft_size;
        self
    }

    pub fn smoothing(mut self, smoothing: f32) -> Self {
        self.options.settings.smoothing = smoothing;
        self
    }

    pub fn time_update_interval(mut self, interval: Duration) -> Self {
        self.options.settings.time_update_interval = interval;
        self
    }

    pub fn render(mut self, render: RenderConfig) -> Self {
        self.options.render = render;
        self
    }

    pub fn stagger(mut self, stagger: u32) -> Self {
        self.options.render.stagger = stagger;
        self
    }

    pub fn spacing(mut self, spacing: f32) -> Self {
        self.options.render.spacing = spacing;
        self
    }

    pub fn bar_width(mut self, width: BarWidth) -> Self {
        self.options.render.bar_width = width;
        self
    }

    pub fn bar_color(mut self, color: BarColor) -> Self {
        self.options.render.bar_color = color;
        self
    }

    pub fn build(self) -> Result<VisualizerOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
