//! 2D drawing surface contract.
//!
//! The render loop only needs to clear the surface, choose a fill style and
//! fill axis-aligned rectangles. Colors render to CSS strings so a web host
//! can hand them straight to a canvas context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// Red, green, blue in `0..=255` and alpha in `[0, 1]`.
    Rgba { r: u8, g: u8, b: u8, a: f32 },
    /// Hue in degrees, saturation and lightness in percent.
    Hsl {
        hue: f32,
        saturation: f32,
        lightness: f32,
    },
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Rgba { r, g, b, a: 1.0 }
    }

    pub const fn hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        Self::Hsl {
            hue,
            saturation,
            lightness,
        }
    }

    /// Hue in degrees for HSL colors.
    pub fn hue(&self) -> Option<f32> {
        match self {
            Color::Hsl { hue, .. } => Some(*hue),
            Color::Rgba { .. } => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Rgba { r, g, b, a } => write!(f, "rgba({}, {}, {}, {})", r, g, b, a),
            Color::Hsl {
                hue,
                saturation,
                lightness,
            } => write!(f, "hsl({}, {}%, {}%)", hue, saturation, lightness),
        }
    }
}

/// One color stop of a gradient; `offset` is in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Color,
}

/// Fill style applied to subsequent [`DrawingSurface::fill_rect`] calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FillStyle {
    Solid(Color),
    LinearGradient {
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
        stops: Vec<GradientStop>,
    },
    /// Host-defined pattern, referenced by name.
    Pattern(String),
}

impl From<Color> for FillStyle {
    fn from(color: Color) -> Self {
        FillStyle::Solid(color)
    }
}

/// Output device for the visualization.
///
/// Coordinates have their origin at the top-left corner with `y` growing
/// downwards.
pub trait DrawingSurface: Send {
    fn width(&self) -> f32;
    fn height(&self) -> f32;

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32);

    fn set_fill_style(&mut self, style: FillStyle);

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32);

    /// Clear the whole surface.
    fn clear(&mut self) {
        let (width, height) = (self.width(), self.height());
        self.clear_rect(0.0, 0.0, width, height);
    }
}
