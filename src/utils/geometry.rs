//! Projection of native-pixel regions onto the displayed page.
//!
//! Everything here is pure. Callers recompute the scale whenever the rendered
//! width or the page's native width changes.

use serde::Serialize;

use crate::core::types::{BoundingBox, TranslatedRegion};

/// Smallest overlay font size, keeps text legible on narrow viewports
pub const MIN_FONT_SIZE: f64 = 8.0;
/// Overlay font size at scale 1.0
pub const BASE_FONT_SIZE: f64 = 14.0;
/// Overlay box padding at scale 1.0
pub const BASE_PADDING: f64 = 2.0;

/// Ratio of displayed width to native width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DisplayScale(f64);

impl DisplayScale {
    pub fn new(factor: f64) -> Option<Self> {
        (factor.is_finite() && factor >= 0.0).then_some(Self(factor))
    }

    /// `None` while the native width is unknown (zero).
    pub fn from_widths(displayed_width: f64, native_width: u32) -> Option<Self> {
        if native_width == 0 {
            return None;
        }
        Self::new(displayed_width / f64::from(native_width))
    }

    pub fn factor(self) -> f64 {
        self.0
    }
}

/// On-screen rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Everything an overlay renderer needs to draw one translated region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayBox {
    #[serde(flatten)]
    pub rect: ScreenRect,
    pub font_size: f64,
    pub padding: f64,
    pub translation: String,
}

pub fn scale_bbox(bbox: &BoundingBox, scale: DisplayScale) -> ScreenRect {
    let s = scale.factor();
    ScreenRect {
        left: bbox.x0 * s,
        top: bbox.y0 * s,
        width: bbox.width() * s,
        height: bbox.height() * s,
    }
}

pub fn font_size(scale: DisplayScale) -> f64 {
    (BASE_FONT_SIZE * scale.factor()).max(MIN_FONT_SIZE)
}

pub fn padding(scale: DisplayScale) -> f64 {
    BASE_PADDING * scale.factor()
}

pub fn layout_overlay(regions: &[TranslatedRegion], scale: DisplayScale) -> Vec<OverlayBox> {
    let font_size = font_size(scale);
    let padding = padding(scale);
    regions
        .iter()
        .map(|region| OverlayBox {
            rect: scale_bbox(&region.bbox, scale),
            font_size,
            padding,
            translation: region.translation.clone(),
        })
        .collect()
}
