//! Normalized marker coordinates to pixel space.

use crate::constants::DEFAULT_MARKER_SIZE_PX;
use crate::state::Marker;

/// Pixel dimensions of the overlay surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f32, height as f32)
    }
}

/// Anchor point and extent of a marker, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerGeometry {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
}

impl MarkerGeometry {
    /// Radius of the largest circle that fits the extent.
    pub fn radius(&self) -> f32 {
        self.width.min(self.height) * 0.5
    }
}

pub fn resolve_geometry(marker: &Marker, viewport: Viewport) -> MarkerGeometry {
    let center_x = marker.anchor.x * viewport.width / 100.0;
    let center_y = marker.anchor.y * viewport.height / 100.0;
    let (width, height) = match marker.extent {
        Some(extent) => (
            extent.width() * viewport.width / 100.0,
            extent.height() * viewport.height / 100.0,
        ),
        None => (DEFAULT_MARKER_SIZE_PX, DEFAULT_MARKER_SIZE_PX),
    };

    MarkerGeometry {
        center_x,
        center_y,
        width,
        height,
    }
}
