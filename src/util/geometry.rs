// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions.
//!
//! This module provides the mapping between display-surface coordinates and
//! image-pixel coordinates under zoom and pan. Every pointer-driven
//! operation converts through [`ViewTransform`].

/// Zoom multiplier applied per zoom step.
pub const ZOOM_STEP: f64 = 1.2;
pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;

/// Distance below which a scaled coordinate snaps to the nearest integer
/// instead of truncating, absorbing float noise from repeated zoom steps.
const SNAP_EPSILON: f64 = 1e-6;

/// Zoom factor and integer pan offset of the display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    zoom: f64,
    pub pan_x: i32,
    pub pan_y: i32,
}

impl ViewTransform {
    /// Create a transform; the zoom is clamped into the allowed range.
    pub fn new(zoom: f64, pan_x: i32, pan_y: i32) -> Self {
        Self {
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            pan_x,
            pan_y,
        }
    }

    /// Create an identity transform (zoom=1, no pan).
    pub fn identity() -> Self {
        Self::new(1.0, 0, 0)
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Screen position to integer image pixel.
    ///
    /// Scaled coordinates are truncated toward zero, except that a value
    /// within `SNAP_EPSILON` of an integer snaps to that integer. The snap is
    /// part of the contract: it keeps `to_image(to_screen(p)) == p` exact
    /// after repeated zoom steps, where truncation alone would land one
    /// pixel short on values like `79.99999999`.
    pub fn to_image(&self, screen_x: f64, screen_y: f64) -> (i32, i32) {
        (
            truncate((screen_x - f64::from(self.pan_x)) / self.zoom),
            truncate((screen_y - f64::from(self.pan_y)) / self.zoom),
        )
    }

    /// Image pixel to screen position.
    pub fn to_screen(&self, image_x: i32, image_y: i32) -> (f64, f64) {
        (
            f64::from(self.pan_x) + f64::from(image_x) * self.zoom,
            f64::from(self.pan_y) + f64::from(image_y) * self.zoom,
        )
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * ZOOM_STEP).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / ZOOM_STEP).max(MIN_ZOOM);
    }

    /// Back to 100% with no pan.
    pub fn reset(&mut self) {
        *self = Self::identity();
    }

    /// Apply a pan delta in screen pixels.
    pub fn pan_by(&mut self, dx: i32, dy: i32) {
        self.pan_x = self.pan_x.saturating_add(dx);
        self.pan_y = self.pan_y.saturating_add(dy);
    }

    /// Handle grab radius in image pixels, `max(8 / zoom, 3)`.
    pub fn hit_tolerance(&self) -> f64 {
        (8.0 / self.zoom).max(3.0)
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::identity()
    }
}

fn truncate(value: f64) -> i32 {
    let nearest = value.round();
    if (value - nearest).abs() < SNAP_EPSILON {
        nearest as i32
    } else {
        value.trunc() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_roundtrip() {
        let t = ViewTransform::identity();
        assert_eq!(t.to_screen(17, 23), (17.0, 23.0));
        assert_eq!(t.to_image(17.0, 23.0), (17, 23));
    }

    #[test]
    fn test_to_image_truncates() {
        let t = ViewTransform::new(2.0, 10, 20);
        assert_eq!(t.to_image(15.0, 25.0), (2, 2));
        assert_eq!(t.to_image(13.9, 23.9), (1, 1));
    }

    #[test]
    fn test_roundtrip_under_stepped_zoom_and_pan() {
        let mut t = ViewTransform::new(1.0, -37, 12);
        for _ in 0..30 {
            for &(x, y) in &[(0, 0), (3, 7), (511, 1023), (1999, 4)] {
                let (sx, sy) = t.to_screen(x, y);
                assert_eq!(t.to_image(sx, sy), (x, y), "zoom {}", t.zoom());
            }
            t.zoom_out();
        }
        for _ in 0..30 {
            t.zoom_in();
            let (sx, sy) = t.to_screen(3, 5);
            assert_eq!(t.to_image(sx, sy), (3, 5), "zoom {}", t.zoom());
        }
    }

    #[test]
    fn test_zoom_clamps() {
        let mut t = ViewTransform::identity();
        for _ in 0..50 {
            t.zoom_in();
        }
        assert_eq!(t.zoom(), MAX_ZOOM);
        for _ in 0..100 {
            t.zoom_out();
        }
        assert_eq!(t.zoom(), MIN_ZOOM);
        assert_eq!(ViewTransform::new(42.0, 0, 0).zoom(), MAX_ZOOM);
    }

    #[test]
    fn test_reset_restores_identity() {
        let mut t = ViewTransform::new(3.0, 40, -8);
        t.reset();
        assert_eq!(t, ViewTransform::identity());
    }

    #[test]
    fn test_hit_tolerance_scales_inversely_with_zoom() {
        assert_eq!(ViewTransform::new(1.0, 0, 0).hit_tolerance(), 8.0);
        assert_eq!(ViewTransform::new(0.5, 0, 0).hit_tolerance(), 16.0);
        assert_eq!(ViewTransform::new(4.0, 0, 0).hit_tolerance(), 3.0);
        assert_eq!(ViewTransform::new(10.0, 0, 0).hit_tolerance(), 3.0);
    }
}
