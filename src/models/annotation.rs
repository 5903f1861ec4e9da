// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation data structures.
//!
//! This module defines the bounding box drawn around a spine on one frame,
//! in integer image-pixel coordinates, and the handles used to edit it.

use serde::{Deserialize, Serialize};

/// An axis-aligned box `(x1, y1, x2, y2)` in image pixels.
///
/// Serialized as the four-element array `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Bbox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl From<[i32; 4]> for Bbox {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Bbox> for [i32; 4] {
    fn from(b: Bbox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

impl Bbox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box spanned by two arbitrary corner points.
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Self {
        Self::new(a.0, a.1, b.0, b.1).normalized()
    }

    /// Swap coordinates so that `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    /// Clamp every coordinate into `[0, width] x [0, height]`.
    pub fn clamped(self, width: u32, height: u32) -> Self {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        Self {
            x1: self.x1.clamp(0, w),
            y1: self.y1.clamp(0, h),
            x2: self.x2.clamp(0, w),
            y2: self.y2.clamp(0, h),
        }
    }

    /// Normalize then clamp; the form every committed box takes.
    pub fn sanitized(self, width: u32, height: u32) -> Self {
        self.normalized().clamped(width, height)
    }

    /// True when the ordering and bounds invariants already hold.
    pub fn is_valid_for(&self, width: u32, height: u32) -> bool {
        *self == self.sanitized(width, height)
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Length of the box diagonal in pixels.
    pub fn diagonal(&self) -> f64 {
        f64::from(self.x2 - self.x1).hypot(f64::from(self.y2 - self.y1))
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }

    /// Apply a pointer displacement according to the handle being dragged.
    ///
    /// Corner handles move only their own two coordinates; `Move` translates
    /// the whole box. The result is not normalized.
    pub fn dragged(self, handle: Handle, dx: i32, dy: i32) -> Self {
        let mut b = self;
        match handle {
            Handle::TopLeft => {
                b.x1 += dx;
                b.y1 += dy;
            }
            Handle::TopRight => {
                b.x2 += dx;
                b.y1 += dy;
            }
            Handle::BottomLeft => {
                b.x1 += dx;
                b.y2 += dy;
            }
            Handle::BottomRight => {
                b.x2 += dx;
                b.y2 += dy;
            }
            Handle::Move => {
                b.x1 += dx;
                b.y1 += dy;
                b.x2 += dx;
                b.y2 += dy;
            }
        }
        b
    }

    /// Position of a corner handle.
    pub fn corner(&self, handle: Handle) -> Option<(i32, i32)> {
        match handle {
            Handle::TopLeft => Some((self.x1, self.y1)),
            Handle::TopRight => Some((self.x2, self.y1)),
            Handle::BottomLeft => Some((self.x1, self.y2)),
            Handle::BottomRight => Some((self.x2, self.y2)),
            Handle::Move => None,
        }
    }

    /// Find the handle under an image-space point.
    ///
    /// Corners are tested before the interior, so a grab near a corner
    /// always resizes.
    pub fn hit_test(&self, x: i32, y: i32, tolerance: f64) -> Option<Handle> {
        for handle in Handle::CORNERS {
            if let Some((cx, cy)) = self.corner(handle) {
                let dx = f64::from(x - cx).abs();
                let dy = f64::from(y - cy).abs();
                if dx <= tolerance && dy <= tolerance {
                    return Some(handle);
                }
            }
        }
        self.contains(x, y).then_some(Handle::Move)
    }
}

/// Grab target on a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handle {
    #[serde(rename = "tl")]
    TopLeft,
    #[serde(rename = "tr")]
    TopRight,
    #[serde(rename = "bl")]
    BottomLeft,
    #[serde(rename = "br")]
    BottomRight,
    Move,
}

impl Handle {
    /// Corner handles in hit-test order.
    pub const CORNERS: [Handle; 4] = [
        Handle::TopLeft,
        Handle::TopRight,
        Handle::BottomLeft,
        Handle::BottomRight,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners_normalizes_any_drag_direction() {
        let b = Bbox::from_corners((50, 40), (10, 60));
        assert_eq!(b, Bbox::new(10, 40, 50, 60));
        let b = Bbox::from_corners((50, 60), (10, 10));
        assert_eq!(b, Bbox::new(10, 10, 50, 60));
    }

    #[test]
    fn test_clamp_to_frame_bounds() {
        let b = Bbox::new(-5, -3, 120, 80).clamped(100, 50);
        assert_eq!(b, Bbox::new(0, 0, 100, 50));
    }

    #[test]
    fn test_degenerate_box_has_zero_diagonal() {
        let b = Bbox::new(7, 7, 7, 7);
        assert_eq!(b.diagonal(), 0.0);
        assert!(b.is_valid_for(10, 10));
    }

    #[test]
    fn test_drag_corner_moves_only_that_corner() {
        let b = Bbox::new(10, 10, 50, 50);
        assert_eq!(b.dragged(Handle::TopLeft, 5, 5), Bbox::new(15, 15, 50, 50));
        assert_eq!(b.dragged(Handle::TopRight, 5, -2), Bbox::new(10, 8, 55, 50));
        assert_eq!(b.dragged(Handle::BottomLeft, -4, 3), Bbox::new(6, 10, 50, 53));
        assert_eq!(b.dragged(Handle::BottomRight, 1, 1), Bbox::new(10, 10, 51, 51));
        assert_eq!(b.dragged(Handle::Move, 3, -4), Bbox::new(13, 6, 53, 46));
    }

    #[test]
    fn test_hit_test_prefers_corners_over_interior() {
        let b = Bbox::new(10, 10, 50, 50);
        assert_eq!(b.hit_test(12, 12, 3.0), Some(Handle::TopLeft));
        assert_eq!(b.hit_test(49, 11, 3.0), Some(Handle::TopRight));
        assert_eq!(b.hit_test(30, 30, 3.0), Some(Handle::Move));
        assert_eq!(b.hit_test(70, 30, 3.0), None);
        // Outside the box but within tolerance of a corner
        assert_eq!(b.hit_test(8, 8, 3.0), Some(Handle::TopLeft));
    }

    #[test]
    fn test_serializes_as_array() {
        let json = serde_json::to_string(&Bbox::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, "[1,2,3,4]");
        let b: Bbox = serde_json::from_str("[10,10,50,50]").unwrap();
        assert_eq!(b, Bbox::new(10, 10, 50, 50));
    }
}
