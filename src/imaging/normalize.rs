// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Stack-wide display normalization.
//!
//! Intensity bounds are the 0.1st and 99.9th percentiles over every pixel of
//! every frame, so all frames share one scale and relative brightness across
//! time is preserved on screen.

use crate::io::media::{FramePixels, FrameStack, LoadMode};
use image::{Rgb, RgbImage};
use std::collections::HashMap;

pub const LOWER_PERCENTILE: f64 = 0.1;
pub const UPPER_PERCENTILE: f64 = 99.9;

/// Clip range used to map raw intensities to 8-bit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityBounds {
    pub vmin: f32,
    pub vmax: f32,
}

impl IntensityBounds {
    /// Map one raw intensity to a display byte.
    pub fn scale(&self, value: f32) -> u8 {
        let span = self.vmax - self.vmin;
        if !(span > 0.0) {
            return 0;
        }
        let clipped = value.clamp(self.vmin, self.vmax);
        ((clipped - self.vmin) / span * 255.0).round() as u8
    }
}

/// Compute stack-wide percentile bounds.
///
/// 8- and 16-bit stacks are counted into a histogram; float and RGB stacks
/// fall back to selecting over a copy of every value.
pub fn compute_bounds(stack: &FrameStack) -> IntensityBounds {
    if stack.mode() == LoadMode::Display {
        // Frames are already 8-bit display images.
        return IntensityBounds { vmin: 0.0, vmax: 255.0 };
    }
    let bounds = match integer_histogram(stack) {
        Some(counts) => IntensityBounds {
            vmin: histogram_percentile(&counts, LOWER_PERCENTILE),
            vmax: histogram_percentile(&counts, UPPER_PERCENTILE),
        },
        None => {
            let mut values: Vec<f32> = stack
                .frames()
                .iter()
                .flat_map(|f| f.pixels.gray_values())
                .filter(|v| v.is_finite())
                .collect();
            IntensityBounds {
                vmin: percentile(&mut values, LOWER_PERCENTILE),
                vmax: percentile(&mut values, UPPER_PERCENTILE),
            }
        }
    };
    log::debug!("Display bounds: vmin={} vmax={}", bounds.vmin, bounds.vmax);
    bounds
}

/// Counts per intensity over the whole stack, or `None` when any frame holds
/// float or RGB samples.
fn integer_histogram(stack: &FrameStack) -> Option<Vec<u64>> {
    let mut counts = vec![0u64; usize::from(u16::MAX) + 1];
    for frame in stack.frames() {
        match &frame.pixels {
            FramePixels::Gray8(b) => {
                for &v in b.as_raw() {
                    counts[usize::from(v)] += 1;
                }
            }
            FramePixels::Gray16(b) => {
                for &v in b.as_raw() {
                    counts[usize::from(v)] += 1;
                }
            }
            FramePixels::Gray32F(_) | FramePixels::Rgb8(_) => return None,
        }
    }
    Some(counts)
}

/// Intensity at sorted position `rank` (zero based).
fn histogram_value_at(counts: &[u64], rank: u64) -> f32 {
    let mut seen = 0u64;
    for (value, &count) in counts.iter().enumerate() {
        seen += count;
        if seen > rank {
            return value as f32;
        }
    }
    counts.len().saturating_sub(1) as f32
}

/// [`percentile`] over histogram counts, where bin `i` holds intensity `i`.
pub fn histogram_percentile(counts: &[u64], p: f64) -> f32 {
    let n: u64 = counts.iter().sum();
    if n == 0 {
        return 0.0;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = rank.floor() as u64;
    let frac = (rank - lo as f64) as f32;

    let lo_value = histogram_value_at(counts, lo);
    if frac == 0.0 || lo + 1 >= n {
        return lo_value;
    }
    let hi_value = histogram_value_at(counts, lo + 1);
    lo_value + (hi_value - lo_value) * frac
}

/// Percentile with linear interpolation between closest ranks.
///
/// Reorders `values`; `p` is in percent.
pub fn percentile(values: &mut [f32], p: f64) -> f32 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let frac = (rank - lo as f64) as f32;

    let (_, lo_value, rest) = values.select_nth_unstable_by(lo, f32::total_cmp);
    let lo_value = *lo_value;
    if frac == 0.0 || rest.is_empty() {
        return lo_value;
    }
    let hi_value = rest.iter().copied().fold(f32::INFINITY, f32::min);
    lo_value + (hi_value - lo_value) * frac
}

/// Render one frame to RGB using the given bounds.
///
/// Frames loaded in display mode are already RGB and are returned as is.
pub fn render_frame(pixels: &FramePixels, bounds: &IntensityBounds) -> RgbImage {
    if let FramePixels::Rgb8(rgb) = pixels {
        return rgb.clone();
    }
    let (w, h) = pixels.dimensions();
    let gray = pixels.gray_values();
    RgbImage::from_fn(w, h, |x, y| {
        let v = bounds.scale(gray[(y * w + x) as usize]);
        Rgb([v, v, v])
    })
}

/// Cached bounds and rendered frames for one loaded stack.
#[derive(Debug, Default)]
pub struct DisplayNormalizer {
    bounds: Option<IntensityBounds>,
    rendered: HashMap<usize, RgbImage>,
}

impl DisplayNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget cached bounds and renders; called on load and registration.
    pub fn invalidate(&mut self) {
        self.bounds = None;
        self.rendered.clear();
    }

    /// Bounds for the stack, computed on first use.
    pub fn bounds(&mut self, stack: &FrameStack) -> IntensityBounds {
        *self.bounds.get_or_insert_with(|| compute_bounds(stack))
    }

    pub fn cached_bounds(&self) -> Option<IntensityBounds> {
        self.bounds
    }

    /// Display image for a frame, rendered once per bounds.
    pub fn render(&mut self, stack: &FrameStack, index: usize) -> Option<&RgbImage> {
        let frame = stack.frame(index)?;
        let bounds = self.bounds(stack);
        Some(
            self.rendered
                .entry(index)
                .or_insert_with(|| render_frame(&frame.pixels, &bounds)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::media::{Frame, Gray16Image, Gray32FImage};
    use std::path::PathBuf;

    fn gray16_stack(frames: Vec<Vec<u16>>, w: u32) -> FrameStack {
        let frames = frames
            .into_iter()
            .enumerate()
            .map(|(i, values)| {
                let h = values.len() as u32 / w;
                let img = Gray16Image::from_raw(w, h, values).unwrap();
                Frame::new(PathBuf::from(format!("f{i}.tif")), FramePixels::Gray16(img))
            })
            .collect();
        FrameStack::new(frames, LoadMode::Fidelity)
    }

    #[test]
    fn test_percentile_interpolates() {
        let mut v: Vec<f32> = (0..=10).map(|i| i as f32).collect();
        assert_eq!(percentile(&mut v, 50.0), 5.0);
        assert_eq!(percentile(&mut v, 0.0), 0.0);
        assert_eq!(percentile(&mut v, 100.0), 10.0);
        assert!((percentile(&mut v, 25.0) - 2.5).abs() < 1e-6);
        let mut v = vec![4.0, 1.0, 3.0, 2.0];
        assert!((percentile(&mut v, 50.0) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_histogram_percentile_matches_selection() {
        // Deterministic scatter over the 16-bit range with repeats
        let values: Vec<u16> = (0u32..5000).map(|i| ((i * 7919 + 13) % 4099) as u16 * 11).collect();
        let mut counts = vec![0u64; 65536];
        for &v in &values {
            counts[usize::from(v)] += 1;
        }
        let mut floats: Vec<f32> = values.iter().map(|&v| f32::from(v)).collect();
        for p in [0.0, LOWER_PERCENTILE, 25.0, 50.0, 97.3, UPPER_PERCENTILE, 100.0] {
            let expected = percentile(&mut floats, p);
            let got = histogram_percentile(&counts, p);
            assert!((got - expected).abs() < 1e-3, "p={} {} vs {}", p, got, expected);
        }
        assert_eq!(histogram_percentile(&[0; 4], 50.0), 0.0);
    }

    #[test]
    fn test_float_stack_uses_value_selection() {
        let img = Gray32FImage::from_raw(2, 2, vec![0.25, 0.5, 0.75, 1.0]).unwrap();
        let stack = FrameStack::new(
            vec![Frame::new(PathBuf::from("f.tif"), FramePixels::Gray32F(img))],
            LoadMode::Fidelity,
        );
        let bounds = compute_bounds(&stack);
        assert!((bounds.vmin - 0.25).abs() < 1e-3);
        assert!((bounds.vmax - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_bounds_ignore_saturated_outliers() {
        // 10_000 ordinary pixels and a single hot pixel
        let mut values: Vec<u16> = (0..10_000).map(|i| 100 + (i % 100) as u16).collect();
        values[0] = 65_535;
        let stack = gray16_stack(vec![values], 100);
        let bounds = compute_bounds(&stack);
        assert!(bounds.vmax <= 200.0, "vmax {}", bounds.vmax);
        assert!(bounds.vmin >= 100.0);
    }

    #[test]
    fn test_bounds_span_all_frames() {
        let stack = gray16_stack(vec![vec![10; 1000], vec![1000; 1000]], 10);
        let bounds = compute_bounds(&stack);
        assert_eq!(bounds.vmin, 10.0);
        assert_eq!(bounds.vmax, 1000.0);
        // The bright frame renders white, the dim one black
        assert_eq!(render_frame(&stack.frame(0).unwrap().pixels, &bounds).get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(
            render_frame(&stack.frame(1).unwrap().pixels, &bounds).get_pixel(0, 0).0,
            [255, 255, 255]
        );
    }

    #[test]
    fn test_scale_clips_and_handles_flat_bounds() {
        let b = IntensityBounds { vmin: 100.0, vmax: 200.0 };
        assert_eq!(b.scale(50.0), 0);
        assert_eq!(b.scale(150.0), 128);
        assert_eq!(b.scale(500.0), 255);
        let flat = IntensityBounds { vmin: 7.0, vmax: 7.0 };
        assert_eq!(flat.scale(7.0), 0);
    }

    #[test]
    fn test_render_is_deterministic_and_cached() {
        let stack = gray16_stack(vec![(0..64).collect(), (64..128).collect()], 8);
        let mut normalizer = DisplayNormalizer::new();
        let first = normalizer.render(&stack, 1).unwrap().clone();
        let fresh = render_frame(
            &stack.frame(1).unwrap().pixels,
            &normalizer.cached_bounds().unwrap(),
        );
        assert_eq!(first, fresh);
        assert_eq!(normalizer.render(&stack, 1).unwrap(), &first);
        assert!(normalizer.render(&stack, 5).is_none());

        normalizer.invalidate();
        assert!(normalizer.cached_bounds().is_none());
    }

    #[test]
    fn test_keeps_underlying_pixels_untouched() {
        let stack = gray16_stack(vec![vec![5, 6, 7, 8]], 2);
        let before = stack.clone();
        let mut normalizer = DisplayNormalizer::new();
        normalizer.render(&stack, 0);
        assert_eq!(stack, before);
    }

    #[test]
    fn test_display_mode_passes_rgb_through() {
        let rgb = RgbImage::from_pixel(2, 2, Rgb([9, 9, 9]));
        let stack = FrameStack::new(
            vec![Frame::new(PathBuf::from("a.tif"), FramePixels::Rgb8(rgb.clone()))],
            LoadMode::Display,
        );
        let mut normalizer = DisplayNormalizer::new();
        assert_eq!(normalizer.render(&stack, 0).unwrap(), &rgb);
    }
}
