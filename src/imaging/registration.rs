// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Rigid-body registration of a frame stack.
//!
//! Every frame after the first is aligned to frame 0 with a rotation plus a
//! translation. Estimation and resampling go through a [`FrameAligner`]; the
//! OpenCV one (`registration` feature) runs ECC maximization with a
//! Euclidean motion model and warps each channel with `warp_affine`. The
//! stack is only modified once every frame has been aligned.

use crate::error::RegistrationError;
use crate::io::media::{FramePixels, FrameStack};

/// ECC iterations allowed per frame.
pub const MAX_ITERATIONS: usize = 200;

/// Correlation increment at which ECC stops.
pub const CONVERGENCE_EPS: f64 = 1e-6;

/// Rotation followed by a translation, origin at the top-left pixel.
///
/// A registered pixel at `x` takes the moving frame's value at
/// `R(angle) * x + (tx, ty)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RigidTransform {
    /// Radians.
    pub angle: f64,
    pub tx: f64,
    pub ty: f64,
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self::default()
    }

    /// Row-major 2x3 affine matrix.
    pub fn to_affine(&self) -> [[f64; 3]; 2] {
        let (sin, cos) = self.angle.sin_cos();
        [[cos, -sin, self.tx], [sin, cos, self.ty]]
    }

    /// Rigid part of a 2x3 affine matrix.
    pub fn from_affine(m: &[[f64; 3]; 2]) -> Self {
        Self {
            angle: m[1][0].atan2(m[0][0]),
            tx: m[0][2],
            ty: m[1][2],
        }
    }
}

/// Estimates and applies the transform aligning one frame to the reference.
pub trait FrameAligner {
    /// Transform mapping reference coordinates into `moving`.
    ///
    /// `frame` is only used to label errors.
    fn estimate(
        &self,
        reference: &FramePixels,
        moving: &FramePixels,
        frame: usize,
    ) -> Result<RigidTransform, RegistrationError>;

    /// Resample every channel of `pixels` onto the reference grid.
    fn apply(
        &self,
        pixels: &FramePixels,
        transform: &RigidTransform,
        frame: usize,
    ) -> Result<FramePixels, RegistrationError>;
}

/// Align every frame after the first to frame 0, all or nothing.
///
/// Returns the transform applied to each frame (identity for frame 0).
#[cfg(feature = "registration")]
pub fn register_stack(stack: &mut FrameStack) -> Result<Vec<RigidTransform>, RegistrationError> {
    register_stack_with(stack, &ecc::EccAligner::default())
}

/// Registration needs the `registration` feature.
#[cfg(not(feature = "registration"))]
pub fn register_stack(_stack: &mut FrameStack) -> Result<Vec<RigidTransform>, RegistrationError> {
    log::warn!("Built without the `registration` feature");
    Err(RegistrationError::Unavailable)
}

/// [`register_stack`] with an explicit aligner.
pub fn register_stack_with(
    stack: &mut FrameStack,
    aligner: &impl FrameAligner,
) -> Result<Vec<RigidTransform>, RegistrationError> {
    if stack.is_registered() {
        return Err(RegistrationError::AlreadyRegistered);
    }
    let reference = stack.frame(0).ok_or(RegistrationError::NoStack)?;
    if is_flat(&reference.pixels) {
        return Err(RegistrationError::Degenerate { frame: 0 });
    }
    let (rw, rh) = reference.dimensions();

    let mut transforms = vec![RigidTransform::identity()];
    let mut aligned = vec![reference.pixels.clone()];
    for (index, frame) in stack.frames().iter().enumerate().skip(1) {
        let (width, height) = frame.dimensions();
        if (width, height) != (rw, rh) {
            return Err(RegistrationError::ShapeMismatch {
                frame: index,
                width,
                height,
                ref_width: rw,
                ref_height: rh,
            });
        }
        if is_flat(&frame.pixels) {
            return Err(RegistrationError::Degenerate { frame: index });
        }

        let transform = aligner.estimate(&reference.pixels, &frame.pixels, index)?;
        log::info!(
            "Frame {}: rotation {:.3} deg, shift ({:.2}, {:.2})",
            index,
            transform.angle.to_degrees(),
            transform.tx,
            transform.ty
        );
        aligned.push(aligner.apply(&frame.pixels, &transform, index)?);
        transforms.push(transform);
    }

    stack.replace_pixels(aligned);
    log::info!("Registered {} frames to frame 0", stack.len());
    Ok(transforms)
}

/// A frame with a single intensity has nothing to align on.
fn is_flat(pixels: &FramePixels) -> bool {
    let mut values = pixels.gray_values().into_iter().filter(|v| v.is_finite());
    match values.next() {
        Some(first) => values.all(|v| v == first),
        None => true,
    }
}

#[cfg(feature = "registration")]
pub use ecc::EccAligner;

#[cfg(feature = "registration")]
mod ecc {
    use super::{FrameAligner, RigidTransform, CONVERGENCE_EPS, MAX_ITERATIONS};
    use crate::error::RegistrationError;
    use crate::io::media::FramePixels;
    use opencv::prelude::*;
    use opencv::{core, imgproc, video};

    /// Gaussian blur applied by ECC before estimating.
    const GAUSS_FILTER_SIZE: i32 = 5;

    /// ECC registration with a Euclidean motion model.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct EccAligner {
        pub max_iterations: usize,
        pub epsilon: f64,
    }

    impl Default for EccAligner {
        fn default() -> Self {
            Self {
                max_iterations: MAX_ITERATIONS,
                epsilon: CONVERGENCE_EPS,
            }
        }
    }

    impl EccAligner {
        fn not_converged(&self, frame: usize, error: opencv::Error) -> RegistrationError {
            log::warn!("ECC failed on frame {}: {}", frame, error);
            RegistrationError::NotConverged {
                frame,
                iterations: self.max_iterations,
            }
        }

        fn find_warp(&self, reference: &FramePixels, moving: &FramePixels) -> opencv::Result<[[f64; 3]; 2]> {
            let (width, _) = reference.dimensions();
            let (ref_values, moving_values) = normalized_pair(reference, moving);
            let template = plane_to_mat(&ref_values, width)?;
            let input = plane_to_mat(&moving_values, width)?;

            let mut warp = core::Mat::eye(2, 3, core::CV_32F)?.to_mat()?;
            let criteria = core::TermCriteria {
                typ: core::TermCriteria_COUNT + core::TermCriteria_EPS,
                max_count: self.max_iterations as i32,
                epsilon: self.epsilon,
            };
            let correlation = video::find_transform_ecc(
                &template,
                &input,
                &mut warp,
                video::MOTION_EUCLIDEAN,
                criteria,
                &core::Mat::default(),
                GAUSS_FILTER_SIZE,
            )?;
            log::debug!("ECC correlation {:.4}", correlation);

            let mut m = [[0.0f64; 3]; 2];
            for (r, row) in m.iter_mut().enumerate() {
                for (c, slot) in row.iter_mut().enumerate() {
                    *slot = f64::from(*warp.at_2d::<f32>(r as i32, c as i32)?);
                }
            }
            Ok(m)
        }

        fn warp_planes(&self, pixels: &FramePixels, transform: &RigidTransform) -> opencv::Result<Vec<Vec<f32>>> {
            let (width, height) = pixels.dimensions();
            let affine = transform.to_affine().map(|row| row.map(|v| v as f32));
            let warp = core::Mat::from_slice_2d(&affine)?;
            let size = core::Size::new(width as i32, height as i32);

            pixels
                .planes()
                .iter()
                .map(|plane| {
                    let src = plane_to_mat(plane, width)?;
                    let mut dst = core::Mat::default();
                    imgproc::warp_affine(
                        &src,
                        &mut dst,
                        &warp,
                        size,
                        imgproc::INTER_LINEAR + imgproc::WARP_INVERSE_MAP,
                        core::BORDER_CONSTANT,
                        core::Scalar::default(),
                    )?;
                    Ok(dst.data_typed::<f32>()?.to_vec())
                })
                .collect()
        }
    }

    impl FrameAligner for EccAligner {
        fn estimate(
            &self,
            reference: &FramePixels,
            moving: &FramePixels,
            frame: usize,
        ) -> Result<RigidTransform, RegistrationError> {
            let m = self
                .find_warp(reference, moving)
                .map_err(|e| self.not_converged(frame, e))?;
            let transform = RigidTransform::from_affine(&m);
            if !(transform.angle.is_finite() && transform.tx.is_finite() && transform.ty.is_finite()) {
                return Err(RegistrationError::NotConverged {
                    frame,
                    iterations: self.max_iterations,
                });
            }
            Ok(transform)
        }

        fn apply(
            &self,
            pixels: &FramePixels,
            transform: &RigidTransform,
            frame: usize,
        ) -> Result<FramePixels, RegistrationError> {
            let planes = self
                .warp_planes(pixels, transform)
                .map_err(|e| self.not_converged(frame, e))?;
            // Same kind, size and channel count as the input
            Ok(pixels.with_planes(&planes).unwrap_or_else(|| pixels.clone()))
        }
    }

    fn plane_to_mat(values: &[f32], width: u32) -> opencv::Result<core::Mat> {
        let rows: Vec<&[f32]> = values.chunks(width as usize).collect();
        core::Mat::from_slice_2d(&rows)
    }

    /// Gray intensities scaled so the reference spans `[0, 1]`.
    fn normalized_pair(reference: &FramePixels, moving: &FramePixels) -> (Vec<f32>, Vec<f32>) {
        let ref_values = reference.gray_values();
        let (min, max) = ref_values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let span = if max > min { max - min } else { 1.0 };
        let scale = |values: Vec<f32>| -> Vec<f32> { values.into_iter().map(|v| (v - min) / span).collect() };
        (scale(ref_values), scale(moving.gray_values()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::media::{Frame, Gray16Image, LoadMode};
    use image::Luma;
    use std::path::PathBuf;

    const SIZE: u32 = 96;
    const BLOBS: [(f64, f64, f64); 4] = [
        (30.0, 30.0, 9000.0),
        (65.0, 35.0, 6000.0),
        (40.0, 68.0, 7500.0),
        (70.0, 70.0, 4000.0),
    ];

    /// Smooth synthetic frame: gaussian blobs over a dim background.
    fn blobs(x: f64, y: f64) -> f64 {
        let sigma2 = 2.0 * 5.0 * 5.0;
        100.0
            + BLOBS
                .iter()
                .map(|(bx, by, a)| a * (-((x - bx).powi(2) + (y - by).powi(2)) / sigma2).exp())
                .sum::<f64>()
    }

    fn frame_from(f: impl Fn(f64, f64) -> f64) -> FramePixels {
        FramePixels::Gray16(Gray16Image::from_fn(SIZE, SIZE, |x, y| {
            Luma([f(f64::from(x), f64::from(y)).round() as u16])
        }))
    }

    fn stack_of(frames: Vec<FramePixels>) -> FrameStack {
        let frames = frames
            .into_iter()
            .enumerate()
            .map(|(i, p)| Frame::new(PathBuf::from(format!("t{i}.tif")), p))
            .collect();
        FrameStack::new(frames, LoadMode::Fidelity)
    }

    /// Hands out a fixed shift per frame and fills aligned frames with a
    /// constant, failing on one chosen frame.
    struct FixedAligner {
        fail_on: Option<usize>,
    }

    impl FrameAligner for FixedAligner {
        fn estimate(
            &self,
            _reference: &FramePixels,
            _moving: &FramePixels,
            frame: usize,
        ) -> Result<RigidTransform, RegistrationError> {
            if self.fail_on == Some(frame) {
                return Err(RegistrationError::NotConverged { frame, iterations: 3 });
            }
            Ok(RigidTransform {
                angle: 0.0,
                tx: frame as f64,
                ty: 0.0,
            })
        }

        fn apply(
            &self,
            pixels: &FramePixels,
            _transform: &RigidTransform,
            _frame: usize,
        ) -> Result<FramePixels, RegistrationError> {
            let (w, h) = pixels.dimensions();
            Ok(FramePixels::Gray16(Gray16Image::from_pixel(w, h, Luma([7]))))
        }
    }

    fn three_frames() -> FrameStack {
        stack_of(vec![
            frame_from(blobs),
            frame_from(|x, y| blobs(x - 3.0, y - 2.0)),
            frame_from(|x, y| blobs(x + 2.0, y - 1.0)),
        ])
    }

    #[test]
    fn test_affine_roundtrip() {
        let t = RigidTransform { angle: 0.3, tx: -4.5, ty: 2.25 };
        let back = RigidTransform::from_affine(&t.to_affine());
        assert!((back.angle - t.angle).abs() < 1e-12);
        assert_eq!((back.tx, back.ty), (t.tx, t.ty));
        assert_eq!(RigidTransform::identity().to_affine(), [[1.0, -0.0, 0.0], [0.0, 1.0, 0.0]]);
    }

    #[test]
    fn test_register_with_replaces_all_frames_and_sets_flag() {
        let mut stack = three_frames();
        let reference = stack.frame(0).unwrap().pixels.clone();
        let transforms = register_stack_with(&mut stack, &FixedAligner { fail_on: None }).unwrap();
        assert_eq!(transforms.len(), 3);
        assert_eq!(transforms[0], RigidTransform::identity());
        assert_eq!(transforms[2].tx, 2.0);
        assert!(stack.is_registered());
        assert_eq!(stack.frame(0).unwrap().pixels, reference);
        assert_eq!(stack.frame(1).unwrap().pixels.gray_values()[0], 7.0);
    }

    #[test]
    fn test_second_registration_is_refused() {
        let mut stack = three_frames();
        let aligner = FixedAligner { fail_on: None };
        register_stack_with(&mut stack, &aligner).unwrap();
        let before = stack.clone();
        assert_eq!(
            register_stack_with(&mut stack, &aligner),
            Err(RegistrationError::AlreadyRegistered)
        );
        assert_eq!(stack, before);
    }

    #[test]
    fn test_failure_on_later_frame_leaves_stack_untouched() {
        let mut stack = three_frames();
        let before = stack.clone();
        let err = register_stack_with(&mut stack, &FixedAligner { fail_on: Some(2) }).unwrap_err();
        assert_eq!(err, RegistrationError::NotConverged { frame: 2, iterations: 3 });
        assert_eq!(stack, before);
        assert!(!stack.is_registered());
    }

    #[test]
    fn test_flat_frame_is_degenerate() {
        let mut stack = stack_of(vec![
            frame_from(blobs),
            frame_from(|x, y| blobs(x - 1.0, y)),
            frame_from(|_, _| 500.0),
        ]);
        let before = stack.clone();
        let err = register_stack_with(&mut stack, &FixedAligner { fail_on: None }).unwrap_err();
        assert_eq!(err, RegistrationError::Degenerate { frame: 2 });
        assert_eq!(stack, before);
    }

    #[test]
    fn test_shape_mismatch_is_reported() {
        let small = FramePixels::Gray16(Gray16Image::from_pixel(10, 10, Luma([1])));
        let mut stack = stack_of(vec![frame_from(blobs), small]);
        let err = register_stack_with(&mut stack, &FixedAligner { fail_on: None }).unwrap_err();
        assert!(matches!(err, RegistrationError::ShapeMismatch { frame: 1, width: 10, .. }));
        assert!(!stack.is_registered());
    }

    #[cfg(not(feature = "registration"))]
    #[test]
    fn test_unavailable_without_feature() {
        let mut stack = three_frames();
        let before = stack.clone();
        assert_eq!(register_stack(&mut stack), Err(RegistrationError::Unavailable));
        assert_eq!(stack, before);
    }

    #[cfg(feature = "registration")]
    #[test]
    fn test_ecc_recovers_translation() {
        let reference = frame_from(blobs);
        let moving = frame_from(|x, y| blobs(x - 3.0, y - 2.0));
        let t = EccAligner::default().estimate(&reference, &moving, 1).unwrap();
        assert!((t.tx - 3.0).abs() < 0.25, "tx {}", t.tx);
        assert!((t.ty - 2.0).abs() < 0.25, "ty {}", t.ty);
        assert!(t.angle.abs() < 0.01, "angle {}", t.angle);
    }

    #[cfg(feature = "registration")]
    #[test]
    fn test_ecc_register_stack_aligns_frames() {
        let mut stack = three_frames();
        let reference = stack.frame(0).unwrap().pixels.gray_values();
        register_stack(&mut stack).unwrap();
        assert!(stack.is_registered());

        // Interior of each aligned frame matches the reference
        for index in 1..3 {
            let got = stack.frame(index).unwrap().pixels.gray_values();
            for y in 8..(SIZE - 8) {
                for x in 8..(SIZE - 8) {
                    let i = (y * SIZE + x) as usize;
                    assert!(
                        (got[i] - reference[i]).abs() < 300.0,
                        "frame {} pixel ({}, {}): {} vs {}",
                        index,
                        x,
                        y,
                        got[i],
                        reference[i]
                    );
                }
            }
        }
    }

    #[cfg(feature = "registration")]
    #[test]
    fn test_ecc_warps_rgb_channels() {
        let rgb = image::RgbImage::from_fn(8, 8, |x, _| image::Rgb([x as u8 * 10, 50, 200]));
        let pixels = FramePixels::Rgb8(rgb);
        let shift = RigidTransform { angle: 0.0, tx: 1.0, ty: 0.0 };
        match EccAligner::default().apply(&pixels, &shift, 1).unwrap() {
            FramePixels::Rgb8(out) => {
                assert_eq!(out.get_pixel(2, 3).0, [30, 50, 200]);
                // Sampled past the right edge
                assert_eq!(out.get_pixel(7, 3).0, [0, 0, 0]);
            }
            other => panic!("expected RGB output, got {:?}", other),
        }
    }
}
