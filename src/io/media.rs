// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Image stack loading.
//!
//! This module reads an ordered sequence of single-plane frames from a
//! directory. Multi-channel files are reduced to their first channel, so
//! every frame is one 2-D intensity array.

use crate::error::LoadError;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File extensions recognized as frames (compared case-insensitively).
pub const FRAME_EXTENSIONS: &[&str] = &["tif", "tiff"];

pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;
pub type Gray32FImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// How frame intensities are represented after load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Keep native bit depth; display scaling uses stack-wide statistics.
    #[default]
    Fidelity,
    /// Rescale each frame to 8-bit by its own min/max, as 3-channel RGB.
    Display,
}

/// Pixel data of one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePixels {
    Gray8(GrayImage),
    Gray16(Gray16Image),
    Gray32F(Gray32FImage),
    /// Display-normalized frame, gray replicated over three channels.
    Rgb8(RgbImage),
}

impl FramePixels {
    pub fn width(&self) -> u32 {
        match self {
            FramePixels::Gray8(b) => b.width(),
            FramePixels::Gray16(b) => b.width(),
            FramePixels::Gray32F(b) => b.width(),
            FramePixels::Rgb8(b) => b.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            FramePixels::Gray8(b) => b.height(),
            FramePixels::Gray16(b) => b.height(),
            FramePixels::Gray32F(b) => b.height(),
            FramePixels::Rgb8(b) => b.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn channel_count(&self) -> usize {
        match self {
            FramePixels::Rgb8(_) => 3,
            _ => 1,
        }
    }

    /// Single-channel intensities in row-major order.
    ///
    /// RGB frames are reduced with Rec. 601 luma weights.
    pub fn gray_values(&self) -> Vec<f32> {
        match self {
            FramePixels::Gray8(b) => b.as_raw().iter().map(|&v| f32::from(v)).collect(),
            FramePixels::Gray16(b) => b.as_raw().iter().map(|&v| f32::from(v)).collect(),
            FramePixels::Gray32F(b) => b.as_raw().clone(),
            FramePixels::Rgb8(b) => b
                .pixels()
                .map(|p| {
                    0.299 * f32::from(p.0[0]) + 0.587 * f32::from(p.0[1]) + 0.114 * f32::from(p.0[2])
                })
                .collect(),
        }
    }

    /// Each channel as its own row-major plane.
    pub fn planes(&self) -> Vec<Vec<f32>> {
        match self {
            FramePixels::Rgb8(b) => (0..3)
                .map(|c| {
                    b.as_raw()
                        .iter()
                        .skip(c)
                        .step_by(3)
                        .map(|&v| f32::from(v))
                        .collect()
                })
                .collect(),
            _ => vec![self.gray_values()],
        }
    }

    /// Build pixels of the same kind and size from planes, rounding and
    /// saturating into the native sample type.
    pub fn with_planes(&self, planes: &[Vec<f32>]) -> Option<FramePixels> {
        let (w, h) = self.dimensions();
        let first = planes.first()?;
        let pixels = match self {
            FramePixels::Gray8(_) => {
                FramePixels::Gray8(GrayImage::from_raw(w, h, first.iter().map(|&v| to_u8(v)).collect())?)
            }
            FramePixels::Gray16(_) => FramePixels::Gray16(Gray16Image::from_raw(
                w,
                h,
                first.iter().map(|&v| to_u16(v)).collect(),
            )?),
            FramePixels::Gray32F(_) => FramePixels::Gray32F(Gray32FImage::from_raw(w, h, first.clone())?),
            FramePixels::Rgb8(_) => {
                if planes.len() != 3 {
                    return None;
                }
                let n = first.len();
                let mut raw = Vec::with_capacity(n * 3);
                for i in 0..n {
                    for plane in planes {
                        raw.push(to_u8(*plane.get(i)?));
                    }
                }
                FramePixels::Rgb8(RgbImage::from_raw(w, h, raw)?)
            }
        };
        Some(pixels)
    }
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, f32::from(u8::MAX)) as u8
}

fn to_u16(v: f32) -> u16 {
    v.round().clamp(0.0, f32::from(u16::MAX)) as u16
}

/// One time point of the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    path: PathBuf,
    pub pixels: FramePixels,
}

impl Frame {
    pub fn new(path: PathBuf, pixels: FramePixels) -> Self {
        Self { path, pixels }
    }

    /// Source file of the frame.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Frames in load order, which is fixed for the life of the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStack {
    frames: Vec<Frame>,
    mode: LoadMode,
    registered: bool,
}

impl FrameStack {
    pub fn new(frames: Vec<Frame>, mode: LoadMode) -> Self {
        Self {
            frames,
            mode,
            registered: false,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    /// Whether rigid registration has been applied to these frames.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Source paths as strings, in frame order.
    pub fn paths(&self) -> Vec<String> {
        self.frames
            .iter()
            .map(|f| f.path.to_string_lossy().into_owned())
            .collect()
    }

    /// Swap in new pixel data for every frame at once and mark the stack
    /// registered. The caller guarantees one entry per frame.
    pub(crate) fn replace_pixels(&mut self, pixels: Vec<FramePixels>) {
        debug_assert_eq!(pixels.len(), self.frames.len());
        for (frame, new) in self.frames.iter_mut().zip(pixels) {
            frame.pixels = new;
        }
        self.registered = true;
    }
}

/// List frame files in a directory, sorted by path.
pub fn list_frame_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Directory {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && has_frame_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            FRAME_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Load every frame file in `dir`.
///
/// Any unreadable file aborts the whole load; no partial stack is returned.
pub fn load_stack(dir: &Path, mode: LoadMode) -> Result<FrameStack, LoadError> {
    let files = list_frame_files(dir)?;
    if files.is_empty() {
        return Err(LoadError::Empty {
            path: dir.to_path_buf(),
        });
    }

    let mut frames = Vec::with_capacity(files.len());
    for path in files {
        let pixels = load_frame(&path, mode)?;
        log::debug!(
            "Loaded frame {} ({}x{})",
            path.display(),
            pixels.width(),
            pixels.height()
        );
        frames.push(Frame::new(path, pixels));
    }

    log::info!("Loaded {} frames from {} ({:?} mode)", frames.len(), dir.display(), mode);
    Ok(FrameStack::new(frames, mode))
}

/// Decode one file and reduce it to a single plane.
pub fn load_frame(path: &Path, mode: LoadMode) -> Result<FramePixels, LoadError> {
    let decode_err = |source: image::ImageError| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let img = image::ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?
        .decode()
        .map_err(decode_err)?;
    let plane = first_plane(path, img)?;
    Ok(match mode {
        LoadMode::Fidelity => plane,
        LoadMode::Display => FramePixels::Rgb8(rescale_to_rgb8(&plane)),
    })
}

fn first_plane(path: &Path, img: DynamicImage) -> Result<FramePixels, LoadError> {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Err(unsupported(path, "image has zero size"));
    }
    let channels = usize::from(img.color().channel_count());

    let pixels = match img {
        DynamicImage::ImageLuma8(b) => Some(FramePixels::Gray8(b)),
        DynamicImage::ImageLuma16(b) => Some(FramePixels::Gray16(b)),
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => {
            let raw = img.into_bytes();
            GrayImage::from_raw(w, h, take_channel(&raw, channels)).map(FramePixels::Gray8)
        }
        DynamicImage::ImageLumaA16(b) => {
            Gray16Image::from_raw(w, h, take_channel(b.as_raw(), channels)).map(FramePixels::Gray16)
        }
        DynamicImage::ImageRgb16(b) => {
            Gray16Image::from_raw(w, h, take_channel(b.as_raw(), channels)).map(FramePixels::Gray16)
        }
        DynamicImage::ImageRgba16(b) => {
            Gray16Image::from_raw(w, h, take_channel(b.as_raw(), channels)).map(FramePixels::Gray16)
        }
        DynamicImage::ImageRgb32F(b) => {
            Gray32FImage::from_raw(w, h, take_channel(b.as_raw(), channels)).map(FramePixels::Gray32F)
        }
        DynamicImage::ImageRgba32F(b) => {
            Gray32FImage::from_raw(w, h, take_channel(b.as_raw(), channels)).map(FramePixels::Gray32F)
        }
        other => {
            return Err(unsupported(
                path,
                &format!("unsupported color type {:?}", other.color()),
            ))
        }
    };
    pixels.ok_or_else(|| unsupported(path, "sample count does not match dimensions"))
}

fn take_channel<T: Copy>(raw: &[T], channels: usize) -> Vec<T> {
    raw.iter().step_by(channels.max(1)).copied().collect()
}

fn unsupported(path: &Path, message: &str) -> LoadError {
    LoadError::UnsupportedShape {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Rescale one frame by its own min/max to 8-bit, replicated to RGB.
///
/// 8-bit frames are kept as they are; a constant frame becomes black.
fn rescale_to_rgb8(plane: &FramePixels) -> RgbImage {
    let (w, h) = plane.dimensions();
    let gray: Vec<u8> = match plane {
        FramePixels::Gray8(b) => b.as_raw().clone(),
        _ => {
            let values = plane.gray_values();
            let (min, max) = values
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            if max > min {
                values
                    .iter()
                    .map(|&v| ((v - min) / (max - min) * 255.0) as u8)
                    .collect()
            } else {
                vec![0; values.len()]
            }
        }
    };
    RgbImage::from_fn(w, h, |x, y| {
        let v = gray[(y * w + x) as usize];
        image::Rgb([v, v, v])
    })
}
