// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for the annotation core.
//!
//! Every fallible host-facing operation returns one of these values and
//! leaves the session state it was called on untouched.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading an image stack from a directory.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The directory itself could not be listed
    #[error("Failed to read directory {path:?}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No file in the directory carries a recognized extension
    #[error("No image files found in {path:?}")]
    Empty { path: PathBuf },

    /// A frame file could not be decoded
    #[error("Failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A frame decoded to something that cannot be reduced to one 2-D plane
    #[error("Unsupported image shape in {path:?}: {message}")]
    UnsupportedShape { path: PathBuf, message: String },
}

/// Errors raised by rigid-body registration of the stack.
#[derive(Error, Debug, PartialEq)]
pub enum RegistrationError {
    /// Registration was already applied to the loaded stack
    #[error("Stack is already registered")]
    AlreadyRegistered,

    /// No stack is loaded
    #[error("No image stack loaded")]
    NoStack,

    /// A frame's size differs from the reference frame
    #[error("Frame {frame} is {width}x{height}, reference is {ref_width}x{ref_height}")]
    ShapeMismatch {
        frame: usize,
        width: u32,
        height: u32,
        ref_width: u32,
        ref_height: u32,
    },

    /// The frame is a single intensity with nothing to align on
    #[error("Frame {frame} has no structure to align on")]
    Degenerate { frame: usize },

    /// The estimate failed or did not settle within the iteration budget
    #[error("Alignment of frame {frame} did not converge after {iterations} iterations")]
    NotConverged { frame: usize, iterations: usize },

    /// Built without the `registration` feature
    #[error("Registration is not available in this build")]
    Unavailable,
}

/// Errors raised while saving or loading an annotation snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The snapshot was made against a different image stack
    #[error("Snapshot image paths do not match the loaded stack ({saved} saved, {loaded} loaded)")]
    Mismatch { saved: usize, loaded: usize },

    /// A frame key is not a decimal frame index
    #[error("Invalid frame key '{key}' for spine '{spine}'")]
    InvalidFrameKey { spine: String, key: String },

    /// A box references a frame the loaded stack does not have
    #[error("Spine '{spine}' references frame {frame}, stack has {frames} frames")]
    FrameOutOfRange {
        spine: String,
        frame: usize,
        frames: usize,
    },

    /// No stack is loaded to validate the snapshot against
    #[error("No image stack loaded")]
    NoStack,
}

/// Errors raised while exporting the measurement table.
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error when reading the settings file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is outside its allowed range
    #[error("Invalid setting '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}
