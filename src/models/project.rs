// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Serializable annotation snapshot.
//!
//! The snapshot mirrors the on-disk JSON layout: frame indices are stored as
//! decimal string keys and boxes as `[x1, y1, x2, y2]` arrays.

use super::annotation::Bbox;
use super::store::AnnotationState;
use crate::error::SnapshotError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete annotation data for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSnapshot {
    pub spine_annotations: BTreeMap<String, BTreeMap<String, Bbox>>,
    pub spine_colors: BTreeMap<String, String>,
    pub color_index: usize,
    #[serde(default)]
    pub image_paths: Vec<String>,
}

impl AnnotationSnapshot {
    /// Capture annotation state along with the stack it was drawn on.
    pub fn capture(state: &AnnotationState, image_paths: Vec<String>) -> Self {
        let spine_annotations = state
            .boxes
            .iter()
            .map(|(spine, frames)| {
                let frames = frames
                    .iter()
                    .map(|(frame, bbox)| (frame.to_string(), *bbox))
                    .collect();
                (spine.clone(), frames)
            })
            .collect();
        Self {
            spine_annotations,
            spine_colors: state.colors.clone(),
            color_index: state.color_index,
            image_paths,
        }
    }

    /// Whether this snapshot may be applied to a stack with these paths.
    ///
    /// Snapshots that predate path tracking carry no paths and match any stack.
    pub fn matches_paths(&self, image_paths: &[String]) -> bool {
        self.image_paths.is_empty() || self.image_paths == image_paths
    }

    /// Convert back into annotation state, checking frame keys.
    ///
    /// `frame_count` bounds the allowed frame indices.
    pub fn to_state(&self, frame_count: usize) -> Result<AnnotationState, SnapshotError> {
        let mut boxes = BTreeMap::new();
        for (spine, frames) in &self.spine_annotations {
            let mut parsed = BTreeMap::new();
            for (key, bbox) in frames {
                let frame: usize = key.parse().map_err(|_| SnapshotError::InvalidFrameKey {
                    spine: spine.clone(),
                    key: key.clone(),
                })?;
                if frame >= frame_count {
                    return Err(SnapshotError::FrameOutOfRange {
                        spine: spine.clone(),
                        frame,
                        frames: frame_count,
                    });
                }
                parsed.insert(frame, *bbox);
            }
            boxes.insert(spine.clone(), parsed);
        }

        Ok(AnnotationState {
            boxes,
            colors: self.spine_colors.clone(),
            color_index: self.color_index,
        })
    }
}
