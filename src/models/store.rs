// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! The authoritative spine -> frame -> box mapping.
//!
//! Every mutation goes through [`AnnotationStore::set_box`] or
//! [`AnnotationStore::delete_box`], which keep the measurement table in step
//! with the boxes: one row per stored box, never more, never fewer.

use super::annotation::Bbox;
use super::measurement::{MeasurementDeriver, MeasurementTable};
use std::collections::BTreeMap;

/// Boxes and color assignments, without derived data.
///
/// This is the unit captured by undo history and by snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationState {
    /// spine name -> frame index -> box
    pub boxes: BTreeMap<String, BTreeMap<usize, Bbox>>,
    pub colors: BTreeMap<String, String>,
    /// Number of colors handed out so far.
    pub color_index: usize,
}

/// Annotation boxes plus their derived measurement rows.
#[derive(Debug, Clone)]
pub struct AnnotationStore {
    state: AnnotationState,
    measurements: MeasurementTable,
    deriver: MeasurementDeriver,
    palette: Vec<String>,
}

impl AnnotationStore {
    /// Create an empty store. An empty palette falls back to gray.
    pub fn new(deriver: MeasurementDeriver, palette: Vec<String>) -> Self {
        let palette = if palette.is_empty() {
            vec!["gray".to_string()]
        } else {
            palette
        };
        Self {
            state: AnnotationState::default(),
            measurements: MeasurementTable::new(),
            deriver,
            palette,
        }
    }

    pub fn get_box(&self, spine: &str, frame: usize) -> Option<Bbox> {
        self.state.boxes.get(spine)?.get(&frame).copied()
    }

    /// Store a box for `(spine, frame)` and recompute its measurement row.
    ///
    /// The box is normalized and clamped to `width x height` first; a spine
    /// seen for the first time gets the next palette color. Returns the box
    /// as stored.
    pub fn set_box(&mut self, spine: &str, frame: usize, bbox: Bbox, width: u32, height: u32) -> Bbox {
        let committed = bbox.sanitized(width, height);
        if committed != bbox {
            log::debug!("Normalized box {:?} to {:?} for {} on frame {}", bbox, committed, spine, frame);
        }
        self.assign_color(spine);
        self.state
            .boxes
            .entry(spine.to_string())
            .or_default()
            .insert(frame, committed);
        self.measurements
            .upsert(self.deriver.derive(spine, frame, &committed));
        committed
    }

    /// Remove a box together with its measurement row.
    pub fn delete_box(&mut self, spine: &str, frame: usize) -> Option<Bbox> {
        let removed = self.state.boxes.get_mut(spine)?.remove(&frame)?;
        self.measurements.remove(spine, frame);
        Some(removed)
    }

    /// Spine names in sorted order.
    pub fn list_spines(&self) -> Vec<&str> {
        self.state.boxes.keys().map(String::as_str).collect()
    }

    pub fn color_of(&self, spine: &str) -> Option<&str> {
        self.state.colors.get(spine).map(String::as_str)
    }

    /// Number of spines that have been assigned a color.
    pub fn color_count(&self) -> usize {
        self.state.colors.len()
    }

    /// Frame indices holding a box for `spine`, ascending.
    pub fn annotated_frames(&self, spine: &str) -> Vec<usize> {
        self.state
            .boxes
            .get(spine)
            .map(|frames| frames.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Every `(spine, box)` on one frame, by spine name.
    pub fn boxes_on_frame(&self, frame: usize) -> Vec<(&str, Bbox)> {
        self.state
            .boxes
            .iter()
            .filter_map(|(name, frames)| frames.get(&frame).map(|b| (name.as_str(), *b)))
            .collect()
    }

    pub fn box_count(&self) -> usize {
        self.state.boxes.values().map(BTreeMap::len).sum()
    }

    pub fn measurements(&self) -> &MeasurementTable {
        &self.measurements
    }

    pub fn deriver(&self) -> &MeasurementDeriver {
        &self.deriver
    }

    pub fn state(&self) -> &AnnotationState {
        &self.state
    }

    /// Replace all boxes and colors, rebuilding measurements from scratch.
    pub fn restore(&mut self, state: AnnotationState) {
        self.state = state;
        self.rebuild_measurements();
    }

    /// Roll the boxes back to `state`, keeping color assignments.
    ///
    /// Colors only accumulate and the color counter never decreases, so a
    /// spine keeps its color through undo and redo.
    pub fn restore_boxes(&mut self, state: AnnotationState) {
        for (spine, color) in state.colors {
            self.state.colors.entry(spine).or_insert(color);
        }
        self.state.color_index = self.state.color_index.max(state.color_index);
        self.state.boxes = state.boxes;
        self.rebuild_measurements();
    }

    /// Drop every box, color and measurement.
    pub fn clear(&mut self) {
        self.restore(AnnotationState::default());
    }

    fn rebuild_measurements(&mut self) {
        self.measurements.clear();
        for (spine, frames) in &self.state.boxes {
            for (frame, bbox) in frames {
                self.measurements
                    .upsert(self.deriver.derive(spine, *frame, bbox));
            }
        }
    }

    fn assign_color(&mut self, spine: &str) {
        if self.state.colors.contains_key(spine) {
            return;
        }
        let color = self.palette[self.state.color_index % self.palette.len()].clone();
        log::info!("New spine '{}' assigned color {}", spine, color);
        self.state.colors.insert(spine.to_string(), color);
        // Only used modulo the palette length
        self.state.color_index = self.state.color_index.wrapping_add(1);
    }
}

impl Default for AnnotationStore {
    fn default() -> Self {
        let settings = crate::config::Settings::default();
        Self::new(MeasurementDeriver::from_settings(&settings), settings.palette)
    }
}
