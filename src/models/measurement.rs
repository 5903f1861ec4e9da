// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Length measurements derived from box geometry.
//!
//! A measurement is a pure function of a box and two constants, so the
//! whole table can be rebuilt from stored boxes at any time.

use super::annotation::Bbox;
use crate::config::Settings;
use serde::{Deserialize, Serialize};

/// One row of the measurement table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    pub spine_name: String,
    pub image_idx: usize,
    pub length_pixels: f64,
    pub length_microns: f64,
    pub stable: bool,
}

/// Derives measurements from boxes using fixed conversion constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementDeriver {
    pub pixel_to_micron: f64,
    pub stability_threshold: f64,
}

impl MeasurementDeriver {
    pub fn new(pixel_to_micron: f64, stability_threshold: f64) -> Self {
        Self {
            pixel_to_micron,
            stability_threshold,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.pixel_to_micron, settings.stability_threshold)
    }

    /// Compute the row for one box.
    pub fn derive(&self, spine: &str, frame: usize, bbox: &Bbox) -> MeasurementRow {
        let length_pixels = bbox.diagonal();
        MeasurementRow {
            spine_name: spine.to_string(),
            image_idx: frame,
            length_pixels,
            length_microns: length_pixels * self.pixel_to_micron,
            stable: length_pixels < self.stability_threshold,
        }
    }
}

impl Default for MeasurementDeriver {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Measurement rows in insertion order, unique per `(spine, frame)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementTable {
    rows: Vec<MeasurementRow>,
}

impl MeasurementTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the row for the row's key, appending it at the end.
    pub fn upsert(&mut self, row: MeasurementRow) {
        self.remove(&row.spine_name, row.image_idx);
        self.rows.push(row);
    }

    /// Remove the row for a key; returns whether one existed.
    pub fn remove(&mut self, spine: &str, frame: usize) -> bool {
        let before = self.rows.len();
        self.rows
            .retain(|r| !(r.spine_name == spine && r.image_idx == frame));
        self.rows.len() != before
    }

    pub fn get(&self, spine: &str, frame: usize) -> Option<&MeasurementRow> {
        self.rows
            .iter()
            .find(|r| r.spine_name == spine && r.image_idx == frame)
    }

    pub fn rows(&self) -> &[MeasurementRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Rows sorted by spine name then frame, independent of insertion order.
    pub fn sorted(&self) -> Vec<MeasurementRow> {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            a.spine_name
                .cmp(&b.spine_name)
                .then(a.image_idx.cmp(&b.image_idx))
        });
        rows
    }
}
