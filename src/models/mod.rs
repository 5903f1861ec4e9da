// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Data models for spine annotation.

pub mod annotation;
pub mod measurement;
pub mod project;
pub mod store;

pub use annotation::{Bbox, Handle};
pub use measurement::{MeasurementDeriver, MeasurementRow, MeasurementTable};
pub use project::AnnotationSnapshot;
pub use store::{AnnotationState, AnnotationStore};
