// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! I/O operations for image stacks, annotation snapshots and measurements.

pub mod media;
pub mod serialization;
