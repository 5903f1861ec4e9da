// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Pixel processing over loaded stacks: display normalization and rigid
//! frame registration.

pub mod normalize;
pub mod registration;
