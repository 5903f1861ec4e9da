// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Spine Tracker - dendritic spine annotation over time-lapse image stacks.
//!
//! The library holds everything below the GUI: stack loading and display
//! normalization, rigid registration, the annotation store with its derived
//! measurements, interactive box editing and snapshot/CSV persistence. A
//! [`Session`] ties them together for a host.

pub mod config;
pub mod editor;
pub mod error;
pub mod history;
pub mod imaging;
pub mod io;
pub mod models;
pub mod session;
pub mod util;

pub use config::Settings;
pub use error::{ConfigError, ExportError, LoadError, RegistrationError, SnapshotError};
pub use session::{Overlay, Session};
