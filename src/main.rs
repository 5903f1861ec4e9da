// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Spine Tracker
//!
//! A desktop application for annotating dendritic spines with bounding boxes
//! across the frames of a time-lapse image stack.

mod app;
mod ui;

use anyhow::Result;
use app::SpineApp;
use spine_tracker::Settings;

fn main() -> Result<()> {
    let (settings, config_error) = match Settings::locate() {
        Some(path) => match Settings::load(&path) {
            Ok(settings) => (settings, None),
            Err(e) => (
                Settings::default(),
                Some(format!("{}: {}", path.display(), e)),
            ),
        },
        None => (Settings::default(), None),
    };

    // RUST_LOG still wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_filter()),
    )
    .init();

    if let Some(message) = config_error {
        log::error!("Ignoring configuration {}", message);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("Spine Tracker"),
        ..Default::default()
    };

    eframe::run_native(
        "Spine Tracker",
        options,
        Box::new(|_cc| Ok(Box::new(SpineApp::new(settings)))),
    )
    .map_err(|e| anyhow::anyhow!("Application error: {}", e))?;

    Ok(())
}
