// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Measurement panel.
//!
//! Lists the active spine's annotated frames and the full measurement table.
//! Clicking a row jumps to that spine and frame.

use spine_tracker::Session;

/// Result of panel interaction.
pub enum PropertiesAction {
    None,
    Goto { spine: String, frame: usize },
}

pub fn show(ui: &mut egui::Ui, session: &Session) -> PropertiesAction {
    let mut action = PropertiesAction::None;

    ui.heading("Active spine");
    ui.label(session.active_spine());
    let frames = session.annotated_frames(session.active_spine());
    if frames.is_empty() {
        ui.label(egui::RichText::new("No boxes yet").weak());
    } else {
        ui.horizontal_wrapped(|ui| {
            for frame in frames {
                let current = frame == session.current_frame();
                if ui.selectable_label(current, frame.to_string()).clicked() {
                    action = PropertiesAction::Goto {
                        spine: session.active_spine().to_string(),
                        frame,
                    };
                }
            }
        });
    }

    ui.separator();
    ui.heading("Measurements");

    let rows = session.measurements().sorted();
    if rows.is_empty() {
        ui.label(egui::RichText::new("Draw a box to measure a spine").weak());
        return action;
    }

    egui::ScrollArea::vertical().show(ui, |ui| {
        egui::Grid::new("measurements")
            .striped(true)
            .num_columns(4)
            .show(ui, |ui| {
                ui.strong("Spine");
                ui.strong("Frame");
                ui.strong("µm");
                ui.strong("Stable");
                ui.end_row();

                for row in &rows {
                    let selected = row.spine_name == session.active_spine()
                        && row.image_idx == session.current_frame();
                    if ui.selectable_label(selected, &row.spine_name).clicked() {
                        action = PropertiesAction::Goto {
                            spine: row.spine_name.clone(),
                            frame: row.image_idx,
                        };
                    }
                    ui.label(row.image_idx.to_string());
                    ui.label(format!("{:.2}", row.length_microns))
                        .on_hover_text(format!("{:.2} px", row.length_pixels));
                    ui.label(if row.stable { "yes" } else { "no" });
                    ui.end_row();
                }
            });
    });

    action
}
