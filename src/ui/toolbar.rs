// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Toolbar: spine selection, frame navigation and zoom.

use spine_tracker::Session;

/// Result of toolbar interaction.
pub enum ToolbarAction {
    None,
    SetSpine(String),
    NewSpine,
    DeleteBox,
    PrevFrame,
    NextFrame,
    ZoomIn,
    ZoomOut,
    ResetView,
    Register,
}

/// Display the toolbar.
///
/// `spine_input` is the text field contents; it is committed as the active
/// spine when the field loses focus or Enter is pressed.
pub fn show(ui: &mut egui::Ui, session: &Session, spine_input: &mut String) -> ToolbarAction {
    let mut action = ToolbarAction::None;
    let has_stack = session.stack().is_some();

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        ui.label("Spine:");
        let edit = ui.add(egui::TextEdit::singleline(spine_input).desired_width(110.0));
        if edit.lost_focus() && spine_input.trim() != session.active_spine() {
            action = ToolbarAction::SetSpine(spine_input.clone());
        }

        egui::ComboBox::from_id_source("spine_select")
            .selected_text(session.active_spine())
            .show_ui(ui, |ui| {
                for spine in session.list_spines() {
                    if ui
                        .selectable_label(spine == session.active_spine(), spine)
                        .clicked()
                    {
                        action = ToolbarAction::SetSpine(spine.to_string());
                    }
                }
            });

        if ui.button("➕ New Spine").clicked() {
            action = ToolbarAction::NewSpine;
        }
        if ui
            .add_enabled(has_stack, egui::Button::new("🗑 Delete Box"))
            .clicked()
        {
            action = ToolbarAction::DeleteBox;
        }

        ui.separator();

        let frame = session.current_frame();
        let count = session.frame_count();
        if ui.add_enabled(frame > 0, egui::Button::new("◀")).clicked() {
            action = ToolbarAction::PrevFrame;
        }
        if count > 0 {
            ui.label(format!("Frame {} / {}", frame + 1, count));
        } else {
            ui.label("No frames");
        }
        if ui
            .add_enabled(frame + 1 < count, egui::Button::new("▶"))
            .clicked()
        {
            action = ToolbarAction::NextFrame;
        }

        ui.separator();

        if ui.button("🔍+").clicked() {
            action = ToolbarAction::ZoomIn;
        }
        if ui.button("🔍-").clicked() {
            action = ToolbarAction::ZoomOut;
        }
        if ui.button("Reset").clicked() {
            action = ToolbarAction::ResetView;
        }
        ui.label(format!("{:.0}%", session.view().zoom() * 100.0));

        ui.separator();

        let can_register = has_stack && !session.is_registered();
        if ui
            .add_enabled(can_register, egui::Button::new("Register"))
            .clicked()
        {
            action = ToolbarAction::Register;
        }
        if session.is_registered() {
            ui.label(egui::RichText::new("registered").italics().weak());
        }
    });

    action
}
