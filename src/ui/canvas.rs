// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Drawing canvas for frame display and box annotation.
//!
//! The canvas draws the current frame at the session's zoom and pan and
//! reports pointer activity in canvas-local screen coordinates. It never
//! edits anything itself; the app forwards its actions to the session.

use spine_tracker::util::geometry::ViewTransform;
use spine_tracker::Overlay;

/// Result of canvas interaction.
pub enum CanvasAction {
    None,
    PointerDown(f64, f64),
    PointerMove(f64, f64),
    PointerUp(f64, f64),
    /// Press and release without movement
    Click(f64, f64),
    Pan(egui::Vec2),
    ZoomIn,
    ZoomOut,
}

/// Display the frame and its boxes and collect mouse interactions.
pub fn show(
    ui: &mut egui::Ui,
    texture: Option<&egui::TextureHandle>,
    image_size: Option<(u32, u32)>,
    view: &ViewTransform,
    overlays: &[Overlay],
) -> CanvasAction {
    let mut action = CanvasAction::None;
    ui.style_mut().visuals.extreme_bg_color = egui::Color32::from_gray(40);

    let available_size = ui.available_size();

    egui::Frame::canvas(ui.style()).show(ui, |ui| {
        ui.set_min_size(available_size);

        let (Some(texture), Some((img_width, img_height))) = (texture, image_size) else {
            show_welcome(ui);
            return;
        };

        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let origin = response.rect.min;
        let painter = painter.with_clip_rect(response.rect);

        let (x0, y0) = view.to_screen(0, 0);
        let (x1, y1) = view.to_screen(img_width as i32, img_height as i32);
        let image_rect = egui::Rect::from_min_max(
            origin + egui::vec2(x0 as f32, y0 as f32),
            origin + egui::vec2(x1 as f32, y1 as f32),
        );
        painter.image(
            texture.id(),
            image_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        for overlay in overlays {
            draw_overlay(&painter, origin, view, overlay);
        }

        let local = |pos: egui::Pos2| (f64::from(pos.x - origin.x), f64::from(pos.y - origin.y));

        if response.clicked_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                let (x, y) = local(pos);
                action = CanvasAction::Click(x, y);
            }
        } else if response.drag_started_by(egui::PointerButton::Primary) {
            let press = ui.input(|i| i.pointer.press_origin());
            if let Some(pos) = press.or_else(|| response.interact_pointer_pos()) {
                let (x, y) = local(pos);
                action = CanvasAction::PointerDown(x, y);
            }
        } else if response.drag_stopped_by(egui::PointerButton::Primary) {
            let pos = response
                .interact_pointer_pos()
                .or_else(|| ui.input(|i| i.pointer.latest_pos()));
            if let Some(pos) = pos {
                let (x, y) = local(pos);
                action = CanvasAction::PointerUp(x, y);
            }
        } else if response.dragged_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                let (x, y) = local(pos);
                action = CanvasAction::PointerMove(x, y);
            }
        } else if response.dragged_by(egui::PointerButton::Middle)
            || response.dragged_by(egui::PointerButton::Secondary)
        {
            action = CanvasAction::Pan(response.drag_delta());
        } else if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll > 0.0 {
                action = CanvasAction::ZoomIn;
            } else if scroll < 0.0 {
                action = CanvasAction::ZoomOut;
            }
        }
    });

    action
}

fn show_welcome(ui: &mut egui::Ui) {
    ui.centered_and_justified(|ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(20.0);
            ui.heading(
                egui::RichText::new("Spine Tracker")
                    .size(32.0)
                    .color(egui::Color32::from_gray(200)),
            );
            ui.label(
                egui::RichText::new("Dendritic spine annotation over time")
                    .size(14.0)
                    .color(egui::Color32::from_gray(150)),
            );
            ui.add_space(20.0);
            ui.label(
                egui::RichText::new("Open a folder of TIFF frames to begin annotating")
                    .color(egui::Color32::from_gray(180)),
            );
            ui.add_space(10.0);
            ui.label(
                egui::RichText::new("File > Open Stack...")
                    .weak()
                    .color(egui::Color32::from_gray(130)),
            );
        });
    });
}

/// Draw one box with its spine label.
fn draw_overlay(painter: &egui::Painter, origin: egui::Pos2, view: &ViewTransform, overlay: &Overlay) {
    let color = overlay
        .color
        .as_deref()
        .map(color_from_name)
        .unwrap_or(egui::Color32::GRAY);
    let (x1, y1) = view.to_screen(overlay.bbox.x1, overlay.bbox.y1);
    let (x2, y2) = view.to_screen(overlay.bbox.x2, overlay.bbox.y2);
    let rect = egui::Rect::from_two_pos(
        origin + egui::vec2(x1 as f32, y1 as f32),
        origin + egui::vec2(x2 as f32, y2 as f32),
    );

    let width = if overlay.active { 2.5 } else { 1.5 };
    painter.rect_stroke(rect, 0.0, egui::Stroke::new(width, color));

    if overlay.active {
        // Corner handles
        for corner in [rect.left_top(), rect.right_top(), rect.left_bottom(), rect.right_bottom()] {
            let fill = if overlay.preview { egui::Color32::WHITE } else { color };
            painter.circle_filled(corner, 4.0, fill);
            painter.circle_stroke(corner, 4.0, egui::Stroke::new(1.0, egui::Color32::BLACK));
        }
    }

    painter.text(
        rect.left_top() - egui::vec2(0.0, 2.0),
        egui::Align2::LEFT_BOTTOM,
        &overlay.spine,
        egui::FontId::proportional(12.0),
        color,
    );
}

/// Map a palette color name to a display color.
pub fn color_from_name(name: &str) -> egui::Color32 {
    match name.trim().to_ascii_lowercase().as_str() {
        "red" => egui::Color32::from_rgb(230, 50, 50),
        "blue" => egui::Color32::from_rgb(60, 110, 240),
        "green" => egui::Color32::from_rgb(50, 200, 80),
        "orange" => egui::Color32::from_rgb(255, 150, 30),
        "purple" => egui::Color32::from_rgb(160, 70, 220),
        "cyan" => egui::Color32::from_rgb(40, 210, 220),
        "yellow" => egui::Color32::from_rgb(240, 230, 40),
        "pink" => egui::Color32::from_rgb(250, 120, 190),
        "white" => egui::Color32::WHITE,
        "magenta" => egui::Color32::from_rgb(230, 40, 230),
        other => parse_hex(other).unwrap_or(egui::Color32::GRAY),
    }
}

fn parse_hex(value: &str) -> Option<egui::Color32> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(egui::Color32::from_rgb(channel(0)?, channel(2)?, channel(4)?))
}
