// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Main application state and egui App implementation.
//!
//! [`SpineApp`] owns one [`Session`] and translates menu, toolbar, canvas and
//! keyboard input into session calls. Stack loading runs on a background
//! thread; everything else happens on the UI thread, one event at a time.

use crate::ui::{canvas, properties, toolbar};
use spine_tracker::error::LoadError;
use spine_tracker::io::media::{self, FrameStack};
use spine_tracker::{Session, Settings};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};

/// Main application state.
pub struct SpineApp {
    session: Session,

    /// Texture of the displayed frame
    texture: Option<egui::TextureHandle>,

    /// Set whenever the displayed pixels may have changed
    texture_dirty: bool,

    /// Contents of the spine name field
    spine_input: String,

    /// Sub-pixel pan left over from previous drags
    pan_residual: egui::Vec2,

    /// Receiver for background stack loading
    stack_loader: Option<Receiver<Result<FrameStack, LoadError>>>,

    /// Loading state message
    loading_message: Option<String>,

    /// Last error or notice shown in the status bar
    status: Option<String>,
}

impl SpineApp {
    pub fn new(settings: Settings) -> Self {
        let session = Session::new(settings);
        let spine_input = session.active_spine().to_string();
        Self {
            session,
            texture: None,
            texture_dirty: true,
            spine_input,
            pan_residual: egui::Vec2::ZERO,
            stack_loader: None,
            loading_message: None,
            status: None,
        }
    }

    /// Load a folder of frames on a background thread.
    fn open_stack(&mut self, dir: PathBuf) {
        let (sender, receiver) = channel();
        self.stack_loader = Some(receiver);
        self.loading_message = Some(format!("Loading {}...", dir.display()));
        let mode = self.session.settings().load_mode;

        std::thread::spawn(move || {
            let _ = sender.send(media::load_stack(&dir, mode));
        });
    }

    fn poll_loader(&mut self) {
        let Some(ref receiver) = self.stack_loader else {
            return;
        };
        let Ok(result) = receiver.try_recv() else {
            return;
        };
        self.stack_loader = None;
        self.loading_message = None;

        match result {
            Ok(stack) => {
                let count = self.session.install_stack(stack);
                self.texture_dirty = true;
                self.status = Some(format!("Loaded {} frames", count));
                log::info!("Loaded stack of {} frames", count);
            }
            Err(e) => {
                log::error!("Failed to load stack: {}", e);
                self.status = Some(format!("Failed to load stack: {}", e));
            }
        }
    }

    fn register(&mut self) {
        match self.session.register_stack() {
            Ok(transforms) => {
                self.texture_dirty = true;
                self.status = Some(format!("Registered {} frames", transforms.len()));
            }
            Err(e) => {
                log::error!("Registration failed: {}", e);
                self.status = Some(format!("Registration failed: {}", e));
            }
        }
    }

    fn save_annotations(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .set_file_name("annotations.json")
            .save_file()
        else {
            return;
        };
        if let Err(e) = self.session.save_snapshot(&path) {
            log::error!("Failed to save annotations: {}", e);
            self.status = Some(format!("Failed to save annotations: {}", e));
        }
    }

    fn load_annotations(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .pick_file()
        else {
            return;
        };
        match self.session.load_snapshot(&path) {
            Ok(()) => self.status = Some(format!("Loaded annotations from {}", path.display())),
            Err(e) => {
                log::error!("Failed to load annotations: {}", e);
                self.status = Some(format!("Failed to load annotations: {}", e));
            }
        }
    }

    fn export_measurements(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV", &["csv"])
            .set_file_name("spine_measurements.csv")
            .save_file()
        else {
            return;
        };
        if let Err(e) = self.session.export_measurements(&path) {
            log::error!("Failed to export measurements: {}", e);
            self.status = Some(format!("Failed to export measurements: {}", e));
        }
    }

    fn set_spine(&mut self, name: &str) {
        self.session.set_active_spine(name);
        self.spine_input = self.session.active_spine().to_string();
    }

    fn goto_frame(&mut self, frame: usize) {
        if self.session.goto_frame(frame) {
            self.texture_dirty = true;
        }
    }

    fn step_frame(&mut self, forward: bool) {
        let moved = if forward {
            self.session.next_frame()
        } else {
            self.session.prev_frame()
        };
        if moved {
            self.texture_dirty = true;
        }
    }

    fn pan(&mut self, delta: egui::Vec2) {
        self.pan_residual += delta;
        let dx = self.pan_residual.x.trunc();
        let dy = self.pan_residual.y.trunc();
        self.pan_residual -= egui::vec2(dx, dy);
        if dx != 0.0 || dy != 0.0 {
            self.session.pan_by(dx as i32, dy as i32);
        }
    }

    /// Upload the current frame if it changed since the last upload.
    fn refresh_texture(&mut self, ctx: &egui::Context) {
        if !self.texture_dirty {
            return;
        }
        self.texture_dirty = false;
        self.texture = self.session.render_current().map(|rgb| {
            let size = [rgb.width() as usize, rgb.height() as usize];
            let color_image = egui::ColorImage::from_rgb(size, rgb.as_raw());
            ctx.load_texture("frame", color_image, egui::TextureOptions::NEAREST)
        });
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.session.cancel_gesture();
        }

        // Only process if no text field is focused (to avoid editing the spine name)
        if ctx.wants_keyboard_input() {
            return;
        }

        if ctx.input(|i| i.key_pressed(egui::Key::ArrowRight)) {
            self.step_frame(true);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowLeft)) {
            self.step_frame(false);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace)) {
            self.session.delete_current_box();
        }
        if ctx.input(|i| i.modifiers.command && i.key_pressed(egui::Key::Z) && !i.modifiers.shift) {
            self.session.undo();
        }
        if ctx.input(|i| {
            (i.modifiers.command && i.modifiers.shift && i.key_pressed(egui::Key::Z))
                || (i.modifiers.command && i.key_pressed(egui::Key::Y))
        }) {
            self.session.redo();
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Stack...").clicked() {
                        if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                            self.open_stack(dir);
                        }
                        ui.close_menu();
                    }
                    let has_stack = self.session.stack().is_some();
                    if ui
                        .add_enabled(has_stack, egui::Button::new("Load Annotations..."))
                        .clicked()
                    {
                        self.load_annotations();
                        ui.close_menu();
                    }
                    if ui.button("Save Annotations...").clicked() {
                        self.save_annotations();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Export Measurements...").clicked() {
                        self.export_measurements();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("Edit", |ui| {
                    if ui
                        .add_enabled(self.session.can_undo(), egui::Button::new("Undo (Ctrl+Z)"))
                        .clicked()
                    {
                        self.session.undo();
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(
                            self.session.can_redo(),
                            egui::Button::new("Redo (Ctrl+Shift+Z)"),
                        )
                        .clicked()
                    {
                        self.session.redo();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Delete Box (Del)").clicked() {
                        self.session.delete_current_box();
                        ui.close_menu();
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui.button("Zoom In").clicked() {
                        self.session.zoom_in();
                        ui.close_menu();
                    }
                    if ui.button("Zoom Out").clicked() {
                        self.session.zoom_out();
                        ui.close_menu();
                    }
                    if ui.button("Reset Zoom").clicked() {
                        self.session.reset_view();
                        ui.close_menu();
                    }
                });

                ui.menu_button("Tools", |ui| {
                    let can_register =
                        self.session.stack().is_some() && !self.session.is_registered();
                    if ui
                        .add_enabled(can_register, egui::Button::new("Register Stack"))
                        .clicked()
                    {
                        self.register();
                        ui.close_menu();
                    }
                });
            });
        });
    }
}

impl eframe::App for SpineApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_loader();

        // Request repaint if still loading (to update spinner)
        if self.loading_message.is_some() {
            ctx.request_repaint();
        }

        self.menu_bar(ctx);

        let toolbar_action = egui::TopBottomPanel::top("toolbar")
            .show(ctx, |ui| toolbar::show(ui, &self.session, &mut self.spine_input))
            .inner;

        match toolbar_action {
            toolbar::ToolbarAction::SetSpine(name) => self.set_spine(&name),
            toolbar::ToolbarAction::NewSpine => {
                let name = self.session.suggest_spine_name();
                self.set_spine(&name);
            }
            toolbar::ToolbarAction::DeleteBox => {
                self.session.delete_current_box();
            }
            toolbar::ToolbarAction::PrevFrame => self.step_frame(false),
            toolbar::ToolbarAction::NextFrame => self.step_frame(true),
            toolbar::ToolbarAction::ZoomIn => self.session.zoom_in(),
            toolbar::ToolbarAction::ZoomOut => self.session.zoom_out(),
            toolbar::ToolbarAction::ResetView => self.session.reset_view(),
            toolbar::ToolbarAction::Register => self.register(),
            toolbar::ToolbarAction::None => {}
        }

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match self.session.stack() {
                    Some(stack) => ui.label(format!(
                        "{} frames, {} boxes",
                        stack.len(),
                        self.session.store().box_count()
                    )),
                    None => ui.label("No stack loaded"),
                };
                if let Some(ref status) = self.status {
                    ui.separator();
                    ui.label(status);
                }
            });
        });

        let properties_action = egui::SidePanel::right("properties")
            .default_width(260.0)
            .show(ctx, |ui| properties::show(ui, &self.session))
            .inner;

        if let properties::PropertiesAction::Goto { spine, frame } = properties_action {
            self.set_spine(&spine);
            self.goto_frame(frame);
        }

        self.handle_keyboard(ctx);
        self.refresh_texture(ctx);

        let canvas_action = egui::CentralPanel::default()
            .show(ctx, |ui| {
                if let Some(ref message) = self.loading_message {
                    ui.centered_and_justified(|ui| {
                        ui.vertical_centered(|ui| {
                            ui.add_space(20.0);
                            ui.spinner();
                            ui.add_space(10.0);
                            ui.label(
                                egui::RichText::new(message)
                                    .size(16.0)
                                    .color(egui::Color32::from_gray(200)),
                            );
                        });
                    });
                    canvas::CanvasAction::None
                } else {
                    let image_size = self
                        .session
                        .stack()
                        .and_then(|s| s.frame(self.session.current_frame()))
                        .map(|f| f.dimensions());
                    canvas::show(
                        ui,
                        self.texture.as_ref(),
                        image_size,
                        self.session.view(),
                        &self.session.overlays(),
                    )
                }
            })
            .inner;

        match canvas_action {
            canvas::CanvasAction::PointerDown(x, y) => self.session.pointer_down(x, y),
            canvas::CanvasAction::PointerMove(x, y) => self.session.pointer_move(x, y),
            canvas::CanvasAction::PointerUp(x, y) => {
                self.session.pointer_up(x, y);
            }
            canvas::CanvasAction::Click(x, y) => {
                self.session.click(x, y);
            }
            canvas::CanvasAction::Pan(delta) => self.pan(delta),
            canvas::CanvasAction::ZoomIn => self.session.zoom_in(),
            canvas::CanvasAction::ZoomOut => self.session.zoom_out(),
            canvas::CanvasAction::None => {}
        }
    }
}
