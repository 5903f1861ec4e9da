// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation session.
//!
//! [`Session`] is the single owner of everything an interactive host works
//! with: the loaded stack, display caches, view state, active spine, the
//! annotation store, the gesture engine and undo history. Hosts drive it
//! through the methods below and never touch the parts directly, which keeps
//! loads, registration and pointer events strictly serialized.

use crate::config::Settings;
use crate::editor::{BoxEditEngine, Commit, EditTarget};
use crate::error::{ExportError, LoadError, RegistrationError, SnapshotError};
use crate::history::History;
use crate::imaging::normalize::DisplayNormalizer;
use crate::imaging::registration::{self, RigidTransform};
use crate::io::media::{self, FrameStack};
use crate::io::serialization;
use crate::models::annotation::Bbox;
use crate::models::measurement::{MeasurementDeriver, MeasurementTable};
use crate::models::project::AnnotationSnapshot;
use crate::models::store::AnnotationStore;
use crate::util::geometry::ViewTransform;
use image::RgbImage;
use std::path::Path;

/// Spine selected when a session starts.
pub const DEFAULT_SPINE: &str = "spine_1";

/// A box to draw over the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub spine: String,
    pub bbox: Bbox,
    pub color: Option<String>,
    /// Belongs to the active spine.
    pub active: bool,
    /// Shows an uncommitted gesture.
    pub preview: bool,
}

/// Interactive annotation session over one image stack.
pub struct Session {
    settings: Settings,
    stack: Option<FrameStack>,
    normalizer: DisplayNormalizer,
    view: ViewTransform,
    active_spine: String,
    current_frame: usize,
    store: AnnotationStore,
    engine: BoxEditEngine,
    history: History,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        let store = AnnotationStore::new(
            MeasurementDeriver::from_settings(&settings),
            settings.palette.clone(),
        );
        Self {
            settings,
            stack: None,
            normalizer: DisplayNormalizer::new(),
            view: ViewTransform::identity(),
            active_spine: DEFAULT_SPINE.to_string(),
            current_frame: 0,
            store,
            engine: BoxEditEngine::new(),
            history: History::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // --- Stack -------------------------------------------------------------

    /// Load every frame in `dir`, replacing the current stack and starting a
    /// fresh set of annotations. On error nothing changes.
    pub fn load_stack(&mut self, dir: &Path) -> Result<usize, LoadError> {
        let stack = media::load_stack(dir, self.settings.load_mode)?;
        Ok(self.install_stack(stack))
    }

    /// Make an already loaded stack current; see [`Session::load_stack`].
    pub fn install_stack(&mut self, stack: FrameStack) -> usize {
        let count = stack.len();
        self.engine.cancel();
        self.stack = Some(stack);
        self.normalizer.invalidate();
        self.current_frame = 0;
        if self.store.box_count() > 0 {
            log::info!("Discarding {} boxes from the previous stack", self.store.box_count());
        }
        self.store.clear();
        self.history.clear();
        count
    }

    /// Align all frames to frame 0. On error the frames are unchanged.
    pub fn register_stack(&mut self) -> Result<Vec<RigidTransform>, RegistrationError> {
        self.engine.cancel();
        let stack = self.stack.as_mut().ok_or(RegistrationError::NoStack)?;
        let transforms = registration::register_stack(stack)?;
        self.normalizer.invalidate();
        Ok(transforms)
    }

    pub fn stack(&self) -> Option<&FrameStack> {
        self.stack.as_ref()
    }

    pub fn frame_count(&self) -> usize {
        self.stack.as_ref().map_or(0, FrameStack::len)
    }

    pub fn is_registered(&self) -> bool {
        self.stack.as_ref().is_some_and(FrameStack::is_registered)
    }

    /// Display image of the current frame.
    pub fn render_current(&mut self) -> Option<&RgbImage> {
        let stack = self.stack.as_ref()?;
        self.normalizer.render(stack, self.current_frame)
    }

    fn current_dimensions(&self) -> Option<(u32, u32)> {
        self.stack
            .as_ref()?
            .frame(self.current_frame)
            .map(|f| f.dimensions())
    }

    // --- Navigation ----------------------------------------------------------

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Show another frame, keeping zoom and pan. Cancels any gesture.
    pub fn goto_frame(&mut self, index: usize) -> bool {
        if index >= self.frame_count() || index == self.current_frame {
            return false;
        }
        self.engine.cancel();
        self.current_frame = index;
        true
    }

    pub fn next_frame(&mut self) -> bool {
        self.goto_frame(self.current_frame + 1)
    }

    pub fn prev_frame(&mut self) -> bool {
        match self.current_frame.checked_sub(1) {
            Some(index) => self.goto_frame(index),
            None => false,
        }
    }

    // --- Spines --------------------------------------------------------------

    pub fn active_spine(&self) -> &str {
        &self.active_spine
    }

    /// Direct subsequent drawing at another spine name.
    ///
    /// Existing boxes are neither renamed nor merged. Blank names are
    /// ignored. Cancels any gesture.
    pub fn set_active_spine(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || name == self.active_spine {
            return false;
        }
        self.engine.cancel();
        self.active_spine = name.to_string();
        log::info!("Active spine is now '{}'", self.active_spine);
        true
    }

    /// Default name for a new spine, `spine_{n+1}`.
    pub fn suggest_spine_name(&self) -> String {
        format!("spine_{}", self.store.color_count() + 1)
    }

    pub fn list_spines(&self) -> Vec<&str> {
        self.store.list_spines()
    }

    pub fn annotated_frames(&self, spine: &str) -> Vec<usize> {
        self.store.annotated_frames(spine)
    }

    // --- View ----------------------------------------------------------------

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn zoom_in(&mut self) {
        self.view.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.view.zoom_out();
    }

    pub fn reset_view(&mut self) {
        self.view.reset();
    }

    pub fn pan_by(&mut self, dx: i32, dy: i32) {
        self.view.pan_by(dx, dy);
    }

    // --- Pointer gestures ------------------------------------------------------

    pub fn pointer_down(&mut self, screen_x: f64, screen_y: f64) {
        let Some((width, height)) = self.current_dimensions() else {
            return;
        };
        let target = EditTarget {
            spine: &self.active_spine,
            frame: self.current_frame,
            width,
            height,
        };
        self.engine
            .pointer_down(&self.store, &target, &self.view, screen_x, screen_y);
    }

    pub fn pointer_move(&mut self, screen_x: f64, screen_y: f64) {
        self.engine.pointer_move(&self.view, screen_x, screen_y);
    }

    /// Finish the gesture, committing its box and recording undo history.
    pub fn pointer_up(&mut self, screen_x: f64, screen_y: f64) -> Option<Commit> {
        let Some((width, height)) = self.current_dimensions() else {
            self.engine.cancel();
            return None;
        };
        if !self.engine.is_active() {
            return None;
        }
        let before = self.store.state().clone();
        let target = EditTarget {
            spine: &self.active_spine,
            frame: self.current_frame,
            width,
            height,
        };
        let commit = self.engine.pointer_up(
            &mut self.store,
            &target,
            &self.view,
            screen_x,
            screen_y,
        )?;
        self.history.push(before);
        Some(commit)
    }

    /// Press and release at one position without moving.
    ///
    /// On empty space this commits a zero-size box at the clicked pixel.
    pub fn click(&mut self, screen_x: f64, screen_y: f64) -> Option<Commit> {
        self.pointer_down(screen_x, screen_y);
        self.pointer_up(screen_x, screen_y)
    }

    /// Abandon the gesture in progress.
    pub fn cancel_gesture(&mut self) {
        self.engine.cancel();
    }

    pub fn is_gesture_active(&self) -> bool {
        self.engine.is_active()
    }

    /// Remove the active spine's box on the current frame with its row.
    pub fn delete_current_box(&mut self) -> Option<Bbox> {
        self.engine.cancel();
        let before = self.store.state().clone();
        let removed = self
            .store
            .delete_box(&self.active_spine, self.current_frame)?;
        self.history.push(before);
        log::info!(
            "Deleted box for {} on frame {}",
            self.active_spine,
            self.current_frame
        );
        Some(removed)
    }

    /// Boxes to draw on the current frame, with any gesture preview standing
    /// in for the box it will replace.
    pub fn overlays(&self) -> Vec<Overlay> {
        let preview = self.engine.preview();
        let preview_spine = self
            .engine
            .editing()
            .map(|(spine, _)| spine)
            .unwrap_or(self.active_spine.as_str());

        let mut overlays: Vec<Overlay> = self
            .store
            .boxes_on_frame(self.current_frame)
            .into_iter()
            .filter(|(spine, _)| preview.is_none() || *spine != preview_spine)
            .map(|(spine, bbox)| Overlay {
                spine: spine.to_string(),
                bbox,
                color: self.store.color_of(spine).map(str::to_string),
                active: spine == self.active_spine,
                preview: false,
            })
            .collect();

        if let Some(bbox) = preview {
            overlays.push(Overlay {
                spine: preview_spine.to_string(),
                bbox,
                color: self.store.color_of(preview_spine).map(str::to_string),
                active: true,
                preview: true,
            });
        }
        overlays
    }

    // --- History ---------------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        self.engine.cancel();
        match self.history.undo(self.store.state().clone()) {
            Some(previous) => {
                self.store.restore_boxes(previous);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        self.engine.cancel();
        match self.history.redo(self.store.state().clone()) {
            Some(next) => {
                self.store.restore_boxes(next);
                true
            }
            None => false,
        }
    }

    // --- Persistence -----------------------------------------------------------

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn measurements(&self) -> &MeasurementTable {
        self.store.measurements()
    }

    /// Snapshot of the committed annotations and the stack's paths.
    pub fn snapshot(&self) -> AnnotationSnapshot {
        let paths = self.stack.as_ref().map(FrameStack::paths).unwrap_or_default();
        AnnotationSnapshot::capture(self.store.state(), paths)
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<(), SnapshotError> {
        serialization::save_snapshot(&self.snapshot(), path)?;
        log::info!("Saved annotations to {}", path.display());
        Ok(())
    }

    /// Read a snapshot from disk and apply it.
    pub fn load_snapshot(&mut self, path: &Path) -> Result<(), SnapshotError> {
        let snapshot = serialization::load_snapshot(path)?;
        self.apply_snapshot(&snapshot)?;
        log::info!("Loaded annotations from {}", path.display());
        Ok(())
    }

    /// Replace all annotations with a snapshot's, all or nothing.
    ///
    /// The snapshot must have been made against the loaded stack. Boxes are
    /// re-normalized against their frame's bounds and measurements are
    /// rebuilt rather than read from anywhere.
    pub fn apply_snapshot(&mut self, snapshot: &AnnotationSnapshot) -> Result<(), SnapshotError> {
        let stack = self.stack.as_ref().ok_or(SnapshotError::NoStack)?;
        let paths = stack.paths();
        if !snapshot.matches_paths(&paths) {
            log::warn!("Rejected snapshot made against a different image stack");
            return Err(SnapshotError::Mismatch {
                saved: snapshot.image_paths.len(),
                loaded: paths.len(),
            });
        }
        let mut state = snapshot.to_state(stack.len())?;
        for (spine, frames) in state.boxes.iter_mut() {
            for (frame, bbox) in frames.iter_mut() {
                if let Some((w, h)) = stack.frame(*frame).map(|f| f.dimensions()) {
                    let fixed = bbox.sanitized(w, h);
                    if fixed != *bbox {
                        log::warn!("Normalized stored box {:?} of {} on frame {}", bbox, spine, frame);
                        *bbox = fixed;
                    }
                }
            }
        }

        self.engine.cancel();
        self.store.restore(state);
        self.history.clear();
        Ok(())
    }

    pub fn export_measurements(&self, path: &Path) -> Result<(), ExportError> {
        serialization::export_measurements(self.store.measurements().rows(), path)?;
        log::info!(
            "Exported {} measurements to {}",
            self.store.measurements().len(),
            path.display()
        );
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::media::tests::write_gray16;
    use tempfile::TempDir;

    fn session_with_stack(frames: usize) -> (Session, TempDir) {
        let dir = TempDir::new().unwrap();
        for i in 0..frames {
            write_gray16(&dir.path().join(format!("t{i:02}.tif")), 100, 80, |x, y| (x * y) as u16 + i as u16);
        }
        let mut session = Session::default();
        session.load_stack(dir.path()).unwrap();
        (session, dir)
    }

    fn drag(session: &mut Session, from: (f64, f64), to: (f64, f64)) -> Option<Commit> {
        session.pointer_down(from.0, from.1);
        session.pointer_move(to.0, to.1);
        session.pointer_up(to.0, to.1)
    }

    #[test]
    fn test_pointer_events_without_stack_are_ignored() {
        let mut session = Session::default();
        session.pointer_down(1.0, 1.0);
        assert!(session.pointer_up(5.0, 5.0).is_none());
        assert!(session.measurements().is_empty());
    }

    #[test]
    fn test_navigation_cancels_gesture_and_keeps_view() {
        let (mut session, _dir) = session_with_stack(3);
        session.zoom_in();
        let view = *session.view();
        session.pointer_down(10.0, 10.0);
        assert!(session.next_frame());
        assert!(!session.is_gesture_active());
        assert_eq!(session.current_frame(), 1);
        assert_eq!(*session.view(), view);
        assert!(session.pointer_up(30.0, 30.0).is_none());
        assert!(session.next_frame());
        assert!(!session.next_frame());
        assert!(session.prev_frame());
        assert_eq!(session.current_frame(), 1);
    }

    #[test]
    fn test_set_active_spine_does_not_rename_data() {
        let (mut session, _dir) = session_with_stack(1);
        drag(&mut session, (10.0, 10.0), (20.0, 20.0));
        assert!(session.set_active_spine(" spine_2 "));
        assert_eq!(session.active_spine(), "spine_2");
        assert!(!session.set_active_spine("   "));
        assert_eq!(session.list_spines(), vec!["spine_1"]);
        drag(&mut session, (40.0, 40.0), (60.0, 60.0));
        assert_eq!(session.list_spines(), vec!["spine_1", "spine_2"]);
        assert_eq!(session.suggest_spine_name(), "spine_3");
    }

    #[test]
    fn test_delete_and_undo_redo() {
        let (mut session, _dir) = session_with_stack(1);
        drag(&mut session, (10.0, 10.0), (50.0, 50.0));
        assert_eq!(session.delete_current_box(), Some(Bbox::new(10, 10, 50, 50)));
        assert!(session.measurements().is_empty());
        assert_eq!(session.delete_current_box(), None);

        assert!(session.undo());
        assert_eq!(session.store().get_box("spine_1", 0), Some(Bbox::new(10, 10, 50, 50)));
        assert_eq!(session.measurements().len(), 1);
        assert!(session.undo());
        assert!(session.measurements().is_empty());
        assert!(!session.undo());
        assert!(session.redo());
        assert_eq!(session.measurements().len(), 1);
    }

    #[test]
    fn test_spine_keeps_color_across_undo() {
        let (mut session, _dir) = session_with_stack(1);
        drag(&mut session, (10.0, 10.0), (50.0, 50.0));
        assert_eq!(session.store().color_of("spine_1"), Some("red"));
        assert!(session.undo());

        session.set_active_spine("spine_2");
        drag(&mut session, (60.0, 10.0), (70.0, 20.0));
        session.set_active_spine("spine_1");
        drag(&mut session, (10.0, 10.0), (50.0, 50.0));

        assert_eq!(session.store().color_of("spine_1"), Some("red"));
        assert_eq!(session.store().color_of("spine_2"), Some("blue"));

        // Redo past a later color assignment keeps both colors too
        assert!(session.undo());
        assert!(session.redo());
        assert_eq!(session.store().color_of("spine_1"), Some("red"));
        assert_eq!(session.store().color_of("spine_2"), Some("blue"));
    }

    #[test]
    fn test_click_without_drag_commits_point_box() {
        let (mut session, _dir) = session_with_stack(1);
        let commit = session.click(20.0, 30.0).unwrap();
        assert_eq!(commit.bbox, Bbox::new(20, 30, 20, 30));
        let row = session.measurements().get("spine_1", 0).unwrap();
        assert_eq!(row.length_pixels, 0.0);
        assert!(row.stable);
        assert!(!session.is_gesture_active());
    }

    #[test]
    fn test_overlays_substitute_preview() {
        let (mut session, _dir) = session_with_stack(1);
        drag(&mut session, (10.0, 10.0), (50.0, 50.0));
        session.set_active_spine("spine_2");
        drag(&mut session, (60.0, 10.0), (70.0, 20.0));
        session.set_active_spine("spine_1");

        session.pointer_down(30.0, 30.0);
        session.pointer_move(35.0, 32.0);
        let overlays = session.overlays();
        assert_eq!(overlays.len(), 2);
        let preview = overlays.iter().find(|o| o.preview).unwrap();
        assert_eq!(preview.spine, "spine_1");
        assert_eq!(preview.bbox, Bbox::new(15, 12, 55, 52));
        assert_eq!(preview.color.as_deref(), Some("red"));
        let other = overlays.iter().find(|o| !o.preview).unwrap();
        assert_eq!(other.spine, "spine_2");
        assert!(!other.active);
    }

    #[test]
    fn test_snapshot_needs_stack() {
        let mut session = Session::default();
        let snap = session.snapshot();
        assert!(matches!(session.apply_snapshot(&snap), Err(SnapshotError::NoStack)));
    }

    #[test]
    fn test_snapshot_boxes_are_renormalized() {
        let (mut session, _dir) = session_with_stack(2);
        let mut snap = session.snapshot();
        snap.spine_annotations
            .entry("s".to_string())
            .or_default()
            .insert("1".to_string(), Bbox::new(150, 90, 10, 5));
        session.apply_snapshot(&snap).unwrap();
        assert_eq!(session.store().get_box("s", 1), Some(Bbox::new(10, 5, 100, 80)));
        assert_eq!(session.measurements().len(), 1);
    }

    #[test]
    fn test_failed_load_keeps_previous_stack() {
        let (mut session, _dir) = session_with_stack(2);
        drag(&mut session, (10.0, 10.0), (50.0, 50.0));
        let empty = TempDir::new().unwrap();
        assert!(session.load_stack(empty.path()).is_err());
        assert_eq!(session.frame_count(), 2);
        assert_eq!(session.measurements().len(), 1);
    }

    #[test]
    fn test_render_current_frame() {
        let (mut session, _dir) = session_with_stack(2);
        let img = session.render_current().unwrap();
        assert_eq!(img.dimensions(), (100, 80));
    }
}
