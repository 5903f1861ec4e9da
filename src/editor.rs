// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Interactive box editing.
//!
//! [`BoxEditEngine`] turns pointer down/move/up events into box creation,
//! corner resizing and moving. While a gesture is in progress the edited box
//! only exists as a preview held by the engine; the annotation store (and
//! with it the measurement table) changes once, when the pointer is released.

use crate::models::annotation::{Bbox, Handle};
use crate::models::store::AnnotationStore;
use crate::util::geometry::ViewTransform;

/// The spine and frame a gesture applies to, with the frame's size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditTarget<'a> {
    pub spine: &'a str,
    pub frame: usize,
    pub width: u32,
    pub height: u32,
}

/// Gesture state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditState {
    #[default]
    Idle,
    /// Drawing a new box from `anchor` to the latest pointer position.
    Drawing { anchor: (i32, i32), current: (i32, i32) },
    /// Dragging a handle of an existing box.
    Editing {
        spine: String,
        frame: usize,
        handle: Handle,
        original: Bbox,
        anchor: (i32, i32),
        preview: Bbox,
    },
}

/// What a completed gesture did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    Created,
    Edited(Handle),
}

/// A box written to the store at the end of a gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub spine: String,
    pub frame: usize,
    pub bbox: Bbox,
    pub kind: CommitKind,
}

/// Pointer-driven state machine for creating and editing boxes.
#[derive(Debug, Default)]
pub struct BoxEditEngine {
    state: EditState,
}

impl BoxEditEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    /// Whether a gesture is in progress.
    pub fn is_active(&self) -> bool {
        self.state != EditState::Idle
    }

    /// Pointer pressed at a screen position.
    ///
    /// Grabbing a handle of the target spine's box on the target frame starts
    /// an edit; anywhere else starts drawing a new box.
    pub fn pointer_down(
        &mut self,
        store: &AnnotationStore,
        target: &EditTarget<'_>,
        view: &ViewTransform,
        screen_x: f64,
        screen_y: f64,
    ) {
        if self.is_active() {
            log::warn!("Pointer down during an active gesture; discarding {:?}", self.state);
        }
        let point = view.to_image(screen_x, screen_y);

        let grabbed = store
            .get_box(target.spine, target.frame)
            .and_then(|bbox| {
                bbox.hit_test(point.0, point.1, view.hit_tolerance())
                    .map(|handle| (bbox, handle))
            });

        self.state = match grabbed {
            Some((original, handle)) => {
                log::debug!("Editing {} on frame {} via {:?}", target.spine, target.frame, handle);
                EditState::Editing {
                    spine: target.spine.to_string(),
                    frame: target.frame,
                    handle,
                    original,
                    anchor: point,
                    preview: original,
                }
            }
            None => {
                log::debug!("Drawing new box at {:?}", point);
                EditState::Drawing {
                    anchor: point,
                    current: point,
                }
            }
        };
    }

    /// Pointer moved while pressed; updates the preview only.
    pub fn pointer_move(&mut self, view: &ViewTransform, screen_x: f64, screen_y: f64) {
        let point = view.to_image(screen_x, screen_y);
        match &mut self.state {
            EditState::Idle => {}
            EditState::Drawing { current, .. } => *current = point,
            EditState::Editing {
                handle,
                original,
                anchor,
                preview,
                ..
            } => {
                *preview = original.dragged(*handle, point.0 - anchor.0, point.1 - anchor.1);
            }
        }
    }

    /// Pointer released: normalize, clamp and commit the box, then go idle.
    ///
    /// Returns `None` when no gesture was in progress.
    pub fn pointer_up(
        &mut self,
        store: &mut AnnotationStore,
        target: &EditTarget<'_>,
        view: &ViewTransform,
        screen_x: f64,
        screen_y: f64,
    ) -> Option<Commit> {
        self.pointer_move(view, screen_x, screen_y);
        match std::mem::take(&mut self.state) {
            EditState::Idle => None,
            EditState::Drawing { anchor, current } => {
                let bbox = store.set_box(
                    target.spine,
                    target.frame,
                    Bbox::from_corners(anchor, current),
                    target.width,
                    target.height,
                );
                log::info!("Created box {:?} for {} on frame {}", bbox, target.spine, target.frame);
                Some(Commit {
                    spine: target.spine.to_string(),
                    frame: target.frame,
                    bbox,
                    kind: CommitKind::Created,
                })
            }
            EditState::Editing {
                spine,
                frame,
                handle,
                preview,
                ..
            } => {
                let bbox = store.set_box(&spine, frame, preview, target.width, target.height);
                log::info!("Updated box {:?} for {} on frame {}", bbox, spine, frame);
                Some(Commit {
                    spine,
                    frame,
                    bbox,
                    kind: CommitKind::Edited(handle),
                })
            }
        }
    }

    /// Abandon any gesture without touching the store.
    pub fn cancel(&mut self) {
        if self.is_active() {
            log::debug!("Cancelled gesture {:?}", self.state);
        }
        self.state = EditState::Idle;
    }

    /// The box being drawn or edited, normalized, for display.
    pub fn preview(&self) -> Option<Bbox> {
        match &self.state {
            EditState::Idle => None,
            EditState::Drawing { anchor, current } => Some(Bbox::from_corners(*anchor, *current)),
            EditState::Editing { preview, .. } => Some(preview.normalized()),
        }
    }

    /// Spine and frame whose stored box the preview stands in for.
    pub fn editing(&self) -> Option<(&str, usize)> {
        match &self.state {
            EditState::Editing { spine, frame, .. } => Some((spine.as_str(), *frame)),
            _ => None,
        }
    }
}
