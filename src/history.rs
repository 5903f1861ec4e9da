// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Undo/redo of committed annotation edits.
//!
//! History stores [`AnnotationState`] values only; measurements are always
//! rebuilt from the restored boxes.

use crate::models::store::AnnotationState;

/// Number of past states kept.
pub const MAX_HISTORY: usize = 50;

/// History system for undo/redo functionality.
#[derive(Debug)]
pub struct History {
    /// Undo stack (past states)
    undo_stack: Vec<AnnotationState>,
    /// Redo stack (future states after undo)
    redo_stack: Vec<AnnotationState>,
    max_size: usize,
}

impl History {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size: max_size.max(1),
        }
    }

    /// Save current state before making a change
    pub fn push(&mut self, state: AnnotationState) {
        self.undo_stack.push(state);
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
        // A new edit invalidates anything that was undone
        self.redo_stack.clear();
    }

    /// Undo: swap `current` for the previous state
    pub fn undo(&mut self, current: AnnotationState) -> Option<AnnotationState> {
        let previous = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    /// Redo: swap `current` for the next state
    pub fn redo(&mut self, current: AnnotationState) -> Option<AnnotationState> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
