//! Undo/redo stack.
//!
//! ## Learning: The Command Pattern
//!
//! Each edit is stored as an operation that can be:
//! - Undone (its inverse is applied)
//! - Redone (re-applied after undo)
//!
//! Operations are collected into groups; a group is the unit that one
//! `undo()` reverts. The stack never touches the text itself: the document
//! asks for the group to replay and reports back when it is done.
//!
//! ## State machine
//!
//! ```text
//!   Idle ──begin_undo/redo──▶ Playback ──enter_modify──▶ PlaybackModifyDocument
//!    ▲                          │   ▲                          │
//!    └──────end_undo/redo───────┘   └────────exit_modify───────┘
//! ```
//!
//! Only changes made in `Idle` are recorded; changes made while replaying
//! (`PlaybackModifyDocument`) are the replay itself and are ignored.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::change::DocumentChange;
use crate::{BufferError, BufferResult};

/// Default maximum number of undo groups.
pub const DEFAULT_UNDO_LIMIT: usize = 1000;

/// Something that can be undone.
///
/// New kinds of undoable work get a new variant; undo and redo dispatch with
/// `match`, so every kind must say how it is inverted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UndoOperation {
    /// A text change applied to the document.
    DocumentEdit(DocumentChange),
}

impl UndoOperation {
    /// The operation that reverts this one.
    pub fn inverse(&self) -> Self {
        match self {
            UndoOperation::DocumentEdit(change) => UndoOperation::DocumentEdit(change.invert()),
        }
    }
}

/// Operations undone/redone together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationGroup {
    operations: Vec<UndoOperation>,
}

impl OperationGroup {
    pub fn operations(&self) -> &[UndoOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Operations to apply for an undo: inverses, last one first.
    pub fn undo_operations(&self) -> impl Iterator<Item = UndoOperation> + '_ {
        self.operations.iter().rev().map(UndoOperation::inverse)
    }

    /// Operations to apply for a redo: as recorded.
    pub fn redo_operations(&self) -> impl Iterator<Item = UndoOperation> + '_ {
        self.operations.iter().cloned()
    }
}

/// Where the stack is in its playback cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndoStackState {
    /// Recording user changes.
    #[default]
    Idle,
    /// An undo or redo is in progress.
    Playback,
    /// The document is applying a replayed change.
    PlaybackModifyDocument,
}

/// Bounded undo/redo history with nested groups.
///
/// ## Learning: VecDeque
///
/// The undo side is a `VecDeque`: new groups go on the back and, once the
/// size limit is reached, the oldest groups fall off the front.
#[derive(Debug, Clone)]
pub struct UndoStack {
    undo: VecDeque<OperationGroup>,
    redo: Vec<OperationGroup>,
    state: UndoStackState,
    size_limit: usize,
    accept_changes: bool,
    /// Nesting depth of open groups.
    group_depth: usize,
    /// Operations recorded since the outermost group was opened.
    pending: Vec<UndoOperation>,
    /// The open group continues the group on top of the stack.
    continue_top: bool,
    /// Undo steps between the current state and the original file:
    /// positive means the original is further down the undo stack,
    /// negative means it is on the redo stack. `None` if unreachable.
    steps_from_original: Option<isize>,
}

impl UndoStack {
    /// Creates a stack with the default size limit.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_UNDO_LIMIT)
    }

    /// Creates a stack keeping at most `size_limit` groups.
    pub fn with_limit(size_limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            state: UndoStackState::Idle,
            size_limit,
            accept_changes: true,
            group_depth: 0,
            pending: Vec::new(),
            continue_top: false,
            steps_from_original: Some(0),
        }
    }

    pub fn state(&self) -> UndoStackState {
        self.state
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    /// Changes the size limit, dropping the oldest groups if needed.
    pub fn set_size_limit(&mut self, size_limit: usize) {
        self.size_limit = size_limit;
        self.enforce_limit();
    }

    /// Whether new changes are recorded.
    pub fn accept_changes(&self) -> bool {
        self.accept_changes
    }

    pub fn set_accept_changes(&mut self, accept: bool) {
        self.accept_changes = accept;
    }

    /// Returns true if there are groups to undo.
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Returns true if there are groups to redo.
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }

    /// Current nesting depth of undo groups.
    pub fn group_depth(&self) -> usize {
        self.group_depth
    }

    /// Returns true if the text equals the state last marked as original.
    pub fn is_original_file(&self) -> bool {
        self.steps_from_original == Some(0)
    }

    /// Declares the current state to be the original (e.g. after saving).
    pub fn mark_as_original_file(&mut self) {
        self.steps_from_original = Some(0);
    }

    /// Forgets the original state; `is_original_file` stays false until
    /// the next `mark_as_original_file`.
    pub fn discard_original_file_marker(&mut self) {
        self.steps_from_original = None;
    }

    // ==================== Groups ====================

    /// Opens a group. Nested groups merge into the outermost one.
    pub fn start_undo_group(&mut self) {
        if self.group_depth == 0 {
            self.continue_top = false;
        }
        self.group_depth += 1;
    }

    /// Opens a group that, if it is the outermost one, is merged into the
    /// group currently on top of the stack.
    pub fn start_continued_undo_group(&mut self) {
        if self.group_depth == 0 {
            self.continue_top = !self.undo.is_empty();
        }
        self.group_depth += 1;
    }

    /// Closes the innermost open group.
    ///
    /// Closing the outermost group commits its operations as one step;
    /// a group without operations leaves no trace.
    pub fn end_undo_group(&mut self) -> BufferResult<()> {
        if self.group_depth == 0 {
            return Err(BufferError::InvalidOperation(
                "end_undo_group called without an open group".into(),
            ));
        }
        self.group_depth -= 1;
        if self.group_depth == 0 && !self.pending.is_empty() {
            let operations = std::mem::take(&mut self.pending);
            match self.undo.back_mut() {
                Some(top) if self.continue_top => {
                    top.operations.extend(operations);
                    // The state the top group led to no longer exists.
                    if self.steps_from_original == Some(0) {
                        self.steps_from_original = None;
                    }
                    self.clear_redo_stack();
                }
                _ => self.push_group(OperationGroup { operations }),
            }
        }
        Ok(())
    }

    // ==================== Recording ====================

    /// Records an operation.
    ///
    /// Ignored while a replayed change is being applied or when
    /// `accept_changes` is off. Recording during `Playback` itself means the
    /// document was modified behind the replay's back and is rejected.
    pub fn push(&mut self, operation: UndoOperation) -> BufferResult<()> {
        match self.state {
            UndoStackState::PlaybackModifyDocument => return Ok(()),
            UndoStackState::Playback => {
                return Err(BufferError::InvalidOperation(
                    "document changed during undo/redo playback".into(),
                ));
            }
            UndoStackState::Idle => {}
        }
        if !self.accept_changes {
            return Ok(());
        }
        if self.group_depth > 0 {
            self.pending.push(operation);
        } else {
            self.push_group(OperationGroup {
                operations: vec![operation],
            });
        }
        Ok(())
    }

    fn push_group(&mut self, group: OperationGroup) {
        self.clear_redo_stack();
        self.undo.push_back(group);
        self.shift_original(1);
        self.enforce_limit();
    }

    fn enforce_limit(&mut self) {
        while self.undo.len() > self.size_limit {
            self.undo.pop_front();
        }
        if let Some(steps) = self.steps_from_original {
            if steps > self.undo.len() as isize {
                self.steps_from_original = None;
            }
        }
    }

    fn shift_original(&mut self, delta: isize) {
        if let Some(steps) = self.steps_from_original.as_mut() {
            *steps += delta;
        }
    }

    // ==================== Playback ====================

    fn check_can_play_back(&self) -> BufferResult<()> {
        if self.group_depth > 0 {
            return Err(BufferError::InvalidOperation(
                "cannot undo or redo while an undo group is open".into(),
            ));
        }
        if self.state != UndoStackState::Idle {
            return Err(BufferError::InvalidOperation(
                "undo/redo already in progress".into(),
            ));
        }
        Ok(())
    }

    /// Starts undoing the top group.
    ///
    /// Returns `None` (and stays `Idle`) if there is nothing to undo.
    pub fn begin_undo(&mut self) -> BufferResult<Option<OperationGroup>> {
        self.check_can_play_back()?;
        let group = self.undo.pop_back();
        if group.is_some() {
            self.state = UndoStackState::Playback;
        }
        Ok(group)
    }

    /// Finishes an undo started with [`begin_undo`](Self::begin_undo).
    pub fn end_undo(&mut self, group: OperationGroup) {
        self.redo.push(group);
        self.shift_original(-1);
        self.state = UndoStackState::Idle;
    }

    /// Starts redoing the most recently undone group.
    pub fn begin_redo(&mut self) -> BufferResult<Option<OperationGroup>> {
        self.check_can_play_back()?;
        let group = self.redo.pop();
        if group.is_some() {
            self.state = UndoStackState::Playback;
        }
        Ok(group)
    }

    /// Finishes a redo started with [`begin_redo`](Self::begin_redo).
    pub fn end_redo(&mut self, group: OperationGroup) {
        self.undo.push_back(group);
        self.shift_original(1);
        self.state = UndoStackState::Idle;
        self.enforce_limit();
    }

    /// Marks the start of applying one replayed change.
    pub fn enter_modify(&mut self) {
        if self.state == UndoStackState::Playback {
            self.state = UndoStackState::PlaybackModifyDocument;
        }
    }

    /// Marks the end of applying one replayed change.
    pub fn exit_modify(&mut self) {
        if self.state == UndoStackState::PlaybackModifyDocument {
            self.state = UndoStackState::Playback;
        }
    }

    // ==================== Clearing ====================

    /// Drops everything that could be redone.
    pub fn clear_redo_stack(&mut self) {
        self.redo.clear();
        if matches!(self.steps_from_original, Some(steps) if steps < 0) {
            self.steps_from_original = None;
        }
    }

    /// Drops all history. Fails while a group is open.
    pub fn clear_all(&mut self) -> BufferResult<()> {
        if self.group_depth > 0 {
            return Err(BufferError::InvalidOperation(
                "cannot clear history while an undo group is open".into(),
            ));
        }
        self.undo.clear();
        self.redo.clear();
        if !self.is_original_file() {
            self.steps_from_original = None;
        }
        Ok(())
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(offset: usize, text: &str) -> UndoOperation {
        UndoOperation::DocumentEdit(DocumentChange::new(offset, "", text))
    }

    fn inserted(op: &UndoOperation) -> &str {
        match op {
            UndoOperation::DocumentEdit(change) => change.inserted_text(),
        }
    }

    #[test]
    fn test_operation_inverse() {
        let op = UndoOperation::DocumentEdit(DocumentChange::new(0, "old", "new"));
        let UndoOperation::DocumentEdit(change) = op.inverse();
        assert_eq!(change.removed_text(), "new");
        assert_eq!(change.inserted_text(), "old");
    }

    #[test]
    fn test_undo_redo_cycle() {
        let mut stack = UndoStack::new();
        stack.push(edit(0, "a")).unwrap();
        stack.push(edit(1, "b")).unwrap();
        assert_eq!(stack.undo_count(), 2);

        let group = stack.begin_undo().unwrap().unwrap();
        assert_eq!(stack.state(), UndoStackState::Playback);
        let ops: Vec<_> = group.undo_operations().collect();
        let UndoOperation::DocumentEdit(change) = &ops[0];
        assert_eq!(change.removed_text(), "b");
        stack.end_undo(group);

        assert_eq!(stack.state(), UndoStackState::Idle);
        assert!(stack.can_redo());
        let group = stack.begin_redo().unwrap().unwrap();
        assert_eq!(inserted(&group.operations()[0]), "b");
        stack.end_redo(group);
        assert_eq!(stack.undo_count(), 2);
        assert_eq!(stack.redo_count(), 0);
    }

    #[test]
    fn test_empty_stack_is_noop() {
        let mut stack = UndoStack::new();
        assert!(stack.begin_undo().unwrap().is_none());
        assert!(stack.begin_redo().unwrap().is_none());
        assert_eq!(stack.state(), UndoStackState::Idle);
    }

    #[test]
    fn test_nested_groups_merge() {
        let mut stack = UndoStack::new();
        stack.start_undo_group();
        stack.push(edit(0, "a")).unwrap();
        stack.start_undo_group();
        stack.push(edit(1, "b")).unwrap();
        stack.end_undo_group().unwrap();
        stack.push(edit(2, "c")).unwrap();
        assert_eq!(stack.undo_count(), 0);
        stack.end_undo_group().unwrap();

        assert_eq!(stack.undo_count(), 1);
        let group = stack.begin_undo().unwrap().unwrap();
        assert_eq!(group.len(), 3);
        stack.end_undo(group);
    }

    #[test]
    fn test_group_errors() {
        let mut stack = UndoStack::new();
        assert!(matches!(
            stack.end_undo_group(),
            Err(BufferError::InvalidOperation(_))
        ));

        stack.push(edit(0, "a")).unwrap();
        stack.start_undo_group();
        assert!(stack.begin_undo().is_err());
        assert!(stack.clear_all().is_err());
        stack.end_undo_group().unwrap();

        // The empty group left nothing behind.
        assert_eq!(stack.undo_count(), 1);
    }

    #[test]
    fn test_continued_group_joins_top() {
        let mut stack = UndoStack::new();
        stack.push(edit(0, "a")).unwrap();
        stack.start_continued_undo_group();
        stack.push(edit(1, "b")).unwrap();
        stack.end_undo_group().unwrap();
        assert_eq!(stack.undo_count(), 1);
        assert_eq!(stack.begin_undo().unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_playback_changes_are_not_recorded() {
        let mut stack = UndoStack::new();
        stack.push(edit(0, "a")).unwrap();
        let group = stack.begin_undo().unwrap().unwrap();

        assert!(stack.push(edit(0, "x")).is_err());
        stack.enter_modify();
        stack.push(edit(0, "x")).unwrap();
        stack.exit_modify();
        stack.end_undo(group);

        assert_eq!(stack.undo_count(), 0);
        assert_eq!(stack.redo_count(), 1);
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut stack = UndoStack::new();
        stack.push(edit(0, "a")).unwrap();
        let group = stack.begin_undo().unwrap().unwrap();
        stack.end_undo(group);
        stack.push(edit(0, "b")).unwrap();
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_size_limit() {
        let mut stack = UndoStack::with_limit(3);
        for i in 0..5 {
            stack.push(edit(i, "x")).unwrap();
        }
        assert_eq!(stack.undo_count(), 3);
        stack.set_size_limit(1);
        assert_eq!(stack.undo_count(), 1);
    }

    #[test]
    fn test_original_file_tracking() {
        let mut stack = UndoStack::new();
        assert!(stack.is_original_file());

        stack.push(edit(0, "a")).unwrap();
        assert!(!stack.is_original_file());

        let group = stack.begin_undo().unwrap().unwrap();
        stack.end_undo(group);
        assert!(stack.is_original_file());

        let group = stack.begin_redo().unwrap().unwrap();
        stack.end_redo(group);
        stack.mark_as_original_file();
        let group = stack.begin_undo().unwrap().unwrap();
        stack.end_undo(group);
        assert!(!stack.is_original_file());

        // The original is on the redo stack; a new edit makes it unreachable.
        stack.push(edit(0, "b")).unwrap();
        let group = stack.begin_undo().unwrap().unwrap();
        stack.end_undo(group);
        assert!(!stack.is_original_file());
    }

    #[test]
    fn test_ignores_changes_when_not_accepting() {
        let mut stack = UndoStack::new();
        stack.set_accept_changes(false);
        stack.push(edit(0, "a")).unwrap();
        assert!(!stack.can_undo());
    }
}
