//! Undo/redo journal with time-windowed coalescing.
//!
//! Each recorded edit is an [`EditOperation`]. A new operation merges into
//! the top of the undo stack when it is the same kind, contiguous with it,
//! and arrives within the coalescing window of the previous record:
//! * inserts merge when appended at the end of the previous insert or
//!   inserted at its start (typing forwards or at a fixed point);
//! * deletes merge on the same start (forward delete) or when the new
//!   delete ends where the previous one started (backspace).
//!
//! After an undo or redo the journal forgets its last record time, so the
//! next edit always opens a new entry. Recording any edit clears redo.

use std::time::{Duration, Instant};

use tracing::trace;

/// Default window within which consecutive edits coalesce.
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(750);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Insert,
    Delete,
}

/// A journaled edit: `text` was inserted at, or removed from, `position`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOperation {
    pub kind: EditKind,
    pub position: usize,
    pub text: String,
    /// Cached `text.chars().count()`.
    pub len: usize,
}

impl EditOperation {
    pub fn insert(position: usize, text: impl Into<String>) -> Self {
        Self::new(EditKind::Insert, position, text.into())
    }

    pub fn delete(position: usize, text: impl Into<String>) -> Self {
        Self::new(EditKind::Delete, position, text.into())
    }

    fn new(kind: EditKind, position: usize, text: String) -> Self {
        let len = text.chars().count();
        Self {
            kind,
            position,
            text,
            len,
        }
    }

    /// Try to absorb `incoming` (recorded `elapsed` after `self`).
    /// Returns `false` and leaves `self` untouched when the two do not merge.
    pub fn try_merge(
        &mut self,
        incoming: &EditOperation,
        elapsed: Duration,
        window: Duration,
    ) -> bool {
        if self.kind != incoming.kind || elapsed > window {
            return false;
        }
        let appends = match self.kind {
            EditKind::Insert => incoming.position == self.position + self.len,
            EditKind::Delete => incoming.position == self.position,
        };
        if appends {
            self.text.push_str(&incoming.text);
            self.len += incoming.len;
            return true;
        }
        // Inserted text lands in front of the previous run only when it
        // starts exactly where that run starts; removed text is in front
        // when it ends there.
        let prepends = match self.kind {
            EditKind::Insert => incoming.position == self.position,
            EditKind::Delete => incoming.position + incoming.len == self.position,
        };
        if prepends {
            let mut text = String::with_capacity(incoming.text.len() + self.text.len());
            text.push_str(&incoming.text);
            text.push_str(&self.text);
            self.text = text;
            self.position = incoming.position;
            self.len += incoming.len;
            return true;
        }
        false
    }
}

/// Undo and redo stacks plus coalescing state.
#[derive(Debug, Clone)]
pub struct UndoJournal {
    undo_stack: Vec<EditOperation>,
    redo_stack: Vec<EditOperation>,
    last_recorded: Option<Instant>,
    coalesce_window: Duration,
}

impl Default for UndoJournal {
    fn default() -> Self {
        Self::new(DEFAULT_COALESCE_WINDOW)
    }
}

impl UndoJournal {
    pub fn new(coalesce_window: Duration) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            last_recorded: None,
            coalesce_window,
        }
    }

    pub fn coalesce_window(&self) -> Duration {
        self.coalesce_window
    }
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn record(&mut self, op: EditOperation) {
        self.record_at(op, Instant::now());
    }

    /// Record `op` as having happened at `now`.
    pub fn record_at(&mut self, op: EditOperation, now: Instant) {
        let merged = match (self.undo_stack.last_mut(), self.last_recorded) {
            (Some(top), Some(last)) => {
                let elapsed = now.saturating_duration_since(last);
                top.try_merge(&op, elapsed, self.coalesce_window)
            }
            _ => false,
        };
        if merged {
            trace!(target: "text.undo", undo_depth = self.undo_stack.len(), kind = ?op.kind, position = op.position, "coalesced");
        } else {
            trace!(target: "text.undo", undo_depth = self.undo_stack.len() + 1, kind = ?op.kind, position = op.position, "push");
            self.undo_stack.push(op);
        }
        self.last_recorded = Some(now);
        if !self.redo_stack.is_empty() {
            self.redo_stack.clear();
            trace!(target: "text.undo", "redo_stack_cleared_on_new_edit");
        }
    }

    /// Pop the next entry to revert. The caller replays its inverse and then
    /// hands it back through [`UndoJournal::push_redo`].
    pub fn pop_undo(&mut self) -> Option<EditOperation> {
        let op = self.undo_stack.pop();
        if op.is_some() {
            trace!(target: "text.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), "undo_pop");
        }
        op
    }

    pub fn pop_redo(&mut self) -> Option<EditOperation> {
        let op = self.redo_stack.pop();
        if op.is_some() {
            trace!(target: "text.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), "redo_pop");
        }
        op
    }

    pub fn push_redo(&mut self, op: EditOperation) {
        self.redo_stack.push(op);
        self.last_recorded = None;
    }

    pub fn push_undo(&mut self, op: EditOperation) {
        self.undo_stack.push(op);
        self.last_recorded = None;
    }
}
