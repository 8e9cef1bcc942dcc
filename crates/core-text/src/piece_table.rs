//! Piece table storage.
//!
//! The text is the concatenation of `pieces`, each referencing a byte range
//! of either the original text or one add buffer. Buffers are immutable once
//! stored; an insert appends a fresh add buffer and splices one piece in, a
//! delete splits at both ends of the span and drops the covered pieces.
//!
//! Piece list and add-buffer list sit behind `Arc`s. Taking a snapshot clones
//! the `Arc`s; the next edit copies the list it touches (`Arc::make_mut`), so
//! snapshots never observe later edits.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::error::BufferError;
use crate::snapshot::PieceTreeSnapshot;
use crate::undo::{DEFAULT_COALESCE_WINDOW, EditKind, EditOperation, UndoJournal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PieceSource {
    Original,
    /// Index into the add-buffer list.
    Add(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Piece {
    pub(crate) source: PieceSource,
    /// Byte offset into the source buffer.
    pub(crate) start: usize,
    pub(crate) byte_len: usize,
    pub(crate) char_len: usize,
}

/// Shared storage behind both the live buffer and its snapshots.
#[derive(Clone)]
pub(crate) struct PieceStore {
    original: Arc<str>,
    add_buffers: Arc<Vec<Arc<str>>>,
    pieces: Arc<Vec<Piece>>,
}

impl PieceStore {
    fn new(original: &str) -> Self {
        let mut pieces = Vec::new();
        if !original.is_empty() {
            pieces.push(Piece {
                source: PieceSource::Original,
                start: 0,
                byte_len: original.len(),
                char_len: original.chars().count(),
            });
        }
        Self {
            original: Arc::from(original),
            add_buffers: Arc::new(Vec::new()),
            pieces: Arc::new(pieces),
        }
    }

    pub(crate) fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub(crate) fn slice(&self, piece: &Piece) -> &str {
        let buffer: &str = match piece.source {
            PieceSource::Original => &self.original,
            PieceSource::Add(id) => &self.add_buffers[id],
        };
        &buffer[piece.start..piece.start + piece.byte_len]
    }

    pub(crate) fn chunks(&self) -> Chunks<'_> {
        Chunks {
            store: self,
            index: 0,
        }
    }

    pub(crate) fn collect(&self, byte_hint: usize) -> String {
        let mut out = String::with_capacity(byte_hint);
        for chunk in self.chunks() {
            out.push_str(chunk);
        }
        out
    }

    /// Validated range read over `len` chars of content.
    pub(crate) fn text_range(
        &self,
        len: usize,
        position: usize,
        length: usize,
    ) -> Result<String, BufferError> {
        match position.checked_add(length) {
            Some(end) if end <= len => {}
            _ => {
                return Err(BufferError::OutOfRange {
                    position,
                    length,
                    len,
                });
            }
        }
        if length == 0 {
            return Ok(String::new());
        }
        let end = position + length;
        let mut out = String::new();
        let mut current = 0usize;
        for piece in self.pieces.iter() {
            let next = current + piece.char_len;
            if next <= position {
                current = next;
                continue;
            }
            if current >= end {
                break;
            }
            let skip = position.saturating_sub(current);
            let take = next.min(end) - (current + skip);
            out.extend(self.slice(piece).chars().skip(skip).take(take));
            current = next;
        }
        Ok(out)
    }

    /// Ensure a piece boundary at char offset `position` and return the index
    /// of the first piece at or after it.
    fn split_at(&mut self, position: usize, len: usize) -> usize {
        if self.pieces.is_empty() || position == len {
            return self.pieces.len();
        }
        let mut current = 0usize;
        for i in 0..self.pieces.len() {
            let piece = self.pieces[i];
            let next = current + piece.char_len;
            if position == current {
                return i;
            }
            if position < next {
                let offset = position - current;
                let byte = byte_offset(self.slice(&piece), offset);
                let left = Piece {
                    byte_len: byte,
                    char_len: offset,
                    ..piece
                };
                let right = Piece {
                    start: piece.start + byte,
                    byte_len: piece.byte_len - byte,
                    char_len: piece.char_len - offset,
                    ..piece
                };
                let pieces = Arc::make_mut(&mut self.pieces);
                pieces[i] = left;
                pieces.insert(i + 1, right);
                return i + 1;
            }
            current = next;
        }
        self.pieces.len()
    }

    fn push_add_buffer(&mut self, text: &str) -> usize {
        let buffers = Arc::make_mut(&mut self.add_buffers);
        buffers.push(Arc::from(text));
        buffers.len() - 1
    }
}

fn byte_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map_or(text.len(), |(i, _)| i)
}

/// Iterator over the stored chunks of a buffer or snapshot, one per piece.
pub struct Chunks<'a> {
    store: &'a PieceStore,
    index: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let store: &'a PieceStore = self.store;
        let piece = store.pieces.get(self.index)?;
        self.index += 1;
        Some(store.slice(piece))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.store.pieces.len().saturating_sub(self.index);
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for Chunks<'_> {}

/// Piece-table text buffer with coalesced undo/redo and O(1) snapshots.
#[derive(Clone)]
pub struct PieceTreeTextBuffer {
    store: PieceStore,
    len: usize,
    byte_len: usize,
    version: u64,
    journal: UndoJournal,
}

impl Default for PieceTreeTextBuffer {
    fn default() -> Self {
        Self::new("")
    }
}

impl fmt::Debug for PieceTreeTextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PieceTreeTextBuffer")
            .field("len", &self.len)
            .field("version", &self.version)
            .field("pieces", &self.store.piece_count())
            .field("undo_depth", &self.journal.undo_depth())
            .field("redo_depth", &self.journal.redo_depth())
            .finish()
    }
}

impl PieceTreeTextBuffer {
    pub fn new(initial: &str) -> Self {
        Self::with_coalesce_window(initial, DEFAULT_COALESCE_WINDOW)
    }

    pub fn with_coalesce_window(initial: &str, window: Duration) -> Self {
        Self {
            store: PieceStore::new(initial),
            len: initial.chars().count(),
            byte_len: initial.len(),
            version: 0,
            journal: UndoJournal::new(window),
        }
    }

    /// Length in `char`s.
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    /// Incremented on every structural change, including undo/redo replays.
    pub fn version(&self) -> u64 {
        self.version
    }
    pub fn piece_count(&self) -> usize {
        self.store.piece_count()
    }
    pub fn can_undo(&self) -> bool {
        self.journal.can_undo()
    }
    pub fn can_redo(&self) -> bool {
        self.journal.can_redo()
    }
    pub fn undo_depth(&self) -> usize {
        self.journal.undo_depth()
    }
    pub fn redo_depth(&self) -> usize {
        self.journal.redo_depth()
    }

    pub fn insert(&mut self, position: usize, text: &str) -> Result<(), BufferError> {
        self.insert_internal(position, text, true)
    }

    /// Remove up to `length` chars starting at `position`; the length is
    /// clamped to the remaining text. Returns the removed text.
    pub fn delete(&mut self, position: usize, length: usize) -> Result<String, BufferError> {
        self.delete_internal(position, length, true)
    }

    pub fn text(&self, position: usize, length: usize) -> Result<String, BufferError> {
        self.store.text_range(self.len, position, length)
    }

    pub fn snapshot(&self) -> PieceTreeSnapshot {
        PieceTreeSnapshot::new(self.version, self.len, self.byte_len, self.store.clone())
    }

    pub fn chunks(&self) -> Chunks<'_> {
        self.store.chunks()
    }

    /// Revert the most recent journal entry. `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, BufferError> {
        let Some(op) = self.journal.pop_undo() else {
            return Ok(false);
        };
        let replay = match op.kind {
            EditKind::Insert => self.delete_internal(op.position, op.len, false).map(|_| ()),
            EditKind::Delete => self.insert_internal(op.position, &op.text, false),
        };
        if let Err(err) = replay {
            self.journal.push_undo(op);
            return Err(err);
        }
        self.journal.push_redo(op);
        Ok(true)
    }

    /// Reapply the most recently undone entry. `Ok(false)` when there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool, BufferError> {
        let Some(op) = self.journal.pop_redo() else {
            return Ok(false);
        };
        let replay = match op.kind {
            EditKind::Insert => self.insert_internal(op.position, &op.text, false),
            EditKind::Delete => self.delete_internal(op.position, op.len, false).map(|_| ()),
        };
        if let Err(err) = replay {
            self.journal.push_redo(op);
            return Err(err);
        }
        self.journal.push_undo(op);
        Ok(true)
    }

    fn insert_internal(
        &mut self,
        position: usize,
        text: &str,
        record: bool,
    ) -> Result<(), BufferError> {
        if position > self.len {
            return Err(BufferError::OutOfRange {
                position,
                length: 0,
                len: self.len,
            });
        }
        if text.is_empty() {
            return Ok(());
        }
        let index = self.store.split_at(position, self.len);
        let buffer_id = self.store.push_add_buffer(text);
        let char_len = text.chars().count();
        Arc::make_mut(&mut self.store.pieces).insert(
            index,
            Piece {
                source: PieceSource::Add(buffer_id),
                start: 0,
                byte_len: text.len(),
                char_len,
            },
        );
        self.len += char_len;
        self.byte_len += text.len();
        self.version += 1;
        trace!(target: "text.buffer", position, chars = char_len, version = self.version, pieces = self.store.piece_count(), "insert");
        if record {
            self.journal.record(EditOperation::insert(position, text));
        }
        Ok(())
    }

    fn delete_internal(
        &mut self,
        position: usize,
        length: usize,
        record: bool,
    ) -> Result<String, BufferError> {
        if position > self.len {
            return Err(BufferError::OutOfRange {
                position,
                length,
                len: self.len,
            });
        }
        let length = length.min(self.len - position);
        if length == 0 {
            return Ok(String::new());
        }
        let removed = self.store.text_range(self.len, position, length)?;
        let start = self.store.split_at(position, self.len);
        let end = self.store.split_at(position + length, self.len);
        Arc::make_mut(&mut self.store.pieces).drain(start..end);
        self.len -= length;
        self.byte_len -= removed.len();
        self.version += 1;
        trace!(target: "text.buffer", position, chars = length, version = self.version, pieces = self.store.piece_count(), "delete");
        if record {
            self.journal.record(EditOperation::delete(position, removed.clone()));
        }
        Ok(removed)
    }
}

impl fmt::Display for PieceTreeTextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}
