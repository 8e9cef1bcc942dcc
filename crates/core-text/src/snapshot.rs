use std::fmt;

use crate::error::BufferError;
use crate::lines::LineLengths;
use crate::piece_table::{Chunks, PieceStore};

/// Immutable point-in-time view of a [`crate::PieceTreeTextBuffer`].
///
/// Cloning is cheap; the storage is shared with the buffer it came from.
#[derive(Clone)]
pub struct PieceTreeSnapshot {
    version: u64,
    len: usize,
    byte_len: usize,
    store: PieceStore,
}

impl PieceTreeSnapshot {
    pub(crate) fn new(version: u64, len: usize, byte_len: usize, store: PieceStore) -> Self {
        Self {
            version,
            len,
            byte_len,
            store,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Materialize the full content.
    pub fn text(&self) -> String {
        self.store.collect(self.byte_len)
    }

    pub fn text_range(&self, position: usize, length: usize) -> Result<String, BufferError> {
        self.store.text_range(self.len, position, length)
    }

    pub fn chunks(&self) -> Chunks<'_> {
        self.store.chunks()
    }

    pub fn line_lengths(&self) -> LineLengths {
        LineLengths::from_text(&self.text())
    }
}

impl fmt::Debug for PieceTreeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PieceTreeSnapshot")
            .field("version", &self.version)
            .field("len", &self.len)
            .field("pieces", &self.store.piece_count())
            .finish()
    }
}
