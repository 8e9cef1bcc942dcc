use std::sync::Arc;

use crate::identity::{DocumentId, DocumentVersion};
use crate::snapshot::DocumentSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentChangeKind {
    Insert,
    Delete,
    Undo,
    Redo,
}

/// One document mutation. `Undo`/`Redo` are markers without position or
/// text; subscribers should re-read a snapshot instead of applying a delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
    pub kind: DocumentChangeKind,
    pub position: Option<usize>,
    /// Length of `text` in chars; zero for markers.
    pub length: usize,
    pub text: Option<String>,
}

impl DocumentChange {
    pub fn insert(position: usize, text: impl Into<String>) -> Self {
        Self::with_text(DocumentChangeKind::Insert, position, text.into())
    }

    pub fn delete(position: usize, removed: impl Into<String>) -> Self {
        Self::with_text(DocumentChangeKind::Delete, position, removed.into())
    }

    pub fn undo() -> Self {
        Self::marker(DocumentChangeKind::Undo)
    }

    pub fn redo() -> Self {
        Self::marker(DocumentChangeKind::Redo)
    }

    fn with_text(kind: DocumentChangeKind, position: usize, text: String) -> Self {
        Self {
            kind,
            position: Some(position),
            length: text.chars().count(),
            text: Some(text),
        }
    }

    fn marker(kind: DocumentChangeKind) -> Self {
        Self {
            kind,
            position: None,
            length: 0,
            text: None,
        }
    }
}

/// A batch of changes delivered to subscribers, with the document version
/// and snapshot as of the last change in the batch.
#[derive(Debug, Clone)]
pub struct DocumentChangeSet {
    pub document_id: DocumentId,
    pub version: DocumentVersion,
    pub changes: Arc<[DocumentChange]>,
    pub snapshot: DocumentSnapshot,
}
