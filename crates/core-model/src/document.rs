use std::time::Duration;

use core_text::{BufferError, DEFAULT_COALESCE_WINDOW, PieceTreeTextBuffer};
use tracing::trace;
use url::Url;

use crate::bus::{DocumentChangeBus, TransactionScope};
use crate::change::DocumentChange;
use crate::identity::{DocumentId, DocumentVersion};
use crate::snapshot::DocumentSnapshot;

/// Builder for [`Document`]; obtained from [`Document::builder`].
#[derive(Debug)]
pub struct DocumentBuilder {
    bus: DocumentChangeBus,
    text: String,
    uri: Option<Url>,
    id: Option<DocumentId>,
    coalesce_window: Duration,
}

impl DocumentBuilder {
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn uri(mut self, uri: Url) -> Self {
        self.uri = Some(uri);
        self
    }

    pub fn id(mut self, id: DocumentId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn coalesce_window(mut self, window: Duration) -> Self {
        self.coalesce_window = window;
        self
    }

    pub fn build(self) -> Document {
        Document {
            id: self.id.unwrap_or_default(),
            uri: self.uri,
            buffer: PieceTreeTextBuffer::with_coalesce_window(&self.text, self.coalesce_window),
            version: DocumentVersion::initial(),
            dirty: false,
            bus: self.bus,
        }
    }
}

/// A text buffer with identity, version and change publication.
#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    uri: Option<Url>,
    buffer: PieceTreeTextBuffer,
    version: DocumentVersion,
    dirty: bool,
    bus: DocumentChangeBus,
}

impl Document {
    pub fn builder(bus: DocumentChangeBus) -> DocumentBuilder {
        DocumentBuilder {
            bus,
            text: String::new(),
            uri: None,
            id: None,
            coalesce_window: DEFAULT_COALESCE_WINDOW,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }
    pub fn uri(&self) -> Option<&Url> {
        self.uri.as_ref()
    }
    pub fn version(&self) -> DocumentVersion {
        self.version
    }
    pub fn len(&self) -> usize {
        self.buffer.len()
    }
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
    pub fn can_undo(&self) -> bool {
        self.buffer.can_undo()
    }
    pub fn can_redo(&self) -> bool {
        self.buffer.can_redo()
    }
    pub fn bus(&self) -> &DocumentChangeBus {
        &self.bus
    }
    pub fn text(&self) -> String {
        self.buffer.to_string()
    }
    pub fn text_range(&self, position: usize, length: usize) -> Result<String, BufferError> {
        self.buffer.text(position, length)
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot::new(self.id, self.version, self.uri.clone(), self.buffer.snapshot())
    }

    pub fn insert(&mut self, position: usize, text: &str) -> Result<(), BufferError> {
        let before = self.buffer.version();
        self.buffer.insert(position, text)?;
        if self.advance(before) {
            self.publish(DocumentChange::insert(position, text));
        }
        Ok(())
    }

    /// Delete up to `length` chars at `position`, returning the removed text.
    pub fn delete(&mut self, position: usize, length: usize) -> Result<String, BufferError> {
        let before = self.buffer.version();
        let removed = self.buffer.delete(position, length)?;
        if self.advance(before) {
            self.publish(DocumentChange::delete(position, removed.clone()));
        }
        Ok(removed)
    }

    pub fn undo(&mut self) -> Result<bool, BufferError> {
        let before = self.buffer.version();
        if !self.buffer.undo()? {
            return Ok(false);
        }
        if self.advance(before) {
            self.publish(DocumentChange::undo());
        }
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool, BufferError> {
        let before = self.buffer.version();
        if !self.buffer.redo()? {
            return Ok(false);
        }
        if self.advance(before) {
            self.publish(DocumentChange::redo());
        }
        Ok(true)
    }

    /// Buffer this document's changes until the returned scope (and any
    /// scopes nested inside it) completes.
    pub fn begin_change_transaction(&self) -> TransactionScope {
        self.bus.begin_transaction(self.id)
    }

    pub fn flush_pending_changes(&self) {
        self.bus.flush_pending(self.id);
    }

    fn advance(&mut self, buffer_version_before: u64) -> bool {
        if self.buffer.version() == buffer_version_before {
            return false;
        }
        self.version = self.version.next();
        self.dirty = true;
        trace!(target: "model.document", document = %self.id, version = self.version.sequence, len = self.buffer.len(), "advance");
        true
    }

    fn publish(&self, change: DocumentChange) {
        self.bus
            .publish(self.id, self.version, change, self.snapshot());
    }
}
