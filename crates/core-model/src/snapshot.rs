use core_text::{Chunks, PieceTreeSnapshot};
use url::Url;

use crate::identity::{DocumentId, DocumentVersion};

/// Immutable view of a document at one version.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    id: DocumentId,
    version: DocumentVersion,
    uri: Option<Url>,
    buffer: PieceTreeSnapshot,
}

impl DocumentSnapshot {
    pub fn new(
        id: DocumentId,
        version: DocumentVersion,
        uri: Option<Url>,
        buffer: PieceTreeSnapshot,
    ) -> Self {
        Self {
            id,
            version,
            uri,
            buffer,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }
    pub fn version(&self) -> DocumentVersion {
        self.version
    }
    pub fn uri(&self) -> Option<&Url> {
        self.uri.as_ref()
    }
    pub fn len(&self) -> usize {
        self.buffer.len()
    }
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
    pub fn buffer_snapshot(&self) -> &PieceTreeSnapshot {
        &self.buffer
    }
    pub fn text(&self) -> String {
        self.buffer.text()
    }
    pub fn chunks(&self) -> Chunks<'_> {
        self.buffer.chunks()
    }
}
