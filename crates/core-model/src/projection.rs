//! Derived, read-only views of a document.
//!
//! A [`ProjectionBuffer`] subscribes to one document on its bus and rebuilds
//! an immutable [`ProjectionSnapshot`] from each delivered change set's
//! snapshot. What the projection shows is decided by its [`SegmentBuilder`]:
//! [`ReadOnlySegments`] mirrors the document, [`DiffSegments`] contrasts it
//! with a comparison snapshot and [`MetadataSegments`] delegates to a closure.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::bus::Subscription;
use crate::document::Document;
use crate::identity::{DocumentId, DocumentVersion};
use crate::snapshot::DocumentSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionSegmentKind {
    Original,
    Added,
    Removed,
    Literal,
    Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionSegment {
    pub text: String,
    pub kind: ProjectionSegmentKind,
    pub metadata: BTreeMap<String, String>,
}

impl ProjectionSegment {
    pub fn new(text: impl Into<String>, kind: ProjectionSegmentKind) -> Self {
        Self {
            text: text.into(),
            kind,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Segments built for one document version; `text` is their concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionSnapshot {
    pub document_id: DocumentId,
    pub version: DocumentVersion,
    pub text: String,
    pub segments: Vec<ProjectionSegment>,
}

impl ProjectionSnapshot {
    fn new(
        document_id: DocumentId,
        version: DocumentVersion,
        segments: Vec<ProjectionSegment>,
    ) -> Self {
        let text = segments.iter().map(|s| s.text.as_str()).collect();
        Self {
            document_id,
            version,
            text,
            segments,
        }
    }
}

pub trait SegmentBuilder: Send + 'static {
    fn build_segments(&mut self, snapshot: &DocumentSnapshot) -> Vec<ProjectionSegment>;
}

struct Shared<B> {
    builder: B,
    source: DocumentSnapshot,
    current: Arc<ProjectionSnapshot>,
}

impl<B: SegmentBuilder> Shared<B> {
    fn rebuild(&mut self) {
        let segments = self.builder.build_segments(&self.source);
        self.current = Arc::new(ProjectionSnapshot::new(
            self.source.id(),
            self.source.version(),
            segments,
        ));
        trace!(target: "model.projection", document = %self.source.id(), version = self.source.version().sequence, segments = self.current.segments.len(), "rebuilt");
    }
}

/// Projection kept current by the document's change bus. Dropping it
/// unsubscribes.
pub struct ProjectionBuffer<B: SegmentBuilder> {
    shared: Arc<Mutex<Shared<B>>>,
    _subscription: Subscription,
}

impl<B: SegmentBuilder> ProjectionBuffer<B> {
    pub fn new(document: &Document, mut builder: B) -> Self {
        let source = document.snapshot();
        let segments = builder.build_segments(&source);
        let current = Arc::new(ProjectionSnapshot::new(source.id(), source.version(), segments));
        let shared = Arc::new(Mutex::new(Shared {
            builder,
            source,
            current,
        }));
        let handler_shared = Arc::clone(&shared);
        let subscription = document.bus().subscribe(Some(document.id()), move |set| {
            let mut shared = handler_shared.lock();
            shared.source = set.snapshot.clone();
            shared.rebuild();
        });
        Self {
            shared,
            _subscription: subscription,
        }
    }

    /// The projection as of the last delivered change set.
    pub fn snapshot(&self) -> Arc<ProjectionSnapshot> {
        Arc::clone(&self.shared.lock().current)
    }

    /// Mutate the builder and rebuild against the last seen document snapshot.
    pub fn update_builder(&self, f: impl FnOnce(&mut B)) {
        let mut shared = self.shared.lock();
        f(&mut shared.builder);
        shared.rebuild();
    }
}

/// Mirrors the document as one `Original` segment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadOnlySegments;

impl SegmentBuilder for ReadOnlySegments {
    fn build_segments(&mut self, snapshot: &DocumentSnapshot) -> Vec<ProjectionSegment> {
        vec![ProjectionSegment::new(
            snapshot.text(),
            ProjectionSegmentKind::Original,
        )]
    }
}

/// Whole-text comparison against a baseline snapshot.
#[derive(Debug, Default, Clone)]
pub struct DiffSegments {
    comparison: Option<DocumentSnapshot>,
}

impl DiffSegments {
    pub fn new(comparison: Option<DocumentSnapshot>) -> Self {
        Self { comparison }
    }

    pub fn set_comparison(&mut self, comparison: DocumentSnapshot) {
        self.comparison = Some(comparison);
    }
}

impl SegmentBuilder for DiffSegments {
    fn build_segments(&mut self, snapshot: &DocumentSnapshot) -> Vec<ProjectionSegment> {
        let current = snapshot.text();
        let comparison = self
            .comparison
            .as_ref()
            .map(DocumentSnapshot::text)
            .unwrap_or_default();
        if current == comparison {
            return vec![ProjectionSegment::new(current, ProjectionSegmentKind::Original)];
        }
        let mut segments = Vec::with_capacity(2);
        if !comparison.is_empty() {
            segments.push(
                ProjectionSegment::new(comparison, ProjectionSegmentKind::Removed)
                    .with_metadata("label", "comparison"),
            );
        }
        if !current.is_empty() {
            segments.push(
                ProjectionSegment::new(current, ProjectionSegmentKind::Added)
                    .with_metadata("label", "current"),
            );
        }
        segments
    }
}

/// Segments produced by a caller-supplied closure.
pub struct MetadataSegments<F> {
    provider: F,
}

impl<F> MetadataSegments<F>
where
    F: FnMut(&DocumentSnapshot) -> Vec<ProjectionSegment> + Send + 'static,
{
    pub fn new(provider: F) -> Self {
        Self { provider }
    }
}

impl<F> SegmentBuilder for MetadataSegments<F>
where
    F: FnMut(&DocumentSnapshot) -> Vec<ProjectionSegment> + Send + 'static,
{
    fn build_segments(&mut self, snapshot: &DocumentSnapshot) -> Vec<ProjectionSegment> {
        (self.provider)(snapshot)
    }
}

pub type ReadOnlyProjectionBuffer = ProjectionBuffer<ReadOnlySegments>;
pub type DiffProjectionBuffer = ProjectionBuffer<DiffSegments>;

impl DiffProjectionBuffer {
    pub fn update_comparison(&self, comparison: DocumentSnapshot) {
        self.update_builder(|b| b.set_comparison(comparison));
    }
}
