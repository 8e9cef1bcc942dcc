use std::time::Duration;

use core_text::{DEFAULT_COALESCE_WINDOW, PieceTreeTextBuffer};
use url::Url;

use crate::bus::DocumentChangeBus;
use crate::document::Document;
use crate::identity::DocumentId;

/// Entry point that hands out buffers and documents bound to one bus.
#[derive(Debug, Clone)]
pub struct EditorKernel {
    bus: DocumentChangeBus,
    coalesce_window: Duration,
}

impl EditorKernel {
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    pub fn new(bus: DocumentChangeBus) -> Self {
        Self {
            bus,
            coalesce_window: DEFAULT_COALESCE_WINDOW,
        }
    }

    pub fn with_coalesce_window(mut self, window: Duration) -> Self {
        self.coalesce_window = window;
        self
    }

    pub fn bus(&self) -> &DocumentChangeBus {
        &self.bus
    }

    pub fn create_text_buffer(&self, initial: &str) -> PieceTreeTextBuffer {
        PieceTreeTextBuffer::with_coalesce_window(initial, self.coalesce_window)
    }

    pub fn create_document(
        &self,
        initial: &str,
        uri: Option<Url>,
        id: Option<DocumentId>,
    ) -> Document {
        let mut builder = Document::builder(self.bus.clone())
            .text(initial)
            .coalesce_window(self.coalesce_window);
        if let Some(uri) = uri {
            builder = builder.uri(uri);
        }
        if let Some(id) = id {
            builder = builder.id(id);
        }
        builder.build()
    }
}
