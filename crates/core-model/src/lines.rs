use core_text::{LineLengths, TextLineProvider};

use crate::snapshot::DocumentSnapshot;

/// Line metrics of a document snapshot, for clamping caret and column
/// selections.
#[derive(Debug, Clone)]
pub struct DocumentLineProvider {
    lines: LineLengths,
}

impl DocumentLineProvider {
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Self {
        Self {
            lines: snapshot.buffer_snapshot().line_lengths(),
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            lines: LineLengths::from_text(text),
        }
    }
}

impl TextLineProvider for DocumentLineProvider {
    fn line_count(&self) -> usize {
        self.lines.line_count()
    }

    fn line_length(&self, line: usize) -> Option<usize> {
        self.lines.line_length(line)
    }
}
