use thiserror::Error;

/// Failures surfaced by buffer edits and reads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// A position or span falls outside `0..=len`.
    #[error("position {position} (+{length}) is out of range for buffer of length {len}")]
    OutOfRange {
        position: usize,
        length: usize,
        len: usize,
    },
}

/// Failures raised while constructing selections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Column selections must keep their anchor on the span's line.
    #[error("column selection anchor on line {anchor_line} does not match span line {span_line}")]
    AnchorOffSpanLine { anchor_line: usize, span_line: usize },
    /// Column selections need a span; other kinds must not carry one.
    #[error("{0}")]
    InvalidShape(&'static str),
}
