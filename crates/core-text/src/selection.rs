//! Selection value types: carets, linear ("stream") ranges and rectangular
//! ("column") slices.
//!
//! A rectangular selection over several lines is represented as one
//! [`TextSelection`] of kind [`SelectionKind::Column`] per line, each carrying
//! the [`ColumnSelectionSpan`] for its row.
//!
//! Invariants enforced on construction:
//! * `Caret` selections always have `anchor == active`.
//! * A `Stream` selection whose endpoints coincide is demoted to `Caret`.
//! * `Column` selections carry a span on the anchor's line; the active
//!   endpoint is moved onto that line if needed.

use std::fmt;

use crate::error::SelectionError;
use crate::position::TextPosition;

/// Which way the active endpoint faces relative to the anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LogicalDirection {
    #[default]
    Forward,
    Backward,
}

/// Shape of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionKind {
    Caret,
    Stream,
    Column,
}

/// One row of a rectangular selection: `[start_column, end_column)` on `line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnSelectionSpan {
    line: usize,
    start_column: usize,
    end_column: usize,
}

impl ColumnSelectionSpan {
    /// Build a span, swapping the bounds when given in reverse.
    pub fn new(line: usize, start_column: usize, end_column: usize) -> Self {
        let (start_column, end_column) = if end_column < start_column {
            (end_column, start_column)
        } else {
            (start_column, end_column)
        };
        Self {
            line,
            start_column,
            end_column,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }
    pub fn start_column(&self) -> usize {
        self.start_column
    }
    pub fn end_column(&self) -> usize {
        self.end_column
    }
    pub fn len(&self) -> usize {
        self.end_column - self.start_column
    }
    pub fn is_empty(&self) -> bool {
        self.start_column == self.end_column
    }

    /// Same line, new bounds (again normalized).
    pub fn with_bounds(&self, start_column: usize, end_column: usize) -> Self {
        Self::new(self.line, start_column, end_column)
    }
}

/// A caret together with its selection metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextSelection {
    anchor: TextPosition,
    active: TextPosition,
    kind: SelectionKind,
    active_direction: LogicalDirection,
    column_span: Option<ColumnSelectionSpan>,
}

impl TextSelection {
    /// General constructor. Prefer [`TextSelection::caret`],
    /// [`TextSelection::stream`] and [`TextSelection::column`], which cannot fail.
    pub fn new(
        anchor: TextPosition,
        active: TextPosition,
        kind: SelectionKind,
        active_direction: LogicalDirection,
        column_span: Option<ColumnSelectionSpan>,
    ) -> Result<Self, SelectionError> {
        let mut anchor = anchor;
        let mut active = active;
        let mut kind = kind;
        match (kind, column_span) {
            (SelectionKind::Column, None) => {
                return Err(SelectionError::InvalidShape(
                    "column selections require a column span",
                ));
            }
            (SelectionKind::Column, Some(span)) => {
                if span.line != anchor.line {
                    return Err(SelectionError::AnchorOffSpanLine {
                        anchor_line: anchor.line,
                        span_line: span.line,
                    });
                }
                active.line = span.line;
            }
            (_, Some(_)) => {
                return Err(SelectionError::InvalidShape(
                    "column span is only valid for column selections",
                ));
            }
            (SelectionKind::Caret, None) => anchor = active,
            (SelectionKind::Stream, None) => {
                if anchor == active {
                    kind = SelectionKind::Caret;
                }
            }
        }
        Ok(Self {
            anchor,
            active,
            kind,
            active_direction,
            column_span,
        })
    }

    /// Caret-only selection at `position`.
    pub fn caret(position: TextPosition, direction: LogicalDirection) -> Self {
        Self {
            anchor: position,
            active: position,
            kind: SelectionKind::Caret,
            active_direction: direction,
            column_span: None,
        }
    }

    /// Linear selection between two endpoints. When `direction` is `None` it
    /// is inferred from the endpoint order.
    pub fn stream(
        anchor: TextPosition,
        active: TextPosition,
        direction: Option<LogicalDirection>,
    ) -> Self {
        let direction = direction.unwrap_or(if anchor <= active {
            LogicalDirection::Forward
        } else {
            LogicalDirection::Backward
        });
        if anchor == active {
            return Self::caret(active, direction);
        }
        Self {
            anchor,
            active,
            kind: SelectionKind::Stream,
            active_direction: direction,
            column_span: None,
        }
    }

    /// Column slice on `line` between two column bounds (in either order).
    /// A backward selection anchors at the end column.
    pub fn column(
        line: usize,
        column_a: usize,
        column_b: usize,
        direction: LogicalDirection,
    ) -> Self {
        let span = ColumnSelectionSpan::new(line, column_a, column_b);
        let (anchor_col, active_col) = match direction {
            LogicalDirection::Forward => (span.start_column, span.end_column),
            LogicalDirection::Backward => (span.end_column, span.start_column),
        };
        Self {
            anchor: TextPosition::new(line, anchor_col),
            active: TextPosition::new(line, active_col),
            kind: SelectionKind::Column,
            active_direction: direction,
            column_span: Some(span),
        }
    }

    pub fn anchor(&self) -> TextPosition {
        self.anchor
    }
    pub fn active(&self) -> TextPosition {
        self.active
    }
    pub fn kind(&self) -> SelectionKind {
        self.kind
    }
    pub fn active_direction(&self) -> LogicalDirection {
        self.active_direction
    }
    pub fn column_span(&self) -> Option<ColumnSelectionSpan> {
        self.column_span
    }
    pub fn is_caret(&self) -> bool {
        self.kind == SelectionKind::Caret
    }

    pub fn is_empty(&self) -> bool {
        match self.kind {
            SelectionKind::Caret => true,
            SelectionKind::Stream => self.anchor == self.active,
            SelectionKind::Column => self.column_span.is_none_or(|s| s.is_empty()),
        }
    }

    /// Logically earlier endpoint.
    pub fn start(&self) -> TextPosition {
        match (self.kind, self.column_span) {
            (SelectionKind::Column, Some(span)) => TextPosition::new(span.line, span.start_column),
            _ => self.anchor.min(self.active),
        }
    }

    /// Logically later endpoint.
    pub fn end(&self) -> TextPosition {
        match (self.kind, self.column_span) {
            (SelectionKind::Column, Some(span)) => TextPosition::new(span.line, span.end_column),
            _ => self.anchor.max(self.active),
        }
    }

    /// Reshape by moving the active endpoint. A caret grows into a stream
    /// selection; a column selection keeps its anchored edge.
    pub fn with_active(&self, active: TextPosition, direction: LogicalDirection) -> Self {
        match (self.kind, self.column_span) {
            (SelectionKind::Caret, _) => Self::stream(self.anchor, active, Some(direction)),
            (SelectionKind::Column, Some(span)) => {
                let fixed = match self.active_direction {
                    LogicalDirection::Backward => span.end_column,
                    LogicalDirection::Forward => span.start_column,
                };
                Self::column(span.line, fixed, active.column, direction)
            }
            _ => Self::stream_unchecked(self.anchor, active, direction),
        }
    }

    /// Reshape by moving the anchor endpoint.
    pub fn with_anchor(&self, anchor: TextPosition, direction: LogicalDirection) -> Self {
        match (self.kind, self.column_span) {
            (SelectionKind::Caret, _) => Self::stream(anchor, self.active, Some(direction)),
            (SelectionKind::Column, Some(span)) => {
                let fixed = match self.active_direction {
                    LogicalDirection::Backward => span.start_column,
                    LogicalDirection::Forward => span.end_column,
                };
                Self::column(span.line, anchor.column, fixed, direction)
            }
            _ => Self::stream_unchecked(anchor, self.active, direction),
        }
    }

    // Stream reshaping keeps the given direction and demotes to a caret on collapse.
    fn stream_unchecked(
        anchor: TextPosition,
        active: TextPosition,
        direction: LogicalDirection,
    ) -> Self {
        if anchor == active {
            Self::caret(active, direction)
        } else {
            Self {
                anchor,
                active,
                kind: SelectionKind::Stream,
                active_direction: direction,
                column_span: None,
            }
        }
    }
}

impl fmt::Display for TextSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} anchor={} active={} direction={:?}",
            self.kind, self.anchor, self.active, self.active_direction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(line: usize, column: usize) -> TextPosition {
        TextPosition::new(line, column)
    }

    #[test]
    fn span_swaps_reversed_bounds() {
        let s = ColumnSelectionSpan::new(2, 9, 4);
        assert_eq!((s.start_column(), s.end_column()), (4, 9));
        assert_eq!(s.len(), 5);
        assert!(!s.is_empty());
        assert_eq!(s.with_bounds(3, 3).len(), 0);
    }

    #[test]
    fn stream_with_equal_endpoints_is_caret() {
        let s = TextSelection::stream(p(1, 1), p(1, 1), None);
        assert_eq!(s.kind(), SelectionKind::Caret);
        assert!(s.is_empty());
    }

    #[test]
    fn stream_direction_is_inferred() {
        let fwd = TextSelection::stream(p(0, 0), p(0, 4), None);
        assert_eq!(fwd.active_direction(), LogicalDirection::Forward);
        let back = TextSelection::stream(p(3, 0), p(0, 4), None);
        assert_eq!(back.active_direction(), LogicalDirection::Backward);
        assert_eq!(back.start(), p(0, 4));
        assert_eq!(back.end(), p(3, 0));
    }

    #[test]
    fn general_constructor_normalizes_caret() {
        let s = TextSelection::new(
            p(5, 5),
            p(1, 1),
            SelectionKind::Caret,
            LogicalDirection::Forward,
            None,
        )
        .unwrap();
        assert_eq!(s.anchor(), p(1, 1));
    }

    #[test]
    fn column_requires_span_on_anchor_line() {
        let span = ColumnSelectionSpan::new(2, 0, 3);
        let err = TextSelection::new(
            p(1, 0),
            p(2, 3),
            SelectionKind::Column,
            LogicalDirection::Forward,
            Some(span),
        )
        .unwrap_err();
        assert!(matches!(err, SelectionError::AnchorOffSpanLine { .. }));

        let missing = TextSelection::new(
            p(1, 0),
            p(1, 3),
            SelectionKind::Column,
            LogicalDirection::Forward,
            None,
        );
        assert!(matches!(missing, Err(SelectionError::InvalidShape(_))));

        let stray = TextSelection::new(
            p(2, 0),
            p(2, 3),
            SelectionKind::Stream,
            LogicalDirection::Forward,
            Some(span),
        );
        assert!(matches!(stray, Err(SelectionError::InvalidShape(_))));
    }

    #[test]
    fn column_active_moves_onto_span_line() {
        let span = ColumnSelectionSpan::new(2, 0, 3);
        let s = TextSelection::new(
            p(2, 0),
            p(7, 3),
            SelectionKind::Column,
            LogicalDirection::Forward,
            Some(span),
        )
        .unwrap();
        assert_eq!(s.active(), p(2, 3));
    }

    #[test]
    fn backward_column_anchors_at_end() {
        let s = TextSelection::column(4, 2, 8, LogicalDirection::Backward);
        assert_eq!(s.anchor(), p(4, 8));
        assert_eq!(s.active(), p(4, 2));
        assert_eq!(s.start(), p(4, 2));
        assert_eq!(s.end(), p(4, 8));
    }

    #[test]
    fn with_active_grows_caret_into_stream() {
        let caret = TextSelection::caret(p(0, 2), LogicalDirection::Forward);
        let grown = caret.with_active(p(0, 6), LogicalDirection::Forward);
        assert_eq!(grown.kind(), SelectionKind::Stream);
        assert_eq!(grown.anchor(), p(0, 2));
        let collapsed = grown.with_active(p(0, 2), LogicalDirection::Backward);
        assert!(collapsed.is_caret());
    }

    #[test]
    fn with_active_keeps_column_anchor_edge() {
        let col = TextSelection::column(1, 2, 5, LogicalDirection::Forward);
        let moved = col.with_active(p(1, 9), LogicalDirection::Forward);
        let span = moved.column_span().unwrap();
        assert_eq!((span.start_column(), span.end_column()), (2, 9));
        let re_anchored = col.with_anchor(p(1, 0), LogicalDirection::Forward);
        let span = re_anchored.column_span().unwrap();
        assert_eq!((span.start_column(), span.end_column()), (0, 5));
    }
}
