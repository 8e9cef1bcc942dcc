//! Text storage primitives for the editor core.
//!
//! The central type is [`PieceTreeTextBuffer`], a piece table over an
//! immutable original text plus append-only add buffers. Edits splice the
//! piece list and never touch stored text, which keeps snapshots cheap: a
//! [`PieceTreeSnapshot`] shares the piece list and buffers with the live
//! buffer until the next edit copies them on write.
//!
//! All positions and lengths handled by the buffer are measured in Unicode
//! scalar values (`char`s), not bytes.
//!
//! The crate also hosts the value types shared by selection handling
//! ([`TextPosition`], [`TextSelection`], [`ColumnSelectionSpan`]) and the
//! [`TextLineProvider`] contract used to clamp positions against line
//! lengths.

mod error;
pub mod lines;
mod piece_table;
pub mod position;
pub mod selection;
mod snapshot;
pub mod undo;

pub use error::{BufferError, SelectionError};
pub use lines::{LineLengths, TextLineProvider};
pub use piece_table::{Chunks, PieceTreeTextBuffer};
pub use position::TextPosition;
pub use selection::{ColumnSelectionSpan, LogicalDirection, SelectionKind, TextSelection};
pub use snapshot::PieceTreeSnapshot;
pub use undo::DEFAULT_COALESCE_WINDOW;
