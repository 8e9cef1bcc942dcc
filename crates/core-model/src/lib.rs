//! Document model: versioned documents over the piece table and the bus that
//! tells the rest of the editor about their changes.
//!
//! Ownership model
//! ---------------
//! A [`Document`] exclusively owns its [`core_text::PieceTreeTextBuffer`] and
//! is mutated through `&mut self`. Readers that must not hold the document
//! (renderers, projections, background work) take a [`DocumentSnapshot`],
//! which is cheap to create and never observes later edits.
//!
//! Every document is bound to one [`DocumentChangeBus`] at construction. The
//! bus is an explicit dependency; there is no process-wide default. Edits that
//! change the buffer advance the document version, mark it dirty and publish a
//! [`DocumentChange`]; the bus turns these into [`DocumentChangeSet`] batches.
//!
//! Publish policy (first match wins):
//! * an open transaction for the document buffers the change until the
//!   outermost [`TransactionScope`] closes;
//! * a zero throttle window delivers synchronously, in subscription order;
//! * otherwise the change joins the document's pending batch and the
//!   debounce deadline is re-armed, so a burst yields one delivery fired one
//!   window after its last edit.
//!
//! Each delivered batch carries the snapshot taken after its last change, so
//! subscribers can rebuild derived views without touching the live document.
//! [`projection`] builds on that to keep read-only, diff and metadata views
//! of a document current.
//!
//! Invariants:
//! * Document version sequence increases by exactly one per buffer-changing call.
//! * No-op edits (empty insert, zero-length delete, undo on empty stack) publish nothing.
//! * Unsubscribing is idempotent and safe while a delivery is in progress.

mod bus;
mod change;
mod document;
mod identity;
mod kernel;
mod lines;
pub mod projection;
mod snapshot;

pub use bus::{ChangeBusError, DocumentChangeBus, Subscription, TransactionScope};
pub use change::{DocumentChange, DocumentChangeKind, DocumentChangeSet};
pub use document::{Document, DocumentBuilder};
pub use identity::{DocumentId, DocumentVersion};
pub use kernel::EditorKernel;
pub use lines::DocumentLineProvider;
pub use snapshot::DocumentSnapshot;
