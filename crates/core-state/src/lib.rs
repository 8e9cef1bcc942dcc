//! Caret and selection state.
//!
//! [`CaretSelectionManager`] owns an ordered collection of
//! [`core_text::TextSelection`]s plus the index of the primary caret. Every
//! mutation funnels through one normalize-then-swap step:
//! - each selection is re-derived from its shape (collapsed stream
//!   selections become carets, column selections are rebuilt from their span);
//! - identical selections are dropped when deduplication is enabled;
//! - the list is sorted by `(active, anchor)` when sorting is enabled;
//! - the primary is re-resolved by value, so it survives reordering;
//! - the list is trimmed to `max_caret_count`, keeping a window centred on
//!   the primary.
//!
//! Observers register with [`CaretSelectionManager::subscribe`] and receive
//! exactly one [`CaretSelectionChanged`] per call that actually changed the
//! state. Listeners run after the internal lock is released, so they may
//! call back into the manager.

mod carets;
mod options;

pub use carets::{CaretSelectionChanged, CaretSelectionManager, CaretState, CaretSubscription};
pub use options::{CaretOptionsError, CaretSelectionManagerOptions, DEFAULT_MAX_CARET_COUNT};
