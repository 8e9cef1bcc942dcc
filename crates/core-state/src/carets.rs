use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use core_text::{LogicalDirection, SelectionKind, TextLineProvider, TextPosition, TextSelection};
use parking_lot::Mutex;
use tracing::trace;

use crate::options::CaretSelectionManagerOptions;

/// Read-only projection of one caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaretState {
    pub selection: TextSelection,
    pub is_primary: bool,
}

impl CaretState {
    pub fn position(&self) -> TextPosition {
        self.selection.active()
    }
    pub fn kind(&self) -> SelectionKind {
        self.selection.kind()
    }
}

impl fmt::Display for CaretState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.is_primary { '*' } else { ' ' };
        write!(f, "{marker} {}", self.selection)
    }
}

/// Emitted once per state-changing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaretSelectionChanged {
    pub previous: Vec<CaretState>,
    pub current: Vec<CaretState>,
}

type Listener = Arc<dyn Fn(&CaretSelectionChanged) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Registration handle returned by [`CaretSelectionManager::subscribe`].
/// Dropping it unsubscribes.
pub struct CaretSubscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl CaretSubscription {
    /// Idempotent.
    pub fn unsubscribe(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().entries.retain(|(id, _)| *id != self.id);
        }
        self.listeners = Weak::new();
    }
}

impl Drop for CaretSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CaretSet {
    selections: Vec<TextSelection>,
    primary: Option<usize>,
}

impl CaretSet {
    fn states(&self) -> Vec<CaretState> {
        self.selections
            .iter()
            .enumerate()
            .map(|(i, selection)| CaretState {
                selection: *selection,
                is_primary: Some(i) == self.primary,
            })
            .collect()
    }
}

/// Thread-safe multi-caret selection model.
pub struct CaretSelectionManager {
    options: CaretSelectionManagerOptions,
    state: Mutex<CaretSet>,
    listeners: Arc<Mutex<Listeners>>,
}

impl Default for CaretSelectionManager {
    fn default() -> Self {
        Self::new(CaretSelectionManagerOptions::default())
    }
}

impl CaretSelectionManager {
    pub fn new(options: CaretSelectionManagerOptions) -> Self {
        Self {
            options,
            state: Mutex::new(CaretSet::default()),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    pub fn options(&self) -> &CaretSelectionManagerOptions {
        &self.options
    }

    pub fn count(&self) -> usize {
        self.state.lock().selections.len()
    }

    pub fn primary_index(&self) -> Option<usize> {
        self.state.lock().primary
    }

    pub fn primary_caret(&self) -> Option<CaretState> {
        let state = self.state.lock();
        let index = state.primary?;
        state.selections.get(index).map(|selection| CaretState {
            selection: *selection,
            is_primary: true,
        })
    }

    pub fn capture_state(&self) -> Vec<CaretState> {
        self.state.lock().states()
    }

    pub fn subscribe<F>(&self, listener: F) -> CaretSubscription
    where
        F: Fn(&CaretSelectionChanged) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.push((id, Arc::new(listener)));
        CaretSubscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn clear(&self) {
        self.apply(|_| Some((Vec::new(), None)));
    }

    pub fn set_single_caret(&self, position: TextPosition, direction: LogicalDirection) {
        self.set_carets(vec![TextSelection::caret(position, direction)], 0);
    }

    pub fn set_carets(&self, selections: Vec<TextSelection>, primary_index: usize) {
        self.apply(move |_| Some((selections, Some(primary_index))));
    }

    /// Append `selection`. It becomes primary when requested or when it is
    /// the only caret; otherwise the current primary index is kept.
    pub fn add_caret(&self, selection: TextSelection, make_primary: bool) {
        self.apply(|current| {
            let mut list = current.selections.clone();
            list.push(selection);
            let last = list.len() - 1;
            let primary = if make_primary || list.len() == 1 {
                last
            } else {
                current.primary.unwrap_or(0).min(last)
            };
            Some((list, Some(primary)))
        });
    }

    /// No-op when `index` is out of range.
    pub fn remove_caret_at(&self, index: usize) {
        self.apply(|current| {
            if index >= current.selections.len() {
                return None;
            }
            let mut list = current.selections.clone();
            list.remove(index);
            let primary = if list.is_empty() {
                None
            } else {
                Some(current.primary.unwrap_or(0).min(list.len() - 1))
            };
            Some((list, primary))
        });
    }

    /// Move the active end of the primary selection. Without a primary this
    /// places a single caret at `new_active`.
    pub fn extend_primary_selection(&self, new_active: TextPosition, direction: LogicalDirection) {
        self.apply(|current| {
            let Some((index, selection)) = current
                .primary
                .and_then(|i| current.selections.get(i).map(|s| (i, *s)))
            else {
                return Some((vec![TextSelection::caret(new_active, direction)], Some(0)));
            };
            let updated = match (selection.kind(), selection.column_span()) {
                (SelectionKind::Caret, _) => {
                    TextSelection::stream(selection.active(), new_active, Some(direction))
                }
                (SelectionKind::Stream, _) => {
                    TextSelection::stream(selection.anchor(), new_active, Some(direction))
                }
                (SelectionKind::Column, Some(span)) => {
                    let fixed = match direction {
                        LogicalDirection::Backward => span.end_column(),
                        LogicalDirection::Forward => span.start_column(),
                    };
                    TextSelection::column(span.line(), fixed, new_active.column, direction)
                }
                (SelectionKind::Column, None) => selection,
            };
            let mut list = current.selections.clone();
            list[index] = updated;
            Some((list, Some(index)))
        });
    }

    /// Replace all carets with a rectangular selection spanning the lines
    /// between `anchor` and `active`, one column selection per line, clamped
    /// to each line's length.
    pub fn set_column_selection(
        &self,
        anchor: TextPosition,
        active: TextPosition,
        lines: &dyn TextLineProvider,
        horizontal_direction: Option<LogicalDirection>,
    ) {
        let line_count = lines.line_count();
        if line_count == 0 {
            self.set_single_caret(TextPosition::origin(), LogicalDirection::Forward);
            return;
        }
        let anchor_line = anchor.line.min(line_count - 1);
        let active_line = active.line.min(line_count - 1);
        let direction = horizontal_direction.unwrap_or(if anchor.column <= active.column {
            LogicalDirection::Forward
        } else {
            LogicalDirection::Backward
        });
        let left = anchor.column.min(active.column);
        let right = anchor.column.max(active.column);

        let first = anchor_line.min(active_line);
        let last = anchor_line.max(active_line);
        let mut selections = Vec::with_capacity(last - first + 1);
        let mut primary = None;
        for line in first..=last {
            let len = lines.line_length(line).unwrap_or(0);
            selections.push(TextSelection::column(
                line,
                left.min(len),
                right.min(len),
                direction,
            ));
            if line == active_line {
                primary = Some(selections.len() - 1);
            }
        }
        let primary = primary.unwrap_or(selections.len() - 1);
        self.set_carets(selections, primary);
    }

    // Compute the requested state from the current one, normalize it, swap it
    // in and notify. Returning `None` from `f` leaves the state untouched.
    fn apply<F>(&self, f: F)
    where
        F: FnOnce(&CaretSet) -> Option<(Vec<TextSelection>, Option<usize>)>,
    {
        let event = {
            let mut state = self.state.lock();
            let Some((selections, primary)) = f(&state) else {
                return;
            };
            let next = self.normalize(selections, primary);
            if next == *state {
                return;
            }
            let previous = std::mem::replace(&mut *state, next);
            trace!(target: "state.carets", count = state.selections.len(), primary = ?state.primary, "carets_changed");
            CaretSelectionChanged {
                previous: previous.states(),
                current: state.states(),
            }
        };
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }

    fn normalize(&self, selections: Vec<TextSelection>, primary: Option<usize>) -> CaretSet {
        let mut seen = self.options.deduplicate_carets.then(HashSet::new);
        let mut requested = None;
        let mut list = Vec::with_capacity(selections.len());
        for (i, selection) in selections.into_iter().enumerate() {
            let selection = normalize_selection(selection);
            if Some(i) == primary {
                requested = Some(selection);
            }
            if let Some(seen) = seen.as_mut()
                && !seen.insert(selection)
            {
                continue;
            }
            list.push(selection);
        }
        if list.is_empty() {
            return CaretSet::default();
        }

        let fallback = primary.unwrap_or(0).min(list.len() - 1);
        let primary_selection = requested
            .filter(|r| list.contains(r))
            .unwrap_or(list[fallback]);
        if self.options.sort_carets_by_position && list.len() > 1 {
            list.sort_by(|a, b| {
                a.active()
                    .cmp(&b.active())
                    .then_with(|| a.anchor().cmp(&b.anchor()))
            });
        }
        let mut primary = list
            .iter()
            .position(|s| *s == primary_selection)
            .unwrap_or(0);

        let max = self.options.max_caret_count();
        if list.len() > max {
            let start = primary.saturating_sub(max / 2).min(list.len() - max);
            list.drain(..start);
            list.truncate(max);
            primary -= start;
            trace!(target: "state.carets", max, start, "carets_trimmed");
        }
        CaretSet {
            selections: list,
            primary: Some(primary),
        }
    }
}

fn normalize_selection(selection: TextSelection) -> TextSelection {
    let direction = selection.active_direction();
    match (selection.kind(), selection.column_span()) {
        (SelectionKind::Caret, _) => TextSelection::caret(selection.active(), direction),
        (SelectionKind::Stream, _) => {
            TextSelection::stream(selection.anchor(), selection.active(), Some(direction))
        }
        (SelectionKind::Column, Some(span)) => {
            let (a, b) = match direction {
                LogicalDirection::Backward => (span.end_column(), span.start_column()),
                LogicalDirection::Forward => (span.start_column(), span.end_column()),
            };
            TextSelection::column(span.line(), a, b, direction)
        }
        (SelectionKind::Column, None) => TextSelection::column(
            selection.active().line,
            selection.anchor().column,
            selection.active().column,
            direction,
        ),
    }
}
