//! One open document wired to carets, viewport and background layout.
//!
//! Gestures flow through the [`GestureDispatcher`] into a command queue; the
//! session drains it inside a single change transaction, so every gesture
//! publishes at most one change batch. The bus subscription keeps the
//! monospace line table current and records the first line whose geometry
//! changed; the next [`EditorSession::scroll_to`] drops viewport offsets and
//! cached layouts from that line on before requesting layout.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use core_config::Config;
use core_events::{EditorGesture, GestureDispatcher};
use core_model::{Document, DocumentChangeSet, DocumentLineProvider, EditorKernel, Subscription};
use core_render::{
    LineLayoutScheduler, LineLayoutSchedulerOptions, SchedulerError, ViewportComputationResult,
    ViewportManager, ViewportState,
};
use core_state::{CaretSelectionManager, CaretSelectionManagerOptions};
use core_text::{LogicalDirection, SelectionKind, TextLineProvider, TextPosition, TextSelection};
use tracing::{debug, info};
use url::Url;

use crate::commands::{CommandQueue, EditCommand, GestureTranslator, Motion};
use crate::layout::MonospaceLayout;
use crate::text_index::LineIndex;

const CLEAN: usize = usize::MAX;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub char_width: f64,
    pub line_height: f64,
    pub viewport_height: f64,
    pub overscan_margin: f64,
    pub caret_options: CaretSelectionManagerOptions,
    pub layout_options: LineLayoutSchedulerOptions,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 18.0,
            viewport_height: 600.0,
            overscan_margin: 0.0,
            caret_options: CaretSelectionManagerOptions::default(),
            layout_options: LineLayoutSchedulerOptions::default(),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config, viewport_height: f64) -> Result<Self> {
        Ok(Self {
            viewport_height,
            overscan_margin: config.overscan_margin(),
            caret_options: config.caret_options().context("caret options")?,
            layout_options: config.layout_options().context("layout options")?,
            ..Self::default()
        })
    }
}

/// Point-in-time description of a session, printed by the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub version: u64,
    pub length: usize,
    pub line_count: usize,
    pub caret_count: usize,
    pub primary: Option<TextPosition>,
    pub visible_lines: Option<(usize, usize)>,
    pub cached_lines: usize,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{} chars={} lines={} carets={}",
            self.version, self.length, self.line_count, self.caret_count
        )?;
        if let Some(primary) = self.primary {
            write!(f, " primary={primary}")?;
        }
        if let Some((first, last)) = self.visible_lines {
            write!(f, " visible={first}..={last}")?;
        }
        write!(f, " cached={}", self.cached_lines)
    }
}

pub struct EditorSession {
    document: Document,
    carets: CaretSelectionManager,
    layout: Arc<MonospaceLayout>,
    viewport: ViewportManager<Arc<MonospaceLayout>>,
    scheduler: LineLayoutScheduler<MonospaceLayout>,
    dispatcher: GestureDispatcher,
    commands: CommandQueue,
    dirty_from: Arc<AtomicUsize>,
    settings: SessionSettings,
    last_viewport: Option<ViewportComputationResult>,
    _changes: Subscription,
}

impl EditorSession {
    /// Must be called inside a tokio runtime; layout work is spawned on it.
    pub fn open(
        kernel: &EditorKernel,
        text: &str,
        uri: Option<Url>,
        settings: SessionSettings,
    ) -> Result<Self> {
        let document = kernel.create_document(text, uri, None);
        let layout = Arc::new(MonospaceLayout::new(
            text,
            settings.char_width,
            settings.line_height,
        ));
        let scheduler =
            LineLayoutScheduler::new(Arc::clone(&layout), None, settings.layout_options.clone())
                .context("starting layout scheduler")?;

        let dirty_from = Arc::new(AtomicUsize::new(CLEAN));
        let changes = {
            let layout = Arc::clone(&layout);
            let dirty_from = Arc::clone(&dirty_from);
            document
                .bus()
                .subscribe(Some(document.id()), move |set: &DocumentChangeSet| {
                    let lines = set.snapshot.buffer_snapshot().line_lengths();
                    if let Some(line) = layout.replace_lines(lines) {
                        dirty_from.fetch_min(line, Ordering::SeqCst);
                    }
                })
        };

        let carets = CaretSelectionManager::new(settings.caret_options);
        carets.set_single_caret(TextPosition::origin(), LogicalDirection::Forward);

        let commands = CommandQueue::default();
        let dispatcher = GestureDispatcher::new();
        dispatcher.subscribe(Arc::new(GestureTranslator::new(
            Arc::clone(&commands),
            settings.char_width,
            settings.line_height,
        )));

        info!(
            target: "runtime",
            document = %document.id(),
            chars = document.len(),
            "session_open"
        );
        Ok(Self {
            document,
            carets,
            viewport: ViewportManager::new(Arc::clone(&layout)),
            layout,
            scheduler,
            dispatcher,
            commands,
            dirty_from,
            settings,
            last_viewport: None,
            _changes: changes,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn carets(&self) -> &CaretSelectionManager {
        &self.carets
    }

    pub fn dispatcher(&self) -> &GestureDispatcher {
        &self.dispatcher
    }

    pub fn scheduler(&self) -> &LineLayoutScheduler<MonospaceLayout> {
        &self.scheduler
    }

    pub fn layout(&self) -> &Arc<MonospaceLayout> {
        &self.layout
    }

    /// Dispatch `gesture` and apply the commands it produced.
    pub fn handle_gesture(&mut self, gesture: &EditorGesture) -> Result<()> {
        self.dispatcher.dispatch(gesture);
        self.apply_pending()
    }

    fn apply_pending(&mut self) -> Result<()> {
        let mut scope = self.document.begin_change_transaction();
        loop {
            let Some(command) = self.commands.lock().pop_front() else {
                break;
            };
            debug!(target: "runtime.input", ?command, "apply");
            self.apply(command)?;
        }
        scope.complete();
        Ok(())
    }

    fn apply(&mut self, command: EditCommand) -> Result<()> {
        match command {
            EditCommand::InsertText(text) => self.replace_selections(&text, false),
            EditCommand::DeleteBackward => self.replace_selections("", true),
            EditCommand::Undo => {
                if self.document.undo()? {
                    self.clamp_carets();
                }
                Ok(())
            }
            EditCommand::Redo => {
                if self.document.redo()? {
                    self.clamp_carets();
                }
                Ok(())
            }
            EditCommand::Move { motion, extend } => {
                self.move_carets(motion, extend);
                Ok(())
            }
            EditCommand::PlaceCaret { position, add } => {
                let index = LineIndex::new(&self.document.text());
                let caret = TextSelection::caret(index.clamp(position), LogicalDirection::Forward);
                if add {
                    self.carets.add_caret(caret, true);
                } else {
                    self.carets.set_carets(vec![caret], 0);
                }
                Ok(())
            }
        }
    }

    /// Replace every caret's selection with `text`. With `backspace`, empty
    /// selections first grow one char (or one line break) to the left.
    fn replace_selections(&mut self, text: &str, backspace: bool) -> Result<()> {
        let index = LineIndex::new(&self.document.text());
        let state = self.carets.capture_state();
        let primary_offset = state
            .iter()
            .find(|c| c.is_primary)
            .map(|c| selection_range(&index, &c.selection, backspace).0);

        let mut ranges: Vec<(usize, usize)> = state
            .iter()
            .map(|c| selection_range(&index, &c.selection, backspace))
            .collect();
        ranges.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }

        for &(start, end) in merged.iter().rev() {
            if end > start {
                self.document.delete(start, end - start)?;
            }
            if !text.is_empty() {
                self.document.insert(start, text)?;
            }
        }

        let inserted = text.chars().count() as isize;
        let mut shift = 0isize;
        let mut offsets = Vec::with_capacity(merged.len());
        let mut primary = 0;
        for (i, &(start, end)) in merged.iter().enumerate() {
            if primary_offset.is_some_and(|p| (start..=end).contains(&p)) {
                primary = i;
            }
            offsets.push((start as isize + shift + inserted) as usize);
            shift += inserted - (end - start) as isize;
        }

        let after = LineIndex::new(&self.document.text());
        let selections = offsets
            .into_iter()
            .map(|o| TextSelection::caret(after.position_of(o), LogicalDirection::Forward))
            .collect();
        self.carets.set_carets(selections, primary);
        Ok(())
    }

    fn move_carets(&self, motion: Motion, extend: bool) {
        let index = LineIndex::new(&self.document.text());
        let direction = match motion {
            Motion::Left | Motion::Up | Motion::LineStart => LogicalDirection::Backward,
            Motion::Right | Motion::Down | Motion::LineEnd => LogicalDirection::Forward,
        };
        let mut primary = 0;
        let selections = self
            .carets
            .capture_state()
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                if c.is_primary {
                    primary = i;
                }
                let next = step(&index, c.selection.active(), motion);
                if extend {
                    TextSelection::stream(c.selection.anchor(), next, Some(direction))
                } else {
                    TextSelection::caret(next, direction)
                }
            })
            .collect();
        self.carets.set_carets(selections, primary);
    }

    fn clamp_carets(&self) {
        let index = LineIndex::new(&self.document.text());
        let mut primary = 0;
        let selections = self
            .carets
            .capture_state()
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                if c.is_primary {
                    primary = i;
                }
                TextSelection::caret(
                    index.clamp(c.selection.active()),
                    c.selection.active_direction(),
                )
            })
            .collect();
        self.carets.set_carets(selections, primary);
    }

    /// Rectangular selection between two positions, clamped per line.
    pub fn select_column(&self, anchor: TextPosition, active: TextPosition) {
        let lines = DocumentLineProvider::from_snapshot(&self.document.snapshot());
        self.carets.set_column_selection(anchor, active, &lines, None);
    }

    /// Scroll to `offset` and schedule layout for the resulting window.
    pub fn scroll_to(&mut self, offset: f64) -> Result<ViewportComputationResult, SchedulerError> {
        self.document.flush_pending_changes();
        let dirty = self.dirty_from.swap(CLEAN, Ordering::SeqCst);
        if dirty != CLEAN {
            self.viewport.invalidate_from_line(dirty);
            let cache = self.scheduler.cache();
            for line in cache.line_indices().into_iter().filter(|l| *l >= dirty) {
                cache.remove(line);
            }
            debug!(target: "runtime", from_line = dirty, "layout_invalidated");
        }
        let result = self.viewport.update(ViewportState::new(
            offset,
            self.settings.viewport_height,
            self.settings.overscan_margin,
        ));
        self.scheduler.request_layout(&result)?;
        self.last_viewport = Some(result);
        Ok(result)
    }

    pub async fn when_layout_idle(&self) {
        self.scheduler.when_idle().await;
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            version: self.document.version().sequence,
            length: self.document.len(),
            line_count: core_render::LineMetricsProvider::line_count(self.layout.as_ref()),
            caret_count: self.carets.count(),
            primary: self.carets.primary_caret().map(|c| c.position()),
            visible_lines: self
                .last_viewport
                .filter(|v| v.visible_line_count() > 0)
                .map(|v| (v.first_visible_line, v.last_visible_line)),
            cached_lines: self.scheduler.cache().len(),
        }
    }
}

impl fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorSession")
            .field("document", &self.document.id())
            .field("carets", &self.carets.count())
            .field("pending_commands", &self.commands.lock().len())
            .finish()
    }
}

fn selection_range(
    index: &LineIndex,
    selection: &TextSelection,
    backspace: bool,
) -> (usize, usize) {
    match (selection.kind(), selection.column_span()) {
        (SelectionKind::Column, Some(span)) => {
            let line = span.line();
            let start = index.offset_of(TextPosition::new(line, span.start_column()));
            let end = index.offset_of(TextPosition::new(line, span.end_column()));
            (start, end)
        }
        _ if !selection.is_empty() => (
            index.offset_of(selection.start()),
            index.offset_of(selection.end()),
        ),
        _ => {
            let caret = index.clamp(selection.active());
            let offset = index.offset_of(caret);
            if !backspace {
                return (offset, offset);
            }
            if caret.column > 0 {
                (offset - 1, offset)
            } else if caret.line > 0 {
                let prev = caret.line - 1;
                let prev_end = index.offset_of(TextPosition::new(prev, usize::MAX));
                (prev_end, offset)
            } else {
                (offset, offset)
            }
        }
    }
}

fn step(index: &LineIndex, from: TextPosition, motion: Motion) -> TextPosition {
    let p = index.clamp(from);
    let len = |line| index.line_length(line).unwrap_or(0);
    let last_line = index.line_count() - 1;
    match motion {
        Motion::Left if p.column > 0 => TextPosition::new(p.line, p.column - 1),
        Motion::Left if p.line > 0 => TextPosition::new(p.line - 1, len(p.line - 1)),
        Motion::Right if p.column < len(p.line) => TextPosition::new(p.line, p.column + 1),
        Motion::Right if p.line < last_line => TextPosition::new(p.line + 1, 0),
        Motion::Up if p.line > 0 => index.clamp(TextPosition::new(p.line - 1, p.column)),
        Motion::Down if p.line < last_line => index.clamp(TextPosition::new(p.line + 1, p.column)),
        Motion::LineStart => TextPosition::new(p.line, 0),
        Motion::LineEnd => TextPosition::new(p.line, len(p.line)),
        _ => p,
    }
}
