//! Visible line window computation for a virtualized view.
//!
//! Line heights come from a host-supplied [`LineMetricsProvider`]. The
//! manager keeps a sparse map of line index to top offset, filled lazily by
//! walking from the nearest cached anchor in either direction, so a single
//! line's height change only costs the walk between it and the next anchor
//! once [`ViewportManager::invalidate_from_line`] has dropped the stale
//! offsets.
//!
//! Offsets are in device-independent pixels. Line ranges in a
//! [`ViewportComputationResult`] are inclusive.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

/// Line heights of the hosted view.
pub trait LineMetricsProvider {
    fn line_count(&self) -> usize;
    /// Height of `line`; only called for `line < line_count()`.
    fn line_height(&self, line: usize) -> f64;
}

impl<T: LineMetricsProvider + ?Sized> LineMetricsProvider for &T {
    fn line_count(&self) -> usize {
        (**self).line_count()
    }

    fn line_height(&self, line: usize) -> f64 {
        (**self).line_height(line)
    }
}

impl<T: LineMetricsProvider + ?Sized> LineMetricsProvider for Arc<T> {
    fn line_count(&self) -> usize {
        (**self).line_count()
    }

    fn line_height(&self, line: usize) -> f64 {
        (**self).line_height(line)
    }
}

/// Scroll input for [`ViewportManager::update`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportState {
    pub scroll_offset: f64,
    pub viewport_height: f64,
    pub overscan_margin: f64,
}

impl ViewportState {
    /// Negative and NaN inputs become zero.
    pub fn new(scroll_offset: f64, viewport_height: f64, overscan_margin: f64) -> Self {
        Self {
            scroll_offset: non_negative(scroll_offset),
            viewport_height: non_negative(viewport_height),
            overscan_margin: non_negative(overscan_margin),
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value > 0.0 { value } else { 0.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportComputationResult {
    /// Scroll offset after clamping to the scrollable range.
    pub scroll_offset: f64,
    pub viewport_height: f64,
    pub total_height: f64,
    pub first_visible_line: usize,
    /// Distance from the top of `first_visible_line` to `scroll_offset`.
    pub first_line_offset: f64,
    pub last_visible_line: usize,
    pub last_line_bottom: f64,
    pub overscan_start_line: usize,
    pub overscan_end_line: usize,
    pub overscan_start_offset: f64,
    pub overscan_end_offset: f64,
}

impl ViewportComputationResult {
    fn degenerate(viewport_height: f64) -> Self {
        Self {
            viewport_height,
            ..Self::default()
        }
    }

    fn is_degenerate(&self) -> bool {
        self.viewport_height <= 0.0 || self.total_height <= 0.0
    }

    pub fn visible_line_count(&self) -> usize {
        if self.is_degenerate() || self.last_visible_line < self.first_visible_line {
            return 0;
        }
        self.last_visible_line - self.first_visible_line + 1
    }

    pub fn overscan_line_count(&self) -> usize {
        if self.is_degenerate() || self.overscan_end_line < self.overscan_start_line {
            return 0;
        }
        self.overscan_end_line - self.overscan_start_line + 1
    }
}

pub struct ViewportManager<M> {
    metrics: M,
    /// Line index -> top offset. Always holds `0 -> 0.0`.
    tops: BTreeMap<usize, f64>,
    total_height: Option<f64>,
}

impl<M: LineMetricsProvider> ViewportManager<M> {
    pub fn new(metrics: M) -> Self {
        Self {
            metrics,
            tops: BTreeMap::from([(0, 0.0)]),
            total_height: None,
        }
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    /// Callers that change heights through this must invalidate the
    /// affected lines afterwards.
    pub fn metrics_mut(&mut self) -> &mut M {
        &mut self.metrics
    }

    pub fn update(&mut self, state: ViewportState) -> ViewportComputationResult {
        let state = ViewportState::new(
            state.scroll_offset,
            state.viewport_height,
            state.overscan_margin,
        );
        let line_count = self.metrics.line_count();
        if line_count == 0 || state.viewport_height <= 0.0 {
            return ViewportComputationResult::degenerate(state.viewport_height);
        }

        let total_height = self.total_height();
        let max_offset = (total_height - state.viewport_height).max(0.0);
        let scroll_offset = state.scroll_offset.min(max_offset);

        let first_visible_line = self.line_at_offset(scroll_offset, line_count);
        let first_top = self.ensure_line_top(first_visible_line);
        let viewport_bottom = (scroll_offset + state.viewport_height).min(total_height);

        let mut last_visible_line = first_visible_line;
        let mut last_line_bottom = first_top;
        loop {
            last_line_bottom += self.metrics.line_height(last_visible_line);
            if last_line_bottom >= viewport_bottom || last_visible_line + 1 == line_count {
                break;
            }
            last_visible_line += 1;
        }

        let overscan_start_offset = (scroll_offset - state.overscan_margin).max(0.0);
        let overscan_end_offset = (viewport_bottom + state.overscan_margin).min(total_height);
        let overscan_start_line = self.line_at_offset(overscan_start_offset, line_count);
        let overscan_end_line = self
            .line_before_offset(overscan_end_offset, line_count)
            .max(overscan_start_line);

        let result = ViewportComputationResult {
            scroll_offset,
            viewport_height: state.viewport_height,
            total_height,
            first_visible_line,
            first_line_offset: scroll_offset - first_top,
            last_visible_line,
            last_line_bottom,
            overscan_start_line,
            overscan_end_line,
            overscan_start_offset,
            overscan_end_offset,
        };
        trace!(
            target: "render.viewport",
            scroll = result.scroll_offset,
            first = result.first_visible_line,
            last = result.last_visible_line,
            overscan_start = result.overscan_start_line,
            overscan_end = result.overscan_end_line,
            anchors = self.tops.len(),
            "update"
        );
        result
    }

    pub fn total_height(&mut self) -> f64 {
        if let Some(total) = self.total_height {
            return total;
        }
        let line_count = self.metrics.line_count();
        let total = if line_count == 0 {
            0.0
        } else {
            self.ensure_line_top(line_count - 1) + self.metrics.line_height(line_count - 1)
        };
        self.total_height = Some(total);
        total
    }

    /// Top offset of `line`; lines at or past the end report the total height.
    pub fn line_top(&mut self, line: usize) -> f64 {
        if line >= self.metrics.line_count() {
            return self.total_height();
        }
        self.ensure_line_top(line)
    }

    pub fn line_bottom(&mut self, line: usize) -> f64 {
        if line >= self.metrics.line_count() {
            return self.total_height();
        }
        self.ensure_line_top(line) + self.metrics.line_height(line)
    }

    /// Drop cached offsets for `line` and every line after it.
    pub fn invalidate_from_line(&mut self, line: usize) {
        if line == 0 {
            self.reset();
            return;
        }
        let dropped = self.tops.split_off(&line).len();
        self.total_height = None;
        trace!(target: "render.viewport", line, dropped, "invalidate");
    }

    pub fn reset(&mut self) {
        self.tops.clear();
        self.tops.insert(0, 0.0);
        self.total_height = None;
    }

    /// Last line whose top is at or before `offset`.
    fn line_at_offset(&mut self, offset: f64, line_count: usize) -> usize {
        let (mut lo, mut hi) = (1, line_count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.ensure_line_top(mid) <= offset {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo - 1
    }

    /// Last line whose top is strictly before `offset`, or line 0.
    fn line_before_offset(&mut self, offset: f64, line_count: usize) -> usize {
        let (mut lo, mut hi) = (1, line_count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.ensure_line_top(mid) < offset {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo - 1
    }

    fn ensure_line_top(&mut self, line: usize) -> f64 {
        if line == 0 {
            return 0.0;
        }
        if let Some(&top) = self.tops.get(&line) {
            return top;
        }
        let lower = self.tops.range(..line).next_back().map(|(&l, &t)| (l, t));
        let upper = self.tops.range(line + 1..).next().map(|(&l, &t)| (l, t));
        if let Some((anchor, anchor_top)) = upper
            && lower.is_none_or(|(l, _)| anchor - line < line - l)
        {
            let mut top = anchor_top;
            for i in (line..anchor).rev() {
                top -= self.metrics.line_height(i);
                self.tops.insert(i, top);
            }
            return top;
        }
        let (anchor, mut top) = lower.unwrap_or((0, 0.0));
        for i in anchor..line {
            top += self.metrics.line_height(i);
            self.tops.insert(i + 1, top);
        }
        top
    }
}

impl<M> std::fmt::Debug for ViewportManager<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportManager")
            .field("anchors", &self.tops.len())
            .field("total_height", &self.total_height)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    struct Heights {
        heights: Vec<f64>,
        calls: Cell<usize>,
    }

    impl Heights {
        fn uniform(count: usize, height: f64) -> Self {
            Self {
                heights: vec![height; count],
                calls: Cell::new(0),
            }
        }
    }

    impl LineMetricsProvider for Heights {
        fn line_count(&self) -> usize {
            self.heights.len()
        }

        fn line_height(&self, line: usize) -> f64 {
            self.calls.set(self.calls.get() + 1);
            self.heights[line]
        }
    }

    #[test]
    fn ten_uniform_lines_show_three() {
        let mut vm = ViewportManager::new(Heights::uniform(10, 20.0));
        let r = vm.update(ViewportState::new(0.0, 60.0, 0.0));
        assert_eq!(r.first_visible_line, 0);
        assert_eq!(r.last_visible_line, 2);
        assert_eq!(r.last_line_bottom, 60.0);
        assert_eq!(r.visible_line_count(), 3);
        assert_eq!(r.total_height, 200.0);
        assert_eq!((r.overscan_start_line, r.overscan_end_line), (0, 2));
    }

    #[test]
    fn partial_first_line_and_overscan() {
        let mut vm = ViewportManager::new(Heights::uniform(10, 20.0));
        let r = vm.update(ViewportState::new(50.0, 60.0, 30.0));
        assert_eq!(r.first_visible_line, 2);
        assert_eq!(r.first_line_offset, 10.0);
        assert_eq!(r.last_visible_line, 5);
        assert_eq!(r.last_line_bottom, 120.0);
        assert_eq!((r.overscan_start_offset, r.overscan_end_offset), (20.0, 140.0));
        assert_eq!((r.overscan_start_line, r.overscan_end_line), (1, 6));
        assert_eq!(r.overscan_line_count(), 6);
    }

    #[test]
    fn scroll_offset_is_clamped() {
        let mut vm = ViewportManager::new(Heights::uniform(10, 20.0));
        let r = vm.update(ViewportState::new(10_000.0, 60.0, 0.0));
        assert_eq!(r.scroll_offset, 140.0);
        assert_eq!((r.first_visible_line, r.last_visible_line), (7, 9));
        let r = vm.update(ViewportState {
            scroll_offset: -5.0,
            viewport_height: 60.0,
            overscan_margin: -1.0,
        });
        assert_eq!(r.scroll_offset, 0.0);
        assert_eq!(r.first_visible_line, 0);
    }

    #[test]
    fn tall_viewport_stops_at_last_line() {
        let mut vm = ViewportManager::new(Heights::uniform(3, 20.0));
        let r = vm.update(ViewportState::new(0.0, 500.0, 100.0));
        assert_eq!((r.first_visible_line, r.last_visible_line), (0, 2));
        assert_eq!(r.last_line_bottom, 60.0);
        assert_eq!(r.overscan_end_line, 2);
    }

    #[test]
    fn degenerate_inputs_yield_zero_result() {
        let mut empty = ViewportManager::new(Heights::uniform(0, 20.0));
        let r = empty.update(ViewportState::new(10.0, 60.0, 5.0));
        assert_eq!(r, ViewportComputationResult::degenerate(60.0));
        assert_eq!(r.visible_line_count(), 0);

        let mut vm = ViewportManager::new(Heights::uniform(5, 20.0));
        let r = vm.update(ViewportState::new(10.0, 0.0, 5.0));
        assert_eq!(r.total_height, 0.0);
        assert_eq!(r.overscan_line_count(), 0);
    }

    #[test]
    fn variable_heights_and_line_bounds() {
        let mut vm = ViewportManager::new(Heights {
            heights: vec![10.0, 30.0, 5.0, 15.0],
            calls: Cell::new(0),
        });
        assert_eq!(vm.line_top(2), 40.0);
        assert_eq!(vm.line_bottom(2), 45.0);
        assert_eq!(vm.line_top(4), 60.0);
        assert_eq!(vm.line_bottom(99), 60.0);
        let r = vm.update(ViewportState::new(12.0, 30.0, 0.0));
        assert_eq!(r.first_visible_line, 1);
        assert_eq!(r.last_visible_line, 2);
    }

    #[test]
    fn invalidation_recomputes_only_from_anchor() {
        let mut vm = ViewportManager::new(Heights::uniform(100, 10.0));
        assert_eq!(vm.total_height(), 1000.0);
        vm.metrics_mut().heights[50] = 30.0;
        vm.invalidate_from_line(51);
        vm.metrics().calls.set(0);
        assert_eq!(vm.line_top(60), 620.0);
        assert_eq!(vm.metrics().calls.get(), 10, "walk starts at the line-50 anchor");
        assert_eq!(vm.total_height(), 1020.0);
    }

    #[test]
    fn backward_walk_from_closer_upper_anchor() {
        let mut vm = ViewportManager::new(Heights::uniform(100, 10.0));
        assert_eq!(vm.line_top(90), 900.0);
        vm.invalidate_from_line(1);
        assert_eq!(vm.line_top(1), 10.0);
        vm.tops.insert(90, 900.0);
        vm.metrics().calls.set(0);
        assert_eq!(vm.line_top(88), 880.0);
        assert_eq!(vm.metrics().calls.get(), 2);
    }

    #[test]
    fn reset_clears_cache() {
        let mut vm = ViewportManager::new(Heights::uniform(10, 20.0));
        vm.update(ViewportState::new(100.0, 60.0, 40.0));
        assert!(vm.tops.len() > 1);
        vm.reset();
        assert_eq!(vm.tops.len(), 1);
        assert_eq!(vm.total_height, None);
    }
}
