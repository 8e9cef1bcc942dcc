//! Bounded cache of measured line layouts with strict LRU eviction.
//!
//! Entries live in a slot vector threaded into a doubly-linked recency list
//! (most recent at the head). A hash map from line index to slot makes
//! lookup, touch and removal O(1). Freed slots are recycled through a free
//! list. The whole structure sits behind one mutex.

use ahash::AHashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace};

use crate::cache_sizing::calculate_capacity;

pub const DEFAULT_CACHE_CAPACITY: usize = 512;
pub const DEFAULT_MAXIMUM_CAPACITY: usize = 16_384;

const NIL: usize = usize::MAX;

/// Measured geometry of one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineLayoutInfo {
    pub line_index: usize,
    pub width: f64,
    pub height: f64,
    pub baseline: f64,
}

impl LineLayoutInfo {
    pub fn new(line_index: usize, width: f64, height: f64, baseline: f64) -> Self {
        Self {
            line_index,
            width,
            height,
            baseline,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CacheError {
    #[error("invalid cache configuration: {0}")]
    InvalidConfiguration(String),
}

struct Slot {
    info: LineLayoutInfo,
    prev: usize,
    next: usize,
}

struct Lru {
    index: AHashMap<usize, usize>,
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    capacity: usize,
    minimum: usize,
    maximum: usize,
}

impl Lru {
    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.slots[slot].prev, self.slots[slot].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next].prev = prev;
        }
    }

    fn push_front(&mut self, slot: usize) {
        self.slots[slot].prev = NIL;
        self.slots[slot].next = self.head;
        if self.head == NIL {
            self.tail = slot;
        } else {
            self.slots[self.head].prev = slot;
        }
        self.head = slot;
    }

    fn touch(&mut self, slot: usize) {
        if self.head != slot {
            self.unlink(slot);
            self.push_front(slot);
        }
    }

    fn remove(&mut self, line: usize) -> bool {
        let Some(slot) = self.index.remove(&line) else {
            return false;
        };
        self.unlink(slot);
        self.free.push(slot);
        true
    }

    fn insert(&mut self, info: LineLayoutInfo) {
        if let Some(&slot) = self.index.get(&info.line_index) {
            self.slots[slot].info = info;
            self.touch(slot);
            return;
        }
        let fresh = Slot {
            info,
            prev: NIL,
            next: NIL,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = fresh;
                slot
            }
            None => {
                self.slots.push(fresh);
                self.slots.len() - 1
            }
        };
        self.index.insert(info.line_index, slot);
        self.push_front(slot);
        self.evict_over_capacity();
    }

    fn evict_over_capacity(&mut self) -> usize {
        let mut evicted = 0;
        while self.index.len() > self.capacity && self.tail != NIL {
            let line = self.slots[self.tail].info.line_index;
            self.remove(line);
            evicted += 1;
        }
        evicted
    }

    fn resize(&mut self, capacity: usize) {
        if capacity == self.capacity {
            return;
        }
        let previous = std::mem::replace(&mut self.capacity, capacity);
        let evicted = self.evict_over_capacity();
        debug!(target: "render.cache", previous, capacity, evicted, "resize");
    }

    fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }
}

/// Line index to [`LineLayoutInfo`], bounded by a capacity that can follow
/// the viewport via [`VirtualizedLineCache::adjust_capacity`].
pub struct VirtualizedLineCache {
    inner: Mutex<Lru>,
}

impl Default for VirtualizedLineCache {
    fn default() -> Self {
        Self::build(DEFAULT_CACHE_CAPACITY)
    }
}

impl VirtualizedLineCache {
    /// `capacity` also becomes the minimum bound; the maximum is the larger
    /// of `capacity` and [`DEFAULT_MAXIMUM_CAPACITY`].
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::InvalidConfiguration(
                "cache capacity must be positive".into(),
            ));
        }
        Ok(Self::build(capacity))
    }

    fn build(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Lru {
                index: AHashMap::with_capacity(capacity),
                slots: Vec::with_capacity(capacity),
                free: Vec::new(),
                head: NIL,
                tail: NIL,
                capacity,
                minimum: capacity,
                maximum: capacity.max(DEFAULT_MAXIMUM_CAPACITY),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// `(minimum, maximum)` capacity bounds.
    pub fn bounds(&self) -> (usize, usize) {
        let lru = self.inner.lock();
        (lru.minimum, lru.maximum)
    }

    /// Replace the capacity bounds and clamp the current capacity into them.
    pub fn configure_bounds(&self, minimum: usize, maximum: usize) -> Result<(), CacheError> {
        if minimum == 0 {
            return Err(CacheError::InvalidConfiguration(
                "minimum cache capacity must be positive".into(),
            ));
        }
        if maximum < minimum {
            return Err(CacheError::InvalidConfiguration(format!(
                "maximum cache capacity {maximum} is below minimum {minimum}"
            )));
        }
        let mut lru = self.inner.lock();
        lru.minimum = minimum;
        lru.maximum = maximum;
        let clamped = lru.capacity.clamp(minimum, maximum);
        lru.resize(clamped);
        Ok(())
    }

    /// Resize for a viewport window; returns the new capacity. Shrinking
    /// evicts least recently used entries.
    pub fn adjust_capacity(
        &self,
        visible_line_count: usize,
        overscan_line_count: usize,
        headroom_ratio: f64,
    ) -> Result<usize, CacheError> {
        if headroom_ratio.is_nan() || headroom_ratio < 0.0 {
            return Err(CacheError::InvalidConfiguration(format!(
                "headroom ratio must be a non-negative number, got {headroom_ratio}"
            )));
        }
        let mut lru = self.inner.lock();
        let target = calculate_capacity(
            visible_line_count,
            overscan_line_count,
            headroom_ratio,
            lru.minimum,
            lru.maximum,
        );
        lru.resize(target);
        Ok(target)
    }

    /// Look up `line`, marking it most recently used.
    pub fn get(&self, line: usize) -> Option<LineLayoutInfo> {
        let mut lru = self.inner.lock();
        let slot = *lru.index.get(&line)?;
        lru.touch(slot);
        Some(lru.slots[slot].info)
    }

    /// Membership test that leaves recency untouched.
    pub fn contains(&self, line: usize) -> bool {
        self.inner.lock().index.contains_key(&line)
    }

    /// Insert or replace the entry for `info.line_index`.
    pub fn insert(&self, info: LineLayoutInfo) {
        let mut lru = self.inner.lock();
        lru.insert(info);
        trace!(target: "render.cache", line = info.line_index, len = lru.index.len(), "insert");
    }

    pub fn remove(&self, line: usize) -> bool {
        self.inner.lock().remove(line)
    }

    /// Drop every entry outside the inclusive range `start..=end`. Reversed
    /// bounds are swapped.
    pub fn trim_outside_range(&self, start: usize, end: usize) {
        let (start, end) = if end < start { (end, start) } else { (start, end) };
        let mut lru = self.inner.lock();
        let outside: Vec<usize> = lru
            .index
            .keys()
            .copied()
            .filter(|line| !(start..=end).contains(line))
            .collect();
        for line in &outside {
            lru.remove(*line);
        }
        if !outside.is_empty() {
            debug!(target: "render.cache", start, end, trimmed = outside.len(), "trim");
        }
    }

    /// Cached line indices, most recently used first.
    pub fn line_indices(&self) -> Vec<usize> {
        let lru = self.inner.lock();
        let mut lines = Vec::with_capacity(lru.index.len());
        let mut cursor = lru.head;
        while cursor != NIL {
            lines.push(lru.slots[cursor].info.line_index);
            cursor = lru.slots[cursor].next;
        }
        lines
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl std::fmt::Debug for VirtualizedLineCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lru = self.inner.lock();
        f.debug_struct("VirtualizedLineCache")
            .field("len", &lru.index.len())
            .field("capacity", &lru.capacity)
            .field("minimum", &lru.minimum)
            .field("maximum", &lru.maximum)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn info(line: usize) -> LineLayoutInfo {
        LineLayoutInfo::new(line, 100.0 + line as f64, 20.0, 16.0)
    }

    fn filled(capacity: usize, lines: std::ops::Range<usize>) -> VirtualizedLineCache {
        let cache = VirtualizedLineCache::new(capacity).unwrap();
        for line in lines {
            cache.insert(info(line));
        }
        cache
    }

    #[test]
    fn defaults() {
        let cache = VirtualizedLineCache::default();
        assert_eq!(cache.capacity(), 512);
        assert_eq!(cache.bounds(), (512, 16_384));
        assert!(cache.is_empty());
        assert!(VirtualizedLineCache::new(0).is_err());
        assert_eq!(VirtualizedLineCache::new(20_000).unwrap().bounds(), (20_000, 20_000));
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = filled(3, 0..3);
        assert_eq!(cache.get(0), Some(info(0)));
        cache.insert(info(3));
        assert!(!cache.contains(1));
        assert_eq!(cache.line_indices(), vec![3, 0, 2]);
        cache.insert(info(4));
        assert_eq!(cache.line_indices(), vec![4, 3, 0]);
    }

    #[test]
    fn replacing_an_entry_refreshes_recency() {
        let cache = filled(2, 0..2);
        let updated = LineLayoutInfo::new(0, 1.0, 2.0, 3.0);
        cache.insert(updated);
        cache.insert(info(5));
        assert_eq!(cache.get(0), Some(updated));
        assert!(!cache.contains(1));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn contains_does_not_touch() {
        let cache = filled(2, 0..2);
        assert!(cache.contains(0));
        cache.insert(info(2));
        assert!(!cache.contains(0));
    }

    #[test]
    fn adjust_capacity_grows_then_shrinks_to_minimum() {
        let cache = VirtualizedLineCache::default();
        assert_eq!(cache.adjust_capacity(120, 1200, 0.75).unwrap(), 4096);
        assert_eq!(cache.capacity(), 4096);
        for line in 0..1000 {
            cache.insert(info(line));
        }
        cache.get(3);
        assert_eq!(cache.adjust_capacity(50, 80, 0.75).unwrap(), 512);
        assert_eq!(cache.len(), 512);
        assert!(cache.contains(3));
        assert!(cache.contains(999));
        assert!(!cache.contains(4));
        assert!(cache.adjust_capacity(1, 1, -0.5).is_err());
        assert!(cache.adjust_capacity(1, 1, f64::NAN).is_err());
    }

    #[test]
    fn configure_bounds_validates_and_clamps() {
        let cache = filled(8, 0..8);
        assert!(cache.configure_bounds(0, 10).is_err());
        assert!(cache.configure_bounds(10, 5).is_err());
        cache.configure_bounds(2, 4).unwrap();
        assert_eq!(cache.capacity(), 4);
        assert_eq!(cache.line_indices(), vec![7, 6, 5, 4]);
        cache.configure_bounds(16, 32).unwrap();
        assert_eq!(cache.capacity(), 16);
    }

    #[test]
    fn trim_keeps_inclusive_range_and_swaps_bounds() {
        let cache = filled(16, 0..10);
        cache.trim_outside_range(6, 3);
        let mut lines = cache.line_indices();
        lines.sort_unstable();
        assert_eq!(lines, vec![3, 4, 5, 6]);
        cache.insert(info(11));
        assert_eq!(cache.len(), 5);
    }

    #[test]
    fn slots_are_recycled() {
        let cache = filled(4, 0..4);
        assert!(cache.remove(1));
        assert!(!cache.remove(1));
        cache.insert(info(9));
        assert_eq!(cache.inner.lock().slots.len(), 4);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(9), None);
    }
}
