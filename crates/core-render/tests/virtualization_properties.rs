//! Property tests for viewport computation and the LRU line cache.

use core_render::{
    LineLayoutInfo, LineMetricsProvider, ViewportManager, ViewportState, VirtualizedLineCache,
};
use proptest::prelude::*;

#[derive(Clone, Debug)]
struct Heights(Vec<f64>);

impl LineMetricsProvider for Heights {
    fn line_count(&self) -> usize {
        self.0.len()
    }

    fn line_height(&self, line: usize) -> f64 {
        self.0[line]
    }
}

// Whole-pixel heights keep the offset sums exact.
fn heights() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((1u32..40).prop_map(f64::from), 1..60)
}

proptest! {
    #[test]
    fn visible_window_covers_viewport(
        hs in heights(),
        scroll in 0u32..3000,
        height in 1u32..400,
        margin in 0u32..200,
    ) {
        let total: f64 = hs.iter().sum();
        let mut vm = ViewportManager::new(Heights(hs.clone()));
        let r = vm.update(ViewportState::new(scroll.into(), height.into(), margin.into()));

        prop_assert_eq!(r.total_height, total);
        prop_assert!(r.scroll_offset <= (total - f64::from(height)).max(0.0));
        prop_assert!(r.first_visible_line <= r.last_visible_line);
        prop_assert!(r.last_visible_line < hs.len());

        let first_top = vm.line_top(r.first_visible_line);
        prop_assert!(first_top <= r.scroll_offset);
        prop_assert!(
            r.scroll_offset < vm.line_bottom(r.first_visible_line) || r.scroll_offset == total
        );
        prop_assert_eq!(r.first_line_offset, r.scroll_offset - first_top);

        let viewport_bottom = (r.scroll_offset + f64::from(height)).min(total);
        prop_assert!(r.last_line_bottom >= viewport_bottom);
        prop_assert_eq!(r.last_line_bottom, vm.line_bottom(r.last_visible_line));

        prop_assert!(r.overscan_start_line <= r.first_visible_line);
        prop_assert!(r.overscan_end_line >= r.last_visible_line);
        prop_assert!(r.overscan_end_line < hs.len());
    }

    #[test]
    fn invalidation_matches_fresh_layout(
        hs in heights(),
        edit in any::<prop::sample::Index>(),
        new_height in 1u32..80,
        probe in any::<prop::sample::Index>(),
    ) {
        let mut vm = ViewportManager::new(Heights(hs.clone()));
        let _ = vm.total_height();

        let line = edit.index(hs.len());
        vm.metrics_mut().0[line] = f64::from(new_height);
        vm.invalidate_from_line(line + 1);

        let mut fresh = ViewportManager::new(vm.metrics().clone());
        let probe = probe.index(hs.len());
        prop_assert_eq!(vm.line_top(probe), fresh.line_top(probe));
        prop_assert_eq!(vm.total_height(), fresh.total_height());
    }

    #[test]
    fn cache_matches_lru_model(
        capacity in 1usize..16,
        ops in prop::collection::vec((any::<bool>(), 0usize..24), 0..200),
    ) {
        let cache = VirtualizedLineCache::new(capacity).unwrap();
        // Most recent first.
        let mut model: Vec<usize> = Vec::new();
        for (is_insert, line) in ops {
            if is_insert {
                cache.insert(LineLayoutInfo::new(line, 1.0, 1.0, 1.0));
                model.retain(|l| *l != line);
                model.insert(0, line);
                model.truncate(capacity);
            } else {
                let hit = cache.get(line).is_some();
                prop_assert_eq!(hit, model.contains(&line));
                if hit {
                    model.retain(|l| *l != line);
                    model.insert(0, line);
                }
            }
            prop_assert!(cache.len() <= capacity);
        }
        prop_assert_eq!(cache.line_indices(), model);
    }
}
