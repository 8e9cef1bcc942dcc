//! Capacity heuristic for the line layout cache.

const MIN_HEADROOM: usize = 128;
const MAX_HEADROOM: usize = 4_096;
const ALIGNMENT: usize = 64;

/// Capacity that holds the current window plus headroom for scrolling.
///
/// The window is the larger of the visible and overscan line counts. The
/// headroom is `window * headroom_ratio` rounded half away from zero and
/// clamped to `128..=4096`. The sum is aligned up to 64 lines, raised to
/// the next power of two and clamped to `minimum..=maximum`. An empty
/// window yields `minimum`; a non-finite ratio counts as zero.
pub fn calculate_capacity(
    visible_line_count: usize,
    overscan_line_count: usize,
    headroom_ratio: f64,
    minimum: usize,
    maximum: usize,
) -> usize {
    let window = visible_line_count.max(overscan_line_count);
    if window == 0 {
        return minimum;
    }
    let ratio = if headroom_ratio.is_finite() {
        headroom_ratio.max(0.0)
    } else {
        0.0
    };
    let headroom = ((window as f64) * ratio).round() as usize;
    let headroom = headroom.clamp(MIN_HEADROOM, MAX_HEADROOM);

    let target = window
        .checked_add(headroom)
        .and_then(|desired| desired.checked_next_multiple_of(ALIGNMENT))
        .and_then(usize::checked_next_power_of_two)
        .unwrap_or(maximum);
    target.max(minimum).min(maximum)
}
