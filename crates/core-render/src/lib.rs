//! Viewport virtualization: which lines are visible, which are measured.
//!
//! The host view supplies line heights through [`LineMetricsProvider`] and
//! line measurements through [`LineLayoutProvider`]. Per scroll update:
//!
//! 1. [`ViewportManager::update`] turns a [`ViewportState`] into the visible
//!    and overscan line windows.
//! 2. [`LineLayoutScheduler::request_layout`] measures whatever part of that
//!    window the [`VirtualizedLineCache`] does not hold yet, cancelling the
//!    previous request's outstanding work.
//! 3. The cache resizes itself to the window (see [`calculate_capacity`])
//!    and is trimmed back to it once measurement settles.
//!
//! Invariants:
//! - Line ranges are inclusive and clamped to `0..line_count`.
//! - The cache never holds more than its capacity; eviction is strict LRU.
//! - At most one layout run measures at a time; a newer run starts only after
//!   the superseded one has settled.
//!
//! Logging targets: `render.viewport`, `render.cache`, `render.layout`.

mod cache_sizing;
pub mod layout_scheduler;
pub mod line_cache;
pub mod viewport;

pub use cache_sizing::calculate_capacity;
pub use layout_scheduler::{
    LineLayoutProvider, LineLayoutScheduler, LineLayoutSchedulerOptions, MeasureError,
    SchedulerError, default_concurrency,
};
pub use line_cache::{
    CacheError, DEFAULT_CACHE_CAPACITY, DEFAULT_MAXIMUM_CAPACITY, LineLayoutInfo,
    VirtualizedLineCache,
};
pub use viewport::{LineMetricsProvider, ViewportComputationResult, ViewportManager, ViewportState};

pub use tokio_util::sync::CancellationToken;
