use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use core_render::{
    CancellationToken, LineLayoutInfo, LineLayoutProvider, LineLayoutScheduler,
    LineLayoutSchedulerOptions, LineMetricsProvider, MeasureError, SchedulerError,
    ViewportComputationResult, ViewportManager, ViewportState,
};

struct Uniform(usize);

impl LineMetricsProvider for Uniform {
    fn line_count(&self) -> usize {
        self.0
    }

    fn line_height(&self, _line: usize) -> f64 {
        20.0
    }
}

fn viewport_at(lines: usize, scroll: f64) -> ViewportComputationResult {
    ViewportManager::new(Uniform(lines)).update(ViewportState::new(scroll, 100.0, 40.0))
}

struct FakeLayout {
    lines: usize,
    delay: Duration,
    fail_line: Option<usize>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeLayout {
    fn new(lines: usize, delay: Duration) -> Self {
        Self {
            lines,
            delay,
            fail_line: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LineLayoutProvider for FakeLayout {
    fn line_count(&self) -> usize {
        self.lines
    }

    async fn measure(
        &self,
        line: usize,
        cancel: &CancellationToken,
    ) -> Result<LineLayoutInfo, MeasureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(MeasureError::Cancelled),
            _ = tokio::time::sleep(self.delay) => {
                if self.fail_line == Some(line) {
                    Err(MeasureError::Failed("glyph run exploded".into()))
                } else {
                    Ok(LineLayoutInfo::new(line, line as f64 * 7.0, 20.0, 15.0))
                }
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

fn options() -> LineLayoutSchedulerOptions {
    LineLayoutSchedulerOptions {
        max_concurrent_measurements: 4,
        ..Default::default()
    }
}

fn sorted_lines(scheduler: &LineLayoutScheduler<FakeLayout>) -> Vec<usize> {
    let mut lines = scheduler.cache().line_indices();
    lines.sort_unstable();
    lines
}

#[tokio::test(start_paused = true)]
async fn measures_visible_and_overscan_window() {
    let provider = Arc::new(FakeLayout::new(100, Duration::from_millis(5)));
    let scheduler = LineLayoutScheduler::new(provider.clone(), None, options()).unwrap();
    let mut events = scheduler.subscribe();

    let viewport = viewport_at(100, 0.0);
    assert_eq!((viewport.first_visible_line, viewport.last_visible_line), (0, 4));
    scheduler.request_layout(&viewport).unwrap();
    scheduler.when_idle().await;

    assert_eq!(sorted_lines(&scheduler), (0..=6).collect::<Vec<_>>());
    let mut measured = Vec::new();
    while let Ok(info) = events.try_recv() {
        measured.push(info.line_index);
    }
    measured.sort_unstable();
    assert_eq!(measured, (0..=6).collect::<Vec<_>>());
    assert_eq!(
        scheduler.cache().get(3),
        Some(LineLayoutInfo::new(3, 21.0, 20.0, 15.0))
    );

    scheduler.request_layout(&viewport).unwrap();
    scheduler.when_idle().await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 7, "cached lines are skipped");
}

#[tokio::test(start_paused = true)]
async fn disjoint_request_leaves_only_new_range_cached() {
    let provider = Arc::new(FakeLayout::new(100, Duration::from_secs(1)));
    let scheduler = LineLayoutScheduler::new(provider.clone(), None, options()).unwrap();

    scheduler.request_layout(&viewport_at(100, 0.0)).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(provider.in_flight.load(Ordering::SeqCst) > 0);

    let far = viewport_at(100, 1000.0);
    assert_eq!((far.overscan_start_line, far.overscan_end_line), (48, 56));
    scheduler.request_layout(&far).unwrap();
    scheduler.when_idle().await;

    assert_eq!(sorted_lines(&scheduler), (48..=56).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn concurrency_is_capped() {
    let provider = Arc::new(FakeLayout::new(100, Duration::from_millis(3)));
    let opts = LineLayoutSchedulerOptions {
        max_concurrent_measurements: 2,
        ..Default::default()
    };
    let scheduler = LineLayoutScheduler::new(provider.clone(), None, opts).unwrap();
    scheduler.request_layout(&viewport_at(100, 400.0)).unwrap();
    scheduler.when_idle().await;
    let peak = provider.peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak in-flight was {peak}");
    assert_eq!(scheduler.cache().len(), provider.calls.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn failed_line_does_not_abort_siblings() {
    let mut fake = FakeLayout::new(100, Duration::from_millis(1));
    fake.fail_line = Some(3);
    let scheduler = LineLayoutScheduler::new(Arc::new(fake), None, options()).unwrap();
    scheduler.request_layout(&viewport_at(100, 0.0)).unwrap();
    scheduler.when_idle().await;
    assert_eq!(sorted_lines(&scheduler), vec![0, 1, 2, 4, 5, 6]);
}

#[tokio::test(start_paused = true)]
async fn trim_can_be_disabled() {
    let provider = Arc::new(FakeLayout::new(100, Duration::from_millis(1)));
    let opts = LineLayoutSchedulerOptions {
        trim_cache_after_update: false,
        ..options()
    };
    let scheduler = LineLayoutScheduler::new(provider, None, opts).unwrap();
    scheduler.request_layout(&viewport_at(100, 0.0)).unwrap();
    scheduler.when_idle().await;
    scheduler.request_layout(&viewport_at(100, 1000.0)).unwrap();
    scheduler.when_idle().await;
    assert_eq!(scheduler.cache().len(), 7 + 9);
}

#[tokio::test(start_paused = true)]
async fn cache_follows_window_size() {
    let provider = Arc::new(FakeLayout::new(100, Duration::from_millis(1)));
    let opts = LineLayoutSchedulerOptions {
        cache_minimum_capacity: 64,
        cache_maximum_capacity: 1024,
        ..options()
    };
    let scheduler = LineLayoutScheduler::new(provider, None, opts).unwrap();
    assert_eq!(scheduler.cache().bounds(), (64, 1024));
    scheduler.request_layout(&viewport_at(100, 0.0)).unwrap();
    // 7 + 128 -> 192 -> 256
    assert_eq!(scheduler.cache().capacity(), 256);
    scheduler.when_idle().await;
}

#[tokio::test(start_paused = true)]
async fn empty_document_settles_immediately() {
    let provider = Arc::new(FakeLayout::new(0, Duration::from_millis(1)));
    let scheduler = LineLayoutScheduler::new(provider.clone(), None, options()).unwrap();
    scheduler.request_layout(&viewport_at(0, 0.0)).unwrap();
    scheduler.when_idle().await;
    assert!(scheduler.cache().is_empty());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn dispose_cancels_and_rejects_new_requests() {
    let provider = Arc::new(FakeLayout::new(100, Duration::from_secs(5)));
    let scheduler = LineLayoutScheduler::new(provider, None, options()).unwrap();
    scheduler.request_layout(&viewport_at(100, 0.0)).unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    scheduler.dispose();
    scheduler.dispose();
    assert!(scheduler.is_disposed());
    scheduler.when_idle().await;
    assert!(scheduler.cache().is_empty());
    assert!(matches!(
        scheduler.request_layout(&viewport_at(100, 0.0)),
        Err(SchedulerError::Disposed)
    ));
}

#[tokio::test]
async fn when_idle_without_requests_returns() {
    let provider = Arc::new(FakeLayout::new(10, Duration::ZERO));
    let scheduler = LineLayoutScheduler::new(provider, None, options()).unwrap();
    scheduler.when_idle().await;
}

#[test]
fn construction_needs_runtime_and_valid_options() {
    let provider = Arc::new(FakeLayout::new(10, Duration::ZERO));
    assert!(matches!(
        LineLayoutScheduler::new(provider.clone(), None, options()),
        Err(SchedulerError::NoRuntime)
    ));
    let bad = LineLayoutSchedulerOptions {
        max_concurrent_measurements: 0,
        ..Default::default()
    };
    assert!(matches!(
        LineLayoutScheduler::new(provider, None, bad),
        Err(SchedulerError::InvalidConfiguration(_))
    ));
}
