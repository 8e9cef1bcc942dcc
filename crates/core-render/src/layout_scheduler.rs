//! Asynchronous line measurement for the visible window.
//!
//! Each [`LineLayoutScheduler::request_layout`] call supersedes the previous
//! one: its cancellation token is cancelled and the new run waits for the
//! old run to settle before measuring. Lines already in the cache are
//! skipped. Measurements run as separate tasks, at most
//! `max_concurrent_measurements` at a time, and publish each result on a
//! broadcast channel after caching it.
//!
//! Cancellation is cooperative. A measurement that has already started may
//! still complete and be cached after its request was superseded; the cache
//! trim at the end of the next run removes it if it fell out of range.

use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::line_cache::{
    CacheError, DEFAULT_CACHE_CAPACITY, DEFAULT_MAXIMUM_CAPACITY, LineLayoutInfo,
    VirtualizedLineCache,
};
use crate::viewport::ViewportComputationResult;

const EVENT_CHANNEL_CAP: usize = 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeasureError {
    /// The measurement observed its cancellation token.
    #[error("measurement cancelled")]
    Cancelled,
    #[error("measurement failed: {0}")]
    Failed(String),
}

/// Host-side line measurement.
#[async_trait]
pub trait LineLayoutProvider: Send + Sync + 'static {
    fn line_count(&self) -> usize;

    /// Measure `line`. Implementations should return
    /// [`MeasureError::Cancelled`] once `cancel` fires.
    async fn measure(
        &self,
        line: usize,
        cancel: &CancellationToken,
    ) -> Result<LineLayoutInfo, MeasureError>;
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfiguration(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("layout scheduler has been disposed")]
    Disposed,
    #[error("layout scheduler needs a tokio runtime")]
    NoRuntime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineLayoutSchedulerOptions {
    pub max_concurrent_measurements: usize,
    pub cache_minimum_capacity: usize,
    pub cache_maximum_capacity: usize,
    pub cache_headroom_ratio: f64,
    pub auto_adjust_cache_size: bool,
    pub trim_cache_after_update: bool,
}

impl Default for LineLayoutSchedulerOptions {
    fn default() -> Self {
        Self {
            max_concurrent_measurements: default_concurrency(),
            cache_minimum_capacity: DEFAULT_CACHE_CAPACITY,
            cache_maximum_capacity: DEFAULT_MAXIMUM_CAPACITY,
            cache_headroom_ratio: 0.75,
            auto_adjust_cache_size: true,
            trim_cache_after_update: true,
        }
    }
}

/// Half the available parallelism, at least one.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

impl LineLayoutSchedulerOptions {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        let invalid = |msg: String| Err(SchedulerError::InvalidConfiguration(msg));
        if self.max_concurrent_measurements == 0 {
            return invalid("max_concurrent_measurements must be positive".into());
        }
        if self.cache_minimum_capacity == 0 {
            return invalid("cache_minimum_capacity must be positive".into());
        }
        if self.cache_maximum_capacity < self.cache_minimum_capacity {
            return invalid(format!(
                "cache_maximum_capacity {} is below cache_minimum_capacity {}",
                self.cache_maximum_capacity, self.cache_minimum_capacity
            ));
        }
        if !self.cache_headroom_ratio.is_finite() || self.cache_headroom_ratio < 0.0 {
            return invalid(format!(
                "cache_headroom_ratio must be a finite non-negative number, got {}",
                self.cache_headroom_ratio
            ));
        }
        Ok(())
    }
}

struct RunState {
    token: CancellationToken,
    generation: u64,
    last_run: Option<JoinHandle<()>>,
    disposed: bool,
}

struct Shared<P> {
    provider: Arc<P>,
    cache: Arc<VirtualizedLineCache>,
    options: LineLayoutSchedulerOptions,
    events: broadcast::Sender<LineLayoutInfo>,
    /// Generation of the newest settled run.
    settled: watch::Sender<u64>,
    state: Mutex<RunState>,
}

pub struct LineLayoutScheduler<P: LineLayoutProvider> {
    shared: Arc<Shared<P>>,
    runtime: Handle,
}

impl<P: LineLayoutProvider> LineLayoutScheduler<P> {
    /// Create a scheduler on the current tokio runtime. Without a `cache` a
    /// fresh one is created; either way its bounds are set from `options`.
    pub fn new(
        provider: Arc<P>,
        cache: Option<Arc<VirtualizedLineCache>>,
        options: LineLayoutSchedulerOptions,
    ) -> Result<Self, SchedulerError> {
        options.validate()?;
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        let cache = match cache {
            Some(cache) => cache,
            None => Arc::new(VirtualizedLineCache::new(options.cache_minimum_capacity)?),
        };
        cache.configure_bounds(options.cache_minimum_capacity, options.cache_maximum_capacity)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAP);
        let (settled, _) = watch::channel(0);
        Ok(Self {
            shared: Arc::new(Shared {
                provider,
                cache,
                options,
                events,
                settled,
                state: Mutex::new(RunState {
                    token: CancellationToken::new(),
                    generation: 0,
                    last_run: None,
                    disposed: false,
                }),
            }),
            runtime,
        })
    }

    pub fn cache(&self) -> &Arc<VirtualizedLineCache> {
        &self.shared.cache
    }

    pub fn options(&self) -> &LineLayoutSchedulerOptions {
        &self.shared.options
    }

    /// Receiver of every line measured after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LineLayoutInfo> {
        self.shared.events.subscribe()
    }

    /// Measure the uncached lines of `viewport`'s visible and overscan
    /// window, superseding any earlier request. Returns immediately.
    pub fn request_layout(
        &self,
        viewport: &ViewportComputationResult,
    ) -> Result<(), SchedulerError> {
        let mut state = self.shared.state.lock();
        if state.disposed {
            return Err(SchedulerError::Disposed);
        }
        let range = normalize_range(viewport, self.shared.provider.line_count());
        let options = &self.shared.options;
        if options.auto_adjust_cache_size {
            let window = range.as_ref().map_or(0, |r| r.end() - r.start() + 1);
            self.shared.cache.adjust_capacity(
                viewport.visible_line_count(),
                window,
                options.cache_headroom_ratio,
            )?;
        }

        let token = CancellationToken::new();
        std::mem::replace(&mut state.token, token.clone()).cancel();
        state.generation += 1;
        let generation = state.generation;
        let previous = state.last_run.take();
        debug!(target: "render.layout", generation, range = ?range, "request_layout");
        let shared = Arc::clone(&self.shared);
        state.last_run = Some(self.runtime.spawn(async move {
            if let Some(previous) = previous
                && let Err(err) = previous.await
            {
                warn!(target: "render.layout", error = %err, "superseded layout run failed");
            }
            if let Some(range) = range {
                Shared::measure_range(&shared, range, &token).await;
            }
            shared.settled.send_modify(|settled| *settled = (*settled).max(generation));
            trace!(target: "render.layout", generation, cancelled = token.is_cancelled(), "settled");
        }));
        Ok(())
    }

    /// Resolves once the most recently requested run has settled.
    pub async fn when_idle(&self) {
        let (generation, mut settled) = {
            let state = self.shared.state.lock();
            (state.generation, self.shared.settled.subscribe())
        };
        let _ = settled.wait_for(|s| *s >= generation).await;
    }

    /// Cancel outstanding work. Later requests fail with
    /// [`SchedulerError::Disposed`]. Idempotent.
    pub fn dispose(&self) {
        let mut state = self.shared.state.lock();
        if std::mem::replace(&mut state.disposed, true) {
            return;
        }
        state.token.cancel();
        debug!(target: "render.layout", generation = state.generation, "dispose");
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().disposed
    }
}

impl<P: LineLayoutProvider> Drop for LineLayoutScheduler<P> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<P: LineLayoutProvider> std::fmt::Debug for LineLayoutScheduler<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineLayoutScheduler")
            .field("options", &self.shared.options)
            .field("cache", &self.shared.cache)
            .finish_non_exhaustive()
    }
}

impl<P: LineLayoutProvider> Shared<P> {
    async fn measure_range(
        shared: &Arc<Self>,
        range: RangeInclusive<usize>,
        token: &CancellationToken,
    ) {
        let permits = Arc::new(Semaphore::new(shared.options.max_concurrent_measurements));
        let mut tasks = JoinSet::new();
        let mut interrupted = false;
        for line in range.clone() {
            if shared.cache.get(line).is_some() {
                continue;
            }
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                permit = Arc::clone(&permits).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                interrupted = true;
                break;
            };
            let task_shared = Arc::clone(shared);
            let task_token = token.clone();
            tasks.spawn(async move {
                let _permit = permit;
                task_shared.measure_line(line, &task_token).await;
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                warn!(target: "render.layout", error = %err, "measurement task failed");
            }
        }
        if shared.options.trim_cache_after_update && !interrupted && !token.is_cancelled() {
            shared.cache.trim_outside_range(*range.start(), *range.end());
        }
    }

    async fn measure_line(&self, line: usize, token: &CancellationToken) {
        if token.is_cancelled() {
            return;
        }
        match self.provider.measure(line, token).await {
            Ok(info) => {
                self.cache.insert(info);
                // No receivers is fine.
                let _ = self.events.send(info);
                trace!(target: "render.layout", line, width = info.width, height = info.height, "measured");
            }
            Err(MeasureError::Cancelled) => {
                trace!(target: "render.layout", line, "measurement cancelled");
            }
            Err(MeasureError::Failed(reason)) => {
                warn!(target: "render.layout", line, %reason, "line measurement failed");
            }
        }
    }
}

/// Union of the visible and overscan windows clamped to the document, or
/// `None` for an empty document.
fn normalize_range(
    viewport: &ViewportComputationResult,
    line_count: usize,
) -> Option<RangeInclusive<usize>> {
    let last = line_count.checked_sub(1)?;
    let start = viewport
        .overscan_start_line
        .min(last)
        .min(viewport.first_visible_line);
    let end = viewport
        .overscan_end_line
        .min(last)
        .max(viewport.last_visible_line)
        .clamp(start, last);
    Some(start..=end)
}
