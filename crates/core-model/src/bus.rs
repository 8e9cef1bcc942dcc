use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::change::{DocumentChange, DocumentChangeSet};
use crate::identity::{DocumentId, DocumentVersion};
use crate::snapshot::DocumentSnapshot;

#[derive(Debug, Error)]
pub enum ChangeBusError {
    #[error("a throttled change bus needs a tokio runtime to arm its debounce timers")]
    NoRuntime,
}

type Handler = Arc<dyn Fn(&DocumentChangeSet) + Send + Sync>;

struct SubscriptionEntry {
    id: u64,
    document: Option<DocumentId>,
    handler: Handler,
    active: Arc<AtomicBool>,
}

/// Changes accumulated for one document, with the version and snapshot of
/// the latest one.
#[derive(Default)]
struct Batch {
    changes: Vec<DocumentChange>,
    latest: Option<(DocumentVersion, DocumentSnapshot)>,
}

impl Batch {
    fn push(
        &mut self,
        version: DocumentVersion,
        change: DocumentChange,
        snapshot: DocumentSnapshot,
    ) {
        self.changes.push(change);
        self.latest = Some((version, snapshot));
    }

    /// Append a batch recorded after this one.
    fn extend(&mut self, later: Batch) {
        self.changes.extend(later.changes);
        if later.latest.is_some() {
            self.latest = later.latest;
        }
    }

    fn into_change_set(self, document_id: DocumentId) -> Option<DocumentChangeSet> {
        let (version, snapshot) = self.latest?;
        if self.changes.is_empty() {
            return None;
        }
        Some(DocumentChangeSet {
            document_id,
            version,
            changes: self.changes.into(),
            snapshot,
        })
    }
}

struct Pending {
    batch: Batch,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Transaction {
    depth: usize,
    batch: Batch,
}

#[derive(Default)]
struct BusState {
    next_subscription: u64,
    next_generation: u64,
    subscriptions: Vec<SubscriptionEntry>,
    pending: HashMap<DocumentId, Pending>,
    transactions: HashMap<DocumentId, Transaction>,
}

struct BusInner {
    throttle: Duration,
    runtime: Option<Handle>,
    state: Mutex<BusState>,
    /// Held from taking a batch until it is delivered, so a deadline firing
    /// on a runtime thread cannot overtake a newer batch. Reentrant because
    /// handlers may edit documents on the same bus.
    delivery: ReentrantMutex<()>,
}

impl Drop for BusInner {
    fn drop(&mut self) {
        for (_, pending) in self.state.get_mut().pending.drain() {
            if let Some(timer) = pending.timer {
                timer.abort();
            }
        }
    }
}

/// Routes document changes to subscribers, immediately or debounced.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct DocumentChangeBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for DocumentChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentChangeBus")
            .field("throttle", &self.inner.throttle)
            .finish_non_exhaustive()
    }
}

impl DocumentChangeBus {
    /// A bus that delivers every change synchronously.
    pub fn immediate() -> Self {
        Self::build(Duration::ZERO, None)
    }

    /// A debouncing bus driven by the current tokio runtime. A zero window
    /// behaves like [`DocumentChangeBus::immediate`].
    pub fn throttled(window: Duration) -> Result<Self, ChangeBusError> {
        if window.is_zero() {
            return Ok(Self::immediate());
        }
        let handle = Handle::try_current().map_err(|_| ChangeBusError::NoRuntime)?;
        Ok(Self::throttled_on(window, handle))
    }

    /// A debouncing bus whose timers run on `runtime`.
    pub fn throttled_on(window: Duration, runtime: Handle) -> Self {
        Self::build(window, Some(runtime))
    }

    fn build(throttle: Duration, runtime: Option<Handle>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                throttle,
                runtime,
                state: Mutex::new(BusState::default()),
                delivery: ReentrantMutex::new(()),
            }),
        }
    }

    pub fn throttle_window(&self) -> Duration {
        self.inner.throttle
    }

    /// Register `handler` for one document's changes, or for every document
    /// when `document` is `None`.
    pub fn subscribe<F>(&self, document: Option<DocumentId>, handler: F) -> Subscription
    where
        F: Fn(&DocumentChangeSet) + Send + Sync + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let mut state = self.inner.state.lock();
        state.next_subscription += 1;
        let id = state.next_subscription;
        state.subscriptions.push(SubscriptionEntry {
            id,
            document,
            handler: Arc::new(handler),
            active: Arc::clone(&active),
        });
        trace!(target: "model.bus", subscription = id, document = ?document.map(|d| d.to_string()), "subscribe");
        Subscription {
            id,
            active,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscriptions.len()
    }

    /// Open (or nest into) a transaction for `document`. Changes published
    /// while any scope is open are delivered as one batch when the outermost
    /// scope completes.
    pub fn begin_transaction(&self, document: DocumentId) -> TransactionScope {
        let mut state = self.inner.state.lock();
        let tx = state.transactions.entry(document).or_insert(Transaction {
            depth: 0,
            batch: Batch::default(),
        });
        tx.depth += 1;
        trace!(target: "model.bus", document = %document, depth = tx.depth, "transaction_begin");
        TransactionScope {
            bus: self.clone(),
            document,
            open: true,
        }
    }

    /// Deliver a debounced batch for `document` now instead of waiting for
    /// its deadline.
    pub fn flush_pending(&self, document: DocumentId) {
        let _delivery = self.inner.delivery.lock();
        let pending = self.inner.state.lock().pending.remove(&document);
        if let Some(pending) = pending {
            if let Some(timer) = pending.timer {
                timer.abort();
            }
            debug!(target: "model.bus", document = %document, "flush_pending");
            self.emit_batch(document, pending.batch);
        }
    }

    pub(crate) fn publish(
        &self,
        document: DocumentId,
        version: DocumentVersion,
        change: DocumentChange,
        snapshot: DocumentSnapshot,
    ) {
        let _delivery = self.inner.delivery.lock();
        let mut state = self.inner.state.lock();
        if let Some(tx) = state.transactions.get_mut(&document) {
            tx.batch.push(version, change, snapshot);
            return;
        }
        let runtime = self
            .inner
            .runtime
            .as_ref()
            .filter(|_| !self.inner.throttle.is_zero());
        let Some(runtime) = runtime else {
            drop(state);
            let mut batch = Batch::default();
            batch.push(version, change, snapshot);
            self.emit_batch(document, batch);
            return;
        };

        state.next_generation += 1;
        let generation = state.next_generation;
        let pending = state.pending.entry(document).or_insert_with(|| Pending {
            batch: Batch::default(),
            generation,
            timer: None,
        });
        pending.batch.push(version, change, snapshot);
        pending.generation = generation;
        if let Some(previous) = pending.timer.take() {
            previous.abort();
        }
        let bus = Arc::downgrade(&self.inner);
        let window = self.inner.throttle;
        pending.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(inner) = bus.upgrade() {
                DocumentChangeBus { inner }.fire_deadline(document, generation);
            }
        }));
        trace!(target: "model.bus", document = %document, pending = pending.batch.changes.len(), "debounce_rearmed");
    }

    fn fire_deadline(&self, document: DocumentId, generation: u64) {
        let _delivery = self.inner.delivery.lock();
        let batch = {
            let mut state = self.inner.state.lock();
            match state.pending.get(&document) {
                Some(p) if p.generation == generation => {
                    state.pending.remove(&document).map(|p| p.batch)
                }
                _ => None,
            }
        };
        if let Some(batch) = batch {
            self.emit_batch(document, batch);
        }
    }

    /// Closing the outermost scope delivers at once. A debounced batch still
    /// pending for the document is older, so it is delivered in front of the
    /// transaction's changes as part of the same set.
    fn complete_transaction(&self, document: DocumentId) {
        let _delivery = self.inner.delivery.lock();
        let batch = {
            let mut state = self.inner.state.lock();
            let Some(tx) = state.transactions.get_mut(&document) else {
                return;
            };
            tx.depth = tx.depth.saturating_sub(1);
            trace!(target: "model.bus", document = %document, depth = tx.depth, "transaction_end");
            if tx.depth > 0 {
                return;
            }
            let Some(tx) = state.transactions.remove(&document) else {
                return;
            };
            match state.pending.remove(&document) {
                Some(mut pending) => {
                    if let Some(timer) = pending.timer.take() {
                        timer.abort();
                    }
                    debug!(target: "model.bus", document = %document, "pending_merged_into_transaction");
                    pending.batch.extend(tx.batch);
                    pending.batch
                }
                None => tx.batch,
            }
        };
        self.emit_batch(document, batch);
    }

    fn emit_batch(&self, document: DocumentId, batch: Batch) {
        let Some(change_set) = batch.into_change_set(document) else {
            return;
        };
        let listeners: Vec<(Handler, Arc<AtomicBool>)> = {
            let state = self.inner.state.lock();
            state
                .subscriptions
                .iter()
                .filter(|s| s.document.is_none_or(|d| d == document))
                .map(|s| (Arc::clone(&s.handler), Arc::clone(&s.active)))
                .collect()
        };
        debug!(target: "model.bus", document = %document, changes = change_set.changes.len(), version = change_set.version.sequence, listeners = listeners.len(), "emit");
        for (handler, active) in listeners {
            if !active.load(Ordering::Acquire) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| handler(&change_set))).is_err() {
                error!(target: "model.bus", document = %document, "change subscriber panicked; continuing delivery");
            }
        }
    }
}

/// Subscription handle. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Idempotent; safe to call from inside a handler.
    pub fn unsubscribe(&mut self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.bus.upgrade() {
            inner.state.lock().subscriptions.retain(|s| s.id != self.id);
            trace!(target: "model.bus", subscription = self.id, "unsubscribe");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Scope guard returned by [`DocumentChangeBus::begin_transaction`].
/// Completing it (explicitly or on drop) closes one nesting level.
pub struct TransactionScope {
    bus: DocumentChangeBus,
    document: DocumentId,
    open: bool,
}

impl TransactionScope {
    /// Idempotent.
    pub fn complete(&mut self) {
        if std::mem::replace(&mut self.open, false) {
            self.bus.complete_transaction(self.document);
        }
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        self.complete();
    }
}
