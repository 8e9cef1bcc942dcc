use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::gesture::EditorGesture;

/// Consumer of editor gestures.
pub trait GestureSink: Send + Sync {
    fn handle_gesture(&self, gesture: &EditorGesture);
}

impl<F> GestureSink for F
where
    F: Fn(&EditorGesture) + Send + Sync,
{
    fn handle_gesture(&self, gesture: &EditorGesture) {
        self(gesture)
    }
}

/// Fans each gesture out to every subscribed sink in subscription order.
///
/// Sinks are compared by `Arc` identity, so subscribing the same sink twice
/// keeps a single entry. Dispatch iterates a copy of the sink list; a sink
/// may subscribe or unsubscribe others while handling a gesture and the
/// change applies from the next dispatch.
#[derive(Default)]
pub struct GestureDispatcher {
    sinks: Mutex<Vec<Arc<dyn GestureSink>>>,
}

impl GestureDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the sink was already subscribed.
    pub fn subscribe(&self, sink: Arc<dyn GestureSink>) -> bool {
        let mut sinks = self.sinks.lock();
        if sinks.iter().any(|s| Arc::ptr_eq(s, &sink)) {
            return false;
        }
        sinks.push(sink);
        trace!(target: "events.dispatch", sinks = sinks.len(), "subscribe");
        true
    }

    /// Returns `false` when the sink was not subscribed.
    pub fn unsubscribe(&self, sink: &Arc<dyn GestureSink>) -> bool {
        let mut sinks = self.sinks.lock();
        let before = sinks.len();
        sinks.retain(|s| !Arc::ptr_eq(s, sink));
        before != sinks.len()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn dispatch(&self, gesture: &EditorGesture) {
        let sinks = self.sinks.lock().clone();
        trace!(target: "events.dispatch", kind = ?gesture.kind(), sinks = sinks.len(), "dispatch");
        for sink in sinks {
            sink.handle_gesture(gesture);
        }
    }
}

impl GestureSink for GestureDispatcher {
    fn handle_gesture(&self, gesture: &EditorGesture) {
        self.dispatch(gesture);
    }
}

impl std::fmt::Debug for GestureDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureDispatcher")
            .field("sinks", &self.sink_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::{EditorKeyModifiers, GestureKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        hits: AtomicUsize,
    }

    impl GestureSink for Counter {
        fn handle_gesture(&self, _gesture: &EditorGesture) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn same_sink_is_subscribed_once() {
        let d = GestureDispatcher::new();
        let counter = Arc::new(Counter::default());
        let sink: Arc<dyn GestureSink> = counter.clone();
        assert!(d.subscribe(sink.clone()));
        assert!(!d.subscribe(sink.clone()));
        d.dispatch(&EditorGesture::text_input("a"));
        assert_eq!(counter.hits.load(Ordering::SeqCst), 1);
        assert!(d.unsubscribe(&sink));
        assert!(!d.unsubscribe(&sink));
        d.dispatch(&EditorGesture::text_input("b"));
        assert_eq!(counter.hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closures_are_sinks_in_order() {
        let d = GestureDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            d.subscribe(Arc::new(move |g: &EditorGesture| seen.lock().push((tag, g.kind()))));
        }
        d.dispatch(&EditorGesture::key_down("Tab", EditorKeyModifiers::empty()));
        assert_eq!(
            *seen.lock(),
            vec![("first", GestureKind::KeyDown), ("second", GestureKind::KeyDown)]
        );
    }

    #[test]
    fn sink_added_during_dispatch_waits_for_next_gesture() {
        let d = Arc::new(GestureDispatcher::new());
        let late = Arc::new(Counter::default());
        let late_sink: Arc<dyn GestureSink> = late.clone();
        let dispatcher = Arc::downgrade(&d);
        d.subscribe(Arc::new(move |_: &EditorGesture| {
            if let Some(d) = dispatcher.upgrade() {
                d.subscribe(late_sink.clone());
            }
        }));
        d.dispatch(&EditorGesture::focus(true));
        assert_eq!(late.hits.load(Ordering::SeqCst), 0);
        assert_eq!(d.sink_count(), 2);
        d.dispatch(&EditorGesture::focus(false));
        assert_eq!(late.hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatchers_nest() {
        let outer = GestureDispatcher::new();
        let inner = Arc::new(GestureDispatcher::new());
        let counter = Arc::new(Counter::default());
        inner.subscribe(counter.clone());
        outer.subscribe(inner);
        outer.handle_gesture(&EditorGesture::text_input("z"));
        assert_eq!(counter.hits.load(Ordering::SeqCst), 1);
    }
}
