//! Listener registry: a set of callbacks per event kind.
//!
//! Dispatch works on a cloned snapshot, so listeners may add or remove
//! listeners (including themselves) while an event is being delivered.
//! Changes take effect from the next event.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use roomwatch_protocol::EventKind;

use crate::TelemetryEvent;

/// A registered callback.
///
/// Identity is the `Arc` allocation: clone the same `Listener` to pass it
/// to [`off`](crate::TelemetryClient::off) later.
pub type Listener = Arc<dyn Fn(&TelemetryEvent) -> anyhow::Result<()> + Send + Sync>;

/// Wraps a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&TelemetryEvent) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Default)]
struct Listeners {
    /// Bumped by every `clear`. A session only delivers while the epoch it
    /// started under is current.
    epoch: u64,
    by_kind: HashMap<EventKind, Vec<Listener>>,
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Mutex<Listeners>,
}

impl ListenerRegistry {
    /// Returns `false` if this exact listener is already registered.
    pub(crate) fn add(&self, kind: EventKind, listener: Listener) -> bool {
        let mut listeners = self.listeners.lock();
        let set = listeners.by_kind.entry(kind).or_default();
        if set.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        set.push(listener);
        true
    }

    /// Returns `false` if the listener was not registered.
    pub(crate) fn remove(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(set) = listeners.by_kind.get_mut(&kind) else {
            return false;
        };
        let before = set.len();
        set.retain(|l| !Arc::ptr_eq(l, listener));
        let removed = set.len() != before;
        if set.is_empty() {
            listeners.by_kind.remove(&kind);
        }
        removed
    }

    pub(crate) fn len(&self, kind: EventKind) -> usize {
        self.listeners.lock().by_kind.get(&kind).map_or(0, Vec::len)
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.listeners.lock().epoch
    }

    /// Drops every listener and starts a new epoch.
    pub(crate) fn clear(&self) {
        let mut listeners = self.listeners.lock();
        listeners.by_kind.clear();
        listeners.epoch += 1;
    }

    fn snapshot(&self, epoch: u64, kind: EventKind) -> Option<Vec<Listener>> {
        let listeners = self.listeners.lock();
        if listeners.epoch != epoch {
            return None;
        }
        Some(listeners.by_kind.get(&kind).cloned().unwrap_or_default())
    }

    /// Calls every listener registered for the event's kind, unless the
    /// registry was cleared since `epoch`. Errors and panics are logged per
    /// listener and counted.
    pub(crate) fn dispatch(&self, epoch: u64, event: &TelemetryEvent) -> usize {
        let kind = event.kind();
        let Some(snapshot) = self.snapshot(epoch, kind) else {
            tracing::debug!(%kind, "skipping event from a retired session");
            return 0;
        };

        let mut failed = 0;
        for listener in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    tracing::warn!(%kind, error = %e, "listener returned an error");
                }
                Err(_) => {
                    failed += 1;
                    tracing::error!(%kind, "listener panicked");
                }
            }
        }

        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = Arc::clone(counter);
        listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_same_listener_is_stored_once() {
        let registry = ListenerRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let l = counting(&hits);

        assert!(registry.add(EventKind::Connect, Arc::clone(&l)));
        assert!(!registry.add(EventKind::Connect, Arc::clone(&l)));
        assert_eq!(registry.len(EventKind::Connect), 1);

        registry.dispatch(0, &TelemetryEvent::Connected);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_equal_closures_are_distinct_listeners() {
        let registry = ListenerRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.add(EventKind::Connect, counting(&hits));
        registry.add(EventKind::Connect, counting(&hits));

        registry.dispatch(0, &TelemetryEvent::Connected);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_only_matching_kind_is_called() {
        let registry = ListenerRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.add(EventKind::Disconnect, counting(&hits));

        registry.dispatch(0, &TelemetryEvent::Connected);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove() {
        let registry = ListenerRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let keep = counting(&hits);
        let drop_me = counting(&hits);
        registry.add(EventKind::Connect, Arc::clone(&keep));
        registry.add(EventKind::Connect, Arc::clone(&drop_me));

        assert!(registry.remove(EventKind::Connect, &drop_me));
        assert!(!registry.remove(EventKind::Connect, &drop_me));
        assert!(!registry.remove(EventKind::InitialData, &keep));

        registry.dispatch(0, &TelemetryEvent::Connected);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_are_isolated() {
        let registry = ListenerRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.add(
            EventKind::Connect,
            listener(|_| Err(anyhow::anyhow!("bad listener"))),
        );
        registry.add(EventKind::Connect, listener(|_| panic!("boom")));
        registry.add(EventKind::Connect, counting(&hits));

        assert_eq!(registry.dispatch(0, &TelemetryEvent::Connected), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_can_change_registry_during_dispatch() {
        let registry = Arc::new(ListenerRegistry::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let late = counting(&hits);

        let r = Arc::clone(&registry);
        let l = Arc::clone(&late);
        let adder = listener(move |_| {
            r.add(EventKind::Connect, Arc::clone(&l));
            Ok(())
        });
        registry.add(EventKind::Connect, Arc::clone(&adder));

        // The new listener is not part of the running dispatch.
        registry.dispatch(0, &TelemetryEvent::Connected);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        registry.remove(EventKind::Connect, &adder);
        registry.dispatch(0, &TelemetryEvent::Connected);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear() {
        let registry = ListenerRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.add(EventKind::Connect, counting(&hits));
        registry.add(EventKind::InitialData, counting(&hits));
        registry.clear();
        assert_eq!(registry.len(EventKind::Connect), 0);
        assert_eq!(registry.len(EventKind::InitialData), 0);
    }

    #[test]
    fn test_clear_silences_the_old_epoch() {
        let registry = ListenerRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let old = registry.epoch();
        registry.clear();
        let current = registry.epoch();
        assert_ne!(old, current);

        registry.add(EventKind::Connect, counting(&hits));
        assert_eq!(registry.dispatch(old, &TelemetryEvent::Connected), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        registry.dispatch(current, &TelemetryEvent::Connected);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
