//! Listener registration and fan-out.
//!
//! Registrations live behind their own lock. Dispatch clones a snapshot of
//! the registered listeners and releases the lock before invoking anything,
//! so a listener may add or remove listeners (itself included) from inside
//! its callback. A listener that returns an error or panics is logged and
//! skipped; the remaining listeners still run.

use std::any::Any;
use std::error::Error;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Outcome of a listener callback.
pub type ListenerResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Handle returned on registration, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Ordered set of listeners of type `L` (usually a `dyn` trait).
pub struct ListenerSet<L: ?Sized> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Arc<L>)>>,
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> ListenerSet<L> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, listener: Arc<L>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, listener));
        id
    }

    /// Returns `false` when `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Listeners in registration order, detached from the lock.
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.entries
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    /// Invokes `callback` on every listener of the current snapshot.
    ///
    /// Returns the number of listeners that failed.
    pub fn dispatch<F>(&self, event: &'static str, callback: F) -> usize
    where
        F: Fn(&L) -> ListenerResult,
    {
        let mut failures = 0;
        for listener in self.snapshot() {
            match catch_unwind(AssertUnwindSafe(|| callback(&*listener))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failures += 1;
                    tracing::warn!(event, error = %err, "listener failed");
                }
                Err(panic) => {
                    failures += 1;
                    tracing::warn!(event, panic = panic_message(&*panic), "listener panicked");
                }
            }
        }
        failures
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::{ListenerId, ListenerResult, ListenerSet};

    trait Probe: Send + Sync {
        fn hit(&self) -> ListenerResult;
    }

    struct Counter(AtomicUsize);

    impl Probe for Counter {
        fn hit(&self) -> ListenerResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl Probe for Failing {
        fn hit(&self) -> ListenerResult {
            Err("boom".into())
        }
    }

    struct Panicking;

    impl Probe for Panicking {
        fn hit(&self) -> ListenerResult {
            panic!("listener bug");
        }
    }

    #[test]
    fn failing_listeners_do_not_stop_dispatch() {
        let set: ListenerSet<dyn Probe> = ListenerSet::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        set.add(Arc::new(Failing));
        set.add(Arc::new(Panicking));
        set.add(counter.clone());

        let failures = set.dispatch("hit", |probe| probe.hit());
        assert_eq!(failures, 2);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    struct SelfRemoving {
        set: Arc<ListenerSet<dyn Probe>>,
        id: Mutex<Option<ListenerId>>,
        calls: AtomicUsize,
    }

    impl Probe for SelfRemoving {
        fn hit(&self) -> ListenerResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = self.id.lock().take() {
                self.set.remove(id);
            }
            Ok(())
        }
    }

    #[test]
    fn listener_can_remove_itself_during_dispatch() {
        let set: Arc<ListenerSet<dyn Probe>> = Arc::new(ListenerSet::new());
        let remover = Arc::new(SelfRemoving {
            set: set.clone(),
            id: Mutex::new(None),
            calls: AtomicUsize::new(0),
        });
        let id = set.add(remover.clone());
        *remover.id.lock() = Some(id);
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        set.add(counter.clone());

        set.dispatch("hit", |probe| probe.hit());
        set.dispatch("hit", |probe| probe.hit());

        assert_eq!(remover.calls.load(Ordering::SeqCst), 1);
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_unknown_id_is_reported() {
        let set: ListenerSet<dyn Probe> = ListenerSet::new();
        let id = set.add(Arc::new(Failing));
        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert!(set.is_empty());
    }
}
