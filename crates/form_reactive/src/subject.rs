use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

struct Observers<T> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Observer<T>)>>,
}

/// A multicast channel for payloads of type `T`.
///
/// Cloning a subject yields another handle to the same set of observers.
pub struct Subject<T> {
    observers: Arc<Observers<T>>,
}

impl<T: 'static> Subject<T> {
    pub fn new() -> Self {
        Self {
            observers: Arc::new(Observers {
                next_id: AtomicU64::new(0),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self
            .observers
            .next_id
            .fetch_add(1, Ordering::Relaxed);
        self.observers
            .entries
            .lock()
            .push((id, Arc::new(observer)));

        let observers: Weak<Observers<T>> = Arc::downgrade(&self.observers);
        Subscription::new(move || {
            if let Some(observers) = observers.upgrade() {
                observers
                    .entries
                    .lock()
                    .retain(|(existing, _)| *existing != id);
            }
        })
    }

    /// Deliver `payload` to every observer subscribed at the time of the call.
    ///
    /// The observer list is not locked while observers run, so observers may subscribe,
    /// unsubscribe or publish again.
    pub fn next(&self, payload: &T) {
        let observers = self
            .observers
            .entries
            .lock()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect::<Vec<_>>();

        trace!("Publishing. observers: {}", observers.len());
        for observer in observers {
            observer(payload);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.entries.lock().len()
    }

    /// Remove every observer, existing subscriptions become no-ops.
    pub fn clear(&self) {
        self.observers.entries.lock().clear();
    }
}

impl<T: 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            observers: self.observers.clone(),
        }
    }
}

impl<T> Debug for Subject<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("observers", &self.observers.entries.lock().len())
            .finish()
    }
}

/// Keeps an observer subscribed until [`Subscription::unsubscribe`] is called or the guard is
/// dropped.
///
/// Unsubscribing is idempotent and safe after the subject itself has been dropped.
#[must_use = "dropping a subscription unsubscribes the observer"]
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send + 'static>>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    pub fn unsubscribe(&self) {
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.lock().is_none()
    }

    /// Runs `cleanup` after the observer is unsubscribed.
    ///
    /// On a closed subscription `cleanup` runs immediately.
    pub fn on_unsubscribe(self, cleanup: impl FnOnce() + Send + 'static) -> Self {
        let cancel = self.cancel.lock().take();
        match cancel {
            Some(cancel) => Subscription::new(move || {
                cancel();
                cleanup();
            }),
            None => {
                cleanup();
                self
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}
