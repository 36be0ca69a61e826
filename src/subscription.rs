//! Push Subscriptions
//!
//! Reactive sources (the live feed, settings documents, the signed-in user)
//! push `Delivery` values into a caller-supplied sink until the returned
//! `Subscription` is cancelled.
//!
//! ## Guarantees
//!
//! - Deliveries from one subscription arrive in source order.
//! - `Subscription::cancel()` is synchronous: once it returns, any sink call
//!   in progress has finished and the sink is never called again. It is
//!   idempotent and also runs on drop. A sink must not cancel its own
//!   subscription; it closes it through [`Subscription::closer`] instead.
//! - An error delivery is terminal: the subscription closes itself after
//!   forwarding it.
//! - Every source counts its open subscriptions (`SubscriberCount`), so
//!   teardown can be observed from the outside.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One push from a reactive source
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
    /// A new value
    Value(T),
    /// The source failed; nothing follows
    Error(String),
}

impl<T> Delivery<T> {
    pub fn is_error(&self) -> bool {
        matches!(self, Delivery::Error(_))
    }
}

/// Receiver side of a subscription
pub type Sink<T> = Arc<dyn Fn(Delivery<T>) + Send + Sync>;

/// Build a sink from a closure
pub fn sink<T, F>(f: F) -> Sink<T>
where
    F: Fn(Delivery<T>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Number of open subscriptions on a source
#[derive(Debug, Clone, Default)]
pub struct SubscriberCount(Arc<AtomicUsize>);

impl SubscriberCount {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn open(&self) -> Arc<Link> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Arc::new(Link {
            active: AtomicBool::new(true),
            count: Arc::clone(&self.0),
            delivering: Mutex::new(()),
        })
    }
}

/// Shared open/closed state between a handle and its forwarding task
#[derive(Debug)]
struct Link {
    active: AtomicBool,
    count: Arc<AtomicUsize>,
    /// Held for the length of each sink call
    delivering: Mutex<()>,
}

impl Link {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Run `f` if still open. Returns false without running it when closed.
    fn deliver(&self, f: impl FnOnce()) -> bool {
        let _delivering = self.delivering.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_active() {
            return false;
        }
        f();
        true
    }

    /// Close once no sink call is in progress
    fn close_between_deliveries(&self) -> bool {
        let _delivering = self.delivering.lock().unwrap_or_else(PoisonError::into_inner);
        self.close()
    }

    /// Returns true on the first close only
    fn close(&self) -> bool {
        if self.active.swap(false, Ordering::SeqCst) {
            self.count.fetch_sub(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }
}

/// Closes a subscription from inside its own sink
#[derive(Debug, Clone)]
pub struct Closer(Arc<Link>);

impl Closer {
    pub fn close(&self) {
        self.0.close();
    }
}

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle for an open subscription
pub struct Subscription {
    link: Arc<Link>,
    task: Option<JoinHandle<()>>,
    teardown: Option<Teardown>,
}

impl Subscription {
    /// Stop deliveries. Safe to call more than once.
    pub fn cancel(&mut self) {
        if self.link.close_between_deliveries() {
            tracing::trace!("Subscription cancelled");
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    /// Still delivering (not cancelled, not failed, not self-closed)
    pub fn is_active(&self) -> bool {
        self.link.is_active()
    }

    pub fn closer(&self) -> Closer {
        Closer(Arc::clone(&self.link))
    }

    /// Run `f` synchronously when the subscription is cancelled
    fn on_cancel(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.teardown = Some(Box::new(f));
        self
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Forward the current value of a watch channel, then every change, to `sink`.
///
/// When the sender goes away the sink receives one final error.
pub fn from_watch<T>(
    count: &SubscriberCount,
    mut rx: watch::Receiver<Delivery<T>>,
    sink: Sink<T>,
) -> Subscription
where
    T: Clone + Send + Sync + 'static,
{
    let link = count.open();
    let task_link = Arc::clone(&link);

    let task = tokio::spawn(async move {
        loop {
            let delivery = rx.borrow_and_update().clone();
            let terminal = delivery.is_error();
            if !task_link.deliver(|| sink(delivery)) {
                break;
            }
            if terminal {
                task_link.close();
                break;
            }

            if rx.changed().await.is_err() {
                if task_link.deliver(|| sink(Delivery::Error("source closed".to_string()))) {
                    task_link.close();
                }
                break;
            }
        }
    });

    Subscription {
        link,
        task: Some(task),
        teardown: None,
    }
}

/// Follow a changing key: whenever `keys` changes, drop the inner subscription
/// and open a new one with `open`.
///
/// `open` returns `None` when there is nothing to subscribe to for a key; the
/// sink then receives `Value(None)` directly.
pub fn switch_map<K, T, F>(
    mut keys: watch::Receiver<Option<K>>,
    sink: Sink<Option<T>>,
    open: F,
) -> Subscription
where
    K: Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
    F: Fn(&K, Sink<Option<T>>) -> Subscription + Send + Sync + 'static,
{
    let outer = SubscriberCount::default();
    let link = outer.open();
    let task_link = Arc::clone(&link);
    let inner: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let task_inner = Arc::clone(&inner);

    let task = tokio::spawn(async move {
        loop {
            let key = keys.borrow_and_update().clone();

            // Drop the previous inner subscription before opening the next.
            let previous = match task_inner.lock() {
                Ok(mut slot) => slot.take(),
                Err(_) => None,
            };
            drop(previous);

            match key {
                Some(key) => {
                    let sub = open(&key, Arc::clone(&sink));
                    if let Ok(mut slot) = task_inner.lock() {
                        if task_link.is_active() {
                            *slot = Some(sub);
                        }
                    }
                }
                None => {
                    task_link.deliver(|| sink(Delivery::Value(None)));
                }
            }

            if !task_link.is_active() || keys.changed().await.is_err() {
                break;
            }
        }
    });

    Subscription {
        link,
        task: Some(task),
        teardown: None,
    }
    .on_cancel(move || {
        let current = match inner.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        drop(current);
    })
}

/// Subscribe with a listener that only sees the first value accepted by
/// `filter` (or the first error), then closes itself.
pub fn first_matching<T, U, S, F>(subscribe: S, filter: F, sink: Sink<U>) -> Subscription
where
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
    S: FnOnce(Sink<T>) -> Subscription,
    F: Fn(T) -> Option<U> + Send + Sync + 'static,
{
    let fired = Arc::new(AtomicBool::new(false));
    let closer: Arc<Mutex<Option<Closer>>> = Arc::new(Mutex::new(None));

    let listener: Sink<T> = {
        let fired = Arc::clone(&fired);
        let closer = Arc::clone(&closer);
        Arc::new(move |delivery: Delivery<T>| {
            let delivery = match delivery {
                Delivery::Value(v) => match filter(v) {
                    Some(u) => Delivery::Value(u),
                    None => return,
                },
                Delivery::Error(e) => Delivery::Error(e),
            };

            if fired.swap(true, Ordering::SeqCst) {
                return;
            }
            sink(delivery);

            if let Ok(slot) = closer.lock() {
                if let Some(closer) = slot.as_ref() {
                    closer.close();
                }
            }
        })
    };

    let subscription = subscribe(listener);
    if let Ok(mut slot) = closer.lock() {
        *slot = Some(subscription.closer());
    }
    // The first match may have landed before the closer was installed.
    if fired.load(Ordering::SeqCst) {
        subscription.closer().close();
    }

    subscription
}
