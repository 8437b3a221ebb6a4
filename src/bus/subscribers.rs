use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Synchronous callback registry.
///
/// `notify` copies the callback list out of the lock before calling, so a
/// callback may subscribe, unsubscribe or trigger another notification.
pub struct SubscriberSet<T> {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(u64, Callback<T>)>>,
}

impl<T> Default for SubscriberSet<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            callbacks: Mutex::new(Vec::new()),
        }
    }
}

impl<T: 'static> SubscriberSet<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, callback: Callback<T>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, callback));
        id
    }

    pub fn remove(&self, id: u64) -> bool {
        let mut callbacks = self.lock();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub fn contains(&self, id: u64) -> bool {
        self.lock().iter().any(|(existing, _)| *existing == id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn notify(&self, value: &T) {
        let callbacks: Vec<(u64, Callback<T>)> = self.lock().clone();
        for (id, callback) in callbacks {
            // skip callbacks removed earlier in this round
            if self.contains(id) {
                callback(value);
            }
        }
    }

    /// Register `callback` and tie its lifetime to the returned handle.
    pub fn subscribe(self: &Arc<Self>, callback: Callback<T>) -> Subscription {
        let id = self.insert(callback);
        let set: Weak<Self> = Arc::downgrade(self);
        Subscription::new(id, move || {
            if let Some(set) = set.upgrade() {
                set.remove(id);
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Callback<T>)>> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by `subscribe`. Unsubscribes explicitly or on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(id: u64, cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    /// Keep the callback registered for the lifetime of its set.
    pub fn detach(mut self) {
        self.cancel = None;
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
