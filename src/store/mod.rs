//! Research state store.
//!
//! [`ResearchStore`] is the only writer of [`ResearchState`]: every mutation
//! is a [`ResearchAction`] run through [`reduce`]. It is constructed
//! explicitly and handed to whichever component needs it.

pub mod actions;
pub mod reducer;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, watch};

use crate::bus::{Callback, ChangeBus, StateChange, SubscriberSet, Subscription};
use crate::core::state::ResearchState;

pub use actions::ResearchAction;
pub use reducer::reduce;

struct StoreInner {
    state: ResearchState,
    /// Bumped on every accepted mutation; starts at 1.
    version: u64,
    disposed: bool,
}

/// A state together with the version it was committed at.
struct Delivery {
    version: u64,
    state: ResearchState,
}

pub struct ResearchStore {
    inner: Mutex<StoreInner>,
    subscribers: Arc<SubscriberSet<Delivery>>,
    changes: ChangeBus,
    watch_tx: watch::Sender<ResearchState>,
}

impl ResearchStore {
    pub fn new() -> Arc<Self> {
        Self::with_state(ResearchState::default())
    }

    pub fn with_state(state: ResearchState) -> Arc<Self> {
        let (watch_tx, _) = watch::channel(state.clone());
        Arc::new(Self {
            inner: Mutex::new(StoreInner {
                state,
                version: 1,
                disposed: false,
            }),
            subscribers: SubscriberSet::new(),
            changes: ChangeBus::new(),
            watch_tx,
        })
    }

    /// Apply one action. Returns true when the state changed, in which case
    /// every subscriber has seen this state or a newer one before returning.
    pub fn dispatch(&self, action: ResearchAction) -> bool {
        let name = action.name();
        let delivery = {
            let mut inner = self.lock();
            if inner.disposed {
                tracing::debug!(action = name, "dispatch on disposed store ignored");
                return false;
            }
            let next = reduce(inner.state.clone(), action);
            if next == inner.state {
                return false;
            }
            inner.state = next.clone();
            inner.version += 1;
            self.watch_tx.send_replace(next.clone());
            self.changes.publish(name, &next);
            Delivery {
                version: inner.version,
                state: next,
            }
        };

        tracing::trace!(action = name, version = delivery.version, "state updated");
        self.subscribers.notify(&delivery);
        true
    }

    /// Dispatch in order; true if any action changed the state.
    pub fn dispatch_all(&self, actions: impl IntoIterator<Item = ResearchAction>) -> bool {
        actions
            .into_iter()
            .fold(false, |changed, action| self.dispatch(action) || changed)
    }

    pub fn snapshot(&self) -> ResearchState {
        self.lock().state.clone()
    }

    /// Register a callback. It is called once immediately with the current
    /// state, then after every accepted mutation until the subscription is
    /// dropped or unsubscribed.
    ///
    /// A callback never sees an older state after a newer one. When a
    /// dispatch made from inside a callback has already delivered a newer
    /// state, the outer, older delivery is skipped.
    pub fn subscribe<F>(&self, on_state: F) -> Subscription
    where
        F: Fn(&ResearchState) + Send + Sync + 'static,
    {
        let last_seen = AtomicU64::new(0);
        let callback: Callback<Delivery> = Arc::new(move |delivery: &Delivery| {
            if last_seen.fetch_max(delivery.version, Ordering::AcqRel) < delivery.version {
                on_state(&delivery.state);
            }
        });
        let subscription = self.subscribers.subscribe(callback.clone());
        let current = {
            let inner = self.lock();
            Delivery {
                version: inner.version,
                state: inner.state.clone(),
            }
        };
        callback(&current);
        subscription
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Latest state for async consumers.
    pub fn watch(&self) -> watch::Receiver<ResearchState> {
        self.watch_tx.subscribe()
    }

    /// Every accepted mutation with its action name and sequence number.
    pub fn changes(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Drop all subscribers, return to defaults and ignore later dispatches.
    pub fn dispose(&self) {
        {
            let mut inner = self.lock();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.state = ResearchState::default();
            inner.version += 1;
            self.watch_tx.send_replace(ResearchState::default());
        }
        self.subscribers.clear();
        tracing::debug!("research store disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{Message, ResearchStatus, Role};
    use pretty_assertions::assert_eq;

    fn recorder(store: &ResearchStore) -> (Subscription, Arc<Mutex<Vec<ResearchState>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sub = store.subscribe(move |state: &ResearchState| {
            captured.lock().unwrap().push(state.clone())
        });
        (sub, seen)
    }

    #[test]
    fn subscriber_gets_current_state_then_every_change() {
        let store = ResearchStore::new();
        store.dispatch(ResearchAction::SetTopic("fusion".to_string()));

        let (_sub, seen) = recorder(&store);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(seen.lock().unwrap()[0].research_topic, "fusion");

        assert!(store.dispatch(ResearchAction::SetLoading(true)));
        assert!(!store.dispatch(ResearchAction::SetLoading(true)));
        assert!(!store.dispatch(ResearchAction::Unknown));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].is_loading);
    }

    #[test]
    fn late_subscriber_sees_terminal_state_immediately() {
        let store = ResearchStore::new();
        store.dispatch(ResearchAction::SetStatus(ResearchStatus::Completed));

        let (_sub, seen) = recorder(&store);
        assert_eq!(seen.lock().unwrap()[0].status, ResearchStatus::Completed);
    }

    #[test]
    fn unsubscribe_stops_delivery_for_that_subscriber_only() {
        let store = ResearchStore::new();
        let (first, seen_first) = recorder(&store);
        let (_second, seen_second) = recorder(&store);

        first.unsubscribe();
        store.dispatch(ResearchAction::SetCurrentStep(2));

        assert_eq!(seen_first.lock().unwrap().len(), 1);
        assert_eq!(seen_second.lock().unwrap().len(), 2);
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn callback_may_dispatch_and_unsubscribe_reentrantly() {
        let store = ResearchStore::new();
        let store_for_cb = store.clone();
        let _sub = store.subscribe(move |state: &ResearchState| {
            if state.is_loading && state.current_step == 0 {
                store_for_cb.dispatch(ResearchAction::SetCurrentStep(1));
            }
        });

        store.dispatch(ResearchAction::SetLoading(true));
        assert_eq!(store.snapshot().current_step, 1);
    }

    #[test]
    fn reentrant_dispatch_never_leaves_later_subscribers_behind() {
        let store = ResearchStore::new();
        let store_for_cb = store.clone();
        let _first = store.subscribe(move |state: &ResearchState| {
            if state.is_loading && state.current_step == 0 {
                store_for_cb.dispatch(ResearchAction::SetCurrentStep(1));
            }
        });
        let (_second, seen) = recorder(&store);

        store.dispatch(ResearchAction::SetLoading(true));

        assert_eq!(store.snapshot().current_step, 1);
        let steps: Vec<u32> = seen.lock().unwrap().iter().map(|s| s.current_step).collect();
        assert_eq!(steps, vec![0, 1]);
        assert!(seen.lock().unwrap().last().unwrap().is_loading);
    }

    #[test]
    fn dispose_resets_and_ignores_later_dispatches() {
        let store = ResearchStore::new();
        let (_sub, seen) = recorder(&store);
        store.dispatch(ResearchAction::AddMessage(Message::new("m", Role::User, "hi")));

        store.dispose();
        assert!(store.is_disposed());
        assert_eq!(store.snapshot(), ResearchState::default());
        assert_eq!(store.subscriber_count(), 0);
        assert!(!store.dispatch(ResearchAction::SetLoading(true)));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn watch_and_change_feed_follow_dispatches() {
        let store = ResearchStore::new();
        let mut watch = store.watch();
        let mut changes = store.changes();

        store.dispatch(ResearchAction::SetPlanId("p1".to_string()));

        watch.changed().await.unwrap();
        assert_eq!(watch.borrow().plan_id.as_deref(), Some("p1"));
        let change = changes.recv().await.unwrap();
        assert_eq!(change.action, "SET_PLAN_ID");
        assert_eq!(change.seq, 0);
    }
}
