//! Typed notification channels with explicit subscribe/unsubscribe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::executor::Dispatcher;

/// Token controlling delivery of a registered callback.
///
/// Delivery stops as soon as [`cancel`](Self::cancel) is called, even for
/// callbacks already scheduled but not yet run. Dropping the token does
/// not unsubscribe; cancellation is always explicit.
#[derive(Debug, Clone)]
pub struct Subscription {
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

struct Entry<E> {
    active: Arc<AtomicBool>,
    dispatcher: Arc<dyn Dispatcher>,
    callback: Arc<dyn Fn(&E) + Send + Sync>,
}

impl<E> Clone for Entry<E> {
    fn clone(&self) -> Self {
        Self {
            active: Arc::clone(&self.active),
            dispatcher: Arc::clone(&self.dispatcher),
            callback: Arc::clone(&self.callback),
        }
    }
}

/// A typed event channel.
///
/// Subscribers register a callback paired with the execution domain it
/// should run on; publishing schedules one invocation per live subscriber
/// with a clone of the event.
pub struct EventChannel<E> {
    entries: Mutex<Vec<Entry<E>>>,
}

impl<E: Clone + Send + Sync + 'static> EventChannel<E> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register `callback` to run on `dispatcher` for every published
    /// event, until the returned token is cancelled.
    pub fn subscribe<F>(&self, dispatcher: Arc<dyn Dispatcher>, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let subscription = Subscription::new();
        let entry = Entry {
            active: Arc::clone(&subscription.active),
            dispatcher,
            callback: Arc::new(callback),
        };
        self.entries
            .lock()
            .expect("subscriber list poisoned")
            .push(entry);
        subscription
    }

    /// Deliver `event` to every live subscriber on its own dispatcher.
    pub fn publish(&self, event: E) {
        let entries: Vec<Entry<E>> = {
            let mut entries = self.entries.lock().expect("subscriber list poisoned");
            entries.retain(|entry| entry.active.load(Ordering::SeqCst));
            entries.clone()
        };
        for entry in entries {
            let active = Arc::clone(&entry.active);
            let callback = Arc::clone(&entry.callback);
            let event = event.clone();
            entry.dispatcher.dispatch(Box::new(move || {
                if active.load(Ordering::SeqCst) {
                    callback(&event);
                }
            }));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut entries = self.entries.lock().expect("subscriber list poisoned");
        entries.retain(|entry| entry.active.load(Ordering::SeqCst));
        entries.len()
    }
}

impl<E: Clone + Send + Sync + 'static> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::executor::DirectDispatcher;
    use std::sync::atomic::AtomicUsize;

    fn direct() -> Arc<dyn Dispatcher> {
        Arc::new(DirectDispatcher)
    }

    #[test]
    fn publish_delivers_to_every_subscriber() {
        let channel: EventChannel<u32> = EventChannel::new();
        let seen = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let seen = Arc::clone(&seen);
            channel.subscribe(direct(), move |event| {
                assert_eq!(*event, 7);
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }
        channel.publish(7);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn cancelled_subscription_stops_delivery() {
        let channel: EventChannel<&'static str> = EventChannel::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&seen);
        let subscription = channel.subscribe(direct(), move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        channel.publish("one");
        subscription.cancel();
        channel.publish("two");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancelled_entries_are_pruned() {
        let channel: EventChannel<u32> = EventChannel::new();
        let first = channel.subscribe(direct(), |_| {});
        let _second = channel.subscribe(direct(), |_| {});
        assert_eq!(channel.subscriber_count(), 2);
        first.cancel();
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[test]
    fn dropping_the_token_does_not_unsubscribe() {
        let channel: EventChannel<u32> = EventChannel::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&seen);
        let subscription = channel.subscribe(direct(), move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        drop(subscription);
        channel.publish(1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
