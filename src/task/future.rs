//! Single-assignment asynchronous results with listener notification.

use std::sync::{Arc, Condvar, Mutex};

use super::executor::{Dispatcher, Task};

/// Final outcome of an asynchronous task.
///
/// Success values and errors are reference-counted so the same outcome can
/// be handed to every listener.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Succeeded(Arc<T>),
    Failed(Arc<anyhow::Error>),
    Cancelled,
}

impl<T> TaskOutcome<T> {
    /// The success value, if any.
    pub fn value(&self) -> Option<Arc<T>> {
        match self {
            Self::Succeeded(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl<T> Clone for TaskOutcome<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Succeeded(value) => Self::Succeeded(Arc::clone(value)),
            Self::Failed(error) => Self::Failed(Arc::clone(error)),
            Self::Cancelled => Self::Cancelled,
        }
    }
}

type Listener<T> = Box<dyn FnOnce(TaskOutcome<T>) + Send>;

enum State<T> {
    Pending {
        listeners: Vec<(Listener<T>, Arc<dyn Dispatcher>)>,
    },
    Done(TaskOutcome<T>),
}

struct Shared<T> {
    state: Mutex<State<T>>,
    done: Condvar,
}

/// A single-assignment asynchronous result.
///
/// Exactly one of [`complete`](Self::complete), [`fail`](Self::fail) or
/// [`cancel`](Self::cancel) takes effect; later transition attempts are
/// ignored. Listeners registered before completion are scheduled at the
/// terminal transition; listeners registered after it are scheduled
/// immediately. Every listener runs exactly once with the final outcome,
/// on the dispatcher it was registered with.
pub struct ObservableFuture<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ObservableFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + Sync + 'static> ObservableFuture<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Pending {
                    listeners: Vec::new(),
                }),
                done: Condvar::new(),
            }),
        }
    }

    /// Resolve with a success value. Returns whether this call won the
    /// transition.
    pub fn complete(&self, value: T) -> bool {
        self.finish(TaskOutcome::Succeeded(Arc::new(value)))
    }

    /// Resolve with a failure. Returns whether this call won the transition.
    pub fn fail(&self, error: anyhow::Error) -> bool {
        self.finish(TaskOutcome::Failed(Arc::new(error)))
    }

    /// Mark cancelled. Cancellation is cooperative: work already in flight
    /// keeps running unless it polls [`is_cancelled`](Self::is_cancelled),
    /// and its eventual completion attempt becomes a no-op.
    pub fn cancel(&self) -> bool {
        self.finish(TaskOutcome::Cancelled)
    }

    /// Register a callback to run on `dispatcher` once the future is
    /// terminal.
    pub fn add_listener<F>(&self, dispatcher: Arc<dyn Dispatcher>, listener: F)
    where
        F: FnOnce(TaskOutcome<T>) + Send + 'static,
    {
        let outcome = {
            let mut state = self.shared.state.lock().expect("future state poisoned");
            match &mut *state {
                State::Pending { listeners } => {
                    listeners.push((Box::new(listener), dispatcher));
                    return;
                }
                State::Done(outcome) => outcome.clone(),
            }
        };
        let task: Task = Box::new(move || listener(outcome));
        dispatcher.dispatch(task);
    }

    /// Block the calling thread until the future is terminal.
    ///
    /// Only worker-domain threads may wait; the affinity consumer must
    /// never block here.
    pub fn wait(&self) -> TaskOutcome<T> {
        let mut state = self.shared.state.lock().expect("future state poisoned");
        loop {
            if let State::Done(outcome) = &*state {
                return outcome.clone();
            }
            state = self
                .shared
                .done
                .wait(state)
                .expect("future state poisoned");
        }
    }

    /// The terminal outcome, if any.
    pub fn outcome(&self) -> Option<TaskOutcome<T>> {
        let state = self.shared.state.lock().expect("future state poisoned");
        match &*state {
            State::Done(outcome) => Some(outcome.clone()),
            State::Pending { .. } => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.outcome().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome(), Some(TaskOutcome::Cancelled))
    }

    fn finish(&self, outcome: TaskOutcome<T>) -> bool {
        let listeners = {
            let mut state = self.shared.state.lock().expect("future state poisoned");
            let drained = match &mut *state {
                State::Done(_) => return false,
                State::Pending { listeners } => std::mem::take(listeners),
            };
            *state = State::Done(outcome.clone());
            drained
        };
        self.shared.done.notify_all();
        for (listener, dispatcher) in listeners {
            let outcome = outcome.clone();
            dispatcher.dispatch(Box::new(move || listener(outcome)));
        }
        true
    }
}

impl<T: Send + Sync + 'static> Default for ObservableFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::executor::DirectDispatcher;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn direct() -> Arc<dyn Dispatcher> {
        Arc::new(DirectDispatcher)
    }

    #[test]
    fn first_transition_wins() {
        let future: ObservableFuture<u32> = ObservableFuture::new();
        assert!(future.complete(1));
        assert!(!future.complete(2));
        assert!(!future.fail(anyhow::anyhow!("late")));
        assert!(!future.cancel());
        assert_eq!(future.outcome().unwrap().value().as_deref(), Some(&1));
    }

    #[test]
    fn fail_then_complete_keeps_failure() {
        let future: ObservableFuture<u32> = ObservableFuture::new();
        assert!(future.fail(anyhow::anyhow!("boom")));
        assert!(!future.complete(7));
        let outcome = future.outcome().unwrap();
        assert!(outcome.is_failure());
        assert_eq!(outcome.error().unwrap().to_string(), "boom");
    }

    #[test]
    fn cancel_is_terminal_and_observable() {
        let future: ObservableFuture<u32> = ObservableFuture::new();
        assert!(future.cancel());
        assert!(future.is_cancelled());
        assert!(!future.complete(3));
        assert!(future.is_cancelled());
    }

    #[test]
    fn listener_registered_before_completion_fires_once() {
        let future: ObservableFuture<u32> = ObservableFuture::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&fired);
        future.add_listener(direct(), move |outcome| {
            assert_eq!(outcome.value().as_deref(), Some(&42));
            count.fetch_add(1, Ordering::SeqCst);
        });
        future.complete(42);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_registered_after_completion_fires_immediately() {
        let future: ObservableFuture<u32> = ObservableFuture::new();
        future.complete(9);
        let fired = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&fired);
        future.add_listener(direct(), move |outcome| {
            assert_eq!(outcome.value().as_deref(), Some(&9));
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_registration_delivers_exactly_once_each() {
        let future: ObservableFuture<u32> = ObservableFuture::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let future = future.clone();
            let fired = Arc::clone(&fired);
            handles.push(thread::spawn(move || {
                future.add_listener(Arc::new(DirectDispatcher), move |outcome| {
                    assert_eq!(outcome.value().as_deref(), Some(&5));
                    fired.fetch_add(1, Ordering::SeqCst);
                });
            }));
        }

        let completer = {
            let future = future.clone();
            thread::spawn(move || {
                future.complete(5);
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        completer.join().unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn wait_blocks_until_completion() {
        let future: ObservableFuture<&'static str> = ObservableFuture::new();
        let waiter = {
            let future = future.clone();
            thread::spawn(move || future.wait())
        };
        thread::sleep(std::time::Duration::from_millis(20));
        future.complete("done");
        let outcome = waiter.join().unwrap();
        assert_eq!(outcome.value().as_deref(), Some(&"done"));
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let future: ObservableFuture<u32> = ObservableFuture::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            future.add_listener(direct(), move |_| {
                order.lock().unwrap().push(tag);
            });
        }
        future.complete(0);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }
}
