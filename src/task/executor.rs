//! Execution domains - Worker pool and single-consumer affinity queue
//!
//! The worker pool runs arbitrary blocking work concurrently. The affinity
//! queue is the sole synchronization boundary between background results
//! and mutable launcher state: its callbacks run on exactly one logical
//! consumer, in submission order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::anyhow;
use tracing::{error, trace};

use super::future::ObservableFuture;

/// A unit of work runnable on an execution domain.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Schedules tasks onto an execution domain.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, task: Task);
}

/// Runs tasks on the calling thread, immediately.
///
/// Useful when the caller is already on the right domain, and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDispatcher;

impl Dispatcher for DirectDispatcher {
    fn dispatch(&self, task: Task) {
        run_task(task);
    }
}

/// Concurrent pool of worker threads for blocking background work.
///
/// Tasks are unordered relative to each other. A failing or panicking task
/// never unwinds a pool thread; failures are captured into the task's
/// future by [`submit`](Self::submit).
pub struct WorkerPool {
    tx: Sender<Task>,
}

impl WorkerPool {
    /// Start a pool with `threads` worker threads (at least one).
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let (tx, rx) = channel::<Task>();
        let rx = Arc::new(Mutex::new(rx));
        for index in 0..threads {
            let rx = Arc::clone(&rx);
            thread::Builder::new()
                .name(format!("worker-{index}"))
                .spawn(move || worker_loop(rx))
                .expect("failed to spawn worker thread");
        }
        Self { tx }
    }

    /// Run `job` on a worker thread, capturing its result into the
    /// returned future. Errors and panics become the future's failed
    /// state; they never propagate on the worker thread.
    pub fn submit<T, F>(&self, job: F) -> ObservableFuture<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let future = ObservableFuture::new();
        let completion = future.clone();
        self.dispatch(Box::new(move || {
            match catch_unwind(AssertUnwindSafe(job)) {
                Ok(Ok(value)) => {
                    completion.complete(value);
                }
                Ok(Err(error)) => {
                    completion.fail(error);
                }
                Err(panic) => {
                    completion.fail(anyhow!("task panicked: {}", panic_message(&panic)));
                }
            }
        }));
        future
    }
}

impl Dispatcher for WorkerPool {
    fn dispatch(&self, task: Task) {
        if self.tx.send(task).is_err() {
            error!("worker pool is shut down; dropping task");
        }
    }
}

fn worker_loop(rx: Arc<Mutex<Receiver<Task>>>) {
    loop {
        let task = {
            let queue = rx.lock().expect("worker queue poisoned");
            match queue.recv() {
                Ok(task) => task,
                Err(_) => break,
            }
        };
        run_task(task);
    }
    trace!("worker thread exiting");
}

/// Sending half of the affinity queue.
///
/// Clone freely; every callback dispatched through any clone is drained by
/// the single [`AffinityDriver`], in submission order. All registry and
/// other UI-owned state mutation must go through here.
pub struct AffinityQueue {
    tx: Sender<Task>,
}

impl AffinityQueue {
    /// Create the queue, returning the sending handle and its single
    /// consumer.
    pub fn new() -> (AffinityQueue, AffinityDriver) {
        let (tx, rx) = channel::<Task>();
        (AffinityQueue { tx }, AffinityDriver { rx })
    }
}

impl Clone for AffinityQueue {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl Dispatcher for AffinityQueue {
    fn dispatch(&self, task: Task) {
        if self.tx.send(task).is_err() {
            error!("affinity consumer is gone; dropping callback");
        }
    }
}

/// The single consumer of the affinity queue.
///
/// Integrate [`drain`](Self::drain) into a host event loop, or hand the
/// driver its own thread with [`spawn`](Self::spawn). There is exactly one
/// driver per queue; the compiler enforces it by ownership.
pub struct AffinityDriver {
    rx: Receiver<Task>,
}

impl AffinityDriver {
    /// Run every callback queued so far. Returns how many ran.
    pub fn drain(&self) -> usize {
        let mut count = 0;
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    run_task(task);
                    count += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        count
    }

    /// Serve callbacks in submission order until every queue handle has
    /// been dropped.
    pub fn run(self) {
        while let Ok(task) = self.rx.recv() {
            run_task(task);
        }
        trace!("affinity consumer exiting");
    }

    /// Serve callbacks on a dedicated thread.
    pub fn spawn(self) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name("affinity".to_string())
            .spawn(move || self.run())
            .expect("failed to spawn affinity thread")
    }
}

fn run_task(task: Task) {
    if catch_unwind(AssertUnwindSafe(task)).is_err() {
        error!("task panicked; consumer thread continues");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
