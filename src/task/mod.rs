//! Task framework - Execution domains and observable asynchronous results
//!
//! Background work runs on the [`WorkerPool`]; every callback that touches
//! shared launcher state is serialized through the single-consumer
//! [`AffinityQueue`]. An [`ObservableFuture`] carries the result of a
//! background task to listeners scheduled on either domain.

mod executor;
mod future;
mod notify;

pub use executor::{AffinityDriver, AffinityQueue, DirectDispatcher, Dispatcher, Task, WorkerPool};
pub use future::{ObservableFuture, TaskOutcome};
pub use notify::{EventChannel, Subscription};
