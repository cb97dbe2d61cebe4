//! Background operations over the instance list.
//!
//! Work runs on the worker pool; the registry is only ever touched from
//! the affinity queue. Completion is reported through observable futures,
//! change notification through a typed event channel.

use std::fs;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context};
use tracing::info;

use crate::core::instance::{Instance, InstanceRegistry};
use crate::task::{AffinityQueue, Dispatcher, EventChannel, ObservableFuture, WorkerPool};

/// Produces the instance collection, e.g. from a remote listing plus the
/// local instances directory. Manifest parsing lives behind this trait.
pub trait InstanceSource: Send + Sync {
    fn load(&self) -> anyhow::Result<Vec<Instance>>;
}

/// Change notification published after a registry mutation.
#[derive(Debug, Clone)]
pub enum InstanceEvent {
    Reloaded { count: usize },
    Removed { title: String },
}

/// Launcher-state operations driven through the task framework.
pub struct InstanceTasks {
    workers: Arc<WorkerPool>,
    affinity: AffinityQueue,
    registry: Arc<RwLock<InstanceRegistry>>,
    events: Arc<EventChannel<InstanceEvent>>,
}

impl InstanceTasks {
    pub fn new(
        workers: Arc<WorkerPool>,
        affinity: AffinityQueue,
        registry: Arc<RwLock<InstanceRegistry>>,
    ) -> Self {
        Self {
            workers,
            affinity,
            registry,
            events: Arc::new(EventChannel::new()),
        }
    }

    /// Registry change notifications.
    pub fn events(&self) -> Arc<EventChannel<InstanceEvent>> {
        Arc::clone(&self.events)
    }

    /// Reload the instance list on a worker thread and apply it on the
    /// affinity queue. The future resolves with the loaded count once the
    /// application has been scheduled.
    pub fn reload(&self, source: Arc<dyn InstanceSource>) -> ObservableFuture<usize> {
        let registry = Arc::clone(&self.registry);
        let affinity = self.affinity.clone();
        let events = Arc::clone(&self.events);
        self.workers.submit(move || {
            let instances = source.load().context("failed to load instance list")?;
            let count = instances.len();
            info!(count, "instance list loaded");
            affinity.dispatch(Box::new(move || {
                let mut registry = registry.write().expect("instance registry poisoned");
                registry.replace_all(instances);
                registry.sort();
                drop(registry);
                events.publish(InstanceEvent::Reloaded { count });
            }));
            Ok(count)
        })
    }

    /// Delete an instance's files on a worker thread, then drop it from
    /// the registry on the affinity queue.
    pub fn delete(&self, index: usize) -> ObservableFuture<Instance> {
        let target = {
            let registry = self.registry.read().expect("instance registry poisoned");
            registry.get(index).cloned()
        };
        let Some(target) = target else {
            let future = ObservableFuture::new();
            future.fail(anyhow!("no instance at index {index}"));
            return future;
        };

        let registry = Arc::clone(&self.registry);
        let affinity = self.affinity.clone();
        let events = Arc::clone(&self.events);
        self.workers.submit(move || {
            if target.content_dir.exists() {
                fs::remove_dir_all(&target.content_dir).with_context(|| {
                    format!("failed to delete {}", target.content_dir.display())
                })?;
            }
            info!(instance = %target.title, "instance files deleted");

            let removed = target.clone();
            affinity.dispatch(Box::new(move || {
                let mut registry = registry.write().expect("instance registry poisoned");
                if let Some(position) = registry.position(&removed.content_dir) {
                    registry.remove(position);
                }
                drop(registry);
                events.publish(InstanceEvent::Removed {
                    title: removed.title,
                });
            }));
            Ok(target)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::AffinityDriver;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    struct FixedSource {
        instances: Vec<Instance>,
    }

    impl InstanceSource for FixedSource {
        fn load(&self) -> anyhow::Result<Vec<Instance>> {
            Ok(self.instances.clone())
        }
    }

    struct BrokenSource;

    impl InstanceSource for BrokenSource {
        fn load(&self) -> anyhow::Result<Vec<Instance>> {
            Err(anyhow!("listing unreachable"))
        }
    }

    fn harness() -> (InstanceTasks, Arc<RwLock<InstanceRegistry>>, AffinityDriver) {
        let (affinity, driver) = AffinityQueue::new();
        let registry = Arc::new(RwLock::new(InstanceRegistry::new()));
        let tasks = InstanceTasks::new(
            Arc::new(WorkerPool::new(2)),
            affinity,
            Arc::clone(&registry),
        );
        (tasks, registry, driver)
    }

    fn drain_until(driver: &AffinityDriver, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            driver.drain();
            assert!(Instant::now() < deadline, "affinity work never arrived");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn temp_content_dir() -> PathBuf {
        std::env::temp_dir().join(format!("packlaunch-test-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn reload_applies_sorted_list_and_publishes_event() {
        let (tasks, registry, driver) = harness();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let events = tasks.events();
        let log = Arc::clone(&seen);
        events.subscribe(Arc::new(crate::task::DirectDispatcher), move |event| {
            if let InstanceEvent::Reloaded { count } = event {
                log.lock().unwrap().push(*count);
            }
        });

        let source = Arc::new(FixedSource {
            instances: vec![
                Instance::new("Beta", "/instances/beta"),
                Instance::new("Alpha", "/instances/alpha"),
            ],
        });
        let future = tasks.reload(source);
        assert_eq!(future.wait().value().as_deref(), Some(&2));

        drain_until(&driver, || registry.read().unwrap().len() == 2);
        assert_eq!(registry.read().unwrap().get(0).unwrap().title, "Alpha");
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn reload_failure_leaves_registry_untouched() {
        let (tasks, registry, driver) = harness();
        let future = tasks.reload(Arc::new(BrokenSource));
        let outcome = future.wait();
        assert!(outcome.is_failure());
        driver.drain();
        assert!(registry.read().unwrap().is_empty());
    }

    #[test]
    fn delete_removes_files_then_registry_entry() {
        let (tasks, registry, driver) = harness();
        let content_dir = temp_content_dir();
        fs::create_dir_all(content_dir.join("mods")).unwrap();

        registry
            .write()
            .unwrap()
            .push(Instance::new("Doomed", &content_dir));

        let future = tasks.delete(0);
        let outcome = future.wait();
        assert_eq!(outcome.value().unwrap().title, "Doomed");
        assert!(!content_dir.exists());

        drain_until(&driver, || registry.read().unwrap().is_empty());
    }

    #[test]
    fn delete_with_invalid_index_fails_immediately() {
        let (tasks, _registry, _driver) = harness();
        let future = tasks.delete(3);
        let outcome = future.outcome().expect("future should already be terminal");
        assert!(outcome.is_failure());
    }
}
