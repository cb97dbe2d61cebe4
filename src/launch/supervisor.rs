//! Launch orchestration - Update sequencing, spawn, output wiring and
//! lifecycle notification.

use std::sync::{Arc, Mutex, RwLock};

use anyhow::Result;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::{Environment, Instance, InstanceRegistry, LauncherConfig};
use crate::error::LaunchError;
use crate::task::{
    AffinityQueue, Dispatcher, ObservableFuture, Subscription, TaskOutcome, WorkerPool,
};

use super::command::CommandBuilder;
use super::console::{ConsoleSink, PassThroughSink};
use super::process::{ProcessController, ProcessExit};
use super::pump::{OutputPump, OutputSink, StreamSource};

/// Checks for and applies instance updates ahead of a launch.
pub trait Updater: Send + Sync {
    /// Whether an update beyond the instance's own pending flag is known.
    fn check_pending(&self, instance: &Instance) -> bool;

    /// Apply the update, resolving with the refreshed instance record.
    fn perform_update(&self, instance: &Instance) -> ObservableFuture<Instance>;
}

/// Lifecycle callbacks, invoked strictly on the affinity queue.
pub trait LaunchListener: Send + Sync {
    /// Instance state changed as a side effect of the launch sequence.
    fn instances_updated(&self);

    /// The game process spawned; fired before the supervisor blocks on
    /// exit.
    fn game_started(&self);

    /// The game process ended. Fired exactly once per successful spawn,
    /// including abnormal exits.
    fn game_closed(&self);
}

/// Progress of a single launch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Idle,
    CheckingUpdate,
    Building,
    Aborted,
    Spawning,
    Running,
    SpawnFailed,
    Exited,
}

impl LaunchState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CheckingUpdate => "checking-update",
            Self::Building => "building",
            Self::Aborted => "aborted",
            Self::Spawning => "spawning",
            Self::Running => "running",
            Self::SpawnFailed => "spawn-failed",
            Self::Exited => "exited",
        }
    }
}

struct Attempt {
    id: Uuid,
    state: LaunchState,
}

impl Attempt {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: LaunchState::Idle,
        }
    }

    fn advance(&mut self, next: LaunchState) {
        debug!(attempt = %self.id, from = self.state.label(), to = next.label(), "launch state");
        self.state = next;
    }
}

/// Handle to a running launch attempt.
pub struct LaunchHandle {
    /// Resolves with the process exit once the attempt finishes; a failed
    /// update, build or spawn resolves it with the failure instead.
    pub exit: ObservableFuture<ProcessExit>,
    subscription: Subscription,
}

impl LaunchHandle {
    /// Stop delivering lifecycle callbacks, e.g. because the owning view
    /// was disposed. The attempt itself keeps running.
    pub fn cancel_listener(&self) {
        self.subscription.cancel();
    }

    pub fn listener_active(&self) -> bool {
        self.subscription.is_active()
    }
}

#[derive(Clone)]
struct GuardedListener {
    inner: Arc<dyn LaunchListener>,
    subscription: Subscription,
}

impl GuardedListener {
    fn instances_updated(&self) {
        if self.subscription.is_active() {
            self.inner.instances_updated();
        }
    }

    fn game_started(&self) {
        if self.subscription.is_active() {
            self.inner.game_started();
        }
    }

    fn game_closed(&self) {
        if self.subscription.is_active() {
            self.inner.game_closed();
        }
    }
}

struct AttemptContext {
    affinity: AffinityQueue,
    registry: Arc<RwLock<InstanceRegistry>>,
    updater: Arc<dyn Updater>,
    builder: Arc<dyn CommandBuilder>,
    config: LauncherConfig,
    console_slot: Arc<Mutex<Option<Arc<ConsoleSink>>>>,
}

/// Drives the update-then-launch sequence for one instance at a time.
///
/// The whole attempt runs on a worker thread; the registry write-back and
/// every listener callback are dispatched onto the affinity queue.
pub struct LaunchSupervisor {
    workers: Arc<WorkerPool>,
    affinity: AffinityQueue,
    registry: Arc<RwLock<InstanceRegistry>>,
    updater: Arc<dyn Updater>,
    builder: Arc<dyn CommandBuilder>,
    config: LauncherConfig,
    environment: Environment,
    console_slot: Arc<Mutex<Option<Arc<ConsoleSink>>>>,
}

impl LaunchSupervisor {
    pub fn new(
        workers: Arc<WorkerPool>,
        affinity: AffinityQueue,
        registry: Arc<RwLock<InstanceRegistry>>,
        updater: Arc<dyn Updater>,
        builder: Arc<dyn CommandBuilder>,
        config: LauncherConfig,
        environment: Environment,
    ) -> Self {
        Self {
            workers,
            affinity,
            registry,
            updater,
            builder,
            config,
            environment,
            console_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// The most recently attached buffered console, if any. Content is
    /// preserved after the process detaches.
    pub fn console(&self) -> Option<Arc<ConsoleSink>> {
        self.console_slot
            .lock()
            .expect("console slot poisoned")
            .clone()
    }

    /// Start a launch attempt for `instance`.
    ///
    /// When an update is pending and `permit_update` is set, the update
    /// runs to completion first; its failure aborts the attempt before any
    /// process is spawned. Lifecycle callbacks arrive on the affinity
    /// queue until the handle's subscription is cancelled.
    pub fn launch(
        &self,
        instance: &Instance,
        permit_update: bool,
        listener: Arc<dyn LaunchListener>,
    ) -> LaunchHandle {
        let attempt = Attempt::new();
        info!(
            attempt = %attempt.id,
            instance = %instance.title,
            platform = self.environment.platform.label(),
            permit_update,
            "launch requested"
        );

        let subscription = Subscription::new();
        let listener = GuardedListener {
            inner: listener,
            subscription: subscription.clone(),
        };
        let context = AttemptContext {
            affinity: self.affinity.clone(),
            registry: Arc::clone(&self.registry),
            updater: Arc::clone(&self.updater),
            builder: Arc::clone(&self.builder),
            config: self.config.clone(),
            console_slot: Arc::clone(&self.console_slot),
        };
        let instance = instance.clone();

        let exit = self
            .workers
            .submit(move || run_attempt(attempt, context, instance, permit_update, listener));

        LaunchHandle { exit, subscription }
    }
}

fn run_attempt(
    mut attempt: Attempt,
    context: AttemptContext,
    mut instance: Instance,
    permit_update: bool,
    listener: GuardedListener,
) -> Result<ProcessExit> {
    attempt.advance(LaunchState::CheckingUpdate);
    let wants_update = instance.update_pending || context.updater.check_pending(&instance);
    if permit_update && wants_update && instance.can_update() {
        info!(instance = %instance.title, "applying pending update before launch");
        match context.updater.perform_update(&instance).wait() {
            TaskOutcome::Succeeded(updated) => {
                instance = (*updated).clone();
                instance.update_pending = false;
                instance.installed = true;
                instance.local = true;

                let applied = instance.clone();
                let registry = Arc::clone(&context.registry);
                let listener = listener.clone();
                context.affinity.dispatch(Box::new(move || {
                    let mut registry = registry.write().expect("instance registry poisoned");
                    registry.apply(applied);
                    drop(registry);
                    listener.instances_updated();
                }));
            }
            TaskOutcome::Failed(error) => {
                attempt.advance(LaunchState::Aborted);
                warn!(instance = %instance.title, %error, "update failed; launch aborted");
                return Err(LaunchError::Update(error).into());
            }
            TaskOutcome::Cancelled => {
                attempt.advance(LaunchState::Aborted);
                info!(instance = %instance.title, "update cancelled; launch aborted");
                return Err(LaunchError::UpdateCancelled.into());
            }
        }
    }

    attempt.advance(LaunchState::Building);
    let descriptor = match context.builder.build_command(&instance) {
        Ok(descriptor) => descriptor,
        Err(error) => {
            attempt.advance(LaunchState::Aborted);
            warn!(instance = %instance.title, %error, "command construction failed");
            return Err(LaunchError::Build(error).into());
        }
    };

    attempt.advance(LaunchState::Spawning);
    let controller = ProcessController::new();
    let mut handle = match controller.spawn(&descriptor) {
        Ok(handle) => handle,
        Err(error) => {
            attempt.advance(LaunchState::SpawnFailed);
            warn!(instance = %instance.title, %error, "process spawn failed");
            return Err(LaunchError::Spawn(error).into());
        }
    };
    attempt.advance(LaunchState::Running);

    {
        let listener = listener.clone();
        context
            .affinity
            .dispatch(Box::new(move || listener.game_started()));
    }

    let mut console = None;
    let sink: Arc<dyn OutputSink> = if context.config.show_console {
        let buffered = Arc::new(ConsoleSink::new(context.config.console_capacity));
        buffered.attach(handle.id());
        *context.console_slot.lock().expect("console slot poisoned") =
            Some(Arc::clone(&buffered));
        console = Some(Arc::clone(&buffered));
        buffered
    } else {
        Arc::new(PassThroughSink::new())
    };
    if let Some(stdout) = handle.take_stdout() {
        let _ = OutputPump::attach(StreamSource::Stdout, stdout, Arc::clone(&sink));
    }
    if let Some(stderr) = handle.take_stderr() {
        let _ = OutputPump::attach(StreamSource::Stderr, stderr, Arc::clone(&sink));
    }

    let exit = match controller.wait_exit(&mut handle) {
        Ok(exit) => {
            info!(attempt = %attempt.id, instance = %instance.title, code = ?exit.code, "game process ended");
            exit
        }
        Err(error) => {
            // Abandoned wait: give up on the status and leave the process
            // running as an orphan.
            warn!(attempt = %attempt.id, instance = %instance.title, %error, "wait abandoned; process left running");
            ProcessExit { code: None }
        }
    };
    attempt.advance(LaunchState::Exited);

    if let Some(console) = &console {
        console.detach();
    }
    context
        .affinity
        .dispatch(Box::new(move || listener.game_closed()));

    Ok(exit)
}
