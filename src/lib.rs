//! PackLaunch - Launch and supervise local installations of a moddable game client
//!
//! The crate is organized around two subsystems. The task framework
//! ([`task`]) provides single-assignment observable futures and two
//! execution domains: a worker pool for blocking background work and a
//! single-consumer affinity queue that serializes every callback touching
//! shared launcher state. The launch pipeline ([`launch`]) sequences an
//! optional instance update, spawns the external game process, pumps its
//! output streams into a sink, and fires lifecycle notifications back on
//! the affinity queue.
//!
//! Presentation, manifest parsing, update network checks and command
//! assembly live behind the collaborator traits ([`core::InstanceSource`],
//! [`launch::Updater`], [`launch::CommandBuilder`], [`launch::LaunchListener`]).

pub mod core;
pub mod error;
pub mod launch;
pub mod task;

/// Application name constant
pub const APP_NAME: &str = "PackLaunch";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use crate::core::{Environment, Instance, InstanceRegistry, LauncherConfig};
pub use crate::error::{BuildError, LaunchError, SpawnError};
pub use crate::launch::{LaunchHandle, LaunchListener, LaunchSupervisor};
pub use crate::task::{ObservableFuture, TaskOutcome};
