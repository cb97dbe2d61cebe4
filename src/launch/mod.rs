//! Launch module - Update sequencing, process supervision and output plumbing

mod command;
mod console;
mod process;
mod pump;
mod supervisor;

pub use command::{CommandBuilder, CommandDescriptor};
pub use console::{ConsoleLine, ConsoleSink, PassThroughSink};
pub use process::{ProcessController, ProcessExit, ProcessHandle};
pub use pump::{OutputPump, OutputSink, StreamSource};
pub use supervisor::{LaunchHandle, LaunchListener, LaunchState, LaunchSupervisor, Updater};
