//! Process lifecycle - Spawning the game process and waiting for exit.

use std::io;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};

use tracing::info;

use crate::error::SpawnError;

use super::command::CommandDescriptor;

/// Exit status of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code; `None` when the process was signalled or its wait was
    /// abandoned.
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Handle to a spawned process.
///
/// The output streams can each be taken exactly once; from that point
/// they belong to their reader loop until closure.
pub struct ProcessHandle {
    child: Child,
}

impl ProcessHandle {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }
}

/// Spawns the external game process and blocks until exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessController;

impl ProcessController {
    pub fn new() -> Self {
        Self
    }

    /// Spawn the process described by `descriptor` with piped output
    /// streams and no stdin.
    pub fn spawn(&self, descriptor: &CommandDescriptor) -> Result<ProcessHandle, SpawnError> {
        let program = &descriptor.program;
        if program.is_absolute() && !program.exists() {
            return Err(SpawnError::MissingExecutable {
                path: program.clone(),
            });
        }

        let mut command = Command::new(program);
        command
            .args(&descriptor.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &descriptor.working_dir {
            command.current_dir(dir);
        }
        for (key, value) in &descriptor.env {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|source| SpawnError::Io {
            path: program.clone(),
            source,
        })?;
        info!(pid = child.id(), program = %program.display(), "spawned game process");

        Ok(ProcessHandle { child })
    }

    /// Block the calling worker thread until the process exits.
    ///
    /// An error here is the abandoned-wait case: the caller gives up on
    /// the exit status and the child keeps running as an orphan. The
    /// child is never killed by this controller.
    pub fn wait_exit(&self, handle: &mut ProcessHandle) -> io::Result<ProcessExit> {
        let status = handle.child.wait()?;
        Ok(ProcessExit {
            code: status.code(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn spawn_and_wait_reports_exit_code_zero() {
        let controller = ProcessController::new();
        let descriptor = CommandDescriptor::new("/bin/sh").with_args(["-c", "exit 0"]);
        let mut handle = controller.spawn(&descriptor).unwrap();
        let exit = controller.wait_exit(&mut handle).unwrap();
        assert_eq!(exit.code, Some(0));
        assert!(exit.success());
    }

    #[test]
    fn wait_reports_nonzero_exit_code() {
        let controller = ProcessController::new();
        let descriptor = CommandDescriptor::new("/bin/sh").with_args(["-c", "exit 3"]);
        let mut handle = controller.spawn(&descriptor).unwrap();
        let exit = controller.wait_exit(&mut handle).unwrap();
        assert_eq!(exit.code, Some(3));
        assert!(!exit.success());
    }

    #[test]
    fn missing_absolute_executable_is_reported_before_spawn() {
        let controller = ProcessController::new();
        let descriptor = CommandDescriptor::new("/no/such/binary");
        let error = controller
            .spawn(&descriptor)
            .err()
            .expect("spawn should fail");
        match error {
            SpawnError::MissingExecutable { path } => {
                assert_eq!(path, std::path::PathBuf::from("/no/such/binary"));
            }
            other => panic!("expected MissingExecutable, got {other}"),
        }
    }

    #[test]
    fn unresolvable_program_name_is_an_io_spawn_error() {
        let controller = ProcessController::new();
        let descriptor = CommandDescriptor::new("packlaunch-no-such-command");
        assert!(matches!(
            controller.spawn(&descriptor),
            Err(SpawnError::Io { .. })
        ));
    }

    #[test]
    fn environment_and_working_dir_are_applied() {
        let controller = ProcessController::new();
        let descriptor = CommandDescriptor::new("/bin/sh")
            .with_args(["-c", "test \"$MARKER\" = yes && test \"$(pwd)\" = /tmp"])
            .with_working_dir("/tmp")
            .with_env("MARKER", "yes");
        let mut handle = controller.spawn(&descriptor).unwrap();
        let exit = controller.wait_exit(&mut handle).unwrap();
        assert!(exit.success());
    }
}
