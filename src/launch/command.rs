//! Ready-to-execute command descriptors.

use std::path::PathBuf;

use crate::core::Instance;
use crate::error::BuildError;

/// An executable plus its arguments, opaque to the launch pipeline.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    /// Path to the executable
    pub program: PathBuf,
    /// Command line arguments
    pub args: Vec<String>,
    /// Working directory (defaults to the spawning process's)
    pub working_dir: Option<PathBuf>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
}

impl CommandDescriptor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Builds the ready-to-execute command for an instance. Runtime discovery,
/// classpath and argument assembly all live behind this boundary.
pub trait CommandBuilder: Send + Sync {
    fn build_command(&self, instance: &Instance) -> Result<CommandDescriptor, BuildError>;
}
