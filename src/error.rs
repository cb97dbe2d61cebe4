//! Error taxonomy for the launch pipeline.
//!
//! Orchestration faults (update, build, spawn) surface exactly once to the
//! caller through a failed future; stream I/O faults are swallowed at the
//! output pump and an abandoned process wait is logged, never surfaced.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Process creation failed. The launch attempt is aborted and retryable;
/// `game_started` never fires.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("executable not found: {path}")]
    MissingExecutable { path: PathBuf },

    #[error("failed to spawn {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Command construction failed upstream. Sequenced identically to a spawn
/// failure.
#[derive(Debug, Error)]
#[error("failed to assemble launch command: {message}")]
pub struct BuildError {
    message: String,
}

impl BuildError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The single surfaced failure of a launch attempt.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("update failed before launch: {0}")]
    Update(Arc<anyhow::Error>),

    #[error("update cancelled before launch")]
    UpdateCancelled,

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_error_reports_missing_path() {
        let error = SpawnError::MissingExecutable {
            path: PathBuf::from("/opt/game/bin/java"),
        };
        assert_eq!(
            error.to_string(),
            "executable not found: /opt/game/bin/java"
        );
    }

    #[test]
    fn build_error_is_transparent_through_launch_error() {
        let error = LaunchError::from(BuildError::new("no runtime configured"));
        assert_eq!(
            error.to_string(),
            "failed to assemble launch command: no runtime configured"
        );
    }

    #[test]
    fn launch_error_converts_into_anyhow() {
        let error: anyhow::Error = LaunchError::UpdateCancelled.into();
        assert!(error.to_string().contains("update cancelled"));
    }
}
