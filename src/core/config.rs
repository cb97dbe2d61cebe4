//! Launcher configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Options recognized by the launch pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Show a buffered console for spawned processes instead of passing
    /// output through to the launcher's own stdout.
    pub show_console: bool,
    /// Line capacity of the buffered console.
    pub console_capacity: usize,
    /// Worker threads for background tasks.
    pub worker_threads: usize,
    /// Custom launcher data directory.
    pub data_directory: Option<PathBuf>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            show_console: false,
            console_capacity: 10_000,
            worker_threads: 4,
            data_directory: None,
        }
    }
}

impl LauncherConfig {
    /// Get the data directory, using the platform default if not set
    pub fn data_dir(&self) -> PathBuf {
        self.data_directory.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("PackLaunch")
        })
    }

    /// Get the directory holding instance content directories
    pub fn instances_dir(&self) -> PathBuf {
        self.data_dir().join("instances")
    }

    /// Validate settings and fix any invalid values
    pub fn validate(&mut self) {
        self.console_capacity = self.console_capacity.max(1);
        self.worker_threads = self.worker_threads.clamp(1, 64);
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
