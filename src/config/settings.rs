use crate::config::types::{Result, ShellError};
/// Shell configuration: CLI flags merged over an optional JSON file
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Runtime configuration consumed by the read/eval loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Print the prompt before each line
    pub emit_prompt: bool,
    /// Log job-table mutations and print handler-side diagnostics
    pub verbose: bool,
    /// Duplicate stdout onto stderr so a driver sees all output on one pipe
    pub merge_stderr: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            emit_prompt: true,
            verbose: false,
            merge_stderr: false,
        }
    }
}

impl ShellConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShellError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| ShellError::Config(format!("Failed to parse config JSON: {}", e)))
    }

    /// Apply command-line flags. Flags only ever switch behavior on
    /// relative to the file, never off.
    pub fn with_flags(mut self, no_prompt: bool, verbose: bool) -> Self {
        if no_prompt {
            self.emit_prompt = false;
        }
        if verbose {
            self.verbose = true;
        }
        self
    }
}
