//! Environment capability trait
//!
//! The orchestrator only ever touches the project through this trait.
//! Concrete bindings live in `forge-adapters`; [`MemoryEnvironment`] is
//! an in-process implementation for tests and dry runs.

mod memory;

pub use memory::MemoryEnvironment;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Per-package outcome of an install request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOutcome {
    pub installed: Vec<String>,
    pub failed: Vec<String>,
}

/// Captured result of one command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed or never reported a status
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A mutable project the pipeline writes into
#[async_trait]
pub trait Environment: Send + Sync {
    /// Stable identifier for logs
    fn id(&self) -> &str;

    /// Whether the environment can currently be used
    async fn is_available(&self) -> bool {
        true
    }

    /// Write a file relative to the project root, creating parents
    async fn write_file(&self, path: &str, content: &str) -> Result<()>;

    /// Read files with one of the extensions, skipping excluded directories
    ///
    /// Keys are slash-separated paths relative to the project root.
    async fn list_files(
        &self,
        extensions: &[String],
        exclude_dirs: &[String],
    ) -> Result<BTreeMap<String, String>>;

    /// Install packages; an `Err` means the whole request failed
    async fn install_packages(&self, packages: &[String]) -> Result<InstallOutcome>;

    /// Run a command without a shell
    async fn run_command(
        &self,
        argv: &[String],
        cwd: Option<&str>,
        timeout: Duration,
    ) -> Result<CommandOutput>;
}

/// Shared handle to an environment
pub type EnvironmentHandle = Arc<dyn Environment>;

/// Whether a relative path sits under any excluded directory
pub fn is_excluded(path: &str, exclude_dirs: &[String]) -> bool {
    path.split('/')
        .rev()
        .skip(1)
        .any(|segment| exclude_dirs.iter().any(|d| d == segment))
}

/// Whether a path has one of the extensions (given with a leading dot)
pub fn has_extension(path: &str, extensions: &[String]) -> bool {
    extensions.is_empty() || extensions.iter().any(|ext| path.ends_with(ext.as_str()))
}

/// Split a command string into argv on whitespace
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters() {
        let excluded = vec!["node_modules".to_string()];
        assert!(is_excluded("node_modules/react/index.js", &excluded));
        assert!(is_excluded("src/node_modules/x.js", &excluded));
        assert!(!is_excluded("src/node_modules.js", &excluded));

        let extensions = vec![".jsx".to_string(), ".css".to_string()];
        assert!(has_extension("src/App.jsx", &extensions));
        assert!(!has_extension("src/App.js", &extensions));
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("  npm   run build "), vec!["npm", "run", "build"]);
        assert!(split_command("   ").is_empty());
    }
}
