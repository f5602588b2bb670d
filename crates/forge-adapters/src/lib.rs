//! Environment bindings for Forge

mod dry_run;
mod local;

pub use dry_run::DryRunEnvironment;
pub use local::LocalEnvironment;

use forge_core::{EnvironmentHandle, ForgeConfig, ForgeError, MemoryEnvironment, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Which environment binding to use
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvironmentKind {
    /// Project directory on disk, npm and real processes
    Local,
    /// Reads from disk, keeps writes in memory, never executes
    DryRun,
    /// Empty in-memory project
    Memory,
}

impl EnvironmentKind {
    pub fn all() -> &'static [EnvironmentKind] {
        &[EnvironmentKind::Local, EnvironmentKind::DryRun, EnvironmentKind::Memory]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentKind::Local => "local",
            EnvironmentKind::DryRun => "dry-run",
            EnvironmentKind::Memory => "memory",
        }
    }
}

impl std::fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EnvironmentKind {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        EnvironmentKind::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s.to_lowercase())
            .ok_or_else(|| ForgeError::Config(format!("Unknown environment kind: {}", s)))
    }
}

/// Create an environment rooted at a project directory
pub fn create_environment(kind: EnvironmentKind, root: &Path, config: &ForgeConfig) -> Result<EnvironmentHandle> {
    let handle: EnvironmentHandle = match kind {
        EnvironmentKind::Local => {
            if !root.is_dir() {
                return Err(ForgeError::EnvironmentUnavailable(format!(
                    "project directory {} does not exist",
                    root.display()
                )));
            }
            Arc::new(LocalEnvironment::from_config(root, config))
        }
        EnvironmentKind::DryRun => Arc::new(DryRunEnvironment::new(root)),
        EnvironmentKind::Memory => Arc::new(MemoryEnvironment::new()),
    };
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("dry-run".parse::<EnvironmentKind>().unwrap(), EnvironmentKind::DryRun);
        assert_eq!("LOCAL".parse::<EnvironmentKind>().unwrap(), EnvironmentKind::Local);
        assert!("sandbox".parse::<EnvironmentKind>().is_err());
    }

    #[test]
    fn test_local_requires_directory() {
        let config = ForgeConfig::default();
        let missing = Path::new("/definitely/not/a/project");

        assert!(matches!(
            create_environment(EnvironmentKind::Local, missing, &config),
            Err(ForgeError::EnvironmentUnavailable(_))
        ));
        assert!(create_environment(EnvironmentKind::Memory, missing, &config).is_ok());
    }
}
