//! Dry-run environment: reads the real project, keeps writes in memory

use crate::local::{read_tree, resolve};
use async_trait::async_trait;
use forge_core::environment::{has_extension, is_excluded, CommandOutput, Environment, InstallOutcome};
use forge_core::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

pub struct DryRunEnvironment {
    id: String,
    root: PathBuf,
    written: RwLock<BTreeMap<String, String>>,
    actions: RwLock<Vec<String>>,
}

impl DryRunEnvironment {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            id: format!("dry-run:{}", root.display()),
            root,
            written: RwLock::new(BTreeMap::new()),
            actions: RwLock::new(Vec::new()),
        }
    }

    /// Files that would have been written
    pub async fn written(&self) -> BTreeMap<String, String> {
        self.written.read().await.clone()
    }

    /// Installs and commands that would have run, in order
    pub async fn actions(&self) -> Vec<String> {
        self.actions.read().await.clone()
    }
}

#[async_trait]
impl Environment for DryRunEnvironment {
    fn id(&self) -> &str {
        &self.id
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        resolve(&self.root, path)?;
        self.written
            .write()
            .await
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn list_files(
        &self,
        extensions: &[String],
        exclude_dirs: &[String],
    ) -> Result<BTreeMap<String, String>> {
        let mut files = if self.root.is_dir() {
            read_tree(&self.root, extensions, exclude_dirs).await?
        } else {
            BTreeMap::new()
        };

        for (path, content) in self.written.read().await.iter() {
            if has_extension(path, extensions) && !is_excluded(path, exclude_dirs) {
                files.insert(path.clone(), content.clone());
            }
        }
        Ok(files)
    }

    async fn install_packages(&self, packages: &[String]) -> Result<InstallOutcome> {
        info!("[dry run] would install {}", packages.join(" "));
        self.actions
            .write()
            .await
            .push(format!("install {}", packages.join(" ")));
        Ok(InstallOutcome {
            installed: packages.to_vec(),
            failed: Vec::new(),
        })
    }

    async fn run_command(
        &self,
        argv: &[String],
        _cwd: Option<&str>,
        _timeout: Duration,
    ) -> Result<CommandOutput> {
        let command = argv.join(" ");
        info!("[dry run] would run {}", command);
        self.actions.write().await.push(format!("run {}", command));
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_stay_in_memory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/App.jsx"), "disk").unwrap();

        let env = DryRunEnvironment::new(dir.path());
        env.write_file("src/App.jsx", "memory").await.unwrap();
        env.write_file("src/New.jsx", "new").await.unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("src/App.jsx")).unwrap(), "disk");
        assert!(!dir.path().join("src/New.jsx").exists());

        let files = env.list_files(&[".jsx".to_string()], &[]).await.unwrap();
        assert_eq!(files.get("src/App.jsx").map(String::as_str), Some("memory"));
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_records_actions() {
        let env = DryRunEnvironment::new("/nonexistent");
        env.install_packages(&["axios".to_string()]).await.unwrap();
        env.run_command(&["npm".to_string(), "test".to_string()], None, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(env.actions().await, vec!["install axios", "run npm test"]);
        assert!(env.list_files(&[], &[]).await.unwrap().is_empty());
    }
}
