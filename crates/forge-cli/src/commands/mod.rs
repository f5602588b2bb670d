//! CLI commands

pub mod apply;
pub mod classify;
pub mod config;
pub mod extract;
pub mod manifest;

use anyhow::{Context as _, Result};
use forge_adapters::{create_environment, EnvironmentKind};
use forge_core::{ConfigManager, FileManifest, ForgeConfig, Session};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;

/// Global options shared by every command
pub struct Context {
    pub project: PathBuf,
    pub config: Option<PathBuf>,
}

impl Context {
    /// Load the effective configuration
    ///
    /// An explicit `--config` wins, then the project directory, then
    /// `FORGE_HOME`, then built-in defaults.
    pub fn load_config(&self) -> Result<ForgeConfig> {
        let mut manager = ConfigManager::new();
        if let Some(ref path) = self.config {
            return manager
                .load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()));
        }

        let home = forge_home().ok();
        let mut dirs: Vec<&Path> = vec![self.project.as_path()];
        if let Some(ref home) = home {
            dirs.push(home.as_path());
        }
        manager
            .load_or_default(&dirs)
            .context("Failed to load configuration")
    }

    /// Path of the config file that would be used, if any
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.config {
            return Some(path.clone());
        }
        ConfigManager::find_config_file(&self.project)
            .or_else(|| forge_home().ok().and_then(|home| ConfigManager::find_config_file(&home)))
    }

    /// Read the project through a dry-run environment and build its manifest
    pub async fn load_manifest(&self, config: &ForgeConfig) -> Result<FileManifest> {
        let env = create_environment(EnvironmentKind::DryRun, &self.project, config)?;
        let session = Session::new("inspect", Some(env));
        session
            .refresh_manifest(config)
            .await
            .with_context(|| format!("Failed to read project at {}", self.project.display()))
    }
}

/// Forge home directory (~/.forge)
pub fn forge_home() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("FORGE_HOME") {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".forge"))
}

/// Read a model response from a file or stdin
pub async fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        tokio::io::stdin()
            .read_to_string(&mut input)
            .await
            .context("Failed to read stdin")?;
        Ok(input)
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "]));
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_project_config_wins_over_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("forge.config.yaml"),
            "commands:\n  timeout_secs: 5\n",
        )
        .unwrap();

        let ctx = Context {
            project: dir.path().to_path_buf(),
            config: None,
        };
        let config = ctx.load_config().unwrap();

        assert_eq!(config.commands.timeout_secs, 5);
        assert_eq!(ctx.config_path(), Some(dir.path().join("forge.config.yaml")));
    }

    #[tokio::test]
    async fn test_load_manifest() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/App.jsx"),
            "export default function App() { return <div />; }",
        )
        .unwrap();

        let ctx = Context {
            project: dir.path().to_path_buf(),
            config: None,
        };
        let manifest = ctx.load_manifest(&ForgeConfig::default()).await.unwrap();

        assert_eq!(manifest.entry_point, "src/App.jsx");
    }
}
