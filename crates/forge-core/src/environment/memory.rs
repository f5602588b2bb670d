//! In-memory environment with failure injection

use super::{has_extension, is_excluded, CommandOutput, Environment, InstallOutcome};
use crate::error::{ForgeError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Environment backed by a map of files
///
/// Failures can be injected per package, per path and per command, and the
/// whole environment can be marked unavailable.
pub struct MemoryEnvironment {
    id: String,
    available: AtomicBool,
    files: RwLock<BTreeMap<String, String>>,
    installed: RwLock<Vec<String>>,
    commands: RwLock<Vec<Vec<String>>>,
    install_error: Option<String>,
    failing_packages: HashSet<String>,
    failing_writes: HashSet<String>,
    failing_commands: HashSet<String>,
    command_outputs: HashMap<String, CommandOutput>,
}

impl Default for MemoryEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::with_id("memory")
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            available: AtomicBool::new(true),
            files: RwLock::new(BTreeMap::new()),
            installed: RwLock::new(Vec::new()),
            commands: RwLock::new(Vec::new()),
            install_error: None,
            failing_packages: HashSet::new(),
            failing_writes: HashSet::new(),
            failing_commands: HashSet::new(),
            command_outputs: HashMap::new(),
        }
    }

    /// Seed with existing files
    pub fn with_files<I, P, C>(self, files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let seeded = files
            .into_iter()
            .map(|(p, c)| (p.into(), c.into()))
            .collect();
        Self {
            files: RwLock::new(seeded),
            ..self
        }
    }

    /// Make every install request fail as a whole
    pub fn fail_install(mut self, message: impl Into<String>) -> Self {
        self.install_error = Some(message.into());
        self
    }

    /// Make one package fail to install
    pub fn fail_package(mut self, name: impl Into<String>) -> Self {
        self.failing_packages.insert(name.into());
        self
    }

    pub fn fail_write(mut self, path: impl Into<String>) -> Self {
        self.failing_writes.insert(path.into());
        self
    }

    /// Make a command (argv joined by spaces) fail to start
    pub fn fail_command(mut self, command: impl Into<String>) -> Self {
        self.failing_commands.insert(command.into());
        self
    }

    /// Canned output for a command (argv joined by spaces)
    pub fn with_command_output(mut self, command: impl Into<String>, output: CommandOutput) -> Self {
        self.command_outputs.insert(command.into(), output);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn file(&self, path: &str) -> Option<String> {
        self.files.read().await.get(path).cloned()
    }

    pub async fn files(&self) -> BTreeMap<String, String> {
        self.files.read().await.clone()
    }

    pub async fn installed(&self) -> Vec<String> {
        self.installed.read().await.clone()
    }

    /// Every argv passed to `run_command`, in order
    pub async fn commands(&self) -> Vec<Vec<String>> {
        self.commands.read().await.clone()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ForgeError::EnvironmentUnavailable(self.id.clone()))
        }
    }
}

#[async_trait]
impl Environment for MemoryEnvironment {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        self.ensure_available()?;
        if self.failing_writes.contains(path) {
            return Err(ForgeError::environment("write", format!("permission denied: {}", path)));
        }
        self.files
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
        self.ensure_available()?;
        Ok(self
            .files
            .read()
            .await
            .iter()
            .filter(|(path, _)| has_extension(path, extensions) && !is_excluded(path, exclude_dirs))
            .map(|(p, c)| (p.clone(), c.clone()))
            .collect())
    }

    async fn install_packages(&self, packages: &[String]) -> Result<InstallOutcome> {
        self.ensure_available()?;
        if let Some(message) = &self.install_error {
            return Err(ForgeError::environment("install", message.clone()));
        }

        let mut outcome = InstallOutcome::default();
        let mut installed = self.installed.write().await;
        for package in packages {
            if self.failing_packages.contains(package) {
                outcome.failed.push(package.clone());
            } else {
                if !installed.contains(package) {
                    installed.push(package.clone());
                }
                outcome.installed.push(package.clone());
            }
        }
        Ok(outcome)
    }

    async fn run_command(
        &self,
        argv: &[String],
        _cwd: Option<&str>,
        _timeout: Duration,
    ) -> Result<CommandOutput> {
        self.ensure_available()?;
        self.commands.write().await.push(argv.to_vec());

        let command = argv.join(" ");
        if self.failing_commands.contains(&command) {
            return Err(ForgeError::environment("run", format!("failed to start: {}", command)));
        }
        Ok(self
            .command_outputs
            .get(&command)
            .cloned()
            .unwrap_or(CommandOutput {
                exit_code: Some(0),
                ..CommandOutput::default()
            }))
    }
}
