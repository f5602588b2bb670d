//! Project directory on the local machine
//!
//! Writes go straight to disk, packages are installed with npm and
//! commands run as child processes of the project root.

use async_trait::async_trait;
use forge_core::environment::{has_extension, CommandOutput, Environment, InstallOutcome};
use forge_core::{ForgeConfig, ForgeError, Result};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub struct LocalEnvironment {
    id: String,
    root: PathBuf,
    npm: String,
    legacy_peer_deps: bool,
    install_timeout: Duration,
}

impl LocalEnvironment {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(root, &ForgeConfig::default())
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &ForgeConfig) -> Self {
        let root = root.into();
        Self {
            id: format!("local:{}", root.display()),
            root,
            npm: "npm".to_string(),
            legacy_peer_deps: config.packages.legacy_peer_deps,
            install_timeout: config.install_timeout(),
        }
    }

    /// Use a different npm executable
    pub fn with_npm(mut self, npm: impl Into<String>) -> Self {
        self.npm = npm.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn install_argv(&self, packages: &[String]) -> Vec<String> {
        let mut argv = vec![self.npm.clone(), "install".to_string()];
        if self.legacy_peer_deps {
            argv.push("--legacy-peer-deps".to_string());
        }
        argv.extend(packages.iter().cloned());
        argv
    }
}

/// Resolve a relative project path, refusing anything that leaves the root
pub(crate) fn resolve(root: &Path, path: &str) -> Result<PathBuf> {
    let relative = Path::new(path);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.is_empty() || escapes {
        return Err(ForgeError::environment(
            "write",
            format!("path {} is outside the project", path),
        ));
    }
    Ok(root.join(relative))
}

/// Read every matching text file under a root, skipping excluded directories
pub(crate) async fn read_tree(
    root: &Path,
    extensions: &[String],
    exclude_dirs: &[String],
) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![(root.to_path_buf(), String::new())];

    while let Some((dir, prefix)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let relative = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };

            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                if !exclude_dirs.iter().any(|d| d == &name) {
                    pending.push((entry.path(), relative));
                }
            } else if file_type.is_file() && has_extension(&relative, extensions) {
                match tokio::fs::read_to_string(entry.path()).await {
                    Ok(content) => {
                        files.insert(relative, content);
                    }
                    Err(e) => debug!("Skipping unreadable file {}: {}", relative, e),
                }
            }
        }
    }

    Ok(files)
}

/// Spawn a process and wait for it with a deadline
async fn run_process(argv: &[String], cwd: &Path, timeout: Duration) -> Result<CommandOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ForgeError::environment("run", "empty command"))?;

    let child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ForgeError::environment("run", format!("{}: {}", program, e)))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        }),
        Ok(Err(e)) => Err(ForgeError::environment("run", e.to_string())),
        Err(_) => {
            warn!("{} timed out after {:?}", argv.join(" "), timeout);
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: format!("timed out after {}s", timeout.as_secs()),
                exit_code: None,
            })
        }
    }
}

#[async_trait]
impl Environment for LocalEnvironment {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_available(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let target = resolve(&self.root, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, content).await?;
        debug!("Wrote {}", target.display());
        Ok(())
    }

    async fn list_files(
        &self,
        extensions: &[String],
        exclude_dirs: &[String],
    ) -> Result<BTreeMap<String, String>> {
        read_tree(&self.root, extensions, exclude_dirs).await
    }

    async fn install_packages(&self, packages: &[String]) -> Result<InstallOutcome> {
        if packages.is_empty() {
            return Ok(InstallOutcome::default());
        }

        let argv = self.install_argv(packages);
        info!("Running {}", argv.join(" "));
        let output = run_process(&argv, &self.root, self.install_timeout).await?;

        if output.success() {
            Ok(InstallOutcome {
                installed: packages.to_vec(),
                failed: Vec::new(),
            })
        } else {
            let detail = output.stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("npm install failed");
            Err(ForgeError::environment("install", detail.trim().to_string()))
        }
    }

    async fn run_command(
        &self,
        argv: &[String],
        cwd: Option<&str>,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let dir = match cwd {
            Some(cwd) => resolve(&self.root, cwd)?,
            None => self.root.clone(),
        };
        run_process(argv, &dir, timeout).await
    }
}
