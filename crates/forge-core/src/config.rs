//! Configuration management for Forge

use crate::error::{ForgeError, Result};
use crate::types::{ValidationError, ValidationResult, ValidationWarning};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Configuration file names to search for
pub const CONFIG_FILE_NAMES: &[&str] = &["forge.config.yaml", "forge.config.yml", "forge.config.json"];

/// Full Forge configuration
///
/// Every section is optional in the file; missing keys take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub project: ProjectSection,
    pub packages: PackagesSection,
    pub files: FilesSection,
    pub commands: CommandsSection,
    pub orchestrator: OrchestratorSection,
    pub intent: IntentSection,
}

/// Layout of the project inside the environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    /// Source root every generated path is rooted under
    pub source_root: String,
    pub public_dir: String,
    /// Files that stay at the project root instead of moving under the source root
    pub root_files: Vec<String>,
    /// Where bare file names from plain-text listings are placed
    pub component_dir: String,
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            source_root: "src".to_string(),
            public_dir: "public".to_string(),
            root_files: vec!["index.html".to_string()],
            component_dir: "src/components".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesSection {
    /// Runtime packages that are always available and never installed
    pub preinstalled: Vec<String>,
    /// Platform modules that are never treated as packages
    pub builtins: Vec<String>,
    pub install_timeout_secs: u64,
    pub legacy_peer_deps: bool,
}

impl Default for PackagesSection {
    fn default() -> Self {
        Self {
            preinstalled: vec!["react".to_string(), "react-dom".to_string()],
            builtins: [
                "fs",
                "path",
                "http",
                "https",
                "crypto",
                "stream",
                "util",
                "os",
                "url",
                "querystring",
                "child_process",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            install_timeout_secs: 300,
            legacy_peer_deps: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesSection {
    /// File names generated output may never overwrite
    pub protected: Vec<String>,
    /// Extensions synced into the manifest
    pub source_extensions: Vec<String>,
    pub exclude_dirs: Vec<String>,
    /// Files larger than this are listed in the manifest without analysis
    pub max_file_size: usize,
    /// Strip `import './x.css'` lines from scripts
    pub utility_css_only: bool,
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            protected: [
                "package.json",
                "package-lock.json",
                "yarn.lock",
                "pnpm-lock.yaml",
                "vite.config.js",
                "vite.config.ts",
                "tailwind.config.js",
                "tailwind.config.ts",
                "postcss.config.js",
                "tsconfig.json",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            source_extensions: [".jsx", ".js", ".tsx", ".ts", ".css", ".json"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude_dirs: ["node_modules", ".git", "dist", "build"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: 512 * 1024,
            utility_css_only: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsSection {
    pub timeout_secs: u64,
}

impl Default for CommandsSection {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    /// Delay after writes so a file watcher can pick changes up
    pub write_settle_ms: u64,
    /// Delay used instead when packages were installed this turn
    pub install_settle_ms: u64,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            write_settle_ms: 2000,
            install_settle_ms: 5000,
        }
    }
}

/// How many name-matched files an instruction may target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPolicy {
    /// Keep only the first match
    #[default]
    Single,
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentSection {
    pub target_policy: TargetPolicy,
    /// Number of recently modified files considered for fixes
    pub recent_window: usize,
}

impl Default for IntentSection {
    fn default() -> Self {
        Self {
            target_policy: TargetPolicy::Single,
            recent_window: 5,
        }
    }
}

impl ForgeConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.commands.timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.packages.install_timeout_secs)
    }

    /// Settle delay for a turn, longer when packages were installed
    pub fn settle_delay(&self, installed_packages: bool) -> Duration {
        if installed_packages {
            Duration::from_millis(self.orchestrator.install_settle_ms)
        } else {
            Duration::from_millis(self.orchestrator.write_settle_ms)
        }
    }

    /// Check whether a path names a protected file
    pub fn is_protected(&self, path: &str) -> bool {
        let name = path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path);
        self.files.protected.iter().any(|p| p == name)
    }

    pub fn is_preinstalled(&self, package: &str) -> bool {
        self.packages.preinstalled.iter().any(|p| p == package)
    }

    /// Disable all settle delays (tests and dry runs)
    pub fn without_settle_delays(mut self) -> Self {
        self.orchestrator.write_settle_ms = 0;
        self.orchestrator.install_settle_ms = 0;
        self
    }
}

/// Configuration manager for loading and saving Forge configurations
pub struct ConfigManager {
    cache: HashMap<PathBuf, CachedConfig>,
}

struct CachedConfig {
    config: ForgeConfig,
    modified_time: SystemTime,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Find configuration file in a directory
    pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Load configuration from a file
    pub fn load(&mut self, config_path: &Path) -> Result<ForgeConfig> {
        let metadata = std::fs::metadata(config_path)?;
        let modified_time = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        if let Some(cached) = self.cache.get(config_path) {
            if cached.modified_time == modified_time {
                return Ok(cached.config.clone());
            }
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: ForgeConfig = if is_json(config_path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        let validation = self.validate(&config);
        if !validation.valid {
            let messages: Vec<String> = validation
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(ForgeError::InvalidConfig(messages.join("; ")));
        }

        self.cache.insert(
            config_path.to_path_buf(),
            CachedConfig {
                config: config.clone(),
                modified_time,
            },
        );

        Ok(config)
    }

    /// Load configuration from a directory (searches for config files)
    pub fn load_from_directory(&mut self, dir: &Path) -> Result<(ForgeConfig, PathBuf)> {
        let config_path = Self::find_config_file(dir)
            .ok_or_else(|| ForgeError::ConfigNotFound(dir.display().to_string()))?;

        let config = self.load(&config_path)?;
        Ok((config, config_path))
    }

    /// Load from the first directory that has a config file, else defaults
    pub fn load_or_default(&mut self, dirs: &[&Path]) -> Result<ForgeConfig> {
        for dir in dirs {
            if let Some(path) = Self::find_config_file(dir) {
                return self.load(&path);
            }
        }
        Ok(ForgeConfig::default())
    }

    /// Validate a configuration
    pub fn validate(&self, config: &ForgeConfig) -> ValidationResult {
        let mut result = ValidationResult::ok();

        if config.files.protected.is_empty() {
            result = result.with_error(ValidationError {
                field: "files.protected".to_string(),
                message: "Protected file list must not be empty".to_string(),
                code: "EMPTY_PROTECTED".to_string(),
            });
        }

        if config.commands.timeout_secs == 0 {
            result = result.with_error(ValidationError {
                field: "commands.timeout_secs".to_string(),
                message: "Command timeout must be positive".to_string(),
                code: "INVALID_TIMEOUT".to_string(),
            });
        }

        if config.packages.install_timeout_secs == 0 {
            result = result.with_error(ValidationError {
                field: "packages.install_timeout_secs".to_string(),
                message: "Install timeout must be positive".to_string(),
                code: "INVALID_TIMEOUT".to_string(),
            });
        }

        let source_root = &config.project.source_root;
        if source_root.is_empty() || source_root.starts_with('/') {
            result = result.with_error(ValidationError {
                field: "project.source_root".to_string(),
                message: "Source root must be a relative directory name".to_string(),
                code: "INVALID_SOURCE_ROOT".to_string(),
            });
        }

        if config.intent.recent_window == 0 {
            result = result.with_warning(ValidationWarning {
                field: "intent.recent_window".to_string(),
                message: "Recent file window is zero, fix requests only use name matches"
                    .to_string(),
                suggestion: Some("Set recent_window to 5".to_string()),
            });
        }

        if config.orchestrator.install_settle_ms < config.orchestrator.write_settle_ms {
            result = result.with_warning(ValidationWarning {
                field: "orchestrator.install_settle_ms".to_string(),
                message: "Install settle delay is shorter than the write settle delay".to_string(),
                suggestion: None,
            });
        }

        result
    }

    /// Save configuration to a file
    pub fn save(&self, config: &ForgeConfig, config_path: &Path) -> Result<()> {
        let content = if is_json(config_path) {
            serde_json::to_string_pretty(config)?
        } else {
            serde_yaml::to_string(config)?
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(config_path, content)?;

        Ok(())
    }

    /// Create a default configuration
    pub fn create_default() -> ForgeConfig {
        ForgeConfig::default()
    }

    /// Clear the cache
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}
