//! Session state and the session manager
//!
//! A session owns the environment handle and everything learned about the
//! project across turns. Turns hold the session's turn lock for their whole
//! duration and commit their results in one write.

use crate::config::ForgeConfig;
use crate::environment::{has_extension, is_excluded, EnvironmentHandle};
use crate::error::{ForgeError, Result};
use crate::manifest::ManifestBuilder;
use crate::types::{EditRecord, FileManifest};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

/// Last content written for a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedFile {
    pub content: String,
    pub last_modified: DateTime<Utc>,
}

/// Mutable per-conversation state
pub struct SessionState {
    pub environment: Option<EnvironmentHandle>,
    pub known_files: BTreeSet<String>,
    pub file_cache: BTreeMap<String, CachedFile>,
    pub declared_packages: BTreeSet<String>,
    pub manifest: Option<FileManifest>,
    pub edit_history: Vec<EditRecord>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    fn new(environment: Option<EnvironmentHandle>) -> Self {
        Self {
            environment,
            known_files: BTreeSet::new(),
            file_cache: BTreeMap::new(),
            declared_packages: BTreeSet::new(),
            manifest: None,
            edit_history: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Forget everything learned about the project, keep the environment
    fn clear(&mut self) {
        self.known_files.clear();
        self.file_cache.clear();
        self.declared_packages.clear();
        self.manifest = None;
        self.edit_history.clear();
        self.updated_at = Utc::now();
    }

    /// Keep only the most recent history records
    pub fn trim_history(&mut self, keep: usize) {
        if self.edit_history.len() > keep {
            let excess = self.edit_history.len() - keep;
            self.edit_history.drain(..excess);
        }
    }
}

/// Everything one turn learned, committed in a single write
#[derive(Debug, Clone)]
pub struct TurnCommit {
    /// Paths and contents written this turn
    pub written: Vec<(String, String)>,
    pub installed: Vec<String>,
    pub record: EditRecord,
}

/// Read-only copy of session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub environment_id: Option<String>,
    pub known_files: BTreeSet<String>,
    pub declared_packages: BTreeSet<String>,
    pub manifest: Option<FileManifest>,
    pub edit_history: Vec<EditRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    state: RwLock<SessionState>,
    turn_lock: Mutex<()>,
}

impl Session {
    pub fn new(id: impl Into<String>, environment: Option<EnvironmentHandle>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            state: RwLock::new(SessionState::new(environment)),
            turn_lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Serialize environment operations for this session
    pub async fn lock_turn(&self) -> MutexGuard<'_, ()> {
        self.turn_lock.lock().await
    }

    pub async fn environment(&self) -> Option<EnvironmentHandle> {
        self.state.read().await.environment.clone()
    }

    /// Attach a freshly provisioned environment; prior project state is dropped
    pub async fn attach_environment(&self, environment: EnvironmentHandle) {
        let _turn = self.lock_turn().await;
        let mut state = self.state.write().await;
        info!("Session {} attached to environment {}", self.id, environment.id());
        state.clear();
        state.environment = Some(environment);
    }

    pub async fn detach_environment(&self) -> Option<EnvironmentHandle> {
        let _turn = self.lock_turn().await;
        let mut state = self.state.write().await;
        state.clear();
        state.environment.take()
    }

    /// Copy of the current state; may be stale by the time it is used
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            id: self.id.clone(),
            environment_id: state.environment.as_ref().map(|e| e.id().to_string()),
            known_files: state.known_files.clone(),
            declared_packages: state.declared_packages.clone(),
            manifest: state.manifest.clone(),
            edit_history: state.edit_history.clone(),
            created_at: self.created_at,
            updated_at: state.updated_at,
        }
    }

    pub async fn known_files(&self) -> BTreeSet<String> {
        self.state.read().await.known_files.clone()
    }

    pub async fn declared_packages(&self) -> BTreeSet<String> {
        self.state.read().await.declared_packages.clone()
    }

    pub async fn manifest(&self) -> Option<FileManifest> {
        self.state.read().await.manifest.clone()
    }

    /// Re-read the project from the environment and rebuild the manifest
    ///
    /// Brings the bookkeeping back in line with the environment after
    /// interrupted turns. Must not be called while holding the turn lock.
    pub async fn refresh_manifest(&self, config: &ForgeConfig) -> Result<FileManifest> {
        let _turn = self.lock_turn().await;
        self.refresh_locked(config).await
    }

    pub(crate) async fn refresh_locked(&self, config: &ForgeConfig) -> Result<FileManifest> {
        let environment = self
            .environment()
            .await
            .ok_or_else(|| ForgeError::EnvironmentUnavailable(format!("session {} has no environment", self.id)))?;

        let files = environment
            .list_files(&config.files.source_extensions, &config.files.exclude_dirs)
            .await?;
        let declared = files
            .get("package.json")
            .map(|content| declared_dependencies(content))
            .unwrap_or_default();

        let mut state = self.state.write().await;
        let history: HashMap<String, DateTime<Utc>> = state
            .file_cache
            .iter()
            .map(|(path, cached)| (path.clone(), cached.last_modified))
            .collect();
        let manifest = ManifestBuilder::new(config).build_with_history(&files, &history);

        // The listing only covers source extensions; paths it cannot see
        // (root html, public assets) stay known.
        let listed: BTreeSet<String> = files.keys().cloned().collect();
        let extensions = &config.files.source_extensions;
        let exclude_dirs = &config.files.exclude_dirs;
        let unlisted: Vec<String> = state
            .known_files
            .iter()
            .chain(state.file_cache.keys())
            .filter(|path| !has_extension(path, extensions) || is_excluded(path, exclude_dirs))
            .cloned()
            .collect();
        state.known_files = listed;
        state.known_files.extend(unlisted);
        state.declared_packages.extend(declared);
        state.manifest = Some(manifest.clone());
        state.updated_at = Utc::now();

        debug!("Session {} refreshed manifest with {} files", self.id, manifest.files.len());
        Ok(manifest)
    }

    /// Record packages installed outside a turn's commit
    pub async fn declare_packages(&self, packages: impl IntoIterator<Item = String>) {
        let mut state = self.state.write().await;
        state.declared_packages.extend(packages);
        state.updated_at = Utc::now();
    }

    /// Apply a finished turn's bookkeeping in one write
    pub async fn commit(&self, commit: TurnCommit) {
        let mut state = self.state.write().await;
        let now = Utc::now();

        for (path, content) in commit.written {
            state.known_files.insert(path.clone());
            state.file_cache.insert(
                path,
                CachedFile {
                    content,
                    last_modified: now,
                },
            );
        }
        state.declared_packages.extend(commit.installed);
        state.edit_history.push(commit.record);
        state.updated_at = now;
    }

    pub async fn trim_history(&self, keep: usize) {
        self.state.write().await.trim_history(keep);
    }

    /// Forget all project state, keep the environment
    pub async fn reset(&self) {
        let _turn = self.lock_turn().await;
        self.state.write().await.clear();
        info!("Session {} reset", self.id);
    }
}

/// `dependencies` and `devDependencies` names from a package.json
pub fn declared_dependencies(package_json: &str) -> BTreeSet<String> {
    let value: serde_json::Value = match serde_json::from_str(package_json) {
        Ok(value) => value,
        Err(e) => {
            warn!("Ignoring unreadable package.json: {}", e);
            return BTreeSet::new();
        }
    };

    ["dependencies", "devDependencies"]
        .iter()
        .filter_map(|key| value.get(key).and_then(|deps| deps.as_object()))
        .flat_map(|deps| deps.keys().cloned())
        .collect()
}

/// Owns every live session
#[derive(Default)]
pub struct SessionManager {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, environment: Option<EnvironmentHandle>) -> Arc<Session> {
        let id = uuid::Uuid::new_v4().to_string();
        info!(
            "Creating session {} (environment: {})",
            id,
            environment.as_ref().map(|e| e.id()).unwrap_or("none")
        );

        let session = Arc::new(Session::new(id.clone(), environment));
        self.sessions.insert(id, session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Result<Arc<Session>> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ForgeError::SessionNotFound(id.to_string()))
    }

    pub async fn reset(&self, id: &str) -> Result<()> {
        self.get(id)?.reset().await;
        Ok(())
    }

    /// Drop a session; waits for a running turn to finish
    pub async fn destroy(&self, id: &str) -> Result<()> {
        let session = self.get(id)?;
        let _turn = session.lock_turn().await;
        self.sessions.remove(id);
        info!("Destroyed session {}", id);
        Ok(())
    }

    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MemoryEnvironment;
    use forge_types::Outcome;

    fn record(files: &[&str]) -> EditRecord {
        EditRecord {
            id: uuid::Uuid::new_v4(),
            instruction: "build a landing page".to_string(),
            edit_type: None,
            target_files: Vec::new(),
            confidence: None,
            files_touched: files.iter().map(|f| f.to_string()).collect(),
            outcome: Outcome::Success,
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_manager_lifecycle() {
        let manager = SessionManager::new();
        let session = manager.create(None);

        assert_eq!(manager.list(), vec![session.id().to_string()]);
        assert!(manager.get(session.id()).is_ok());

        tokio_test::assert_ok!(manager.destroy(session.id()).await);
        assert!(manager.is_empty());
        assert!(matches!(
            manager.get(session.id()),
            Err(ForgeError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_and_reset() {
        let session = Session::new("s1", None);
        session
            .commit(TurnCommit {
                written: vec![("src/App.jsx".to_string(), "app".to_string())],
                installed: vec!["axios".to_string()],
                record: record(&["src/App.jsx"]),
            })
            .await;

        let snapshot = session.snapshot().await;
        assert!(snapshot.known_files.contains("src/App.jsx"));
        assert!(snapshot.declared_packages.contains("axios"));
        assert_eq!(snapshot.edit_history.len(), 1);

        session.reset().await;
        let snapshot = session.snapshot().await;
        assert!(snapshot.known_files.is_empty());
        assert!(snapshot.edit_history.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_manifest() {
        let env: EnvironmentHandle = Arc::new(MemoryEnvironment::new().with_files([
            ("package.json", r#"{"dependencies":{"react":"^18"},"devDependencies":{"vite":"^5"}}"#),
            ("src/App.jsx", "export default function App() { return <div className=\"a\" />; }"),
            ("node_modules/react/index.js", "module.exports = {};"),
        ]));
        let session = Session::new("s1", Some(env));

        let manifest = session.refresh_manifest(&ForgeConfig::default()).await.unwrap();

        assert_eq!(manifest.entry_point, "src/App.jsx");
        assert!(!manifest.contains("node_modules/react/index.js"));
        let declared = session.declared_packages().await;
        assert!(declared.contains("react") && declared.contains("vite"));
        assert!(session.known_files().await.contains("package.json"));
    }

    #[tokio::test]
    async fn test_written_non_source_files_survive_refresh() {
        let env: EnvironmentHandle = Arc::new(MemoryEnvironment::new().with_files([
            ("src/App.jsx", "export default function App() { return null; }"),
            ("src/Old.jsx", "export default function Old() { return null; }"),
        ]));
        let session = Session::new("s1", Some(env));
        let config = ForgeConfig::default();
        tokio_test::assert_ok!(session.refresh_manifest(&config).await);

        session
            .commit(TurnCommit {
                written: vec![
                    ("index.html".to_string(), "<div id=\"root\"></div>".to_string()),
                    ("public/logo.svg".to_string(), "<svg/>".to_string()),
                ],
                installed: Vec::new(),
                record: record(&["index.html", "public/logo.svg"]),
            })
            .await;
        tokio_test::assert_ok!(session.refresh_manifest(&config).await);

        let known = session.known_files().await;
        assert!(known.contains("index.html"));
        assert!(known.contains("public/logo.svg"));
        assert!(known.contains("src/App.jsx"));
    }

    #[tokio::test]
    async fn test_refresh_drops_missing_source_files() {
        let env: EnvironmentHandle = Arc::new(
            MemoryEnvironment::new().with_files([("src/App.jsx", "export default function App() {}")]),
        );
        let session = Session::new("s1", Some(env));
        session
            .commit(TurnCommit {
                written: vec![("src/Gone.jsx".to_string(), "export default 1;".to_string())],
                installed: Vec::new(),
                record: record(&["src/Gone.jsx"]),
            })
            .await;

        tokio_test::assert_ok!(session.refresh_manifest(&ForgeConfig::default()).await);

        let known = session.known_files().await;
        assert!(known.contains("src/App.jsx"));
        assert!(!known.contains("src/Gone.jsx"));
    }

    #[tokio::test]
    async fn test_refresh_without_environment() {
        let session = Session::new("s1", None);
        assert!(matches!(
            session.refresh_manifest(&ForgeConfig::default()).await,
            Err(ForgeError::EnvironmentUnavailable(_))
        ));
    }

    #[test]
    fn test_trim_history() {
        let mut state = SessionState::new(None);
        for i in 0..5 {
            state.edit_history.push(record(&[&format!("src/{}.jsx", i)]));
        }
        state.trim_history(2);

        assert_eq!(state.edit_history.len(), 2);
        assert_eq!(state.edit_history[0].files_touched, vec!["src/3.jsx"]);
    }
}
