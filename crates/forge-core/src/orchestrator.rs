//! Application orchestrator
//!
//! Applies one turn's reconciled output to the session's environment in
//! three strictly sequential stages: install, write, execute. Every stage
//! records per-item failures in the result and moves on; only an unusable
//! environment ends the turn early. Progress events are emitted in the
//! order operations are attempted and a terminal `complete` always fires.

use crate::config::ForgeConfig;
use crate::environment::{split_command, EnvironmentHandle};
use crate::error::{ForgeError, Result};
use crate::extract::Extraction;
use crate::paths::{normalize_path, strip_css_imports};
use crate::reconcile::Reconciliation;
use crate::session::{Session, TurnCommit};
use crate::types::{EditIntent, EditRecord, ReconciledFile};
use chrono::Utc;
use forge_types::{
    ApplicationResult, FileAction, OutputStream, PackageStatus, ProgressEvent, Stage,
};
use futures::Stream;
use std::collections::BTreeSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Everything one turn asks the orchestrator to do
#[derive(Debug, Clone, Default)]
pub struct ApplyRequest {
    pub instruction: String,
    pub intent: Option<EditIntent>,
    pub files: Vec<ReconciledFile>,
    pub packages: Vec<String>,
    pub commands: Vec<String>,
    pub explanation: Option<String>,
    pub structure: Option<String>,
}

impl ApplyRequest {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            ..Self::default()
        }
    }

    /// Build a request from a reconciled buffer and its extraction
    pub fn from_reconciliation(
        instruction: impl Into<String>,
        reconciliation: Reconciliation,
        extraction: &Extraction,
    ) -> Self {
        Self {
            instruction: instruction.into(),
            intent: None,
            files: reconciliation.files,
            packages: reconciliation.packages,
            commands: extraction.commands.clone(),
            explanation: extraction.explanation.clone(),
            structure: extraction.structure.clone(),
        }
    }

    pub fn with_intent(mut self, intent: EditIntent) -> Self {
        self.intent = Some(intent);
        self
    }
}

/// Sending half of a progress channel; a dropped consumer is ignored
#[derive(Clone)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    /// A sink that drops every event
    pub fn discard() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// Ordered stream of progress events for one turn
pub struct ProgressStream {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Create a connected sink and stream
pub fn progress_channel() -> (ProgressSink, ProgressStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSink { tx: Some(tx) }, ProgressStream { rx })
}

#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<ForgeConfig>,
}

impl Orchestrator {
    pub fn new(config: &ForgeConfig) -> Self {
        Self {
            config: Arc::new(config.clone()),
        }
    }

    /// Run a turn on a background task and stream its progress
    ///
    /// Dropping the stream does not cancel the turn; writes already issued
    /// are not rolled back.
    pub fn spawn_apply(
        &self,
        session: Arc<Session>,
        request: ApplyRequest,
    ) -> (ProgressStream, JoinHandle<Result<ApplicationResult>>) {
        let (sink, stream) = progress_channel();
        let orchestrator = self.clone();
        let handle = tokio::spawn(async move { orchestrator.apply(&session, request, &sink).await });
        (stream, handle)
    }

    /// Apply a turn to the session's environment
    ///
    /// Holds the session's turn lock throughout. Session bookkeeping is
    /// committed only once the terminal event is reached.
    pub async fn apply(
        &self,
        session: &Session,
        request: ApplyRequest,
        sink: &ProgressSink,
    ) -> Result<ApplicationResult> {
        let _turn = session.lock_turn().await;

        let Some(environment) = session.environment().await else {
            let err = ForgeError::EnvironmentUnavailable(format!("session {} has no environment", session.id()));
            return Err(self.abort(sink, &request, ApplicationResult::failed(err.to_string()), err));
        };
        if !environment.is_available().await {
            let err = ForgeError::EnvironmentUnavailable(format!("environment {} is not reachable", environment.id()));
            return Err(self.abort(sink, &request, ApplicationResult::failed(err.to_string()), err));
        }

        info!(
            "Applying turn to {}: {} file(s), {} package(s), {} command(s)",
            environment.id(),
            request.files.len(),
            request.packages.len(),
            request.commands.len()
        );
        sink.emit(ProgressEvent::Start {
            message: "Applying generated code".to_string(),
            total_steps: Stage::all().len() as u32,
        });

        let declared = session.declared_packages().await;
        let known = session.known_files().await;
        let mut run = TurnRun {
            config: &self.config,
            environment,
            sink,
            result: ApplicationResult::new(),
            written: Vec::new(),
        };

        let staged = async {
            run.install(&request.packages, &declared).await?;
            run.write(&request.files, &known).await?;
            run.execute(&request.commands).await
        }
        .await;

        if let Err(e) = staged {
            let mut result = std::mem::take(&mut run.result);
            result.record_error(e.to_string());
            return Err(self.abort(sink, &request, result, e));
        }

        let TurnRun { result, written, .. } = run;

        if !written.is_empty() {
            let delay = self.config.settle_delay(!result.packages_installed.is_empty());
            if !delay.is_zero() {
                debug!("Waiting {:?} for the environment to settle", delay);
                tokio::time::sleep(delay).await;
            }
        }

        session
            .commit(TurnCommit {
                written,
                installed: result.packages_installed.clone(),
                record: edit_record(&request, &result),
            })
            .await;

        sink.emit(ProgressEvent::Complete {
            results: result.clone(),
            explanation: request.explanation.clone(),
            structure: request.structure.clone(),
            message: summary_message(&result),
        });

        Ok(result)
    }

    /// Install packages ahead of a turn's application
    ///
    /// Runs the install stage alone, silently, and declares whatever was
    /// installed so the turn that follows reports it as already installed.
    /// Nothing is recorded in the edit history.
    pub async fn preinstall(&self, session: &Session, packages: &[String]) -> Result<Vec<String>> {
        let _turn = session.lock_turn().await;

        let environment = session
            .environment()
            .await
            .ok_or_else(|| ForgeError::EnvironmentUnavailable(format!("session {} has no environment", session.id())))?;
        if !environment.is_available().await {
            return Err(ForgeError::EnvironmentUnavailable(format!(
                "environment {} is not reachable",
                environment.id()
            )));
        }

        let declared = session.declared_packages().await;
        let sink = ProgressSink::discard();
        let mut run = TurnRun {
            config: &self.config,
            environment,
            sink: &sink,
            result: ApplicationResult::new(),
            written: Vec::new(),
        };
        run.install(packages, &declared).await?;

        let installed = run.result.packages_installed;
        if !installed.is_empty() {
            debug!("Pre-installed {:?}", installed);
            session.declare_packages(installed.clone()).await;
        }
        Ok(installed)
    }

    /// Emit the error and the terminal event for a turn that cannot continue
    fn abort(
        &self,
        sink: &ProgressSink,
        request: &ApplyRequest,
        result: ApplicationResult,
        err: ForgeError,
    ) -> ForgeError {
        error!("Turn aborted: {}", err);
        sink.emit(ProgressEvent::Error {
            error: err.to_string(),
        });
        sink.emit(ProgressEvent::Complete {
            results: result,
            explanation: request.explanation.clone(),
            structure: request.structure.clone(),
            message: "Failed to apply changes".to_string(),
        });
        err
    }
}

/// State of one turn while its stages run
struct TurnRun<'a> {
    config: &'a ForgeConfig,
    environment: EnvironmentHandle,
    sink: &'a ProgressSink,
    result: ApplicationResult,
    written: Vec<(String, String)>,
}

impl TurnRun<'_> {
    async fn install(&mut self, packages: &[String], declared: &BTreeSet<String>) -> Result<()> {
        let mut requested: Vec<String> = Vec::new();
        for package in packages {
            let package = package.trim();
            if !package.is_empty()
                && !self.config.is_preinstalled(package)
                && !requested.iter().any(|p| p == package)
            {
                requested.push(package.to_string());
            }
        }
        if requested.is_empty() {
            return Ok(());
        }

        let (already, missing): (Vec<String>, Vec<String>) =
            requested.iter().cloned().partition(|p| declared.contains(p));

        self.sink.emit(ProgressEvent::Step {
            step: Stage::Install.number(),
            stage: Stage::Install,
            message: format!("Installing {} package(s)", missing.len()),
            total: requested.len(),
            packages: requested.clone(),
        });

        for package in already {
            self.sink.emit(ProgressEvent::PackageProgress {
                package: package.clone(),
                status: PackageStatus::AlreadyInstalled,
                error: None,
            });
            self.result.packages_already_installed.push(package);
        }
        if missing.is_empty() {
            return Ok(());
        }

        for package in &missing {
            self.sink.emit(ProgressEvent::PackageProgress {
                package: package.clone(),
                status: PackageStatus::Installing,
                error: None,
            });
        }

        let timeout = self.config.install_timeout();
        let outcome = match tokio::time::timeout(timeout, self.environment.install_packages(&missing)).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) if e.is_fatal() => return Err(e),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {}s", timeout.as_secs())),
        };

        match outcome {
            Ok(outcome) => {
                for package in missing {
                    if outcome.failed.contains(&package) {
                        warn!("Package {} failed to install", package);
                        self.package_failed(package, "install failed".to_string());
                    } else {
                        self.sink.emit(ProgressEvent::PackageProgress {
                            package: package.clone(),
                            status: PackageStatus::Installed,
                            error: None,
                        });
                        self.result.packages_installed.push(package);
                    }
                }
            }
            Err(message) => {
                warn!("Package installation failed: {}", message);
                self.result
                    .record_error(format!("Failed to install packages: {}", message));
                for package in missing {
                    self.package_failed(package, message.clone());
                }
            }
        }
        Ok(())
    }

    fn package_failed(&mut self, package: String, error: String) {
        self.sink.emit(ProgressEvent::PackageProgress {
            package: package.clone(),
            status: PackageStatus::Failed,
            error: Some(error),
        });
        self.result.packages_failed.push(package);
    }

    async fn write(&mut self, files: &[ReconciledFile], known: &BTreeSet<String>) -> Result<()> {
        let writable: Vec<(String, &ReconciledFile)> = files
            .iter()
            .map(|file| (normalize_path(&file.path, self.config), file))
            .filter(|(path, _)| {
                let protected = self.config.is_protected(path);
                if protected {
                    info!("Skipping protected file {}", path);
                }
                !protected
            })
            .collect();
        if writable.is_empty() {
            return Ok(());
        }

        let total = writable.len();
        self.sink.emit(ProgressEvent::Step {
            step: Stage::Write.number(),
            stage: Stage::Write,
            message: format!("Writing {} file(s)", total),
            total,
            packages: Vec::new(),
        });

        for (i, (path, file)) in writable.into_iter().enumerate() {
            let content = if self.config.files.utility_css_only {
                strip_css_imports(&path, &file.content)
            } else {
                file.content.clone()
            };
            let is_update = known.contains(&path);

            self.sink.emit(ProgressEvent::FileProgress {
                current: i + 1,
                total,
                file_name: path.clone(),
                action: if is_update {
                    FileAction::Updating
                } else {
                    FileAction::Creating
                },
            });

            match self.environment.write_file(&path, &content).await {
                Ok(()) => {
                    let action = if is_update {
                        self.result.files_updated.push(path.clone());
                        FileAction::Updated
                    } else {
                        self.result.files_created.push(path.clone());
                        FileAction::Created
                    };
                    self.sink.emit(ProgressEvent::FileComplete {
                        file_name: path.clone(),
                        action,
                    });
                    self.written.push((path, content));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Failed to write {}: {}", path, e);
                    self.result
                        .record_error(format!("Failed to write {}: {}", path, e));
                    self.sink.emit(ProgressEvent::FileError {
                        file_name: path,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn execute(&mut self, commands: &[String]) -> Result<()> {
        let commands: Vec<(&String, Vec<String>)> = commands
            .iter()
            .map(|c| (c, split_command(c)))
            .filter(|(_, argv)| !argv.is_empty())
            .collect();
        if commands.is_empty() {
            return Ok(());
        }

        let total = commands.len();
        self.sink.emit(ProgressEvent::Step {
            step: Stage::Execute.number(),
            stage: Stage::Execute,
            message: format!("Running {} command(s)", total),
            total,
            packages: Vec::new(),
        });

        let timeout = self.config.command_timeout();
        for (i, (command, argv)) in commands.into_iter().enumerate() {
            self.sink.emit(ProgressEvent::CommandProgress {
                current: i + 1,
                total,
                command: command.clone(),
            });

            match self.environment.run_command(&argv, None, timeout).await {
                Ok(output) => {
                    for (text, stream) in [
                        (&output.stdout, OutputStream::Stdout),
                        (&output.stderr, OutputStream::Stderr),
                    ] {
                        if !text.is_empty() {
                            self.sink.emit(ProgressEvent::CommandOutput {
                                command: command.clone(),
                                output: text.clone(),
                                stream,
                            });
                        }
                    }

                    self.result.commands_executed.push(command.clone());
                    let error = if output.success() {
                        None
                    } else {
                        let detail = match (output.stderr.trim(), output.exit_code) {
                            ("", Some(code)) => format!("exit code {}", code),
                            ("", None) => "terminated".to_string(),
                            (stderr, _) => stderr.to_string(),
                        };
                        warn!("Command '{}' failed: {}", command, detail);
                        self.result
                            .record_error(format!("Command '{}' failed: {}", command, detail));
                        Some(detail)
                    };

                    self.sink.emit(ProgressEvent::CommandComplete {
                        command: command.clone(),
                        exit_code: output.exit_code,
                        success: error.is_none(),
                        error,
                    });
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Command '{}' could not run: {}", command, e);
                    self.result
                        .record_error(format!("Command '{}' failed: {}", command, e));
                    self.sink.emit(ProgressEvent::CommandComplete {
                        command: command.clone(),
                        exit_code: None,
                        success: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        Ok(())
    }
}

fn edit_record(request: &ApplyRequest, result: &ApplicationResult) -> EditRecord {
    EditRecord {
        id: uuid::Uuid::new_v4(),
        instruction: request.instruction.clone(),
        edit_type: request.intent.as_ref().map(|i| i.edit_type),
        target_files: request
            .intent
            .as_ref()
            .map(|i| i.target_files.clone())
            .unwrap_or_default(),
        confidence: request.intent.as_ref().map(|i| i.confidence),
        files_touched: result.touched_files().cloned().collect(),
        outcome: result.outcome(),
        error: (!result.errors.is_empty()).then(|| result.errors.join("; ")),
        timestamp: Utc::now(),
    }
}

fn summary_message(result: &ApplicationResult) -> String {
    let mut message = format!(
        "Applied {} file(s), installed {} package(s)",
        result.files_written(),
        result.packages_installed.len()
    );
    if !result.is_success() {
        let failures = result.errors.len().max(result.packages_failed.len());
        message.push_str(&format!(" with {} error(s)", failures));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{CommandOutput, MemoryEnvironment};
    use forge_types::Outcome;
    use futures::StreamExt;

    fn config() -> ForgeConfig {
        ForgeConfig::default().without_settle_delays()
    }

    fn file(path: &str, content: &str) -> ReconciledFile {
        ReconciledFile {
            path: path.to_string(),
            content: content.to_string(),
            is_update: false,
            complete: true,
        }
    }

    fn session_with(env: MemoryEnvironment) -> (Arc<Session>, Arc<MemoryEnvironment>) {
        let env = Arc::new(env);
        let handle: EnvironmentHandle = env.clone();
        (Arc::new(Session::new("test", Some(handle))), env)
    }

    async fn apply_collect(
        session: &Session,
        request: ApplyRequest,
    ) -> (Result<ApplicationResult>, Vec<ProgressEvent>) {
        let (sink, stream) = progress_channel();
        let result = Orchestrator::new(&config()).apply(session, request, &sink).await;
        drop(sink);
        (result, stream.collect().await)
    }

    #[tokio::test]
    async fn test_protected_files_are_never_written() {
        let (session, env) = session_with(MemoryEnvironment::new());
        let mut request = ApplyRequest::new("build it");
        request.files = vec![
            file("src/Foo.jsx", "export default function Foo() {}"),
            file("package.json", "{}"),
        ];

        let (result, _) = apply_collect(&session, request).await;
        let result = result.unwrap();

        assert_eq!(result.files_created, vec!["src/Foo.jsx"]);
        assert!(result.touched_files().all(|f| f != "package.json"));
        assert!(env.file("package.json").await.is_none());
    }

    #[tokio::test]
    async fn test_install_failure_still_writes_files() {
        let (session, env) = session_with(MemoryEnvironment::new().fail_install("registry unreachable"));
        let mut request = ApplyRequest::new("add a chart");
        request.packages = vec!["recharts".to_string()];
        request.files = vec![file("src/Chart.jsx", "chart"), file("src/App.jsx", "app")];

        let (result, events) = apply_collect(&session, request).await;
        let result = result.unwrap();

        assert_eq!(result.packages_failed, vec!["recharts"]);
        assert_eq!(result.files_created, vec!["src/Chart.jsx", "src/App.jsx"]);
        assert_eq!(result.outcome(), Outcome::Partial);
        assert_eq!(env.file("src/App.jsx").await.as_deref(), Some("app"));
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_event_order() {
        let env = MemoryEnvironment::new().with_command_output(
            "npm run lint",
            CommandOutput {
                stdout: "ok".to_string(),
                stderr: String::new(),
                exit_code: Some(0),
            },
        );
        let (session, _) = session_with(env);
        let mut request = ApplyRequest::new("build it");
        request.packages = vec!["axios".to_string()];
        request.files = vec![file("src/App.jsx", "app")];
        request.commands = vec!["npm run lint".to_string()];

        let (_, events) = apply_collect(&session, request).await;
        let kinds: Vec<&str> = events.iter().map(ProgressEvent::kind).collect();

        assert_eq!(
            kinds,
            vec![
                "start",
                "step",
                "package-progress",
                "package-progress",
                "step",
                "file-progress",
                "file-complete",
                "step",
                "command-progress",
                "command-output",
                "command-complete",
                "complete",
            ]
        );
    }

    #[tokio::test]
    async fn test_preinstall_declares_without_history() {
        let (session, env) = session_with(MemoryEnvironment::new());
        let orchestrator = Orchestrator::new(&config());

        let installed = orchestrator
            .preinstall(&session, &["axios".to_string(), "react".to_string()])
            .await
            .unwrap();

        assert_eq!(installed, vec!["axios"]);
        assert_eq!(env.installed().await, vec!["axios"]);
        let snapshot = session.snapshot().await;
        assert!(snapshot.declared_packages.contains("axios"));
        assert!(snapshot.edit_history.is_empty());

        let mut request = ApplyRequest::new("add a chart");
        request.packages = vec!["axios".to_string()];
        let (result, _) = apply_collect(&session, request).await;
        let result = result.unwrap();
        assert_eq!(result.packages_already_installed, vec!["axios"]);
        assert!(result.packages_installed.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_environment_aborts() {
        let env = MemoryEnvironment::new();
        env.set_available(false);
        let (session, _) = session_with(env);
        let mut request = ApplyRequest::new("build it");
        request.files = vec![file("src/App.jsx", "app")];

        let (result, events) = apply_collect(&session, request).await;

        assert!(matches!(result, Err(ForgeError::EnvironmentUnavailable(_))));
        let kinds: Vec<&str> = events.iter().map(ProgressEvent::kind).collect();
        assert_eq!(kinds, vec!["error", "complete"]);
        match &events[1] {
            ProgressEvent::Complete { results, .. } => {
                assert!(results.files_created.is_empty());
                assert!(results.packages_installed.is_empty());
                assert_eq!(results.errors.len(), 1);
                assert!(results.errors[0].contains("not reachable"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(session.snapshot().await.edit_history.is_empty());
    }

    #[tokio::test]
    async fn test_second_turn_updates_and_skips_installed() {
        let (session, _) = session_with(MemoryEnvironment::new());
        let mut request = ApplyRequest::new("build it");
        request.packages = vec!["axios".to_string()];
        request.files = vec![file("src/App.jsx", "import './App.css';\nexport default App;")];

        let (first, _) = apply_collect(&session, request.clone()).await;
        let (second, _) = apply_collect(&session, request).await;
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.files_created, vec!["src/App.jsx"]);
        assert_eq!(first.packages_installed, vec!["axios"]);
        assert_eq!(second.files_updated, vec!["src/App.jsx"]);
        assert_eq!(second.packages_already_installed, vec!["axios"]);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.edit_history.len(), 2);
        assert!(snapshot.known_files.contains("src/App.jsx"));
    }

    #[tokio::test]
    async fn test_per_item_failures_do_not_block() {
        let env = MemoryEnvironment::new()
            .fail_write("src/Bad.jsx")
            .fail_command("npm run broken")
            .with_command_output(
                "npm test",
                CommandOutput {
                    stdout: String::new(),
                    stderr: "1 failing".to_string(),
                    exit_code: Some(1),
                },
            );
        let (session, env) = session_with(env);
        let mut request = ApplyRequest::new("build it");
        request.files = vec![file("src/Bad.jsx", "bad"), file("src/Good.jsx", "good")];
        request.commands = vec!["npm run broken".to_string(), "npm test".to_string()];

        let (result, _) = apply_collect(&session, request).await;
        let result = result.unwrap();

        assert_eq!(result.files_created, vec!["src/Good.jsx"]);
        assert_eq!(result.commands_executed, vec!["npm test"]);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors[2].contains("1 failing"));
        assert_eq!(env.commands().await.len(), 2);
    }

    #[tokio::test]
    async fn test_css_imports_stripped() {
        let (session, env) = session_with(MemoryEnvironment::new());
        let mut request = ApplyRequest::new("build it");
        request.files = vec![file(
            "src/App.jsx",
            "import React from 'react';\nimport './App.css';\nexport default App;",
        )];

        tokio_test::assert_ok!(apply_collect(&session, request).await.0);

        let written = env.file("src/App.jsx").await.unwrap();
        assert!(!written.contains("App.css"));
        assert!(written.contains("import React"));
    }

    #[tokio::test]
    async fn test_spawn_apply_streams_to_completion() {
        let (session, _) = session_with(MemoryEnvironment::new());
        let mut request = ApplyRequest::new("build it");
        request.files = vec![file("src/App.jsx", "app")];

        let (stream, handle) = Orchestrator::new(&config()).spawn_apply(session, request);
        let events: Vec<ProgressEvent> = stream.collect().await;
        let result = handle.await.unwrap().unwrap();

        assert_eq!(result.files_created, vec!["src/App.jsx"]);
        assert_eq!(events.first().map(ProgressEvent::kind), Some("start"));
        assert!(events.last().unwrap().is_terminal());
    }
}
