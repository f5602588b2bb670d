//! One generation turn from instruction to applied result
//!
//! Ties the classifier, the stream accumulator, the reconciler and the
//! orchestrator together around a session.

use crate::config::ForgeConfig;
use crate::error::Result;
use crate::intent::Classifier;
use crate::orchestrator::{ApplyRequest, Orchestrator, ProgressSink, ProgressStream};
use crate::session::Session;
use crate::stream::{TurnAccumulator, TurnOutput};
use crate::types::EditIntent;
use forge_types::{ApplicationResult, StreamEvent};
use futures::{Stream, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A turn whose stream has closed and whose application is running
pub struct TurnHandle {
    pub output: TurnOutput,
    pub progress: ProgressStream,
    pub task: JoinHandle<Result<ApplicationResult>>,
}

pub struct Pipeline {
    config: ForgeConfig,
    classifier: Classifier,
    orchestrator: Orchestrator,
}

impl Pipeline {
    pub fn new(config: ForgeConfig) -> Self {
        Self {
            classifier: Classifier::new(&config),
            orchestrator: Orchestrator::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Scope a follow-up instruction against a fresh manifest
    ///
    /// Returns `None` for a project with no files yet, where the turn is an
    /// initial generation rather than an edit.
    pub async fn prepare(&self, session: &Session, instruction: &str) -> Result<Option<EditIntent>> {
        let manifest = session.refresh_manifest(&self.config).await?;
        if manifest.is_empty() {
            return Ok(None);
        }

        let intent = self.classifier.classify(instruction, &manifest);
        info!(
            "Classified as {} ({:.2}) targeting {:?}",
            intent.edit_type, intent.confidence, intent.target_files
        );
        Ok(Some(intent))
    }

    /// Consume a model stream and start applying its output
    ///
    /// Packages from closed `<packages>` blocks and tool events are
    /// installed while the stream is still open. Application waits for
    /// those installs, so the turn reports them as already installed.
    pub async fn run_turn<S>(
        &self,
        session: Arc<Session>,
        instruction: &str,
        intent: Option<EditIntent>,
        events: S,
    ) -> Result<TurnHandle>
    where
        S: Stream<Item = StreamEvent>,
    {
        futures::pin_mut!(events);
        let mut accumulator = TurnAccumulator::new(&self.config);
        let mut requested: BTreeSet<String> = BTreeSet::new();
        let mut installs: Vec<JoinHandle<Result<Vec<String>>>> = Vec::new();

        while let Some(event) = events.next().await {
            let terminal = event.is_terminal();
            accumulator.push(event);
            if terminal {
                break;
            }

            let ready: Vec<String> = accumulator
                .ready_packages()
                .into_iter()
                .filter(|p| requested.insert(p.clone()))
                .collect();
            if !ready.is_empty() {
                debug!("Starting early install of {:?}", ready);
                let orchestrator = self.orchestrator.clone();
                let session = session.clone();
                installs.push(tokio::spawn(async move { orchestrator.preinstall(&session, &ready).await }));
            }
        }

        for install in installs {
            match install.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Early install failed: {}", e),
                Err(e) => warn!("Early install task failed: {}", e),
            }
        }

        let output = accumulator.finish()?;
        let request = self.request(&session, instruction, intent, &output).await;
        let (progress, task) = self.orchestrator.spawn_apply(session, request);

        Ok(TurnHandle {
            output,
            progress,
            task,
        })
    }

    /// Apply a complete generated response in the current task
    pub async fn apply_text(
        &self,
        session: &Session,
        instruction: &str,
        intent: Option<EditIntent>,
        text: &str,
        sink: &ProgressSink,
    ) -> Result<ApplicationResult> {
        let mut accumulator = TurnAccumulator::new(&self.config);
        accumulator.push(StreamEvent::Complete {
            generated_code: text.to_string(),
            explanation: None,
            packages_to_install: Vec::new(),
        });
        let output = accumulator.finish()?;

        let request = self.request(session, instruction, intent, &output).await;
        self.orchestrator.apply(session, request, sink).await
    }

    async fn request(
        &self,
        session: &Session,
        instruction: &str,
        intent: Option<EditIntent>,
        output: &TurnOutput,
    ) -> ApplyRequest {
        let known = session.known_files().await;
        let reconciliation = output.reconcile(&self.config, &known);

        let mut request = ApplyRequest::from_reconciliation(instruction, reconciliation, &output.extraction);
        request.explanation = output.explanation.clone();
        if let Some(intent) = intent {
            request = request.with_intent(intent);
        }
        request
    }
}
