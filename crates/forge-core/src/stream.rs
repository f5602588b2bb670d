//! Model stream accumulation
//!
//! Collects one turn's model events into a growing buffer, re-running the
//! extractor on every text delta so callers can render partial files while
//! the stream is still open.

use crate::config::ForgeConfig;
use crate::error::{ForgeError, Result};
use crate::extract::{tags, Extraction, Extractor};
use crate::reconcile::{Reconciler, Reconciliation};
use forge_types::StreamEvent;
use futures::{Stream, StreamExt};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Markers that make a conversation chunk look like leaked code
const CODE_MARKERS: &[&str] = &["<file", "import React", "export default", "className="];

/// Everything a finished stream produced
#[derive(Debug, Clone)]
pub struct TurnOutput {
    /// Final buffer the extraction was run over
    pub buffer: String,
    pub extraction: Extraction,
    /// Explicit packages plus tool-call packages, in arrival order
    pub packages: Vec<String>,
    pub explanation: Option<String>,
    pub conversation: Vec<String>,
}

impl TurnOutput {
    /// Reconcile the extracted files against the session's known files
    pub fn reconcile(&self, config: &ForgeConfig, known_files: &BTreeSet<String>) -> Reconciliation {
        let mut reconciliation = Reconciler::new(config).reconcile(&self.extraction, known_files);
        reconciliation.merge_packages(&self.packages, config);
        reconciliation
    }
}

/// Accumulates stream events for one turn
pub struct TurnAccumulator {
    extractor: Extractor,
    config: ForgeConfig,
    buffer: String,
    latest: Extraction,
    conversation: Vec<String>,
    tool_packages: Vec<String>,
    explanation: Option<String>,
    status: Option<String>,
    completed: bool,
    error: Option<String>,
}

impl TurnAccumulator {
    pub fn new(config: &ForgeConfig) -> Self {
        Self {
            extractor: Extractor::new(config),
            config: config.clone(),
            buffer: String::new(),
            latest: Extraction::default(),
            conversation: Vec::new(),
            tool_packages: Vec::new(),
            explanation: None,
            status: None,
            completed: false,
            error: None,
        }
    }

    /// Feed one event; returns true when the extraction changed
    pub fn push(&mut self, event: StreamEvent) -> bool {
        if self.is_finished() {
            debug!("Ignoring {} event after the stream finished", event.kind());
            return false;
        }

        match event {
            StreamEvent::Stream { text, .. } => {
                self.buffer.push_str(&text);
                self.rescan()
            }
            StreamEvent::Complete {
                generated_code,
                explanation,
                packages_to_install,
            } => {
                self.completed = true;
                self.tool_packages.extend(packages_to_install);
                if explanation.is_some() {
                    self.explanation = explanation;
                }
                if !generated_code.is_empty() {
                    self.buffer = generated_code;
                }
                self.rescan();
                true
            }
            StreamEvent::Package { name, .. } => {
                self.tool_packages.push(name);
                false
            }
            StreamEvent::Conversation { text } => {
                self.push_conversation(&text);
                false
            }
            StreamEvent::Status { message } => {
                self.status = Some(message);
                false
            }
            StreamEvent::Error { error } => {
                warn!("Model stream reported an error: {}", error);
                self.error = Some(error);
                false
            }
            StreamEvent::Thinking { .. } | StreamEvent::ThinkingComplete { .. } | StreamEvent::Unknown => false,
        }
    }

    fn rescan(&mut self) -> bool {
        let extraction = self.extractor.extract(&self.buffer);
        let changed = extraction != self.latest;
        self.latest = extraction;
        changed
    }

    fn push_conversation(&mut self, text: &str) {
        let text = tags::strip_package_tags(text);
        if CODE_MARKERS.iter().any(|marker| text.contains(marker)) {
            debug!("Dropping conversation chunk that looks like code");
            return;
        }
        if !text.trim().is_empty() {
            self.conversation.push(text);
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Current extraction over the buffer seen so far
    pub fn extraction(&self) -> &Extraction {
        &self.latest
    }

    pub fn conversation(&self) -> &[String] {
        &self.conversation
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.completed || self.error.is_some()
    }

    /// Packages already safe to install before files are reconciled
    ///
    /// Closed `<packages>` blocks and tool-call packages only; a block still
    /// being streamed may be cut mid-name.
    pub fn ready_packages(&self) -> Vec<String> {
        let mut ready = Reconciliation::default();
        ready.merge_packages(tags::closed_package_blocks(&self.buffer), &self.config);
        ready.merge_packages(&self.tool_packages, &self.config);
        ready.packages
    }

    /// Close the turn
    pub fn finish(self) -> Result<TurnOutput> {
        if let Some(error) = self.error {
            return Err(ForgeError::StreamError(error));
        }
        if !self.completed {
            return Err(ForgeError::StreamIncomplete);
        }

        let mut packages = self.latest.packages.clone();
        packages.extend(self.tool_packages);
        let explanation = self.latest.explanation.clone().or(self.explanation);

        Ok(TurnOutput {
            buffer: self.buffer,
            extraction: self.latest,
            packages,
            explanation,
            conversation: self.conversation,
        })
    }
}

/// Drain a model event stream into a finished turn
pub async fn collect_turn<S>(config: &ForgeConfig, events: S) -> Result<TurnOutput>
where
    S: Stream<Item = StreamEvent>,
{
    futures::pin_mut!(events);
    let mut accumulator = TurnAccumulator::new(config);
    while let Some(event) = events.next().await {
        let terminal = event.is_terminal();
        accumulator.push(event);
        if terminal {
            break;
        }
    }
    accumulator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> StreamEvent {
        StreamEvent::Stream {
            text: text.to_string(),
            raw: false,
        }
    }

    fn complete(code: &str) -> StreamEvent {
        StreamEvent::Complete {
            generated_code: code.to_string(),
            explanation: None,
            packages_to_install: Vec::new(),
        }
    }

    #[test]
    fn test_partial_file_visible_while_streaming() {
        let mut acc = TurnAccumulator::new(&ForgeConfig::default());
        assert!(acc.push(delta("<file path=\"src/App.jsx\">export default ")));

        let files = &acc.extraction().files;
        assert_eq!(files.len(), 1);
        assert!(!files[0].complete);

        acc.push(delta("function App() { return null }</file>"));
        assert!(acc.extraction().files[0].complete);
    }

    #[test]
    fn test_conversation_filtering() {
        let mut acc = TurnAccumulator::new(&ForgeConfig::default());
        acc.push(StreamEvent::Conversation {
            text: "Sure, adding a chart. <package>recharts</package>".to_string(),
        });
        acc.push(StreamEvent::Conversation {
            text: "export default function App() {}".to_string(),
        });

        assert_eq!(acc.conversation(), &["Sure, adding a chart. ".to_string()]);
    }

    #[test]
    fn test_ready_packages() {
        let mut acc = TurnAccumulator::new(&ForgeConfig::default());
        acc.push(delta("<packages>\naxios\nreact\n</packages>\n<packages>zus"));
        acc.push(StreamEvent::Package {
            name: "clsx".to_string(),
            message: None,
        });

        assert_eq!(acc.ready_packages(), vec!["axios", "clsx"]);
    }

    #[test]
    fn test_finish_requires_complete() {
        let mut acc = TurnAccumulator::new(&ForgeConfig::default());
        acc.push(delta("<file path=\"src/App.jsx\">"));
        assert!(matches!(acc.finish(), Err(ForgeError::StreamIncomplete)));

        let mut acc = TurnAccumulator::new(&ForgeConfig::default());
        acc.push(StreamEvent::Error {
            error: "rate limited".to_string(),
        });
        assert!(matches!(acc.finish(), Err(ForgeError::StreamError(_))));
    }

    #[tokio::test]
    async fn test_collect_turn_end_to_end() {
        let config = ForgeConfig::default();
        let events = futures::stream::iter(vec![
            delta("<file path=\"src/App.jsx\">import React from 'react-router-dom';\n"),
            delta("export default function App(){return null}</file>"),
            StreamEvent::Complete {
                generated_code: String::new(),
                explanation: Some("Added routing".to_string()),
                packages_to_install: vec!["axios".to_string()],
            },
        ]);

        let output = collect_turn(&config, events).await.unwrap();
        let reconciliation = output.reconcile(&config, &BTreeSet::new());

        assert_eq!(reconciliation.paths().collect::<Vec<_>>(), vec!["src/App.jsx"]);
        assert_eq!(reconciliation.packages, vec!["react-router-dom", "axios"]);
        assert_eq!(output.explanation.as_deref(), Some("Added routing"));
    }

    #[test]
    fn test_complete_replaces_buffer() {
        let mut acc = TurnAccumulator::new(&ForgeConfig::default());
        acc.push(delta("<file path=\"src/A.jsx\">partial"));
        acc.push(complete("<file path=\"src/A.jsx\">full</file>"));

        let output = acc.finish().unwrap();
        assert_eq!(output.extraction.files[0].content, "full");
        assert!(output.extraction.files[0].complete);
    }
}
