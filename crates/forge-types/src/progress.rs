//! Orchestrator progress protocol
//!
//! Emitted in the exact order operations are attempted: install,
//! then write, then execute, then one terminal `complete`.

use crate::result::ApplicationResult;
use serde::{Deserialize, Serialize};

/// Pipeline stage of the application orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Install,
    Write,
    Execute,
}

impl Stage {
    /// All stages in execution order
    pub fn all() -> &'static [Stage] {
        &[Stage::Install, Stage::Write, Stage::Execute]
    }

    /// One-based step number used on the wire
    pub fn number(&self) -> u32 {
        match self {
            Stage::Install => 1,
            Stage::Write => 2,
            Stage::Execute => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Install => "install",
            Stage::Write => "write",
            Stage::Execute => "execute",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-package state reported during the install stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageStatus {
    Installing,
    Installed,
    AlreadyInstalled,
    Failed,
}

/// What happened (or is happening) to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Creating,
    Updating,
    Created,
    Updated,
}

/// Which output stream a command chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Progress event emitted by the application orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProgressEvent {
    #[serde(rename_all = "camelCase")]
    Start { message: String, total_steps: u32 },

    /// Stage start with the number of items the stage will attempt
    #[serde(rename_all = "camelCase")]
    Step {
        step: u32,
        stage: Stage,
        message: String,
        total: usize,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        packages: Vec<String>,
    },

    #[serde(rename_all = "camelCase")]
    PackageProgress {
        package: String,
        status: PackageStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    FileProgress {
        current: usize,
        total: usize,
        file_name: String,
        action: FileAction,
    },

    #[serde(rename_all = "camelCase")]
    FileComplete { file_name: String, action: FileAction },

    #[serde(rename_all = "camelCase")]
    FileError { file_name: String, error: String },

    #[serde(rename_all = "camelCase")]
    CommandProgress {
        current: usize,
        total: usize,
        command: String,
    },

    #[serde(rename_all = "camelCase")]
    CommandOutput {
        command: String,
        output: String,
        stream: OutputStream,
    },

    #[serde(rename_all = "camelCase")]
    CommandComplete {
        command: String,
        #[serde(default)]
        exit_code: Option<i32>,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Terminal event, always emitted once per turn
    #[serde(rename_all = "camelCase")]
    Complete {
        results: ApplicationResult,
        #[serde(default)]
        explanation: Option<String>,
        #[serde(default)]
        structure: Option<String>,
        message: String,
    },

    Error { error: String },

    /// Any event type this version does not know about
    #[serde(other)]
    Unknown,
}

impl ProgressEvent {
    /// Get the event type as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Start { .. } => "start",
            ProgressEvent::Step { .. } => "step",
            ProgressEvent::PackageProgress { .. } => "package-progress",
            ProgressEvent::FileProgress { .. } => "file-progress",
            ProgressEvent::FileComplete { .. } => "file-complete",
            ProgressEvent::FileError { .. } => "file-error",
            ProgressEvent::CommandProgress { .. } => "command-progress",
            ProgressEvent::CommandOutput { .. } => "command-output",
            ProgressEvent::CommandComplete { .. } => "command-complete",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. })
    }

    /// Encode as a server-sent-events frame
    pub fn to_sse(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => format!("data: {}\n\n", json),
            Err(_) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_complete_wire_format() {
        let event = ProgressEvent::FileComplete {
            file_name: "src/App.jsx".to_string(),
            action: FileAction::Created,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "file-complete");
        assert_eq!(json["fileName"], "src/App.jsx");
        assert_eq!(json["action"], "created");
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let json = r#"{"type":"command-complete","command":"npm test","exitCode":1,"success":false,"durationMs":12}"#;
        let event: ProgressEvent = serde_json::from_str(json).unwrap();

        assert_eq!(
            event,
            ProgressEvent::CommandComplete {
                command: "npm test".to_string(),
                exit_code: Some(1),
                success: false,
                error: None,
            }
        );
    }

    #[test]
    fn test_stage_order() {
        let numbers: Vec<u32> = Stage::all().iter().map(Stage::number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
