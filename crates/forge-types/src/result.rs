//! Application result accumulated over one turn

use serde::{Deserialize, Serialize};

/// What one turn did to the environment
///
/// Filled progressively by the orchestrator and frozen once the
/// terminal `complete` event is emitted. A fully failed turn still
/// carries empty lists instead of omitting the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResult {
    #[serde(default)]
    pub files_created: Vec<String>,
    #[serde(default)]
    pub files_updated: Vec<String>,
    #[serde(default)]
    pub packages_installed: Vec<String>,
    #[serde(default)]
    pub packages_already_installed: Vec<String>,
    #[serde(default)]
    pub packages_failed: Vec<String>,
    #[serde(default)]
    pub commands_executed: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Coarse outcome of a turn, derived from its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Partial,
    Failed,
}

impl ApplicationResult {
    /// Create an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a result that only carries an error
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Self::default()
        }
    }

    /// Record a per-item error
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Files created or updated, creation order first
    pub fn touched_files(&self) -> impl Iterator<Item = &String> {
        self.files_created.iter().chain(self.files_updated.iter())
    }

    /// Number of files written
    pub fn files_written(&self) -> usize {
        self.files_created.len() + self.files_updated.len()
    }

    /// Whether nothing failed
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.packages_failed.is_empty()
    }

    pub fn outcome(&self) -> Outcome {
        if self.is_success() {
            Outcome::Success
        } else if self.files_written() > 0
            || !self.packages_installed.is_empty()
            || !self.commands_executed.is_empty()
        {
            Outcome::Partial
        } else {
            Outcome::Failed
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Partial => write!(f, "partial"),
            Outcome::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_keeps_empty_lists() {
        let result = ApplicationResult::failed("No environment available");
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["filesCreated"], serde_json::json!([]));
        assert_eq!(json["packagesInstalled"], serde_json::json!([]));
        assert_eq!(result.outcome(), Outcome::Failed);
    }

    #[test]
    fn test_outcome() {
        let mut result = ApplicationResult::new();
        result.files_created.push("src/App.jsx".to_string());
        assert_eq!(result.outcome(), Outcome::Success);

        result.packages_failed.push("left-pad".to_string());
        assert_eq!(result.outcome(), Outcome::Partial);
    }
}
