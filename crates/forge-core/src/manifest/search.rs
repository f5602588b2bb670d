//! Line-level content search over manifest files

use crate::paths::is_script;
use crate::types::FileInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lines of context kept on each side of a hit
const CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchConfidence {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub file: String,
    /// One-based
    pub line_number: usize,
    pub line: String,
    pub matched_term: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
    pub confidence: SearchConfidence,
}

/// Case-insensitive search of script files; high-confidence hits first
pub fn search(files: &BTreeMap<String, FileInfo>, terms: &[String]) -> Vec<SearchHit> {
    let terms: Vec<(&str, String)> = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| (t, t.to_lowercase()))
        .collect();
    if terms.is_empty() {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for (path, info) in files.iter().filter(|(path, _)| is_script(path)) {
        let lines: Vec<&str> = info.content.lines().collect();

        for (i, line) in lines.iter().enumerate() {
            let lower = line.to_lowercase();
            let Some((term, _)) = terms.iter().find(|(_, needle)| lower.contains(needle.as_str())) else {
                continue;
            };

            let confidence = if line.contains(term)
                || line.contains("function")
                || line.contains("export")
                || line.contains("return")
            {
                SearchConfidence::High
            } else {
                SearchConfidence::Medium
            };

            hits.push(SearchHit {
                file: path.clone(),
                line_number: i + 1,
                line: line.trim().to_string(),
                matched_term: term.to_string(),
                context_before: lines[i.saturating_sub(CONTEXT_LINES)..i]
                    .iter()
                    .map(|l| l.to_string())
                    .collect(),
                context_after: lines[i + 1..(i + 1 + CONTEXT_LINES).min(lines.len())]
                    .iter()
                    .map(|l| l.to_string())
                    .collect(),
                confidence,
            });
        }
    }

    hits.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    hits
}
