//! Candidate reconciliation
//!
//! Resolves every extracted version of a file to a single winner per
//! normalized path and aggregates the turn's package list.

use crate::config::ForgeConfig;
use crate::extract::Extraction;
use crate::paths::normalize_path;
use crate::types::{FileCandidate, ReconciledFile};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// Outcome of reconciling one buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Winners in first-arrival order
    pub files: Vec<ReconciledFile>,
    /// Deduplicated packages, first-seen order, preinstalled removed
    pub packages: Vec<String>,
}

impl Reconciliation {
    pub fn get(&self, path: &str) -> Option<&ReconciledFile> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    /// Merge packages from another source, keeping order and uniqueness
    pub fn merge_packages<I, S>(&mut self, packages: I, config: &ForgeConfig)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for package in packages {
            push_package(&mut self.packages, package.as_ref(), config);
        }
    }
}

pub struct Reconciler {
    config: ForgeConfig,
}

impl Reconciler {
    pub fn new(config: &ForgeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Reconcile an extraction against the session's known files
    pub fn reconcile(&self, extraction: &Extraction, known_files: &BTreeSet<String>) -> Reconciliation {
        let mut result = self.reconcile_candidates(&extraction.files, known_files);
        result.merge_packages(&extraction.packages, &self.config);
        result
    }

    /// Apply the replacement policy to candidates in arrival order
    ///
    /// First occurrence wins initially. A complete version replaces an
    /// incomplete one, a complete version replaces a complete one only when
    /// strictly longer, and between incomplete versions the longer wins.
    /// A version suspected of truncation never replaces a stored one.
    pub fn reconcile_candidates(
        &self,
        candidates: &[FileCandidate],
        known_files: &BTreeSet<String>,
    ) -> Reconciliation {
        let mut winners: Vec<(String, &FileCandidate)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for candidate in candidates {
            let path = normalize_path(&candidate.path, &self.config);
            let Some(&slot) = index.get(&path) else {
                index.insert(path.clone(), winners.len());
                winners.push((path, candidate));
                continue;
            };

            let existing = winners[slot].1;
            if !should_replace(existing, candidate) {
                continue;
            }
            if candidate.suspect {
                warn!(path = %path, "Keeping earlier version over one that may be truncated");
                continue;
            }
            debug!(
                path = %path,
                from = existing.content.len(),
                to = candidate.content.len(),
                complete = candidate.complete,
                "Replacing file version"
            );
            winners[slot].1 = candidate;
        }

        let mut packages = Vec::new();
        let files = winners
            .into_iter()
            .map(|(path, candidate)| {
                if !candidate.complete {
                    debug!(path = %path, "File has no closing delimiter");
                }
                for package in &candidate.packages {
                    push_package(&mut packages, package, &self.config);
                }
                ReconciledFile {
                    is_update: known_files.contains(&path),
                    path,
                    content: candidate.content.clone(),
                    complete: candidate.complete,
                }
            })
            .collect();

        Reconciliation { files, packages }
    }
}

fn should_replace(existing: &FileCandidate, candidate: &FileCandidate) -> bool {
    match (existing.complete, candidate.complete) {
        (false, true) => true,
        (true, true) | (false, false) => candidate.content.len() > existing.content.len(),
        (true, false) => false,
    }
}

fn push_package(packages: &mut Vec<String>, package: &str, config: &ForgeConfig) {
    let package = package.trim();
    if package.is_empty() || config.is_preinstalled(package) {
        return;
    }
    if !packages.iter().any(|p| p == package) {
        packages.push(package.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Extractor;
    use crate::types::Provenance;

    fn candidate(path: &str, content: &str, complete: bool) -> FileCandidate {
        FileCandidate {
            path: path.to_string(),
            content: content.to_string(),
            complete,
            suspect: crate::extract::is_truncation_suspect(content),
            provenance: Provenance::FileTag,
            span: 0..0,
            packages: Vec::new(),
        }
    }

    fn reconcile(candidates: &[FileCandidate]) -> Reconciliation {
        Reconciler::new(&ForgeConfig::default()).reconcile_candidates(candidates, &BTreeSet::new())
    }

    #[test]
    fn test_replacement_policy() {
        let result = reconcile(&[
            candidate("src/A.jsx", "partial", false),
            candidate("src/A.jsx", "done", true),
            candidate("src/A.jsx", "shorter", false),
            candidate("src/A.jsx", "do", true),
            candidate("src/A.jsx", "done and longer", true),
        ]);

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].content, "done and longer");
        assert!(result.files[0].complete);
    }

    #[test]
    fn test_longer_incomplete_wins_between_incomplete() {
        let result = reconcile(&[candidate("A.jsx", "abc", false), candidate("A.jsx", "abcdef", false)]);
        assert_eq!(result.files[0].path, "src/A.jsx");
        assert_eq!(result.files[0].content, "abcdef");
    }

    #[test]
    fn test_suspect_version_kept_only_when_alone() {
        let result = reconcile(&[
            candidate("src/A.jsx", "const a = 1;", true),
            candidate("src/A.jsx", "const a = 1;\n// ... rest unchanged", true),
            candidate("src/B.jsx", "<div>...</div>", true),
        ]);

        assert_eq!(result.get("src/A.jsx").unwrap().content, "const a = 1;");
        assert_eq!(result.get("src/B.jsx").unwrap().content, "<div>...</div>");
    }

    #[test]
    fn test_complete_never_downgraded() {
        let versions = ["x", "xxxxx", "xx", "xxxxxxx", "xxx"];
        let mut candidates = Vec::new();
        let mut best_complete = 0;

        for (i, content) in versions.iter().enumerate() {
            let complete = i % 2 == 0;
            candidates.push(candidate("src/A.jsx", content, complete));
            let result = reconcile(&candidates);
            let winner = &result.files[0];

            if complete {
                best_complete = best_complete.max(content.len());
            }
            if best_complete > 0 {
                assert!(winner.complete);
                assert_eq!(winner.content.len(), best_complete);
            }
        }
    }

    #[test]
    fn test_is_update_and_order() {
        let known: BTreeSet<String> = ["src/B.jsx".to_string()].into_iter().collect();
        let result = Reconciler::new(&ForgeConfig::default()).reconcile_candidates(
            &[candidate("src/B.jsx", "b", true), candidate("/src/A.jsx", "a", true)],
            &known,
        );

        let paths: Vec<&str> = result.paths().collect();
        assert_eq!(paths, vec!["src/B.jsx", "src/A.jsx"]);
        assert!(result.files[0].is_update);
        assert!(!result.files[1].is_update);
    }

    #[test]
    fn test_reconciling_twice_is_identical() {
        let config = ForgeConfig::default();
        let buffer = "<file path=\"src/App.jsx\">import axios from 'axios';</file><file path=\"src/App.jsx\">import axios from 'axios';\nimport clsx from 'clsx';</file><package>zustand</package><package>react</package>";
        let extraction = Extractor::new(&config).extract(buffer);
        let reconciler = Reconciler::new(&config);

        let first = reconciler.reconcile(&extraction, &BTreeSet::new());
        let second = reconciler.reconcile(&Extractor::new(&config).extract(buffer), &BTreeSet::new());

        assert_eq!(first, second);
        assert_eq!(first.packages, vec!["axios", "clsx", "zustand"]);
    }
}
