//! File manifest builder
//!
//! Builds a [`FileManifest`] from a snapshot of the project tree. The
//! manifest is always rebuilt from scratch. A file that cannot be analysed
//! is kept with empty imports and exports and never fails the build.

pub mod parser;
pub mod routes;
pub mod search;

use crate::config::ForgeConfig;
use crate::paths::parent_dir;
use crate::types::{ComponentNode, FileInfo, FileManifest, FileType, NodeKind};
use chrono::{DateTime, Utc};
use parser::{parse_source, ParsedSource};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

pub use search::{SearchConfidence, SearchHit};

/// App-root files, strongest first
pub const ENTRY_POINTS: &[&str] = &[
    "src/main.jsx",
    "src/main.tsx",
    "src/index.jsx",
    "src/index.tsx",
    "src/App.jsx",
    "src/App.tsx",
    "App.jsx",
    "App.tsx",
];

/// Root the `@/` import alias points at
const ALIAS_ROOT: &str = "src";

const RESOLVE_EXTENSIONS: &[&str] = &["", ".jsx", ".js", ".tsx", ".ts"];

pub struct ManifestBuilder {
    max_file_size: usize,
}

impl ManifestBuilder {
    pub fn new(config: &ForgeConfig) -> Self {
        Self {
            max_file_size: config.files.max_file_size,
        }
    }

    /// Build a manifest where every file counts as modified now
    pub fn build(&self, files: &BTreeMap<String, String>) -> FileManifest {
        self.build_with_history(files, &HashMap::new())
    }

    /// Build a manifest, carrying known modification times
    pub fn build_with_history(
        &self,
        files: &BTreeMap<String, String>,
        modified: &HashMap<String, DateTime<Utc>>,
    ) -> FileManifest {
        let now = Utc::now();
        let mut manifest = FileManifest {
            timestamp: now,
            ..FileManifest::default()
        };

        for (path, content) in files {
            let parsed = match parse_source(path, content, self.max_file_size) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping analysis");
                    ParsedSource::degraded(path)
                }
            };

            if parsed.file_type == FileType::Style {
                manifest.style_files.push(path.clone());
            }

            manifest.files.insert(
                path.clone(),
                FileInfo {
                    content: content.clone(),
                    file_type: parsed.file_type,
                    imports: parsed.imports,
                    exports: parsed.exports,
                    component_info: parsed.component_info,
                    last_modified: modified.get(path).copied().unwrap_or(now),
                },
            );
        }

        manifest.entry_point = ENTRY_POINTS
            .iter()
            .find(|candidate| manifest.files.contains_key(**candidate))
            .map(|p| p.to_string())
            .unwrap_or_default();
        manifest.component_tree = component_tree(&manifest.files);
        manifest.routes = routes::extract_routes(&manifest.files);

        debug!(
            files = manifest.files.len(),
            routes = manifest.routes.len(),
            entry_point = %manifest.entry_point,
            "Built file manifest"
        );
        manifest
    }
}

/// Link components through their default-imported local identifiers
fn component_tree(files: &BTreeMap<String, FileInfo>) -> BTreeMap<String, ComponentNode> {
    let mut tree: BTreeMap<String, ComponentNode> = BTreeMap::new();

    for (path, info) in files {
        if let Some(component) = &info.component_info {
            tree.entry(component.name.clone()).or_insert_with(|| ComponentNode {
                file: path.clone(),
                kind: match info.file_type {
                    FileType::Page => NodeKind::Page,
                    FileType::Layout => NodeKind::Layout,
                    _ => NodeKind::Component,
                },
                imports: Vec::new(),
                imported_by: Vec::new(),
            });
        }
    }

    let mut edges: Vec<(String, String)> = Vec::new();
    for info in files.values() {
        let Some(component) = &info.component_info else {
            continue;
        };
        for import in info.imports.iter().filter(|i| i.is_local) {
            if let Some(child) = &import.default_import {
                if tree.contains_key(child) && child != &component.name {
                    edges.push((component.name.clone(), child.clone()));
                }
            }
        }
    }

    for (parent, child) in edges {
        if let Some(node) = tree.get_mut(&parent) {
            if !node.imports.contains(&child) {
                node.imports.push(child.clone());
            }
        }
        if let Some(node) = tree.get_mut(&child) {
            if !node.imported_by.contains(&parent) {
                node.imported_by.push(parent);
            }
        }
    }

    tree
}

impl FileManifest {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Most recently modified files, ties broken by path
    pub fn recent_files(&self, limit: usize) -> Vec<String> {
        let mut files: Vec<(&String, &FileInfo)> = self.files.iter().collect();
        files.sort_by(|(pa, a), (pb, b)| b.last_modified.cmp(&a.last_modified).then(pa.cmp(pb)));
        files.into_iter().take(limit).map(|(p, _)| p.clone()).collect()
    }

    /// Resolve a local import specifier to a manifest path
    pub fn resolve_import(&self, from_file: &str, specifier: &str) -> Option<String> {
        let base = if let Some(rest) = specifier.strip_prefix("@/") {
            join_segments(ALIAS_ROOT, rest)
        } else if specifier.starts_with("./") || specifier.starts_with("../") {
            join_segments(parent_dir(from_file), specifier)
        } else {
            return None;
        };

        RESOLVE_EXTENSIONS
            .iter()
            .map(|ext| format!("{}{}", base, ext))
            .chain(
                RESOLVE_EXTENSIONS
                    .iter()
                    .skip(1)
                    .map(|ext| format!("{}/index{}", base, ext)),
            )
            .find(|candidate| self.files.contains_key(candidate))
    }

    /// Search script files for any of the terms
    pub fn search(&self, terms: &[String]) -> Vec<SearchHit> {
        search::search(&self.files, terms)
    }
}

/// Join a relative path onto a directory, resolving `.` and `..`
fn join_segments(dir: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
    for part in relative.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
