//! Core type definitions for Forge

use chrono::{DateTime, Utc};
use forge_types::Outcome;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

/// Which matcher produced a file candidate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// `<file path="...">...</file>`
    FileTag,
    /// A code fence annotated with `path="..."`
    FencedPath,
    /// A plain-text "Generated Files: a, b" listing
    GeneratedListing,
    /// A bare fence whose first line is a `// File:` comment
    FileComment,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::FileTag => "file-tag",
            Provenance::FencedPath => "fenced-path",
            Provenance::GeneratedListing => "generated-listing",
            Provenance::FileComment => "file-comment",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One extracted version of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// Path exactly as the model wrote it
    pub path: String,
    pub content: String,
    /// Whether the region was properly terminated
    pub complete: bool,
    /// Content contains an ellipsis that is not spread/rest syntax
    pub suspect: bool,
    pub provenance: Provenance,
    /// Byte range of the whole match in the buffer
    pub span: Range<usize>,
    /// External packages imported by the content
    pub packages: Vec<String>,
}

/// The surviving version of a file after reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledFile {
    pub path: String,
    pub content: String,
    pub is_update: bool,
    #[serde(skip)]
    pub complete: bool,
}

/// File classification used by the manifest
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Component,
    Page,
    Style,
    Config,
    Utility,
    Layout,
    Hook,
    Context,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Component => "component",
            FileType::Page => "page",
            FileType::Style => "style",
            FileType::Config => "config",
            FileType::Utility => "utility",
            FileType::Layout => "layout",
            FileType::Hook => "hook",
            FileType::Context => "context",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One import statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportInfo {
    pub source: String,
    #[serde(default)]
    pub default_import: Option<String>,
    #[serde(default)]
    pub named: Vec<String>,
    pub is_local: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInfo {
    pub name: String,
    pub hooks: Vec<String>,
    pub has_state: bool,
    pub child_components: Vec<String>,
}

/// Static analysis of one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub content: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<String>,
    #[serde(default)]
    pub component_info: Option<ComponentInfo>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInfo {
    pub path: String,
    /// File that declares or implements the route
    pub file: String,
    #[serde(default)]
    pub component: Option<String>,
}

/// Role of a component in the dependency tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Page,
    Layout,
    Component,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentNode {
    pub file: String,
    pub kind: NodeKind,
    pub imports: Vec<String>,
    pub imported_by: Vec<String>,
}

/// Static-analysis summary of the project tree
///
/// Always rebuilt wholesale from a snapshot, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileManifest {
    pub files: BTreeMap<String, FileInfo>,
    pub routes: Vec<RouteInfo>,
    pub component_tree: BTreeMap<String, ComponentNode>,
    /// Empty until an app root file is observed
    pub entry_point: String,
    pub style_files: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Default for FileManifest {
    fn default() -> Self {
        Self {
            files: BTreeMap::new(),
            routes: Vec::new(),
            component_tree: BTreeMap::new(),
            entry_point: String::new(),
            style_files: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Category of a follow-up edit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditType {
    UpdateComponent,
    AddFeature,
    FixIssue,
    Refactor,
    FullRebuild,
    UpdateStyle,
    AddDependency,
}

impl EditType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditType::UpdateComponent => "UpdateComponent",
            EditType::AddFeature => "AddFeature",
            EditType::FixIssue => "FixIssue",
            EditType::Refactor => "Refactor",
            EditType::FullRebuild => "FullRebuild",
            EditType::UpdateStyle => "UpdateStyle",
            EditType::AddDependency => "AddDependency",
        }
    }
}

impl std::fmt::Display for EditType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classified intent of a follow-up instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditIntent {
    #[serde(rename = "type")]
    pub edit_type: EditType,
    pub target_files: Vec<String>,
    pub confidence: f64,
    pub description: String,
    pub suggested_context: Vec<String>,
}

/// Summary of one applied turn kept in session history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRecord {
    pub id: uuid::Uuid,
    pub instruction: String,
    #[serde(default)]
    pub edit_type: Option<EditType>,
    #[serde(default)]
    pub target_files: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    pub files_touched: Vec<String>,
    pub outcome: Outcome,
    #[serde(default)]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Validation result
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_error(mut self, error: ValidationError) -> Self {
        self.valid = false;
        self.errors.push(error);
        self
    }

    pub fn with_warning(mut self, warning: ValidationWarning) -> Self {
        self.warnings.push(warning);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}
