//! File resolution strategies used by the intent classifier

use crate::config::TargetPolicy;
use crate::paths::basename;
use crate::types::FileManifest;
use once_cell::sync::Lazy;
use regex::Regex;

static STOPWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:the|a|an|in|on|to|from|update|change|modify|edit|fix|make)\b").unwrap()
});
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["']([^"']+)["']"#).unwrap());
static ACTION_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:remove|delete|hide)\s+(?:the\s+)?(.+?)(?:\s+button|\s+link|\s+text|\s+element|\s+section|$)")
        .unwrap()
});
static LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:in|to|on|inside|into)\s+(?:the\s+)?(\w+)").unwrap()
});

/// Common UI section names tried when nothing else matches
pub const UI_ELEMENTS: &[&str] = &[
    "header",
    "footer",
    "nav",
    "sidebar",
    "button",
    "card",
    "modal",
    "hero",
    "banner",
    "about",
    "services",
    "features",
    "testimonials",
    "gallery",
    "contact",
    "team",
    "pricing",
];

/// Files picked by a strategy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub files: Vec<String>,
    /// Whether anything beyond the default fallback was found
    pub resolved: bool,
}

impl Resolution {
    fn found(files: Vec<String>) -> Self {
        let resolved = !files.is_empty();
        Self { files, resolved }
    }

    fn push_unique(&mut self, path: &str) {
        if !path.is_empty() && !self.files.iter().any(|f| f == path) {
            self.files.push(path.to_string());
        }
    }

    fn extend(&mut self, other: Resolution) {
        for file in &other.files {
            self.push_unique(file);
        }
        self.resolved |= other.resolved;
    }
}

/// Resolves instructions to manifest files
pub struct FileResolver<'a> {
    manifest: &'a FileManifest,
    policy: TargetPolicy,
    recent_window: usize,
}

impl<'a> FileResolver<'a> {
    pub fn new(manifest: &'a FileManifest, policy: TargetPolicy, recent_window: usize) -> Self {
        Self {
            manifest,
            policy,
            recent_window,
        }
    }

    /// Default target when nothing specific is found
    fn fallback(&self) -> Resolution {
        let mut files = Vec::new();
        if !self.manifest.entry_point.is_empty() {
            files.push(self.manifest.entry_point.clone());
        }
        Resolution {
            files,
            resolved: false,
        }
    }

    /// Match instruction words against file basenames and component names
    pub fn by_name(&self, text: &str) -> Resolution {
        let words = component_words(text);
        let mut files: Vec<String> = Vec::new();

        for (path, info) in &self.manifest.files {
            let name = basename(path).to_lowercase();
            let component = info.component_info.as_ref().map(|c| c.name.to_lowercase());

            if words.iter().any(|word| {
                name.contains(word.as_str())
                    || component.as_deref().map(|c| c.contains(word.as_str())).unwrap_or(false)
            }) {
                files.push(path.clone());
            }
        }

        if files.is_empty() {
            if let Some(path) = self.by_ui_vocabulary(text) {
                return Resolution::found(vec![path]);
            }
            return self.fallback();
        }

        if self.policy == TargetPolicy::Single {
            files.truncate(1);
        }
        Resolution::found(files)
    }

    /// First UI element named in the text that some file is named after
    fn by_ui_vocabulary(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();

        for &element in UI_ELEMENTS.iter().filter(|e| lower.contains(**e)) {
            let exact = format!("{}.", element);
            let names = || {
                self.manifest
                    .files
                    .keys()
                    .map(|path| (path, basename(path).to_lowercase()))
            };

            if let Some((path, _)) = names().find(|(_, name)| name.contains(&exact) || name.as_str() == element) {
                return Some(path.clone());
            }
            if let Some((path, _)) = names().find(|(_, name)| name.contains(element)) {
                return Some(path.clone());
            }
        }
        None
    }

    /// Search component files for quoted text or the object of remove/delete/hide
    pub fn by_content(&self, text: &str) -> Resolution {
        let mut terms: Vec<String> = QUOTED
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase())
            .collect();
        if let Some(target) = ACTION_TARGET.captures(text).and_then(|c| c.get(1)) {
            let target = target.as_str().trim();
            if !target.is_empty() {
                terms.push(target.to_lowercase());
            }
        }

        if !terms.is_empty() {
            let hit = self
                .manifest
                .files
                .iter()
                .filter(|(path, _)| path.contains(".jsx") || path.contains(".tsx"))
                .find(|(_, info)| {
                    let content = info.content.to_lowercase();
                    terms.iter().any(|term| content.contains(term.as_str()))
                });
            if let Some((path, _)) = hit {
                return Resolution::found(vec![path.clone()]);
            }
        }

        self.by_name(text)
    }

    /// Where a new page, component or section should go
    pub fn feature_insertion(&self, text: &str) -> Resolution {
        let lower = text.to_lowercase();
        let mut result = Resolution::default();

        if lower.contains("page") {
            for (path, info) in &self.manifest.files {
                if info.content.contains("Route")
                    || info.content.contains("createBrowserRouter")
                    || path.contains("router")
                    || path.contains("routes")
                {
                    result.push_unique(path);
                    result.resolved = true;
                }
            }
            if !self.manifest.entry_point.is_empty() {
                result.push_unique(&self.manifest.entry_point);
                result.resolved = true;
            }
        }

        if ["component", "section", "add", "create"].iter().any(|w| lower.contains(w)) {
            match LOCATION.captures(text).and_then(|c| c.get(1)) {
                Some(location) => result.extend(self.by_name(location.as_str())),
                None => {
                    for word in component_words(text) {
                        let found = self.by_name(&word);
                        if found.resolved
                            && found.files.first() != Some(&self.manifest.entry_point)
                        {
                            result.extend(found);
                        }
                    }
                    if result.files.is_empty() {
                        result.extend(self.fallback());
                    }
                }
            }
        }

        result
    }

    /// The most recently modified files unioned with a name match
    pub fn recent_and_named(&self, text: &str) -> Resolution {
        let mut result = Resolution::default();
        for path in self.manifest.recent_files(self.recent_window) {
            result.push_unique(&path);
            result.resolved = true;
        }
        result.extend(self.by_name(text));
        result
    }

    /// Style sheets, the Tailwind config and a name match
    pub fn style_files(&self, text: &str) -> Resolution {
        let mut result = Resolution::default();
        for path in &self.manifest.style_files {
            result.push_unique(path);
            result.resolved = true;
        }
        if let Some(path) = self.manifest.files.keys().find(|p| p.contains("tailwind.config")) {
            result.push_unique(path);
            result.resolved = true;
        }
        result.extend(self.by_name(text));
        result
    }

    /// Package and build configuration files
    pub fn package_files(&self, _text: &str) -> Resolution {
        Resolution::found(
            self.manifest
                .files
                .keys()
                .filter(|p| {
                    p.ends_with("package.json")
                        || p.ends_with("vite.config.js")
                        || p.ends_with("vite.config.ts")
                        || p.ends_with("tsconfig.json")
                })
                .cloned()
                .collect(),
        )
    }

    /// The entry point alone, or nothing when there is none
    pub fn entry_point(&self, _text: &str) -> Resolution {
        Resolution::found(self.fallback().files)
    }
}

/// Instruction words worth matching against file names
pub fn component_words(text: &str) -> Vec<String> {
    let cleaned = STOPWORDS.replace_all(text, "").to_lowercase();
    WORD.find_iter(&cleaned)
        .map(|m| m.as_str().to_string())
        .filter(|w| w.chars().count() > 2)
        .collect()
}
