//! Edit intent classification
//!
//! An ordered strategy table maps instruction patterns to an edit type and
//! a file resolution strategy. The first rule with a matching pattern wins.

pub mod resolvers;

use crate::config::{ForgeConfig, TargetPolicy};
use crate::paths::basename;
use crate::types::{EditIntent, EditType, FileManifest};
use regex::Regex;
use resolvers::{FileResolver, Resolution};
use tracing::debug;

pub use resolvers::{component_words, UI_ELEMENTS};

/// Confidence when no rule matches
const FALLBACK_CONFIDENCE: f64 = 0.3;

/// How specific a pattern is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Names the edit explicitly ("update the hero section")
    Exact,
    /// A bare verb that could mean several things ("change X")
    Loose,
}

type Strategy = fn(&FileResolver<'_>, &str) -> Resolution;

/// One row of the strategy table
pub struct IntentRule {
    pub edit_type: EditType,
    patterns: Vec<(Regex, Precision)>,
    strategy: Strategy,
}

impl IntentRule {
    /// Build a rule from `(pattern, precision)` pairs
    pub fn new(edit_type: EditType, patterns: &[(&str, Precision)], strategy: Strategy) -> Self {
        Self {
            edit_type,
            patterns: patterns
                .iter()
                .filter_map(|(p, precision)| {
                    Regex::new(&format!("(?i){}", p)).ok().map(|r| (r, *precision))
                })
                .collect(),
            strategy,
        }
    }

    /// Precision of the first matching pattern
    pub fn matches(&self, instruction: &str) -> Option<Precision> {
        self.patterns
            .iter()
            .find(|(regex, _)| regex.is_match(instruction))
            .map(|(_, precision)| *precision)
    }
}

/// Default rule table, in priority order
pub fn default_rules() -> Vec<IntentRule> {
    use Precision::{Exact, Loose};

    vec![
        IntentRule::new(
            EditType::UpdateComponent,
            &[
                (r"update\s+(the\s+)?(\w+)\s+(component|section|page)", Exact),
                (r"change\s+(the\s+)?(\w+)", Loose),
                (r"modify\s+(the\s+)?(\w+)", Loose),
                (r"edit\s+(the\s+)?(\w+)", Loose),
                (r"fix\s+(the\s+)?(\w+)\s+(styling|style|css|layout)", Exact),
                (r"remove\s+.*\s+(button|link|text|element|section)", Exact),
                (r"delete\s+.*\s+(button|link|text|element|section)", Exact),
                (r"hide\s+.*\s+(button|link|text|element|section)", Exact),
            ],
            |r, text| r.by_content(text),
        ),
        IntentRule::new(
            EditType::AddFeature,
            &[
                (r"add\s+(a\s+)?new\s+(\w+)\s+(page|section|feature|component)", Exact),
                (r"create\s+(a\s+)?(\w+)\s+(page|section|feature|component)", Exact),
                (r"implement\s+(a\s+)?(\w+)\s+(page|section|feature)", Exact),
                (r"build\s+(a\s+)?(\w+)\s+(page|section|feature)", Exact),
                (r"add\s+(\w+)\s+to\s+(?:the\s+)?(\w+)", Exact),
                (r"add\s+(?:a\s+)?(\w+)\s+(?:component|section)", Exact),
                (r"include\s+(?:a\s+)?(\w+)", Loose),
            ],
            |r, text| r.feature_insertion(text),
        ),
        IntentRule::new(
            EditType::FixIssue,
            &[
                (r"fix\s+(the\s+)?(\w+|\w+\s+\w+)", Loose),
                (r"resolve\s+(the\s+)?error", Exact),
                (r"debug\s+(the\s+)?(\w+)", Loose),
                (r"repair\s+(the\s+)?(\w+)", Loose),
            ],
            |r, text| r.recent_and_named(text),
        ),
        IntentRule::new(
            EditType::UpdateStyle,
            &[
                (r"change\s+(the\s+)?(color|theme|style|styling|css)", Exact),
                (r"update\s+(the\s+)?(color|theme|style|styling|css)", Exact),
                (r"make\s+it\s+(dark|light|blue|red|green)", Exact),
                (r"style\s+(the\s+)?(\w+)", Loose),
            ],
            |r, text| r.style_files(text),
        ),
        IntentRule::new(
            EditType::Refactor,
            &[
                (r"refactor\s+(the\s+)?(\w+)", Exact),
                (r"clean\s+up\s+(the\s+)?code", Exact),
                (r"reorganize\s+(the\s+)?(\w+)", Exact),
                (r"optimize\s+(the\s+)?(\w+)", Loose),
            ],
            |r, text| r.recent_and_named(text),
        ),
        IntentRule::new(
            EditType::FullRebuild,
            &[
                (r"start\s+over", Exact),
                (r"recreate\s+everything", Exact),
                (r"rebuild\s+(the\s+)?app", Exact),
                (r"new\s+app", Exact),
                (r"from\s+scratch", Exact),
            ],
            |r, text| r.entry_point(text),
        ),
        IntentRule::new(
            EditType::AddDependency,
            &[
                (r"install\s+(\w+)", Exact),
                (r"add\s+(\w+)\s+(package|library|dependency)", Exact),
                (r"use\s+(\w+)\s+(library|framework)", Exact),
            ],
            |r, text| r.package_files(text),
        ),
    ]
}

/// Classifies follow-up instructions against the current manifest
pub struct Classifier {
    rules: Vec<IntentRule>,
    policy: TargetPolicy,
    recent_window: usize,
}

impl Classifier {
    pub fn new(config: &ForgeConfig) -> Self {
        Self {
            rules: default_rules(),
            policy: config.intent.target_policy,
            recent_window: config.intent.recent_window,
        }
    }

    /// Replace the rule table
    pub fn with_rules(mut self, rules: Vec<IntentRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn classify(&self, instruction: &str, manifest: &FileManifest) -> EditIntent {
        let resolver = FileResolver::new(manifest, self.policy, self.recent_window);

        for rule in &self.rules {
            let Some(precision) = rule.matches(instruction) else {
                continue;
            };

            let resolution = (rule.strategy)(&resolver, instruction);
            let confidence = confidence(instruction, precision, resolution.resolved);
            debug!(
                edit_type = %rule.edit_type,
                targets = ?resolution.files,
                confidence,
                "Classified instruction"
            );

            return EditIntent {
                edit_type: rule.edit_type,
                description: describe(rule.edit_type, &resolution.files),
                suggested_context: context_files(manifest, &resolution.files),
                target_files: resolution.files,
                confidence,
            };
        }

        let target_files: Vec<String> = if manifest.entry_point.is_empty() {
            Vec::new()
        } else {
            vec![manifest.entry_point.clone()]
        };
        EditIntent {
            edit_type: EditType::UpdateComponent,
            description: "General update to application".to_string(),
            suggested_context: context_files(manifest, &target_files),
            target_files,
            confidence: FALLBACK_CONFIDENCE,
        }
    }
}

/// Base 0.5, +0.2 resolved, +0.1 for more than five words, +0.2 exact
fn confidence(instruction: &str, precision: Precision, resolved: bool) -> f64 {
    let mut score = 0.5;
    if resolved {
        score += 0.2;
    }
    if instruction.split_whitespace().count() > 5 {
        score += 0.1;
    }
    if precision == Precision::Exact {
        score += 0.2;
    }
    ((score * 100.0_f64).round() / 100.0).min(1.0)
}

/// Every manifest file that is not a target
fn context_files(manifest: &FileManifest, targets: &[String]) -> Vec<String> {
    manifest
        .files
        .keys()
        .filter(|path| !targets.contains(path))
        .cloned()
        .collect()
}

fn describe(edit_type: EditType, targets: &[String]) -> String {
    let names = targets
        .iter()
        .map(|t| basename(t))
        .collect::<Vec<_>>()
        .join(", ");

    match edit_type {
        EditType::UpdateComponent => format!("Updating component(s): {}", names),
        EditType::AddFeature => format!("Adding new feature to: {}", names),
        EditType::FixIssue => format!("Fixing issue in: {}", names),
        EditType::UpdateStyle => format!("Updating styles in: {}", names),
        EditType::Refactor => format!("Refactoring: {}", names),
        EditType::FullRebuild => "Rebuilding entire application".to_string(),
        EditType::AddDependency => "Adding new dependency".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestBuilder;
    use std::collections::BTreeMap;

    fn manifest(files: &[(&str, &str)]) -> FileManifest {
        let files: BTreeMap<String, String> = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();
        ManifestBuilder::new(&ForgeConfig::default()).build(&files)
    }

    fn site() -> FileManifest {
        manifest(&[
            ("src/main.jsx", "import App from './App';\nroot.render(<App />);"),
            ("src/App.jsx", "import { Routes, Route } from 'react-router-dom';\nexport default function App() { return <Routes><Route path=\"/\" element={<Home />} /></Routes>; }"),
            ("src/components/Header.jsx", "export default function Header() { return <header className=\"bg-white\">Acme</header>; }"),
            ("src/components/Hero.jsx", "export default function Hero() { return <section className=\"hero\">Build faster</section>; }"),
            ("src/index.css", "@tailwind base;"),
            ("tailwind.config.js", "export default { content: [] };"),
            ("package.json", "{}"),
        ])
    }

    fn classify(instruction: &str, manifest: &FileManifest) -> EditIntent {
        Classifier::new(&ForgeConfig::default()).classify(instruction, manifest)
    }

    #[test]
    fn test_change_header_color() {
        let intent = classify("change the header color to blue", &site());

        assert!(matches!(intent.edit_type, EditType::UpdateComponent | EditType::UpdateStyle));
        assert!(intent
            .target_files
            .iter()
            .any(|f| basename(f).to_lowercase().contains("header")));
        assert!(intent.confidence > 0.5);
        assert_eq!(intent.description, "Updating component(s): Header.jsx");
    }

    #[test]
    fn test_start_over() {
        let site = site();
        let intent = classify("start over", &site);
        assert_eq!(intent.edit_type, EditType::FullRebuild);
        assert_eq!(intent.target_files, vec![site.entry_point.clone()]);

        let bare = manifest(&[("src/App.jsx", "export default function App() {}")]);
        let intent = classify("Start over", &bare);
        assert_eq!(intent.target_files, vec!["src/App.jsx"]);
    }

    #[test]
    fn test_unmatched_instruction() {
        let intent = classify("hello there", &site());

        assert_eq!(intent.edit_type, EditType::UpdateComponent);
        assert_eq!(intent.target_files, vec!["src/main.jsx"]);
        assert_eq!(intent.confidence, FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_add_page_includes_router_and_entry() {
        let intent = classify("add a new pricing page", &site());

        assert_eq!(intent.edit_type, EditType::AddFeature);
        assert!(intent.target_files.contains(&"src/App.jsx".to_string()));
        assert!(intent.target_files.contains(&"src/main.jsx".to_string()));
        assert!(!intent.suggested_context.contains(&"src/App.jsx".to_string()));
    }

    #[test]
    fn test_style_and_dependency_rules() {
        let site = site();

        let intent = classify("make it dark", &site);
        assert_eq!(intent.edit_type, EditType::UpdateStyle);
        assert!(intent.target_files.contains(&"src/index.css".to_string()));
        assert!(intent.target_files.contains(&"tailwind.config.js".to_string()));

        let intent = classify("install framer-motion please", &site);
        assert_eq!(intent.edit_type, EditType::AddDependency);
        assert_eq!(intent.target_files, vec!["package.json"]);
        assert_eq!(intent.confidence, 0.9);
    }

    #[test]
    fn test_confidence_is_capped() {
        assert_eq!(confidence("a b c d e f g", Precision::Exact, true), 1.0);
        assert_eq!(confidence("x", Precision::Loose, false), 0.5);
    }
}
