//! Tag extraction over a growing stream buffer
//!
//! Extraction is stateless: every call re-scans the whole buffer, so it can
//! be repeated as text is appended. Matchers run in order and each one only
//! sees text no earlier matcher claimed.

pub mod matchers;
pub mod packages;
pub mod tags;

use crate::config::ForgeConfig;
use crate::types::{FileCandidate, Provenance};
use std::ops::Range;
use tracing::{debug, warn};

pub use matchers::{FencedPathMatcher, FileCommentMatcher, FileTagMatcher, GeneratedListingMatcher};

/// A file region found by a matcher, before enrichment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub path: String,
    pub content: String,
    pub complete: bool,
    /// Absolute byte range in the buffer
    pub span: Range<usize>,
}

/// A strategy for finding file regions in model output
pub trait Matcher: Send + Sync {
    /// Tag attached to every candidate this matcher produces
    fn provenance(&self) -> Provenance;

    /// Scan one unclaimed segment; `offset` is its position in the buffer
    fn scan(&self, text: &str, offset: usize) -> Vec<RawMatch>;
}

/// Everything extracted from one buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub files: Vec<FileCandidate>,
    /// Packages named by explicit tags
    pub packages: Vec<String>,
    pub commands: Vec<String>,
    pub explanation: Option<String>,
    pub structure: Option<String>,
    pub template: Option<String>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.packages.is_empty() && self.commands.is_empty()
    }

    /// Candidates from a given matcher
    pub fn files_from(&self, provenance: Provenance) -> impl Iterator<Item = &FileCandidate> {
        self.files.iter().filter(move |f| f.provenance == provenance)
    }
}

/// Ordered set of matchers plus the auxiliary tag scanners
pub struct Extractor {
    matchers: Vec<Box<dyn Matcher>>,
    config: ForgeConfig,
}

impl Extractor {
    /// Create an extractor with the standard matcher order
    pub fn new(config: &ForgeConfig) -> Self {
        Self {
            matchers: vec![
                Box::new(FileTagMatcher),
                Box::new(FencedPathMatcher),
                Box::new(GeneratedListingMatcher::new(config)),
                Box::new(FileCommentMatcher::new(config)),
            ],
            config: config.clone(),
        }
    }

    /// Create an extractor with no matchers
    pub fn empty(config: &ForgeConfig) -> Self {
        Self {
            matchers: Vec::new(),
            config: config.clone(),
        }
    }

    /// Append a matcher after the existing ones
    pub fn with_matcher(mut self, matcher: Box<dyn Matcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Scan the whole buffer
    pub fn extract(&self, buffer: &str) -> Extraction {
        let mut claimed: Vec<Range<usize>> = Vec::new();
        let mut files = Vec::new();

        for matcher in &self.matchers {
            let mut spans = Vec::new();
            for segment in unclaimed_segments(buffer.len(), &claimed) {
                for raw in matcher.scan(&buffer[segment.clone()], segment.start) {
                    spans.push(raw.span.clone());
                    files.push(self.candidate(raw, matcher.provenance()));
                }
            }
            claimed.extend(spans);
        }

        if !files.is_empty() {
            debug!(candidates = files.len(), "Extracted file candidates");
        }

        Extraction {
            files,
            packages: tags::packages(buffer),
            commands: tags::commands(buffer),
            explanation: tags::explanation(buffer),
            structure: tags::structure(buffer),
            template: tags::template(buffer),
        }
    }

    fn candidate(&self, raw: RawMatch, provenance: Provenance) -> FileCandidate {
        let suspect = is_truncation_suspect(&raw.content);
        if suspect {
            warn!(path = %raw.path, %provenance, "File content contains an ellipsis, may be truncated");
        }
        let packages = packages::scan_packages(&raw.content, &self.config);

        FileCandidate {
            path: raw.path,
            content: raw.content,
            complete: raw.complete,
            suspect,
            provenance,
            span: raw.span,
            packages,
        }
    }
}

/// Whether content holds a literal `...` that is not spread or rest syntax
pub fn is_truncation_suspect(content: &str) -> bool {
    content.match_indices("...").any(|(idx, _)| {
        match content[idx + 3..].chars().next() {
            Some(c) => !(c.is_alphabetic() || matches!(c, '_' | '$' | '[' | '{' | '(')),
            None => true,
        }
    })
}

/// Gaps between claimed ranges
fn unclaimed_segments(len: usize, claimed: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut sorted: Vec<&Range<usize>> = claimed.iter().collect();
    sorted.sort_by_key(|r| r.start);

    let mut segments = Vec::new();
    let mut cursor = 0;
    for range in sorted {
        if range.start > cursor {
            segments.push(cursor..range.start);
        }
        cursor = cursor.max(range.end);
    }
    if cursor < len {
        segments.push(cursor..len);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(buffer: &str) -> Extraction {
        Extractor::new(&ForgeConfig::default()).extract(buffer)
    }

    #[test]
    fn test_complete_and_incomplete_file_tags() {
        let buffer = "<file path=\"src/App.jsx\">export default function App(){}</file>\n<file path=\"src/Nav.jsx\">import { Link } from 'react-router-dom';\nexport";
        let result = extract(buffer);

        assert_eq!(result.files.len(), 2);
        assert!(result.files[0].complete);
        assert!(!result.files[1].complete);
        assert_eq!(result.files[1].packages, vec!["react-router-dom"]);
    }

    #[test]
    fn test_extraction_is_stable_as_buffer_grows() {
        let full = "<file path=\"src/App.jsx\">const a = 1;</file><command>npm run lint</command>";
        let mut previous: Option<Extraction> = None;

        for end in (0..=full.len()).filter(|i| full.is_char_boundary(*i)) {
            let result = extract(&full[..end]);
            assert_eq!(result, extract(&full[..end]));
            previous = Some(result);
        }

        let last = previous.unwrap();
        assert_eq!(last.files.len(), 1);
        assert!(last.files[0].complete);
        assert_eq!(last.commands, vec!["npm run lint"]);
    }

    #[test]
    fn test_fallbacks_skip_claimed_text() {
        let buffer = "<file path=\"src/A.jsx\">\n```jsx\n// File: B.jsx\nconst b = 1;\n```\n</file>\n```jsx\n// File: C.jsx\nconst c = 1;\n```";
        let result = extract(buffer);

        let paths: Vec<&str> = result.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/A.jsx", "src/components/C.jsx"]);
        assert_eq!(result.files[1].provenance, Provenance::FileComment);
    }

    #[test]
    fn test_truncation_suspect() {
        assert!(!is_truncation_suspect("const x = {...props, ...rest};"));
        assert!(!is_truncation_suspect("const ys = [...items];"));
        assert!(is_truncation_suspect("return (\n  <div>\n  ...\n  </div>\n);"));
        assert!(is_truncation_suspect("// rest of the component..."));
    }

    #[test]
    fn test_unclaimed_segments() {
        assert_eq!(unclaimed_segments(10, &[]), vec![0..10]);
        assert_eq!(unclaimed_segments(10, &[6..8, 2..4]), vec![0..2, 4..6, 8..10]);
        assert_eq!(unclaimed_segments(10, &[0..10]), Vec::<Range<usize>>::new());
    }
}
