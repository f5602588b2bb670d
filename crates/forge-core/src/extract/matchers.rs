//! File matchers, tried in order over the stream buffer

use super::{Matcher, RawMatch};
use crate::config::ForgeConfig;
use crate::paths::place_bare_name;
use crate::types::{FileCandidate, Provenance};
use once_cell::sync::Lazy;
use regex::Regex;

static FILE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<file\s+path="([^"]+)"\s*>"#).unwrap());
const FILE_CLOSE: &str = "</file>";

static FENCED_PATH_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"```(?:file )?path="([^"]+)"\r?\n"#).unwrap());
const FENCE: &str = "```";

static GENERATED_LISTING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Generated Files?:[ \t]*([^\n]+)").unwrap());
static LISTING_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Generated Files?:|Applying code").unwrap());
static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^import\b").unwrap());
const LISTING_EXTENSIONS: &[&str] = &[".jsx", ".js", ".tsx", ".ts", ".css", ".json", ".html"];

static BARE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:jsx?|tsx?|javascript|typescript)?\r?\n(.*?)```").unwrap()
});
static FILE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^//\s*(?:File:|Component:)\s*([\w./@-]+)\s*$").unwrap());

/// `<file path="...">...</file>` regions
///
/// A region ends at `</file>`. If the next `<file path=` opener or the end
/// of the segment comes first, the region is incomplete.
pub struct FileTagMatcher;

impl Matcher for FileTagMatcher {
    fn provenance(&self) -> Provenance {
        Provenance::FileTag
    }

    fn scan(&self, text: &str, offset: usize) -> Vec<RawMatch> {
        let openers: Vec<_> = FILE_OPEN.captures_iter(text).collect();
        let mut found = Vec::with_capacity(openers.len());

        for (i, caps) in openers.iter().enumerate() {
            let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let body_start = whole.end();
            let next_open = openers
                .get(i + 1)
                .and_then(|c| c.get(0))
                .map(|m| m.start())
                .unwrap_or(text.len());
            let close = text[body_start..next_open]
                .find(FILE_CLOSE)
                .map(|idx| body_start + idx);

            let (body_end, span_end, complete) = match close {
                Some(idx) => (idx, idx + FILE_CLOSE.len(), true),
                None => (next_open, next_open, false),
            };

            found.push(RawMatch {
                path: path.as_str().to_string(),
                content: text[body_start..body_end].trim().to_string(),
                complete,
                span: offset + whole.start()..offset + span_end,
            });
        }

        found
    }
}

/// Code fences annotated with a path: ```` ```path="src/App.jsx" ````
pub struct FencedPathMatcher;

impl Matcher for FencedPathMatcher {
    fn provenance(&self) -> Provenance {
        Provenance::FencedPath
    }

    fn scan(&self, text: &str, offset: usize) -> Vec<RawMatch> {
        let mut found = Vec::new();
        let mut cursor = 0;

        while let Some(caps) = FENCED_PATH_OPEN.captures_at(text, cursor) {
            let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            let body_start = whole.end();
            let (body_end, span_end, complete) = match text[body_start..].find(FENCE) {
                Some(idx) => (body_start + idx, body_start + idx + FENCE.len(), true),
                None => (text.len(), text.len(), false),
            };

            found.push(RawMatch {
                path: path.as_str().to_string(),
                content: text[body_start..body_end].trim().to_string(),
                complete,
                span: offset + whole.start()..offset + span_end,
            });
            cursor = span_end;
        }

        found
    }
}

/// Plain-text "Generated Files: Header.jsx, index.css" listings
///
/// Content is recovered from the first `import` line after the file name
/// up to the next listing, an "Applying code" marker, or the next listed
/// name. Recovered content is never considered complete.
pub struct GeneratedListingMatcher {
    config: ForgeConfig,
}

impl GeneratedListingMatcher {
    pub fn new(config: &ForgeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl Matcher for GeneratedListingMatcher {
    fn provenance(&self) -> Provenance {
        Provenance::GeneratedListing
    }

    fn scan(&self, text: &str, offset: usize) -> Vec<RawMatch> {
        let Some(caps) = GENERATED_LISTING.captures(text) else {
            return Vec::new();
        };
        let (Some(whole), Some(list)) = (caps.get(0), caps.get(1)) else {
            return Vec::new();
        };

        let names: Vec<&str> = list
            .as_str()
            .split(',')
            .map(str::trim)
            .filter(|name| LISTING_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
            .collect();

        let mut found = Vec::new();
        for (i, name) in names.iter().enumerate() {
            // a later mention of the name heads its section; otherwise only
            // the first listed file owns the text right after the listing
            let section_start = match text[whole.end()..].find(name) {
                Some(idx) => whole.end() + idx + name.len(),
                None if i == 0 => whole.end(),
                None => continue,
            };

            let rest = &text[section_start..];
            let Some(import) = IMPORT_LINE.find(rest) else {
                continue;
            };
            let body_start = section_start + import.start();

            let mut body_end = LISTING_END
                .find(&text[body_start..])
                .map(|m| body_start + m.start())
                .unwrap_or(text.len());
            for other in names.iter().filter(|other| *other != name) {
                if let Some(idx) = find_heading(&text[body_start..body_end], other) {
                    body_end = body_start + idx;
                }
            }

            let content = text[body_start..body_end].trim();
            if content.is_empty() {
                continue;
            }
            found.push(RawMatch {
                path: place_bare_name(name, &self.config),
                content: content.to_string(),
                complete: false,
                span: offset + body_start..offset + body_end,
            });
        }

        found
    }
}

/// Find a line that is only a file name, possibly decorated as a heading
fn find_heading(text: &str, name: &str) -> Option<usize> {
    let mut pos = 0;
    for line in text.split_inclusive('\n') {
        let bare = line.trim().trim_matches(|c: char| matches!(c, '#' | '*' | '`' | ':' | ' '));
        if bare == name {
            return Some(pos);
        }
        pos += line.len();
    }
    None
}

/// Bare code fences whose body names the file in a `// File:` comment
pub struct FileCommentMatcher {
    config: ForgeConfig,
}

impl FileCommentMatcher {
    pub fn new(config: &ForgeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl Matcher for FileCommentMatcher {
    fn provenance(&self) -> Provenance {
        Provenance::FileComment
    }

    fn scan(&self, text: &str, offset: usize) -> Vec<RawMatch> {
        let mut found = Vec::new();

        for caps in BARE_FENCE.captures_iter(text) {
            let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let content = body.as_str().trim();
            // Only a leading comment names the file
            let Some(name) = content
                .lines()
                .next()
                .and_then(|line| FILE_COMMENT.captures(line.trim()))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
            else {
                continue;
            };

            found.push(RawMatch {
                path: place_bare_name(name, &self.config),
                content: content.to_string(),
                complete: true,
                span: offset + whole.start()..offset + whole.end(),
            });
        }

        found
    }
}
