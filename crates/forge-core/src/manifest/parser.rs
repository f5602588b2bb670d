//! Shallow syntactic analysis of one source file
//!
//! Pattern matching only. Anything it cannot read degrades to empty
//! import and export lists.

use crate::paths::{basename, file_stem, is_script};
use crate::types::{ComponentInfo, FileType, ImportInfo};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+(?:([\w$*{}\s,]+?)\s+from\s+)?['"]([^'"]+)['"]"#).unwrap()
});
static DEFAULT_BINDING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([\w$]+)\s*(?:,|$)").unwrap());
static NAMED_BINDINGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^}]+)\}").unwrap());
static AS_ALIAS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+as\s+").unwrap());

static DEFAULT_EXPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"export\s+default\s+").unwrap());
static DEFAULT_EXPORT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s+default\s+(?:async\s+)?(?:function\s*\*?\s*|class\s+)?([\w$]+)").unwrap()
});
static NAMED_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s+(?:const|let|var|(?:async\s+)?function|class)\s+([\w$]+)").unwrap()
});
static EXPORT_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"export\s+\{([^}]+)\}").unwrap());

static JSX_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[A-Z]\w*|<[a-z]+\s+[^>]*/?>").unwrap());
static FUNCTION_COMPONENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:export\s+)?(?:default\s+)?function\s+([A-Z]\w*)\s*\(").unwrap()
});
static ARROW_COMPONENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:export\s+)?(?:default\s+)?(?:const|let)\s+([A-Z]\w*)\s*=\s*(?:\([^)]*\)|[^=])*=>")
        .unwrap()
});
static HOOK_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\buse[A-Z]\w*").unwrap());
static CHILD_COMPONENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([A-Z]\w*)").unwrap());

/// Why a file was not analysed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("file is {0} bytes, over the analysis limit")]
    TooLarge(usize),
    #[error("file looks binary")]
    Binary,
}

/// Syntactic facts about one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSource {
    pub file_type: FileType,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<String>,
    pub component_info: Option<ComponentInfo>,
}

impl ParsedSource {
    /// Facts for a file that could not be analysed
    pub fn degraded(path: &str) -> Self {
        Self {
            file_type: if path.ends_with(".css") {
                FileType::Style
            } else {
                FileType::Utility
            },
            imports: Vec::new(),
            exports: Vec::new(),
            component_info: None,
        }
    }
}

/// Analyse a file, refusing binary or oversized content
pub fn parse_source(path: &str, content: &str, max_size: usize) -> Result<ParsedSource, ParseFailure> {
    if content.len() > max_size {
        return Err(ParseFailure::TooLarge(content.len()));
    }
    if content.contains('\0') {
        return Err(ParseFailure::Binary);
    }

    let file_type = classify_file(path, content);
    if !is_script(path) {
        return Ok(ParsedSource {
            file_type,
            imports: Vec::new(),
            exports: Vec::new(),
            component_info: None,
        });
    }

    Ok(ParsedSource {
        file_type,
        imports: extract_imports(content),
        exports: extract_exports(content),
        component_info: extract_component_info(path, content),
    })
}

pub fn extract_imports(content: &str) -> Vec<ImportInfo> {
    IMPORT
        .captures_iter(content)
        .filter_map(|caps| {
            let source = caps.get(2)?.as_str().to_string();
            let clause = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");

            let default_import = DEFAULT_BINDING
                .captures(clause)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string());
            let named = NAMED_BINDINGS
                .captures(clause)
                .and_then(|c| c.get(1))
                .map(|m| split_bindings(m.as_str()))
                .unwrap_or_default();

            Some(ImportInfo {
                is_local: source.starts_with("./")
                    || source.starts_with("../")
                    || source.starts_with("@/"),
                source,
                default_import,
                named,
            })
        })
        .collect()
}

pub fn extract_exports(content: &str) -> Vec<String> {
    let mut exports = Vec::new();

    if DEFAULT_EXPORT.is_match(content) {
        match DEFAULT_EXPORT_NAME.captures(content).and_then(|c| c.get(1)) {
            Some(name) => exports.push(format!("default:{}", name.as_str())),
            None => exports.push("default".to_string()),
        }
    }
    for caps in NAMED_EXPORT.captures_iter(content) {
        if let Some(name) = caps.get(1) {
            exports.push(name.as_str().to_string());
        }
    }
    for caps in EXPORT_BLOCK.captures_iter(content) {
        if let Some(block) = caps.get(1) {
            exports.extend(split_bindings(block.as_str()));
        }
    }

    exports
}

fn split_bindings(list: &str) -> Vec<String> {
    list.split(',')
        .filter_map(|binding| AS_ALIAS.split(binding.trim()).next())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

pub fn is_jsx_like(content: &str) -> bool {
    JSX_LIKE.is_match(content)
}

pub fn extract_component_info(path: &str, content: &str) -> Option<ComponentInfo> {
    if !is_jsx_like(content) && !content.contains("React") {
        return None;
    }

    let name = FUNCTION_COMPONENT
        .captures(content)
        .or_else(|| ARROW_COMPONENT.captures(content))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            let stem = file_stem(path);
            stem.starts_with(|c: char| c.is_ascii_uppercase())
                .then(|| stem.to_string())
        })?;

    let mut hooks: Vec<String> = Vec::new();
    for hook in HOOK_CALL.find_iter(content) {
        if !hooks.iter().any(|h| h == hook.as_str()) {
            hooks.push(hook.as_str().to_string());
        }
    }
    let has_state = hooks.iter().any(|h| h == "useState" || h == "useReducer");

    let mut child_components: Vec<String> = Vec::new();
    for caps in CHILD_COMPONENT.captures_iter(content) {
        if let Some(child) = caps.get(1) {
            let child = child.as_str();
            if child != name && !child_components.iter().any(|c| c == child) {
                child_components.push(child.to_string());
            }
        }
    }

    Some(ComponentInfo {
        name,
        hooks,
        has_state,
        child_components,
    })
}

/// Heuristic file classification; first rule that fits wins
pub fn classify_file(path: &str, content: &str) -> FileType {
    let name = basename(path).to_lowercase();
    let dir = format!("/{}", path.to_lowercase());

    if name.ends_with(".css") {
        return FileType::Style;
    }
    if name.contains("config") {
        return FileType::Config;
    }
    let original_name = basename(path);
    let hook_name = original_name
        .strip_prefix("use")
        .map(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
        .unwrap_or(false);
    if dir.contains("/hooks/") || (hook_name && is_script(&name)) {
        return FileType::Hook;
    }
    if dir.contains("/context/") || dir.contains("/contexts/") || name.contains("context") {
        return FileType::Context;
    }

    let jsx = is_jsx_like(content);
    if name.contains("layout") || (jsx && content.contains("children")) {
        return FileType::Layout;
    }
    if dir.contains("/pages/")
        || content.contains("useRouter")
        || content.contains("useParams")
        || content.contains("useNavigate")
    {
        return FileType::Page;
    }
    if dir.contains("/utils/") || dir.contains("/lib/") {
        return FileType::Utility;
    }

    if jsx && is_script(&name) {
        FileType::Component
    } else {
        FileType::Utility
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"import React, { useState, useEffect as useFx } from 'react';
import { Link } from "react-router-dom";
import Logo from './Logo';
import './Header.css';

export const NAV_ITEMS = ['home'];

export default function Header() {
  const [open, setOpen] = useState(false);
  return (
    <header className="p-4">
      <Logo size="sm" />
      <Link to="/">Home</Link>
    </header>
  );
}
"#;

    #[test]
    fn test_imports() {
        let imports = extract_imports(HEADER);
        assert_eq!(imports.len(), 4);

        assert_eq!(imports[0].source, "react");
        assert_eq!(imports[0].default_import.as_deref(), Some("React"));
        assert_eq!(imports[0].named, vec!["useState", "useEffect"]);
        assert!(!imports[0].is_local);

        assert_eq!(imports[2].default_import.as_deref(), Some("Logo"));
        assert!(imports[2].is_local);
        assert_eq!(imports[3].source, "./Header.css");
        assert_eq!(imports[3].default_import, None);
    }

    #[test]
    fn test_exports() {
        assert_eq!(extract_exports(HEADER), vec!["default:Header", "NAV_ITEMS"]);
        assert_eq!(
            extract_exports("const a = 1, b = 2;\nexport { a, b as bee };\nexport default () => null;"),
            vec!["default", "a", "b"]
        );
    }

    #[test]
    fn test_component_info() {
        let info = extract_component_info("src/components/Header.jsx", HEADER).unwrap();
        assert_eq!(info.name, "Header");
        assert!(info.has_state);
        assert_eq!(info.child_components, vec!["Logo", "Link"]);

        let arrow = "const Card = ({ title }) => <div className=\"card\">{title}</div>;\nexport default Card;";
        assert_eq!(extract_component_info("src/Card.jsx", arrow).unwrap().name, "Card");
        assert_eq!(extract_component_info("src/math.js", "export const add = (a, b) => a + b;"), None);
    }

    #[test]
    fn test_classify_file() {
        assert_eq!(classify_file("src/index.css", ""), FileType::Style);
        assert_eq!(classify_file("tailwind.config.js", ""), FileType::Config);
        assert_eq!(classify_file("src/hooks/useCart.js", ""), FileType::Hook);
        assert_eq!(classify_file("src/context/CartContext.jsx", "<Provider value={x}>"), FileType::Context);
        assert_eq!(classify_file("src/Layout.jsx", ""), FileType::Layout);
        assert_eq!(classify_file("src/pages/About.jsx", "<div className=\"x\">"), FileType::Page);
        assert_eq!(classify_file("src/Post.jsx", "const { id } = useParams();"), FileType::Page);
        assert_eq!(classify_file("src/utils/format.js", "<Tag />"), FileType::Utility);
        assert_eq!(classify_file("src/components/Header.jsx", HEADER), FileType::Component);
        assert_eq!(classify_file("src/api.js", "export const get = () => fetch('/');"), FileType::Utility);
    }

    #[test]
    fn test_unparseable_files_are_refused() {
        assert_eq!(parse_source("src/a.js", "abc", 2), Err(ParseFailure::TooLarge(3)));
        assert_eq!(parse_source("src/a.js", "a\0b", 100), Err(ParseFailure::Binary));
        assert_eq!(ParsedSource::degraded("src/a.js").file_type, FileType::Utility);
    }
}
