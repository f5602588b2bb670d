//! Path helpers shared by the reconciler, manifest and orchestrator

use crate::config::ForgeConfig;
use once_cell::sync::Lazy;
use regex::Regex;

static CSS_SELF_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"import\s+['"]\./[^'"]+\.css['"];?[ \t]*\n?"#).unwrap());

const SCRIPT_EXTENSIONS: &[&str] = &[".jsx", ".js", ".tsx", ".ts"];

/// Normalize a generated path to a slash-separated path under the source root
pub fn normalize_path(path: &str, config: &ForgeConfig) -> String {
    let mut normalized = path.trim().replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    let normalized = normalized.trim_start_matches('/').to_string();

    let project = &config.project;
    let under = |dir: &str| normalized.starts_with(&format!("{}/", dir.trim_end_matches('/')));

    if under(&project.source_root)
        || under(&project.public_dir)
        || project.root_files.iter().any(|f| f == &normalized)
        || config.is_protected(&normalized)
    {
        normalized
    } else {
        format!("{}/{}", project.source_root.trim_end_matches('/'), normalized)
    }
}

/// Last path segment
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Last path segment without its extension
pub fn file_stem(path: &str) -> &str {
    let name = basename(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Directory part of a path, empty for top-level files
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

pub fn is_script(path: &str) -> bool {
    SCRIPT_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Remove `import './x.css'` lines from a script
pub fn strip_css_imports(path: &str, content: &str) -> String {
    if !is_script(path) {
        return content.to_string();
    }
    CSS_SELF_IMPORT.replace_all(content, "").into_owned()
}

/// Place a bare file name from a plain-text listing into the component directory
pub fn place_bare_name(name: &str, config: &ForgeConfig) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("{}/{}", config.project.component_dir.trim_end_matches('/'), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        let config = ForgeConfig::default();

        assert_eq!(normalize_path("src/App.jsx", &config), "src/App.jsx");
        assert_eq!(normalize_path("/src/App.jsx", &config), "src/App.jsx");
        assert_eq!(normalize_path("./components/Nav.jsx", &config), "src/components/Nav.jsx");
        assert_eq!(normalize_path("components\\Nav.jsx", &config), "src/components/Nav.jsx");
        assert_eq!(normalize_path("public/logo.svg", &config), "public/logo.svg");
        assert_eq!(normalize_path("index.html", &config), "index.html");
        assert_eq!(normalize_path("package.json", &config), "package.json");
    }

    #[test]
    fn test_strip_css_imports() {
        let content = "import React from 'react';\nimport './App.css';\nexport default App;\n";
        assert_eq!(
            strip_css_imports("src/App.jsx", content),
            "import React from 'react';\nexport default App;\n"
        );
        assert_eq!(strip_css_imports("src/index.css", content), content);
    }

    #[test]
    fn test_names() {
        assert_eq!(basename("src/components/Header.jsx"), "Header.jsx");
        assert_eq!(file_stem("src/components/Header.jsx"), "Header");
        assert_eq!(file_stem(".env"), ".env");
        assert_eq!(parent_dir("src/App.jsx"), "src");
        assert_eq!(parent_dir("App.jsx"), "");
    }
}
