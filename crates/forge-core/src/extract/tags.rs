//! Auxiliary tags: packages, commands, explanation, structure, template

use once_cell::sync::Lazy;
use regex::Regex;

static PACKAGE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<package>(.*?)</package>").unwrap());
static PACKAGES_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<packages>(.*?)</packages>").unwrap());
static COMMAND_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<command>(.*?)</command>").unwrap());
static EXPLANATION_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<explanation>(.*?)</explanation>").unwrap());
static STRUCTURE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<structure>(.*?)</structure>").unwrap());
static TEMPLATE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<template>(.*?)</template>").unwrap());

/// Explicit `<package>` and `<packages>` entries in buffer order
pub fn packages(buffer: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for caps in PACKAGE_TAG.captures_iter(buffer) {
        if let Some(m) = caps.get(1) {
            found.push((m.start(), m.as_str().trim().to_string()));
        }
    }
    for caps in PACKAGES_BLOCK.captures_iter(buffer) {
        if let Some(m) = caps.get(1) {
            for (i, name) in split_package_list(m.as_str()).into_iter().enumerate() {
                found.push((m.start() + i, name));
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    found
        .into_iter()
        .map(|(_, name)| name)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Package names from closed `<packages>` blocks only
///
/// Used to start installs before any file is reconciled.
pub fn closed_package_blocks(buffer: &str) -> Vec<String> {
    PACKAGES_BLOCK
        .captures_iter(buffer)
        .filter_map(|caps| caps.get(1))
        .flat_map(|m| split_package_list(m.as_str()))
        .collect()
}

fn split_package_list(list: &str) -> Vec<String> {
    list.split(|c| c == '\n' || c == ',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

pub fn commands(buffer: &str) -> Vec<String> {
    COMMAND_TAG
        .captures_iter(buffer)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

fn first(regex: &Regex, buffer: &str) -> Option<String> {
    regex
        .captures(buffer)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

pub fn explanation(buffer: &str) -> Option<String> {
    first(&EXPLANATION_TAG, buffer)
}

pub fn structure(buffer: &str) -> Option<String> {
    first(&STRUCTURE_TAG, buffer)
}

pub fn template(buffer: &str) -> Option<String> {
    first(&TEMPLATE_TAG, buffer)
}

/// Remove package tags from prose shown to the user
pub fn strip_package_tags(text: &str) -> String {
    let text = PACKAGES_BLOCK.replace_all(text, "");
    PACKAGE_TAG.replace_all(&text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packages_in_order() {
        let buffer = "<package>axios</package>\n<packages>\nframer-motion, lucide-react\nzustand\n</packages>\n<package>clsx</package>";
        assert_eq!(
            packages(buffer),
            vec!["axios", "framer-motion", "lucide-react", "zustand", "clsx"]
        );
    }

    #[test]
    fn test_open_packages_block_is_not_ready() {
        assert!(closed_package_blocks("<packages>\naxios\n").is_empty());
        assert_eq!(closed_package_blocks("<packages>axios</packages>"), vec!["axios"]);
    }

    #[test]
    fn test_text_tags() {
        let buffer = "<explanation>\nBuilt a landing page.\n</explanation><template>vite-react</template><command>npm run build</command>";
        assert_eq!(explanation(buffer).as_deref(), Some("Built a landing page."));
        assert_eq!(template(buffer).as_deref(), Some("vite-react"));
        assert_eq!(structure(buffer), None);
        assert_eq!(commands(buffer), vec!["npm run build"]);
    }

    #[test]
    fn test_strip_package_tags() {
        assert_eq!(
            strip_package_tags("Installing <package>axios</package>now"),
            "Installing now"
        );
    }
}
