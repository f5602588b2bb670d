//! Package detection from import specifiers

use crate::config::ForgeConfig;
use once_cell::sync::Lazy;
use regex::Regex;

static IMPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"import\s+(?:type\s+)?(?:(?:\{[^}]*\}|\*\s+as\s+\w+|\w+)(?:\s*,\s*(?:\{[^}]*\}|\*\s+as\s+\w+|\w+))*\s+from\s+)?['"]([^'"]+)['"]"#,
    )
    .unwrap()
});

static REQUIRE_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());

static DYNAMIC_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"import\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());

/// Whether a specifier points inside the project
pub fn is_local_specifier(specifier: &str) -> bool {
    specifier.starts_with('.') || specifier.starts_with('/') || specifier.starts_with("@/")
}

/// Collapse a bare specifier to its package name
///
/// `@scope/pkg/sub` becomes `@scope/pkg`, `pkg/sub` becomes `pkg`.
pub fn package_name(specifier: &str) -> &str {
    let segments = if specifier.starts_with('@') { 2 } else { 1 };
    match specifier.match_indices('/').nth(segments - 1) {
        Some((idx, _)) => &specifier[..idx],
        None => specifier,
    }
}

/// Resolve a specifier to an installable package, if it is one
pub fn external_package(specifier: &str, config: &ForgeConfig) -> Option<String> {
    let specifier = specifier.trim();
    if specifier.is_empty() || is_local_specifier(specifier) || specifier.starts_with("node:") {
        return None;
    }

    let name = package_name(specifier);
    if config.packages.builtins.iter().any(|b| b == name) || config.is_preinstalled(name) {
        return None;
    }
    Some(name.to_string())
}

/// Scan source text for external packages, in first-seen order
pub fn scan_packages(content: &str, config: &ForgeConfig) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = Vec::new();
    for regex in [&*IMPORT_FROM, &*REQUIRE_CALL, &*DYNAMIC_IMPORT] {
        for caps in regex.captures_iter(content) {
            if let Some(m) = caps.get(1) {
                found.push((m.start(), m.as_str()));
            }
        }
    }
    found.sort_by_key(|(pos, _)| *pos);

    let mut packages: Vec<String> = Vec::new();
    for (_, specifier) in found {
        if let Some(name) = external_package(specifier, config) {
            if !packages.contains(&name) {
                packages.push(name);
            }
        }
    }
    packages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_name_collapse() {
        assert_eq!(package_name("@scope/pkg/sub/path"), "@scope/pkg");
        assert_eq!(package_name("pkg/sub/path"), "pkg");
        assert_eq!(package_name("@heroicons/react"), "@heroicons/react");
        assert_eq!(package_name("lodash"), "lodash");
    }

    #[test]
    fn test_local_and_builtin_specifiers_are_excluded() {
        let config = ForgeConfig::default();
        for specifier in ["./Header", "../utils", "/abs/path", "@/components/Nav", "fs", "node:path", "react", "react-dom/client"] {
            assert_eq!(external_package(specifier, &config), None, "{}", specifier);
        }
    }

    #[test]
    fn test_scan_packages() {
        let config = ForgeConfig::default();
        let content = r#"
import React, { useState } from 'react';
import { motion } from "framer-motion";
import * as Icons from '@heroicons/react/24/solid';
import './index.css';
import Header from './components/Header';
const axios = require('axios');
const Chart = lazy(() => import('chart.js/auto'));
import { motion as m } from 'framer-motion';
"#;

        assert_eq!(
            scan_packages(content, &config),
            vec!["framer-motion", "@heroicons/react", "axios", "chart.js"]
        );
    }

    #[test]
    fn test_scan_type_only_imports() {
        let config = ForgeConfig::default();
        let content = r#"
import type { ChartOptions } from 'chart.js';
import type Stripe from "stripe";
import type from 'type-fest';
"#;

        assert_eq!(scan_packages(content, &config), vec!["chart.js", "stripe", "type-fest"]);
    }
}
