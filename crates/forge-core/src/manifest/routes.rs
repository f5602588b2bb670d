//! Route extraction from router declarations and the pages/ convention

use crate::paths::is_script;
use crate::types::{FileInfo, RouteInfo};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static ROUTE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<Route\b").unwrap());
static PATH_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\bpath=["']([^"']*)["']"#).unwrap());
static ELEMENT_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:element=\{\s*<|component=\{\s*)([A-Z]\w*)").unwrap()
});
static PATH_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\bpath:\s*["']([^"']*)["']"#).unwrap());
static ELEMENT_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:element:\s*<|Component:\s*)([A-Z]\w*)").unwrap()
});

/// Bytes after a route opener searched for its attributes
const ROUTE_WINDOW: usize = 400;

pub fn extract_routes(files: &BTreeMap<String, FileInfo>) -> Vec<RouteInfo> {
    let mut routes: Vec<RouteInfo> = Vec::new();
    let mut push = |route: RouteInfo| {
        if !routes.iter().any(|r| r.path == route.path && r.file == route.file) {
            routes.push(route);
        }
    };

    for (path, info) in files {
        if !is_script(path) {
            continue;
        }
        let content = &info.content;

        if content.contains("<Route") {
            let starts: Vec<usize> = ROUTE_TAG.find_iter(content).map(|m| m.end()).collect();
            for (i, &start) in starts.iter().enumerate() {
                let window = route_window(content, start, starts.get(i + 1).copied());
                if let Some(route_path) = first_capture(&PATH_ATTR, window) {
                    push(RouteInfo {
                        path: route_path,
                        file: path.clone(),
                        component: first_capture(&ELEMENT_ATTR, window),
                    });
                }
            }
        }

        if content.contains("createBrowserRouter") || content.contains("createHashRouter") {
            let starts: Vec<usize> = PATH_KEY.find_iter(content).map(|m| m.start()).collect();
            for (i, &start) in starts.iter().enumerate() {
                let window = route_window(content, start, starts.get(i + 1).copied());
                if let Some(route_path) = first_capture(&PATH_KEY, window) {
                    push(RouteInfo {
                        path: route_path,
                        file: path.clone(),
                        component: first_capture(&ELEMENT_KEY, window),
                    });
                }
            }
        }

        if let Some(route_path) = page_route(path) {
            push(RouteInfo {
                path: route_path,
                file: path.clone(),
                component: info.component_info.as_ref().map(|c| c.name.clone()),
            });
        }
    }

    routes
}

/// Map a file under `pages/` to its URL path
///
/// `src/pages/about/index.jsx` becomes `/about`, `pages/index.jsx` becomes `/`.
pub fn page_route(path: &str) -> Option<String> {
    let rest = match path.strip_prefix("pages/") {
        Some(rest) => rest,
        None => {
            let idx = path.find("/pages/")?;
            &path[idx + "/pages/".len()..]
        }
    };
    if !is_script(rest) {
        return None;
    }

    let without_ext = rest.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(rest);
    let without_index = without_ext.strip_suffix("index").unwrap_or(without_ext);
    let trimmed = without_index.trim_end_matches('/');

    Some(format!("/{}", trimmed))
}

fn route_window(content: &str, start: usize, next: Option<usize>) -> &str {
    let mut end = next.unwrap_or(content.len()).min(start + ROUTE_WINDOW);
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[start..end]
}

fn first_capture(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileType;
    use chrono::Utc;

    fn info(content: &str) -> FileInfo {
        FileInfo {
            content: content.to_string(),
            file_type: FileType::Component,
            imports: Vec::new(),
            exports: Vec::new(),
            component_info: None,
            last_modified: Utc::now(),
        }
    }

    #[test]
    fn test_page_route() {
        assert_eq!(page_route("src/pages/index.jsx").as_deref(), Some("/"));
        assert_eq!(page_route("src/pages/about/index.tsx").as_deref(), Some("/about"));
        assert_eq!(page_route("pages/blog/[id].jsx").as_deref(), Some("/blog/[id]"));
        assert_eq!(page_route("src/components/Nav.jsx"), None);
        assert_eq!(page_route("src/pages/theme.css"), None);
    }

    #[test]
    fn test_router_declarations() {
        let mut files = BTreeMap::new();
        files.insert(
            "src/App.jsx".to_string(),
            info("<Routes>\n  <Route path=\"/\" element={<Home />} />\n  <Route\n    path=\"/about\"\n    element={<About />}\n  />\n</Routes>"),
        );
        files.insert(
            "src/router.js".to_string(),
            info("export const router = createBrowserRouter([\n  { path: '/videos', element: <Videos /> },\n]);"),
        );

        let routes = extract_routes(&files);
        let summary: Vec<(&str, &str, Option<&str>)> = routes
            .iter()
            .map(|r| (r.path.as_str(), r.file.as_str(), r.component.as_deref()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("/", "src/App.jsx", Some("Home")),
                ("/about", "src/App.jsx", Some("About")),
                ("/videos", "src/router.js", Some("Videos")),
            ]
        );
    }
}
