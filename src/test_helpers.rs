//! Shared test utilities for the atoll test suite.
//!
//! Builds throwaway project trees in temp directories and provides lookup
//! helpers over the route tree that panic with a readable message on miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = project(&["index.tsx", "blog/[slug].tsx", "_layout.tsx"]);
//! let routes = scan(tmp.path());
//!
//! let blog = find_node(&routes, "/blog");
//! assert_eq!(child_paths(blog), vec!["/:slug"]);
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::config::SiteConfig;
use crate::project::ProjectLayout;
use crate::routes::{Route, RouteNode, scan_routes};

// =========================================================================
// Fixture setup
// =========================================================================

/// Create each path under `root` as an empty file, creating parents.
pub fn write_files(root: &Path, paths: &[&str]) {
    for path in paths {
        write_file(root, path, "");
    }
}

/// Create `path` under `root` with `content`, creating parents.
pub fn write_file(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(full, content).unwrap();
}

/// A temp project whose pages directory (`src/pages`) holds `pages`.
pub fn project(pages: &[&str]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let prefixed: Vec<String> = pages.iter().map(|p| format!("src/pages/{p}")).collect();
    let refs: Vec<&str> = prefixed.iter().map(String::as_str).collect();
    write_files(tmp.path(), &refs);
    std::fs::create_dir_all(tmp.path().join("src/pages")).unwrap();
    tmp
}

/// Scan the pages of a temp project with stock config.
pub fn scan(root: &Path) -> RouteNode {
    let config = SiteConfig::default();
    let layout = ProjectLayout::new(root, &config);
    scan_routes(&layout, &config.routes).unwrap()
}

// =========================================================================
// Route tree lookups: panics with a clear message on miss
// =========================================================================

/// Walk child paths from the root, e.g. `"/blog/:slug"`.
pub fn find_route<'a>(root: &'a RouteNode, path: &str) -> &'a Route {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| format!("/{s}"))
        .collect();
    let (last, init) = segments
        .split_last()
        .unwrap_or_else(|| panic!("find_route needs a non-root path, got '{path}'"));

    let mut node = root;
    for segment in init {
        node = match child(node, segment) {
            Route::Node(n) => n,
            Route::Leaf(l) => panic!("'{}' is a leaf, cannot descend to '{path}'", l.path),
        };
    }
    child(node, last)
}

/// Like [`find_route`] but requires an internal node.
pub fn find_node<'a>(root: &'a RouteNode, path: &str) -> &'a RouteNode {
    match find_route(root, path) {
        Route::Node(n) => n,
        Route::Leaf(l) => panic!("expected node at '{path}', found leaf {l:?}"),
    }
}

fn child<'a>(node: &'a RouteNode, path: &str) -> &'a Route {
    node.children
        .iter()
        .find(|c| c.path() == path)
        .unwrap_or_else(|| panic!("route '{path}' not found. Available: {:?}", child_paths(node)))
}

/// Paths of `node`'s direct children, in order.
pub fn child_paths(node: &RouteNode) -> Vec<&str> {
    node.children.iter().map(|c| c.path()).collect()
}
