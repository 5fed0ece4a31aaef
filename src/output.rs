//! CLI output formatting for all pipeline stages.
//!
//! # Route-First Display
//!
//! Output is **route-centric, not file-centric**. Every line leads with the
//! route pattern a visitor would request; the files backing it are secondary
//! context on indented lines. This keeps the output readable as a sitemap
//! while still pointing at the source of every page.
//!
//! # Output Format
//!
//! ## Routes
//!
//! ```text
//! /
//!     Layout: src/pages/_layout.tsx
//!     Index: src/pages/index.tsx
//!     Fallback 404: src/pages/*404.tsx
//!     /about → src/pages/about.tsx
//!     /blog
//!         Index: src/pages/blog/index.tsx
//!         /:slug → src/pages/blog/[slug].tsx
//!     @modal (slot)
//!         /login → src/pages/@modal/login.tsx
//!
//! 6 pages, 6 templates
//! ```
//!
//! ## Generate
//!
//! ```text
//! / → index.html
//! /about → about.html
//!     Entry: .build/generated/client/entry-about.tsx
//!     Islands: Counter (island-1a2b3c4d)
//!
//! Generated 2 pages, 1 client entry
//! ```
//!
//! ## Match
//!
//! ```text
//! /blog/hello → /blog/:slug
//!     Template: blog-[slug]
//!     Page: src/pages/blog/[slug].tsx
//!     Layouts: src/pages/_layout.tsx
//!     slug = hello
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::generate::GenerateReport;
use crate::manifest::{Manifest, StaticReport};
use crate::matcher::RouteMatch;
use crate::routes::{Route, RouteNode};

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn count(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn intercept_note(route: &Route) -> String {
    match route.intercept() {
        Some(i) => format!(" (intercepts under {})", i.base),
        None => String::new(),
    }
}

// ============================================================================
// Routes
// ============================================================================

/// Format the route tree as an indented sitemap followed by a page count.
pub fn format_routes(root: &RouteNode) -> Vec<String> {
    let mut lines = vec![root.path.clone()];
    format_node_body(root, 1, &mut lines);

    let pages = root.pages();
    let templates: std::collections::BTreeSet<String> =
        pages.iter().map(|p| p.template_name()).collect();
    lines.push(String::new());
    lines.push(format!(
        "{}, {}",
        count(pages.len(), "page", "pages"),
        count(templates.len(), "template", "templates")
    ));
    lines
}

fn format_node_body(node: &RouteNode, depth: usize, lines: &mut Vec<String>) {
    let pad = indent(depth);
    if let Some(layout) = &node.layout {
        lines.push(format!("{pad}Layout: {layout}"));
    }
    if let Some(index) = &node.index {
        lines.push(format!("{pad}Index: {index}"));
    }
    for (name, file) in &node.fallback {
        lines.push(format!("{pad}Fallback {name}: {file}"));
    }
    for child in &node.children {
        match child {
            Route::Leaf(leaf) => lines.push(format!(
                "{pad}{} \u{2192} {}{}",
                leaf.path,
                leaf.file,
                intercept_note(child)
            )),
            Route::Node(inner) => {
                lines.push(format!("{pad}{}{}", inner.path, intercept_note(child)));
                format_node_body(inner, depth + 1, lines);
            }
        }
    }
    for (name, slot) in &node.slots {
        lines.push(format!("{pad}{name} (slot)"));
        format_node_body(slot, depth + 1, lines);
    }
}

pub fn print_routes(root: &RouteNode) {
    for line in format_routes(root) {
        println!("{}", line);
    }
}

// ============================================================================
// Generate
// ============================================================================

/// Format the pages written by a generation run.
pub fn format_generate(report: &GenerateReport) -> Vec<String> {
    let mut lines = Vec::new();
    let mut entries = 0;

    for page in &report.pages {
        lines.push(format!("{} \u{2192} {}.html", page.route, page.template));
        if let Some(entry) = &page.entry {
            entries += 1;
            lines.push(format!("    Entry: {entry}"));
            let islands: Vec<String> = page
                .islands
                .iter()
                .map(|i| format!("{} ({})", i.display_name(), i.id))
                .collect();
            lines.push(format!("    Islands: {}", islands.join(", ")));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Generated {}, {}",
        count(report.pages.len(), "page", "pages"),
        count(entries, "client entry", "client entries")
    ));
    lines
}

pub fn print_generate(report: &GenerateReport) {
    for line in format_generate(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Match
// ============================================================================

/// Format the result of matching `url`.
pub fn format_match(url: &str, matched: &RouteMatch<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let pad = indent(1);

    match (&matched.route, &matched.fallback) {
        (Some(route), _) => {
            let pattern: String = matched
                .ancestors
                .iter()
                .map(|n| n.path.as_str())
                .chain([route.path()])
                .filter(|p| *p != "/")
                .collect();
            let pattern = if pattern.is_empty() { "/".to_string() } else { pattern };
            lines.push(format!("{url} \u{2192} {pattern}"));
        }
        (None, Some(fallback)) => {
            lines.push(format!("{url} \u{2192} fallback {}", fallback.name));
        }
        (None, None) => {
            lines.push(format!("{url} \u{2192} no match"));
            return lines;
        }
    }

    match matched.page_file() {
        Some(file) => {
            if let Some(template) = matched.template_name() {
                lines.push(format!("{pad}Template: {template}"));
            }
            lines.push(format!("{pad}Page: {file}"));
        }
        None => lines.push(format!("{pad}No page (directory without index)")),
    }

    let layouts = matched.layouts();
    if !layouts.is_empty() {
        lines.push(format!("{pad}Layouts: {}", layouts.join(", ")));
    }
    for (name, value) in &matched.params {
        lines.push(format!("{pad}{name} = {value}"));
    }
    lines
}

pub fn print_match(url: &str, matched: &RouteMatch<'_>) {
    for line in format_match(url, matched) {
        println!("{}", line);
    }
}

// ============================================================================
// Manifest
// ============================================================================

/// Format the templates of a manifest and what was collected into the
/// static dir.
pub fn format_manifest(manifest: &Manifest, collected: &StaticReport) -> Vec<String> {
    let mut lines = Vec::new();

    for (name, assets) in &manifest.templates {
        lines.push(format!("{name}.html"));
        for css in &assets.css {
            lines.push(format!("    css: {css}"));
        }
        if let Some(entry) = &assets.js_entry {
            lines.push(format!("    js: {entry}"));
        }
        for js in assets.js_imports.iter().chain(&assets.dynamic) {
            lines.push(format!("    preload: {js}"));
        }
    }

    lines.push(String::new());
    for css in &collected.copied_css {
        lines.push(format!("Copied {css} from server bundle"));
    }
    lines.push(format!(
        "{}, {} moved to static",
        count(manifest.templates.len(), "template", "templates"),
        count(collected.moved.len(), "file", "files")
    ));
    lines
}

pub fn print_manifest(manifest: &Manifest, collected: &StaticReport) {
    for line in format_manifest(manifest, collected) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
