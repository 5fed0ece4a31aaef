//! On-disk layout of a project and the naming of its generated files.
//!
//! ```text
//! <root>/
//! ├── config.toml
//! ├── routes.json
//! ├── <build_dir>/
//! │   ├── generated/
//! │   │   ├── client/entry-*.tsx
//! │   │   └── server/entry-*.tsx
//! │   └── bundle/
//! │       ├── client/<chunks> + .vite/manifest.json
//! │       └── server/<chunks> + .vite/manifest.json
//! └── <output_dir>/
//!     ├── manifest.json
//!     ├── pages.json
//!     ├── static/<chunks>
//!     └── templates/*.html
//! ```
//!
//! Template names are derived from the matched route chain: the path of every
//! ancestor plus the route's own path, in bracket source spelling, joined with
//! `-`. The root route is named `index`. Entry files are `entry-<template>`.

use std::path::{Path, PathBuf};

use crate::config::SiteConfig;
use crate::naming::template_segment;

/// Name used for a route chain with no non-root segment.
pub const ROOT_TEMPLATE: &str = "index";

/// Which side of the bundle a generated file or manifest belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    pub fn dir_name(self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
        }
    }
}

/// Resolved paths of one project.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
    pages_dir: String,
    build_dir: String,
    output_dir: String,
    entry_extension: String,
}

impl ProjectLayout {
    pub fn new(root: &Path, config: &SiteConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            pages_dir: config.pages_dir.trim_end_matches('/').to_string(),
            build_dir: config.build_dir.trim_end_matches('/').to_string(),
            output_dir: config.output_dir.trim_end_matches('/').to_string(),
            entry_extension: config.client.entry_extension.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.root.join(&self.pages_dir)
    }

    pub fn routes_file(&self) -> PathBuf {
        self.root.join("routes.json")
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join(&self.build_dir)
    }

    /// `<build>/generated/<side>`, project-relative.
    pub fn entries_dir_ref(&self, side: Side) -> String {
        format!("{}/generated/{}", self.build_dir, side.dir_name())
    }

    pub fn entries_dir(&self, side: Side) -> PathBuf {
        self.root.join(self.entries_dir_ref(side))
    }

    /// Project-relative path of a generated entry, which is also its key in
    /// the bundler manifest.
    pub fn entry_key(&self, side: Side, template: &str) -> String {
        format!(
            "{}/{}.{}",
            self.entries_dir_ref(side),
            entry_name(template),
            self.entry_extension
        )
    }

    pub fn entry_file(&self, side: Side, template: &str) -> PathBuf {
        self.root.join(self.entry_key(side, template))
    }

    pub fn bundle_dir(&self, side: Side) -> PathBuf {
        self.build_dir().join("bundle").join(side.dir_name())
    }

    pub fn bundler_manifest(&self, side: Side) -> PathBuf {
        self.bundle_dir(side).join(".vite").join("manifest.json")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.output_dir)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.output_dir().join("templates")
    }

    pub fn template_file(&self, template: &str) -> PathBuf {
        self.templates_dir().join(format!("{template}.html"))
    }

    pub fn static_dir(&self) -> PathBuf {
        self.output_dir().join("static")
    }

    pub fn manifest_file(&self) -> PathBuf {
        self.output_dir().join("manifest.json")
    }

    pub fn pages_file(&self) -> PathBuf {
        self.output_dir().join("pages.json")
    }

    /// `path` relative to the project root, `/`-separated.
    pub fn relative(&self, path: &Path) -> String {
        crate::file_tree::relative_src(path, &self.root)
    }
}

/// Template name for a chain of route paths, outermost first.
///
/// ```
/// # use atoll::project::template_name;
/// assert_eq!(template_name(["/", "/blog", "/:slug"]), "blog-[slug]");
/// assert_eq!(template_name(["/"]), "index");
/// ```
pub fn template_name<'a>(paths: impl IntoIterator<Item = &'a str>) -> String {
    let name = paths
        .into_iter()
        .map(template_segment)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if name.is_empty() {
        ROOT_TEMPLATE.to_string()
    } else {
        name
    }
}

pub fn entry_name(template: &str) -> String {
    format!("entry-{template}")
}

/// Import path from the directory `from_dir` to `to`, both project-relative.
///
/// The result always starts with `./` or `../` so bundlers treat it as a
/// relative module.
pub fn relative_path(from_dir: &str, to: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let target: Vec<&str> = to.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let common = from
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let ups = from.len() - common;
    let mut parts: Vec<&str> = std::iter::repeat_n("..", ups).collect();
    parts.extend(&target[common..]);
    let joined = parts.join("/");
    if ups == 0 {
        format!("./{joined}")
    } else {
        joined
    }
}
