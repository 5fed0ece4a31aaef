//! `manifest.json`: the route tree plus the assets of every template.
//!
//! Built after the bundler ran on the generated entries. For each template the
//! client closure of `<build>/generated/client/entry-<name>.<ext>` gives the
//! js entry, its preloads and css; the server closure of the matching server
//! entry contributes css only. Templates without a client entry (pages with no
//! islands) carry css alone.
//!
//! The serving side calls [`Manifest::lookup`] with a request path to find the
//! template to serve and the tags to inject into it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::assets::AssetList;
use crate::chunks::{BundlerManifest, ChunkError};
use crate::matcher::match_route;
use crate::project::{ProjectLayout, Side};
use crate::routes::{RouteError, RouteNode, load_routes};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Bundler manifest error: {0}")]
    Chunk(#[from] ChunkError),
    #[error("Route error: {0}")]
    Route(#[from] RouteError),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Asset not found: {}", .0.display())]
    AssetNotFound(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Route tree with every page annotated with its template name.
    pub routes: RouteNode,
    /// Assets per template name.
    pub templates: BTreeMap<String, AssetList>,
}

/// Result of [`Manifest::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub struct PageAssets<'a> {
    pub template: String,
    pub assets: &'a AssetList,
    /// The request matched no route and is answered by a fallback page.
    pub fallback: bool,
}

impl Manifest {
    /// Template and assets for a request path.
    ///
    /// Returns `None` when the path resolves to no page and no fallback covers
    /// it.
    pub fn lookup(&self, url: &str) -> Option<PageAssets<'_>> {
        let matched = match_route(&self.routes, url);
        matched.page_file()?;
        let template = matched.template_name()?;
        let assets = self.templates.get(&template)?;
        Some(PageAssets {
            template,
            assets,
            fallback: !matched.is_match(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Build the manifest for `routes` from the bundler output.
///
/// `server` is optional: a project may be built without a server bundle.
pub fn build_manifest(
    routes: &RouteNode,
    layout: &ProjectLayout,
    client: &BundlerManifest,
    server: Option<&BundlerManifest>,
) -> Result<Manifest, ManifestError> {
    let mut annotated = routes.clone();
    annotated.annotate_templates();

    let mut templates = BTreeMap::new();
    for page in routes.pages() {
        let name = page.template_name();
        if templates.contains_key(&name) {
            continue;
        }

        let client_key = layout.entry_key(Side::Client, &name);
        let (client_chunks, dynamic) = if client.contains(&client_key) {
            let chunks = client.get_chunks(&client_key)?;
            let dynamic = client.dynamic_chunks(&chunks)?;
            (chunks, dynamic)
        } else {
            (Vec::new(), Vec::new())
        };

        let server_key = layout.entry_key(Side::Server, &name);
        let server_chunks = match server {
            Some(server) if server.contains(&server_key) => server.get_chunks(&server_key)?,
            _ => Vec::new(),
        };

        let assets = AssetList::from_closures(&client_chunks, &dynamic, &server_chunks);
        debug!(
            template = %name,
            css = assets.css.len(),
            js = assets.js_imports.len(),
            "template assets"
        );
        templates.insert(name, assets);
    }

    info!(templates = templates.len(), "manifest built");
    Ok(Manifest {
        routes: annotated,
        templates,
    })
}

/// Read `routes.json` and the bundler manifests of a project and build its
/// manifest. The server bundle manifest is used when present.
pub fn build_project_manifest(layout: &ProjectLayout) -> Result<Manifest, ManifestError> {
    let routes = load_routes(&layout.routes_file())?;
    let client = BundlerManifest::load(&layout.bundler_manifest(Side::Client))?;
    let server_path = layout.bundler_manifest(Side::Server);
    let server = if server_path.exists() {
        Some(BundlerManifest::load(&server_path)?)
    } else {
        None
    };
    build_manifest(&routes, layout, &client, server.as_ref())
}

/// What [`collect_static_assets`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticReport {
    /// Stylesheets copied from the server bundle into the client bundle.
    pub copied_css: Vec<String>,
    /// Files moved from the client bundle into the output static dir.
    pub moved: Vec<String>,
}

/// Gather everything the templates reference into the output static dir.
///
/// Stylesheets that only the server bundle emitted are copied into the client
/// bundle first. Then every file of the client bundle except the bundler's
/// own `.vite` metadata is moved, keeping its relative path.
pub fn collect_static_assets(
    manifest: &Manifest,
    layout: &ProjectLayout,
) -> Result<StaticReport, ManifestError> {
    let client_dir = layout.bundle_dir(Side::Client);
    let server_dir = layout.bundle_dir(Side::Server);
    let mut report = StaticReport::default();

    let mut seen = HashSet::new();
    for css in manifest.templates.values().flat_map(|t| &t.css) {
        if !seen.insert(css.as_str()) {
            continue;
        }
        let client_path = client_dir.join(css);
        if client_path.exists() {
            continue;
        }
        let server_path = server_dir.join(css);
        if !server_path.exists() {
            return Err(ManifestError::AssetNotFound(server_path));
        }
        if let Some(parent) = client_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&server_path, &client_path)?;
        debug!(css = %css, "copied server stylesheet");
        report.copied_css.push(css.clone());
    }

    let static_dir = layout.static_dir();
    fs::create_dir_all(&static_dir)?;

    if client_dir.is_dir() {
        let walker = WalkDir::new(&client_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != ".vite");
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = crate::file_tree::relative_src(entry.path(), &client_dir);
            let target = static_dir.join(&rel);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(entry.path(), &target)?;
            report.moved.push(rel);
        }
    }

    info!(
        copied = report.copied_css.len(),
        moved = report.moved.len(),
        "static assets collected"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::ManifestChunk;
    use crate::config::SiteConfig;
    use crate::routes::save_routes;
    use crate::test_helpers::{project, scan, write_file};

    fn layout(root: &Path) -> ProjectLayout {
        ProjectLayout::new(root, &SiteConfig::default())
    }

    fn chunk(file: &str, css: &[&str], imports: &[&str]) -> ManifestChunk {
        ManifestChunk {
            file: file.to_string(),
            css: css.iter().map(|s| s.to_string()).collect(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
            is_entry: true,
            ..ManifestChunk::default()
        }
    }

    /// Site with an index, an about page with islands and a blog post page.
    fn fixture() -> (tempfile::TempDir, RouteNode, BundlerManifest, BundlerManifest) {
        let tmp = project(&["index.tsx", "about.tsx", "blog/[slug].tsx", "_layout.tsx"]);
        let routes = scan(tmp.path());

        let mut client = BundlerManifest::new();
        client.insert(
            ".build/generated/client/entry-about.tsx",
            chunk("assets/entry-about.js", &["assets/counter.css"], &["_solid.js"]),
        );
        client.insert("_solid.js", chunk("assets/solid.js", &[], &[]));

        let mut server = BundlerManifest::new();
        server.insert(
            ".build/generated/server/entry-about.tsx",
            chunk("entry-about.js", &["assets/layout.css", "assets/counter.css"], &[]),
        );
        server.insert(
            ".build/generated/server/entry-index.tsx",
            chunk("entry-index.js", &["assets/layout.css"], &[]),
        );
        (tmp, routes, client, server)
    }

    // =========================================================================
    // build_manifest
    // =========================================================================

    #[test]
    fn templates_for_every_page() {
        let (tmp, routes, client, server) = fixture();
        let manifest = build_manifest(&routes, &layout(tmp.path()), &client, Some(&server)).unwrap();

        let names: Vec<&str> = manifest.templates.keys().map(String::as_str).collect();
        assert_eq!(names, ["about", "blog-[slug]", "index"]);
    }

    #[test]
    fn client_and_server_assets_are_merged() {
        let (tmp, routes, client, server) = fixture();
        let manifest = build_manifest(&routes, &layout(tmp.path()), &client, Some(&server)).unwrap();

        let about = &manifest.templates["about"];
        assert_eq!(about.css, ["assets/counter.css", "assets/layout.css"]);
        assert_eq!(about.js_entry.as_deref(), Some("assets/entry-about.js"));
        assert_eq!(about.js_imports, ["assets/solid.js"]);

        let index = &manifest.templates["index"];
        assert_eq!(index.css, ["assets/layout.css"]);
        assert!(index.js_entry.is_none());

        assert!(manifest.templates["blog-[slug]"].is_empty());
    }

    #[test]
    fn works_without_server_bundle() {
        let (tmp, routes, client, _) = fixture();
        let manifest = build_manifest(&routes, &layout(tmp.path()), &client, None).unwrap();
        assert_eq!(manifest.templates["about"].css, ["assets/counter.css"]);
    }

    #[test]
    fn routes_are_annotated() {
        let (tmp, routes, client, server) = fixture();
        let manifest = build_manifest(&routes, &layout(tmp.path()), &client, Some(&server)).unwrap();
        assert_eq!(manifest.routes.template.as_deref(), Some("index"));
        assert!(routes.template.is_none());
    }

    #[test]
    fn broken_import_in_client_closure_fails() {
        let (tmp, routes, mut client, server) = fixture();
        client.insert(
            ".build/generated/client/entry-about.tsx",
            chunk("assets/entry-about.js", &[], &["_missing.js"]),
        );
        let err = build_manifest(&routes, &layout(tmp.path()), &client, Some(&server)).unwrap_err();
        assert!(matches!(err, ManifestError::Chunk(ChunkError::KeyNotFound(k)) if k == "_missing.js"));
    }

    #[test]
    fn build_from_project_files() {
        let (tmp, routes, client, _) = fixture();
        let layout = layout(tmp.path());
        save_routes(&layout.routes_file(), &routes).unwrap();
        let client_json = serde_json::to_string(&client).unwrap();
        write_file(tmp.path(), ".build/bundle/client/.vite/manifest.json", &client_json);

        let manifest = build_project_manifest(&layout).unwrap();
        assert_eq!(manifest.templates.len(), 3);
        assert!(manifest.templates["index"].css.is_empty());
    }

    // =========================================================================
    // lookup / persistence
    // =========================================================================

    #[test]
    fn lookup_by_url() {
        let (tmp, routes, client, server) = fixture();
        let manifest = build_manifest(&routes, &layout(tmp.path()), &client, Some(&server)).unwrap();

        let page = manifest.lookup("/about").unwrap();
        assert_eq!(page.template, "about");
        assert_eq!(page.assets.js_entry.as_deref(), Some("assets/entry-about.js"));
        assert!(!page.fallback);

        assert_eq!(manifest.lookup("/blog/hello").unwrap().template, "blog-[slug]");
        assert_eq!(manifest.lookup("/").unwrap().template, "index");
        assert!(manifest.lookup("/blog").is_none());
        assert!(manifest.lookup("/nope/deeper").is_none());
    }

    #[test]
    fn lookup_falls_back() {
        let tmp = project(&["index.tsx", "*404.tsx"]);
        let routes = scan(tmp.path());
        let manifest =
            build_manifest(&routes, &layout(tmp.path()), &BundlerManifest::new(), None).unwrap();

        let page = manifest.lookup("/missing").unwrap();
        assert_eq!(page.template, "^404");
        assert!(page.fallback);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let (tmp, routes, client, server) = fixture();
        let layout = layout(tmp.path());
        let manifest = build_manifest(&routes, &layout, &client, Some(&server)).unwrap();

        manifest.save(&layout.manifest_file()).unwrap();
        let loaded = Manifest::load(&layout.manifest_file()).unwrap();
        assert_eq!(loaded, manifest);

        let raw = fs::read_to_string(layout.manifest_file()).unwrap();
        assert!(raw.contains("\"jsEntry\": \"assets/entry-about.js\""));
    }

    // =========================================================================
    // collect_static_assets
    // =========================================================================

    #[test]
    fn copies_server_css_and_moves_client_bundle() {
        let (tmp, routes, client, server) = fixture();
        let layout = layout(tmp.path());
        let root = tmp.path();
        write_file(root, ".build/bundle/client/assets/entry-about.js", "js");
        write_file(root, ".build/bundle/client/assets/solid.js", "js");
        write_file(root, ".build/bundle/client/assets/counter.css", "css");
        write_file(root, ".build/bundle/client/.vite/manifest.json", "{}");
        write_file(root, ".build/bundle/server/assets/layout.css", "layout");

        let manifest = build_manifest(&routes, &layout, &client, Some(&server)).unwrap();
        let report = collect_static_assets(&manifest, &layout).unwrap();

        assert_eq!(report.copied_css, ["assets/layout.css"]);
        assert_eq!(
            report.moved,
            [
                "assets/counter.css",
                "assets/entry-about.js",
                "assets/layout.css",
                "assets/solid.js"
            ]
        );
        let static_dir = layout.static_dir();
        assert_eq!(
            fs::read_to_string(static_dir.join("assets/layout.css")).unwrap(),
            "layout"
        );
        assert!(!static_dir.join(".vite").exists());
        assert!(!root.join(".build/bundle/client/assets/solid.js").exists());
    }

    #[test]
    fn missing_css_is_an_error() {
        let (tmp, routes, client, server) = fixture();
        let layout = layout(tmp.path());
        let manifest = build_manifest(&routes, &layout, &client, Some(&server)).unwrap();

        let err = collect_static_assets(&manifest, &layout).unwrap_err();
        assert!(matches!(err, ManifestError::AssetNotFound(p) if p.ends_with("assets/counter.css")));
    }
}
