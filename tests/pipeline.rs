//! End-to-end run of the build pipeline on a small project.
//!
//! The renderer is a stand-in: each module file lists the islands it renders,
//! one `island <Component> <file> <export>` line per island, and the page
//! markup is a `<main>` holding one `<div>` per module plus the asset
//! placeholders. The bundler is simulated by writing its manifests by hand.

use std::fs;
use std::path::{Path, PathBuf};

use atoll::assets::fill_template;
use atoll::chunks::{BundlerManifest, ManifestChunk};
use atoll::client_entry::ClientEntryOptions;
use atoll::config::SiteConfig;
use atoll::dev::DevEntries;
use atoll::generate::{RenderError, Renderer, generate};
use atoll::island::{IslandMeta, IslandRegistry};
use atoll::manifest::{Manifest, build_project_manifest, collect_static_assets};
use atoll::matcher::{ParamValue, match_route};
use atoll::project::{ProjectLayout, Side};
use atoll::routes::{load_routes, save_routes, scan_routes};
use atoll::types::PageModule;
use tempfile::TempDir;

struct MarkerRenderer {
    root: PathBuf,
}

impl Renderer for MarkerRenderer {
    fn render(
        &self,
        modules: &[PageModule],
        islands: &mut IslandRegistry,
    ) -> Result<String, RenderError> {
        let mut body = String::new();
        for module in modules {
            let source = fs::read_to_string(self.root.join(&module.file))
                .map_err(|e| RenderError::Message(e.to_string()))?;
            for (offset, line) in source.lines().enumerate() {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if let ["island", component, file, export] = parts.as_slice() {
                    let meta = IslandMeta {
                        component: component.to_string(),
                        file: file.to_string(),
                        export_name: export.to_string(),
                    };
                    let id = islands.register(meta, None, offset)?.id.clone();
                    body.push_str(&format!("<div id=\"{id}\"></div>"));
                }
            }
            body.push_str(&format!("<div data-module=\"{}\"></div>", module.file));
        }
        Ok(format!(
            "<html><head>{{{{links}}}}</head><body><main>{body}</main>{{{{scripts}}}}</body></html>"
        ))
    }
}

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

fn setup() -> (TempDir, ProjectLayout) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "src/pages/_layout.tsx", "island Nav src/components/nav.tsx Nav\n");
    write(root, "src/pages/index.tsx", "");
    write(root, "src/pages/*404.tsx", "");
    write(
        root,
        "src/pages/blog/[slug].tsx",
        "island Counter src/components/counter.tsx default\n\
         island Counter src/components/counter.tsx default\n",
    );
    write(root, "src/pages/(marketing)/pricing.tsx", "");
    write(root, "src/pages/notes.md", "not a route");

    let layout = ProjectLayout::new(root, &SiteConfig::default());
    (tmp, layout)
}

fn chunk(file: &str, css: &[&str], imports: &[&str]) -> ManifestChunk {
    ManifestChunk {
        file: file.to_string(),
        css: css.iter().map(|s| s.to_string()).collect(),
        imports: imports.iter().map(|s| s.to_string()).collect(),
        ..ManifestChunk::default()
    }
}

#[test]
fn build_pipeline_end_to_end() {
    let (tmp, layout) = setup();
    let root = tmp.path();
    let config = SiteConfig::default();

    // Routes: scan, persist, reload.
    let routes = scan_routes(&layout, &config.routes).unwrap();
    save_routes(&layout.routes_file(), &routes).unwrap();
    let routes = load_routes(&layout.routes_file()).unwrap();
    let paths: Vec<&str> = routes.children.iter().map(|c| c.path()).collect();
    assert_eq!(paths, ["/pricing", "/blog"]);

    // Matching.
    let m = match_route(&routes, "/blog/first-post");
    assert_eq!(
        m.params.get("slug"),
        Some(&ParamValue::Segment("first-post".to_string()))
    );
    assert_eq!(m.template_name().as_deref(), Some("blog-[slug]"));
    assert_eq!(m.layouts(), ["src/pages/_layout.tsx"]);
    assert_eq!(
        match_route(&routes, "/nowhere").page_file(),
        Some("src/pages/*404.tsx")
    );

    // Generation.
    let renderer = MarkerRenderer {
        root: root.to_path_buf(),
    };
    let report = generate(&routes, &renderer, &layout, &ClientEntryOptions::default()).unwrap();
    assert_eq!(report.pages.len(), 4);

    let html = fs::read_to_string(layout.template_file("blog-[slug]")).unwrap();
    assert!(html.starts_with("<!DOCTYPE html><html>"));
    let layout_pos = html.find("data-module=\"src/pages/_layout.tsx\"").unwrap();
    let page_pos = html.find("data-module=\"src/pages/blog/[slug].tsx\"").unwrap();
    assert!(layout_pos < page_pos);

    let entry_key = layout.entry_key(Side::Client, "blog-[slug]");
    let entry = fs::read_to_string(root.join(&entry_key)).unwrap();
    assert_eq!(
        entry.matches("from \"../../../src/components/counter.tsx\"").count(),
        1
    );
    assert!(entry.contains("import { Nav as Island0 } from \"../../../src/components/nav.tsx\";"));
    assert_eq!(entry.matches("hydrate(() =>").count(), 3);

    let pages: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(layout.pages_file()).unwrap()).unwrap();
    assert_eq!(pages["/blog/:slug"]["entry"], entry_key.as_str());
    assert_eq!(pages["/pricing"]["template"], "pricing");

    // Bundler output.
    let mut client = BundlerManifest::new();
    client.insert(
        entry_key.clone(),
        chunk("assets/entry-slug.js", &["assets/counter.css"], &["_solid.js"]),
    );
    client.insert("_solid.js", chunk("assets/solid.js", &[], &[]));
    write(
        root,
        ".build/bundle/client/.vite/manifest.json",
        &serde_json::to_string(&client).unwrap(),
    );
    write(root, ".build/bundle/client/assets/entry-slug.js", "js");
    write(root, ".build/bundle/client/assets/solid.js", "js");
    write(root, ".build/bundle/client/assets/counter.css", "css");

    let mut server = BundlerManifest::new();
    server.insert(
        layout.entry_key(Side::Server, "blog-[slug]"),
        chunk("entry.js", &["assets/site.css"], &[]),
    );
    write(
        root,
        ".build/bundle/server/.vite/manifest.json",
        &serde_json::to_string(&server).unwrap(),
    );
    write(root, ".build/bundle/server/assets/site.css", "site");

    // Manifest and static assets.
    let manifest = build_project_manifest(&layout).unwrap();
    let collected = collect_static_assets(&manifest, &layout).unwrap();
    manifest.save(&layout.manifest_file()).unwrap();
    assert_eq!(collected.copied_css, ["assets/site.css"]);
    assert!(layout.static_dir().join("assets/solid.js").exists());
    assert!(layout.static_dir().join("assets/site.css").exists());

    let manifest = Manifest::load(&layout.manifest_file()).unwrap();
    let page = manifest.lookup("/blog/first-post").unwrap();
    assert_eq!(page.template, "blog-[slug]");
    assert_eq!(page.assets.css, ["assets/counter.css", "assets/site.css"]);

    // Serving: fill the template with the page's tags.
    let prefix = &config.assets.prefix;
    let served = fill_template(
        &html,
        &page.assets.link_tags(prefix).into_string(),
        &page.assets.script_tags(prefix).into_string(),
    );
    assert!(served.contains("<link rel=\"stylesheet\" href=\"/assets/site.css\">"));
    assert!(served.contains("<link rel=\"modulepreload\" href=\"/assets/solid.js\">"));
    assert!(served.contains("<script type=\"module\" src=\"/assets/entry-slug.js\"></script></body>"));
    assert!(
        page.assets
            .link_header(prefix)
            .unwrap()
            .starts_with("</assets/counter.css>; rel=\"preload\"; as=\"style\"")
    );

    let index = manifest.lookup("/").unwrap();
    assert!(index.assets.js_entry.is_none());
}

#[test]
fn dev_entries_follow_renders_and_invalidate() {
    let (tmp, layout) = setup();
    let config = SiteConfig::default();
    let routes = scan_routes(&layout, &config.routes).unwrap();
    let renderer = MarkerRenderer {
        root: tmp.path().to_path_buf(),
    };

    let mut dev = DevEntries::from_config(&config);
    let pages = routes.pages();
    let post = pages
        .iter()
        .find(|p| p.route_path() == "/blog/:slug")
        .unwrap();
    let rendered = atoll::generate::render_page(post, &renderer).unwrap();
    let id = dev.set_route(&rendered.template, rendered.islands, Vec::new());

    let code = dev.load(&id).unwrap();
    assert!(code.contains("from \"/src/components/counter.tsx\""));

    let inv = dev.invalidate(&routes, "src/pages/_layout.tsx");
    assert!(inv.full_reload);
    assert_eq!(inv.modules, [id.clone()]);
    assert!(!dev.contains(&id));
}
