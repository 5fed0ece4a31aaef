//! Client entries served from memory by a development server.
//!
//! In development there is no bundler output on disk. After rendering a
//! request the server records the islands the page registered with
//! [`DevEntries::set_route`], which returns a virtual module id
//! (`/$site/entry-<template>.<ext>`) to reference from the page's script tag.
//! When the browser requests that id, [`DevEntries::load`] produces the
//! bootstrap source on the fly.
//!
//! Ids handed to the module loader are marked internal by a leading NUL byte,
//! so other resolvers leave them alone ([`DevEntries::resolve_id`]).

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::client_entry::{ClientEntryOptions, generate_client_entry};
use crate::config::SiteConfig;
use crate::island::IslandEntry;
use crate::project::entry_name;
use crate::routes::RouteNode;

/// Public prefix of every virtual entry id.
pub const PUBLIC_PREFIX: &str = "/$site/";
const INTERNAL_MARKER: char = '\0';

#[derive(Debug, Clone, Default)]
struct DevModule {
    islands: Vec<IslandEntry>,
    imports: Vec<String>,
}

/// What a file change requires from the development server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    /// Virtual ids dropped from the store.
    pub modules: Vec<String>,
    /// Whether connected clients must reload the page.
    pub full_reload: bool,
}

#[derive(Debug, Clone)]
pub struct DevEntries {
    options: ClientEntryOptions,
    extension: String,
    modules: BTreeMap<String, DevModule>,
}

impl DevEntries {
    pub fn new(options: ClientEntryOptions, extension: &str) -> Self {
        Self {
            options,
            extension: extension.to_string(),
            modules: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(
            ClientEntryOptions::from(&config.client),
            &config.client.entry_extension,
        )
    }

    pub fn module_id(&self, template: &str) -> String {
        format!("{PUBLIC_PREFIX}{}.{}", entry_name(template), self.extension)
    }

    /// Record the islands and side-effect imports of the last render of
    /// `template`, replacing any earlier record. Returns the module id.
    pub fn set_route(
        &mut self,
        template: &str,
        islands: Vec<IslandEntry>,
        imports: Vec<String>,
    ) -> String {
        let id = self.module_id(template);
        debug!(id = %id, islands = islands.len(), "dev entry recorded");
        self.modules.insert(id.clone(), DevModule { islands, imports });
        id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(strip_internal(id))
    }

    /// Internal id for a public virtual id, `None` for ids this store does
    /// not own.
    pub fn resolve_id(&self, id: &str) -> Option<String> {
        id.starts_with(PUBLIC_PREFIX)
            .then(|| format!("{INTERNAL_MARKER}{id}"))
    }

    /// Bootstrap source for a virtual id, public or internal.
    ///
    /// An id under the prefix that has no record yields an entry without
    /// islands, so a stale script tag still loads.
    pub fn load(&self, id: &str) -> Option<String> {
        let id = strip_internal(id);
        if !id.starts_with(PUBLIC_PREFIX) {
            return None;
        }
        let module = self.modules.get(id).cloned().unwrap_or_default();
        let options = ClientEntryOptions {
            additional_imports: module.imports,
            ..self.options.clone()
        };
        Some(generate_client_entry(&module.islands, &options, |file| {
            format!("/{file}")
        }))
    }

    /// Drop the entries of every page whose page file or layout chain is
    /// `changed` (project-relative).
    pub fn invalidate(&mut self, routes: &RouteNode, changed: &str) -> Invalidation {
        let affected =
            routes.find_pages(|page| page.file() == changed || page.layouts().contains(&changed));
        if affected.is_empty() {
            return Invalidation::default();
        }

        let mut modules = Vec::new();
        for page in &affected {
            let id = self.module_id(&page.template_name());
            if self.modules.remove(&id).is_some() {
                modules.push(id);
            }
        }
        info!(file = %changed, pages = affected.len(), "invalidated");
        Invalidation {
            modules,
            full_reload: true,
        }
    }
}

fn strip_internal(id: &str) -> &str {
    id.strip_prefix(INTERNAL_MARKER).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{project, scan};

    fn entries() -> DevEntries {
        DevEntries::from_config(&SiteConfig::default())
    }

    fn island(id: &str) -> IslandEntry {
        IslandEntry {
            id: id.to_string(),
            component: "Counter".to_string(),
            file: "src/components/counter.tsx".to_string(),
            export_name: "default".to_string(),
        }
    }

    #[test]
    fn module_ids_follow_entry_names() {
        assert_eq!(entries().module_id("blog-[slug]"), "/$site/entry-blog-[slug].tsx");
    }

    #[test]
    fn load_generates_with_root_relative_imports() {
        let mut dev = entries();
        let id = dev.set_route("about", vec![island("x")], vec!["src/global.css".into()]);

        let code = dev.load(&id).unwrap();
        assert!(code.contains("import \"/src/global.css\";"));
        assert!(code.contains("import Island0 from \"/src/components/counter.tsx\";"));
        assert!(code.contains("document.getElementById(\"x\")"));
    }

    #[test]
    fn set_route_replaces_previous_record() {
        let mut dev = entries();
        dev.set_route("about", vec![island("a")], Vec::new());
        let id = dev.set_route("about", vec![island("b")], Vec::new());

        let code = dev.load(&id).unwrap();
        assert!(!code.contains("\"a\""));
        assert!(code.contains("\"b\""));
    }

    #[test]
    fn resolve_and_load_internal_ids() {
        let mut dev = entries();
        let id = dev.set_route("index", vec![island("x")], Vec::new());

        let internal = dev.resolve_id(&id).unwrap();
        assert!(internal.starts_with('\0'));
        assert!(dev.contains(&internal));
        assert_eq!(dev.load(&internal), dev.load(&id));
        assert_eq!(dev.resolve_id("/src/main.tsx"), None);
        assert_eq!(dev.load("/src/main.tsx"), None);
    }

    #[test]
    fn unknown_virtual_id_loads_empty_entry() {
        let code = entries().load("/$site/entry-gone.tsx").unwrap();
        assert!(code.contains("import { hydrate }"));
        assert!(!code.contains("hydrate(() =>"));
    }

    #[test]
    fn invalidate_page_file() {
        let tmp = project(&["index.tsx", "about.tsx"]);
        let routes = scan(tmp.path());
        let mut dev = entries();
        let about = dev.set_route("about", vec![island("x")], Vec::new());
        let index = dev.set_route("index", vec![island("y")], Vec::new());

        let inv = dev.invalidate(&routes, "src/pages/about.tsx");
        assert_eq!(inv.modules, [about.clone()]);
        assert!(inv.full_reload);
        assert!(!dev.contains(&about));
        assert!(dev.contains(&index));
    }

    #[test]
    fn invalidate_layout_affects_every_page_below() {
        let tmp = project(&["index.tsx", "blog/_layout.tsx", "blog/index.tsx", "blog/[slug].tsx"]);
        let routes = scan(tmp.path());
        let mut dev = entries();
        dev.set_route("index", Vec::new(), Vec::new());
        dev.set_route("blog", Vec::new(), Vec::new());
        dev.set_route("blog-[slug]", Vec::new(), Vec::new());

        let inv = dev.invalidate(&routes, "src/pages/blog/_layout.tsx");
        assert_eq!(
            inv.modules,
            ["/$site/entry-blog.tsx", "/$site/entry-blog-[slug].tsx"]
        );
        assert!(dev.contains("/$site/entry-index.tsx"));
    }

    #[test]
    fn unrelated_change_needs_no_reload() {
        let tmp = project(&["index.tsx"]);
        let routes = scan(tmp.path());
        let mut dev = entries();
        dev.set_route("index", Vec::new(), Vec::new());

        assert_eq!(dev.invalidate(&routes, "src/styles.css"), Invalidation::default());
    }

    #[test]
    fn affected_page_without_record_still_reloads() {
        let tmp = project(&["index.tsx"]);
        let routes = scan(tmp.path());
        let inv = entries().invalidate(&routes, "src/pages/index.tsx");
        assert!(inv.modules.is_empty());
        assert!(inv.full_reload);
    }
}
