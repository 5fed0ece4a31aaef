//! Per-render-pass registry of components marked for client hydration.
//!
//! A render pass owns one [`IslandRegistry`]. The renderer registers each
//! island it emits, either directly with [`IslandRegistry::register`] or from
//! a hydration marker plus the rendering module's imports with
//! [`IslandRegistry::register_marker`]. After the pass, the orchestrator
//! drains the registry and hands the entries to
//! [`crate::client_entry::generate_client_entry`].
//!
//! ## Island Ids
//!
//! The id is the DOM id of the island's mount point. Without an explicit id it
//! is derived from the component's file, its display name and the marker's
//! source offset:
//!
//! ```text
//! island- + sha256("src/components/counter.tsx:Counter:42")[..8]
//! ```
//!
//! so ids are stable across builds of the same source and differ between two
//! uses of one component on a page. Ids must be unique within a pass.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IslandError {
    #[error("Duplicate island id '{id}': used by {first} and {second}")]
    DuplicateId {
        id: String,
        first: String,
        second: String,
    },
    #[error("Cannot resolve an import for component '{component}' in {file}")]
    UnresolvedComponent { component: String, file: String },
    #[error("Empty island id for component '{component}'")]
    EmptyId { component: String },
}

/// What the renderer knows about an island's component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IslandMeta {
    /// Display name as written at the use site (`Counter`, `ui.Counter`).
    pub component: String,
    /// Project-relative module that exports the component.
    pub file: String,
    /// `default` or the named export.
    pub export_name: String,
}

/// One registered island.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IslandEntry {
    pub id: String,
    pub component: String,
    pub file: String,
    pub export_name: String,
}

impl IslandEntry {
    pub fn is_default_export(&self) -> bool {
        self.export_name == "default"
    }

    /// Name shown in build reports: the export name, or the component's
    /// display name for default exports.
    pub fn display_name(&self) -> &str {
        if self.is_default_export() {
            &self.component
        } else {
            &self.export_name
        }
    }
}

/// Derived island id: `island-` plus 8 hex digits.
pub fn island_id(file: &str, component: &str, offset: usize) -> String {
    let digest = Sha256::digest(format!("{file}:{component}:{offset}").as_bytes());
    let hex = format!("{:x}", digest);
    format!("island-{}", &hex[..8])
}

/// Islands registered during one render pass, in registration order.
#[derive(Debug, Default)]
pub struct IslandRegistry {
    entries: Vec<IslandEntry>,
    ids: HashMap<String, usize>,
}

impl IslandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything from the previous pass.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.ids.clear();
    }

    /// Register an island. `id` overrides the derived id.
    pub fn register(
        &mut self,
        meta: IslandMeta,
        id: Option<&str>,
        offset: usize,
    ) -> Result<&IslandEntry, IslandError> {
        let id = match id {
            Some(id) if id.trim().is_empty() => {
                return Err(IslandError::EmptyId {
                    component: meta.component,
                });
            }
            Some(id) => id.to_string(),
            None => island_id(&meta.file, &meta.component, offset),
        };

        if let Some(&existing) = self.ids.get(&id) {
            let first = &self.entries[existing];
            return Err(IslandError::DuplicateId {
                id,
                first: format!("{} ({})", first.component, first.file),
                second: format!("{} ({})", meta.component, meta.file),
            });
        }

        self.ids.insert(id.clone(), self.entries.len());
        self.entries.push(IslandEntry {
            id,
            component: meta.component,
            file: meta.file,
            export_name: meta.export_name,
        });
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Register the island a hydration marker stands for.
    ///
    /// Returns `Ok(None)` for markers on DOM-like elements (`<div client:load>`),
    /// which are not islands.
    pub fn register_marker(
        &mut self,
        marker: &HydrationMarker,
        imports: &ImportTable,
    ) -> Result<Option<&IslandEntry>, IslandError> {
        if marker.component.is_dom_like() {
            return Ok(None);
        }
        let binding =
            imports
                .resolve(&marker.component)
                .ok_or_else(|| IslandError::UnresolvedComponent {
                    component: marker.component.to_string(),
                    file: imports.importer().to_string(),
                })?;
        let meta = IslandMeta {
            component: marker.component.to_string(),
            file: binding.file,
            export_name: binding.export_name,
        };
        self.register(meta, marker.id.as_deref(), marker.offset)
            .map(Some)
    }

    pub fn entries(&self) -> &[IslandEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take every entry, leaving the registry empty.
    pub fn drain(&mut self) -> Vec<IslandEntry> {
        self.ids.clear();
        std::mem::take(&mut self.entries)
    }
}

// =============================================================================
// Hydration markers
// =============================================================================

/// Element name as written in markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentName {
    /// `Counter`
    Ident(String),
    /// `ui.widgets.Counter`
    Member(Vec<String>),
    /// `svg:path`
    Namespaced { namespace: String, name: String },
}

impl ComponentName {
    pub fn parse(name: &str) -> Self {
        if let Some((namespace, name)) = name.split_once(':') {
            return ComponentName::Namespaced {
                namespace: namespace.to_string(),
                name: name.to_string(),
            };
        }
        if name.contains('.') {
            return ComponentName::Member(name.split('.').map(str::to_string).collect());
        }
        ComponentName::Ident(name.to_string())
    }

    /// Plain lowercase identifiers name DOM elements, not components.
    pub fn is_dom_like(&self) -> bool {
        matches!(self, ComponentName::Ident(name) if name.starts_with(|c: char| c.is_ascii_lowercase()))
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentName::Ident(name) => f.write_str(name),
            ComponentName::Member(parts) => f.write_str(&parts.join(".")),
            ComponentName::Namespaced { namespace, name } => write!(f, "{namespace}:{name}"),
        }
    }
}

/// A `client:` directive found while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrationMarker {
    pub component: ComponentName,
    /// Value of `client:id`, if given.
    pub id: Option<String>,
    /// Byte offset of the element in its source module.
    pub offset: usize,
}

/// Where an imported local name comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    pub file: String,
    pub export_name: String,
}

/// Imports of one module, keyed by local name.
///
/// Relative specifiers are normalized against the importing module with
/// [`normalize_import_path`] as they are added.
#[derive(Debug, Clone)]
pub struct ImportTable {
    importer: String,
    default_extension: String,
    named: BTreeMap<String, ImportBinding>,
    namespaces: BTreeMap<String, String>,
}

impl ImportTable {
    pub fn new(importer: &str) -> Self {
        Self::with_extension(importer, "tsx")
    }

    pub fn with_extension(importer: &str, default_extension: &str) -> Self {
        Self {
            importer: importer.to_string(),
            default_extension: default_extension.to_string(),
            named: BTreeMap::new(),
            namespaces: BTreeMap::new(),
        }
    }

    pub fn importer(&self) -> &str {
        &self.importer
    }

    /// `import { export_name as local } from "specifier"`
    pub fn import_named(&mut self, local: &str, specifier: &str, export_name: &str) -> &mut Self {
        let file = self.normalize(specifier);
        self.named.insert(
            local.to_string(),
            ImportBinding {
                file,
                export_name: export_name.to_string(),
            },
        );
        self
    }

    /// `import local from "specifier"`
    pub fn import_default(&mut self, local: &str, specifier: &str) -> &mut Self {
        self.import_named(local, specifier, "default")
    }

    /// `import * as local from "specifier"`
    pub fn import_namespace(&mut self, local: &str, specifier: &str) -> &mut Self {
        let file = self.normalize(specifier);
        self.namespaces.insert(local.to_string(), file);
        self
    }

    /// Resolve an element name to the module and export it refers to.
    pub fn resolve(&self, name: &ComponentName) -> Option<ImportBinding> {
        match name {
            ComponentName::Ident(local) => self.named.get(local).cloned(),
            ComponentName::Member(parts) => {
                let (export_name, object) = parts.split_last()?;
                let file = self.namespaces.get(&object.join("."))?;
                Some(ImportBinding {
                    file: file.clone(),
                    export_name: export_name.clone(),
                })
            }
            ComponentName::Namespaced { .. } => None,
        }
    }

    fn normalize(&self, specifier: &str) -> String {
        normalize_import_path(specifier, &self.importer, &self.default_extension)
    }
}

/// Normalize an import specifier to a project path under `src/`.
///
/// Bare specifiers (`solid-js`) are returned unchanged, as are relative ones
/// that resolve outside the importer's `src` directory. Paths without a
/// script extension get `default_extension` appended.
///
/// ```
/// # use atoll::island::normalize_import_path;
/// assert_eq!(
///     normalize_import_path("../components/counter", "src/pages/index.tsx", "tsx"),
///     "src/components/counter.tsx"
/// );
/// ```
pub fn normalize_import_path(specifier: &str, importer: &str, default_extension: &str) -> String {
    if !specifier.starts_with('.') {
        return specifier.to_string();
    }

    let importer = importer.split('?').next().unwrap_or(importer);
    let mut dir: Vec<&str> = importer.split('/').filter(|s| !s.is_empty()).collect();
    dir.pop();

    let Some(src_index) = dir.iter().rposition(|s| *s == "src") else {
        return specifier.to_string();
    };

    let mut resolved = dir.clone();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                resolved.pop();
            }
            part => resolved.push(part),
        }
    }

    if resolved.len() <= src_index + 1 || resolved[..=src_index] != dir[..=src_index] {
        return specifier.to_string();
    }

    let normalized = format!("src/{}", resolved[src_index + 1..].join("/"));
    if has_script_extension(&normalized) {
        normalized
    } else {
        format!("{normalized}.{default_extension}")
    }
}

/// `.js`, `.ts`, `.jsx`, `.tsx`, optionally with an `m` or `c` prefix.
fn has_script_extension(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    let Some((_, ext)) = file.rsplit_once('.') else {
        return false;
    };
    let ext = ext.strip_prefix(['m', 'c']).unwrap_or(ext);
    let ext = ext.strip_suffix('x').unwrap_or(ext);
    ext == "js" || ext == "ts"
}
