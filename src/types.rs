//! Types shared between the orchestrator, its render collaborator and the
//! files it persists.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role of a module in a composed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Layout,
    Page,
}

/// One component module handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageModule {
    /// Project-relative source file.
    pub file: String,
    pub kind: ModuleKind,
}

impl PageModule {
    pub fn layout(file: &str) -> Self {
        Self {
            file: file.to_string(),
            kind: ModuleKind::Layout,
        }
    }

    pub fn page(file: &str) -> Self {
        Self {
            file: file.to_string(),
            kind: ModuleKind::Page,
        }
    }
}

/// Entry of `pages.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageIndexEntry {
    pub template: String,
    /// Project-relative client entry, absent for pages without islands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

/// `pages.json`: route pattern to its template and client entry.
pub type PageIndex = BTreeMap<String, PageIndexEntry>;
