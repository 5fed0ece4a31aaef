//! # Atoll
//!
//! A static-site build pipeline with a file-system router and islands
//! partial hydration. Pages are rendered once to static markup; only the
//! components marked for hydration ship code to the browser.
//!
//! # Architecture: Route Tree at the Center
//!
//! Everything hangs off one persisted route tree, built from a single snapshot
//! of the pages directory:
//!
//! ```text
//! 1. Routes     src/pages/  →  routes.json             (naming grammar → route tree)
//! 2. Generate   routes      →  templates/, entries      (render collaborator + islands)
//! 3. Bundle     entries     →  .vite/manifest.json      (external bundler)
//! 4. Manifest   routes +    →  manifest.json, static/   (per-template asset closures)
//!               bundles
//! ```
//!
//! The development server and the static build both read `routes.json`, so
//! they can never disagree about which file serves which URL.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`file_tree`] | Sorted snapshot of a directory, hidden entries skipped |
//! | [`naming`] | Classifies file and directory names into route constructs |
//! | [`routes`] | Builds, persists and walks the route tree |
//! | [`matcher`] | Resolves a URL against the route tree, including interception |
//! | [`island`] | Per-render registry of hydrated components |
//! | [`client_entry`] | Hydration bootstrap source for one page |
//! | [`chunks`] | Ordered asset closure over a bundler manifest |
//! | [`assets`] | Per-template css/js lists, link and script tags, `Link` headers |
//! | [`generate`] | Renders every page and writes templates and client entries |
//! | [`manifest`] | `manifest.json` and static asset collection |
//! | [`dev`] | In-memory client entries for a development server |
//! | [`project`] | On-disk layout of a project and generated file names |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`types`] | Types shared with the render collaborator and `pages.json` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Registry per Render
//!
//! The island registry is a value passed into each render, never process
//! state. Parallel page rendering gives every page its own registry, so
//! islands cannot leak from one page into another.
//!
//! ## Route Variants Are an Enum
//!
//! A route is either an internal node or a page leaf, serialized with an
//! explicit `kind` tag. Every consumer matches both variants exhaustively.
//!
//! ## Configuration Errors Are Fatal
//!
//! Two index pages for one path, two layouts reached through different groups,
//! a fallback written as a directory, a duplicate island id: each stops the
//! build with an error naming the offending path. Nothing is silently
//! overridden.

pub mod assets;
pub mod chunks;
pub mod client_entry;
pub mod config;
pub mod dev;
pub mod file_tree;
pub mod generate;
pub mod island;
pub mod manifest;
pub mod matcher;
pub mod naming;
pub mod output;
pub mod project;
pub mod routes;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
