//! Route tree construction, persistence and traversal.
//!
//! The builder turns one [`FileTreeDir`] snapshot of the pages directory into a
//! [`RouteNode`] tree. Every entry is classified by [`crate::naming`] and then
//! routed into one of a directory's namespaces:
//!
//! | Entry | Goes to |
//! |-------|---------|
//! | `_layout.tsx` | the directory's `layout` |
//! | `index.tsx` | the directory's `index` |
//! | `*404.tsx` | `fallback["404"]` |
//! | `@modal.tsx`, `@modal/` | `slots["@modal"]` |
//! | `(group)/` | flattened into the directory itself |
//! | anything else | `children`, as a [`LeafRoute`] (file) or [`RouteNode`] (dir) |
//!
//! ## Merging
//!
//! Two children with the same path are merged into one node: `about.tsx`
//! next to `about/`, or `about/` reached through two different groups. A leaf
//! joining a merge becomes a node whose index is the leaf's file. Merging
//! never overrides: two indexes, two layouts, or a repeated fallback or slot
//! key is an error.
//!
//! ## Interception
//!
//! A segment written as `(.)photo`, `(..)photo`, `(..)(..)photo` or
//! `(...)photo` is an intercepting route. It keeps its physical place in the
//! tree but records the logical base it is matched under, computed from the
//! ancestor path with groups and slots removed. Ordinary matching skips it;
//! see [`crate::matcher::match_intercepted`].
//!
//! ## Persistence
//!
//! `routes.json` holds the serialized root node. Routes carry an explicit
//! `kind` tag (`node` or `leaf`), so consumers never sniff for fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::RoutesConfig;
use crate::file_tree::{FileTree, FileTreeDir, FileTreeError, FileTreeFile, read_file_tree};
use crate::naming::{
    EntryName, InterceptLevel, RouteNameToken, RouteSegment, SLOT_MARKER,
    fallback_path, parse_route_name, pattern_path,
};
use crate::project::{ProjectLayout, template_name};

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("File tree error: {0}")]
    FileTree(#[from] FileTreeError),
    #[error("Ambiguous layout: {0} has more than one layout")]
    AmbiguousLayout(String),
    #[error("Duplicate index: {0} has more than one index page")]
    DuplicateIndex(String),
    #[error("Fallback must be a file, not a directory: {0}")]
    FallbackDirectory(String),
    #[error("Unresolved route path: {0}")]
    UnresolvedPath(String),
    #[error("Cannot merge {kind} routes at {path}")]
    MergeConflict { kind: MergeKind, path: String },
    #[error("Route tree root must have path '/', found '{0}'")]
    InvalidRoot(String),
}

/// What collided when two subtrees were merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    Index,
    Fallback,
    Slot,
    Param,
}

impl fmt::Display for MergeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MergeKind::Index => "index",
            MergeKind::Fallback => "fallback",
            MergeKind::Slot => "slot",
            MergeKind::Param => "parameter",
        })
    }
}

/// A route in the tree: an internal node or a page leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Route {
    Node(RouteNode),
    Leaf(LeafRoute),
}

/// Internal route: a directory-backed path segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteNode {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fallback: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slots: BTreeMap<String, RouteNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intercept: Option<Intercept>,
    /// Suffix of an escaped name, `docs(a)` → `a`. Not part of the URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disambiguator: Option<String>,
    /// Template name, filled in when the persisted manifest is built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default)]
    pub children: Vec<Route>,
}

/// Page route backed by a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafRoute {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intercept: Option<Intercept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disambiguator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// Where an intercepting route is logically mounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intercept {
    pub level: InterceptLevel,
    /// Absolute logical path the route is nested under, e.g. `/feed`.
    pub base: String,
}

impl Intercept {
    /// Base for `level` given the logical path segments of the enclosing
    /// directory (`["/feed", "/:id"]`).
    pub fn new(level: InterceptLevel, segments: &[String]) -> Self {
        let keep = match level.levels_up() {
            Some(n) => segments.len().saturating_sub(n),
            None => 0,
        };
        let base = if keep == 0 {
            "/".to_string()
        } else {
            segments[..keep].concat()
        };
        Self { level, base }
    }
}

impl Route {
    pub fn path(&self) -> &str {
        match self {
            Route::Node(node) => &node.path,
            Route::Leaf(leaf) => &leaf.path,
        }
    }

    pub fn param(&self) -> Option<&str> {
        match self {
            Route::Node(node) => node.param.as_deref(),
            Route::Leaf(leaf) => leaf.param.as_deref(),
        }
    }

    pub fn intercept(&self) -> Option<&Intercept> {
        match self {
            Route::Node(node) => node.intercept.as_ref(),
            Route::Leaf(leaf) => leaf.intercept.as_ref(),
        }
    }

    pub fn is_intercepting(&self) -> bool {
        self.intercept().is_some()
    }

    pub fn disambiguator(&self) -> Option<&str> {
        match self {
            Route::Node(node) => node.disambiguator.as_deref(),
            Route::Leaf(leaf) => leaf.disambiguator.as_deref(),
        }
    }

    /// Path with any intercept prefix and escape suffix,
    /// `/photo` → `/(.)photo`.
    pub fn pattern_path(&self) -> String {
        match self {
            Route::Node(node) => node.pattern_path(),
            Route::Leaf(leaf) => leaf.pattern_path(),
        }
    }

    pub fn template(&self) -> Option<&str> {
        match self {
            Route::Node(node) => node.template.as_deref(),
            Route::Leaf(leaf) => leaf.template.as_deref(),
        }
    }

    fn into_node(self) -> RouteNode {
        match self {
            Route::Node(node) => node,
            Route::Leaf(leaf) => RouteNode {
                path: leaf.path,
                param: leaf.param,
                index: Some(leaf.file),
                intercept: leaf.intercept,
                disambiguator: leaf.disambiguator,
                template: leaf.template,
                ..RouteNode::default()
            },
        }
    }
}

impl LeafRoute {
    pub fn pattern_path(&self) -> String {
        pattern_path(
            &self.path,
            self.intercept.as_ref().map(|i| i.level),
            self.disambiguator.as_deref(),
        )
    }
}

impl RouteNode {
    /// Path with any intercept prefix and escape suffix,
    /// `/photo` → `/(.)photo`.
    pub fn pattern_path(&self) -> String {
        pattern_path(
            &self.path,
            self.intercept.as_ref().map(|i| i.level),
            self.disambiguator.as_deref(),
        )
    }

    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn root() -> Self {
        Self::new("/")
    }
}

// =============================================================================
// Building
// =============================================================================

/// Walk the project's pages directory and build its route tree.
pub fn scan_routes(
    project: &ProjectLayout,
    config: &RoutesConfig,
) -> Result<RouteNode, RouteError> {
    let tree = read_file_tree(&project.pages_dir(), project.root())?;
    let routes = build_routes(&tree, config)?;
    info!(
        pages = routes.pages().len(),
        dir = %tree.src,
        "built route tree"
    );
    Ok(routes)
}

/// Build a route tree from a snapshot of the pages directory.
pub fn build_routes(dir: &FileTreeDir, config: &RoutesConfig) -> Result<RouteNode, RouteError> {
    build_node(dir, RouteNode::root(), &[], config)
}

/// Everything one directory contributes to its node.
#[derive(Default)]
struct Contents {
    layout: Option<String>,
    index: Option<String>,
    fallback: BTreeMap<String, String>,
    slots: BTreeMap<String, RouteNode>,
    children: Vec<Route>,
}

impl Contents {
    /// Flatten a group's contents into its parent.
    fn absorb(&mut self, group: Contents, group_src: &str) -> Result<(), RouteError> {
        merge_layout(&mut self.layout, group.layout, group_src)?;
        merge_index(&mut self.index, group.index, group_src)?;
        merge_fallbacks(&mut self.fallback, group.fallback, group_src)?;
        merge_slots(&mut self.slots, group.slots, group_src)?;
        for child in group.children {
            push_child(&mut self.children, child)?;
        }
        Ok(())
    }
}

fn build_node(
    dir: &FileTreeDir,
    node: RouteNode,
    segments: &[String],
    config: &RoutesConfig,
) -> Result<RouteNode, RouteError> {
    let contents = collect_dir(dir, segments, config)?;
    Ok(RouteNode {
        layout: contents.layout,
        index: contents.index,
        fallback: contents.fallback,
        slots: contents.slots,
        children: contents.children,
        ..node
    })
}

fn collect_dir(
    dir: &FileTreeDir,
    segments: &[String],
    config: &RoutesConfig,
) -> Result<Contents, RouteError> {
    let mut contents = Contents::default();
    for entry in &dir.children {
        match entry {
            FileTree::File(file) => collect_file(&mut contents, file, &dir.src, segments, config)?,
            FileTree::Dir(sub) => collect_subdir(&mut contents, sub, segments, config)?,
        }
    }
    Ok(contents)
}

fn collect_file(
    contents: &mut Contents,
    file: &FileTreeFile,
    dir_src: &str,
    segments: &[String],
    config: &RoutesConfig,
) -> Result<(), RouteError> {
    if !config.is_routable(&file.name) {
        debug!(file = %file.src, "skipping non-route file");
        return Ok(());
    }

    let token = parse_route_name(&EntryName::file(&file.name, &config.index))
        .ok_or_else(|| RouteError::UnresolvedPath(file.src.clone()))?;
    let path = token.segment_path();
    let param = token.param_name().map(str::to_string);

    match token {
        RouteNameToken::Layout => {
            merge_layout(&mut contents.layout, Some(file.src.clone()), dir_src)?;
        }
        RouteNameToken::Index => {
            if contents.index.is_some() {
                return Err(RouteError::DuplicateIndex(dir_src.to_string()));
            }
            contents.index = Some(file.src.clone());
        }
        RouteNameToken::Fallback { name } => {
            let single = BTreeMap::from([(name, file.src.clone())]);
            merge_fallbacks(&mut contents.fallback, single, dir_src)?;
        }
        RouteNameToken::Slot { name } => {
            let node = RouteNode {
                index: Some(file.src.clone()),
                ..RouteNode::new(slot_path(&name))
            };
            insert_slot(&mut contents.slots, node)?;
        }
        RouteNameToken::Segment {
            intercept,
            disambiguator,
            ..
        } => {
            let path = path.ok_or_else(|| RouteError::UnresolvedPath(file.src.clone()))?;
            let leaf = LeafRoute {
                path,
                param,
                file: file.src.clone(),
                intercept: intercept.map(|level| Intercept::new(level, segments)),
                disambiguator,
                template: None,
            };
            push_child(&mut contents.children, Route::Leaf(leaf))?;
        }
        RouteNameToken::Group { .. } => {
            return Err(RouteError::UnresolvedPath(file.src.clone()));
        }
    }
    Ok(())
}

fn collect_subdir(
    contents: &mut Contents,
    dir: &FileTreeDir,
    segments: &[String],
    config: &RoutesConfig,
) -> Result<(), RouteError> {
    let token = parse_route_name(&EntryName::dir(&dir.name))
        .ok_or_else(|| RouteError::UnresolvedPath(dir.src.clone()))?;

    match &token {
        RouteNameToken::Group { .. } => {
            let group = collect_dir(dir, segments, config)?;
            contents.absorb(group, &dir.src)?;
        }
        RouteNameToken::Slot { name } => {
            let node = build_node(dir, RouteNode::new(slot_path(name)), segments, config)?;
            insert_slot(&mut contents.slots, node)?;
        }
        RouteNameToken::Fallback { .. } => {
            return Err(RouteError::FallbackDirectory(dir.src.clone()));
        }
        RouteNameToken::Segment {
            intercept,
            disambiguator,
            ..
        } => {
            let path = token
                .segment_path()
                .ok_or_else(|| RouteError::UnresolvedPath(dir.src.clone()))?;
            let mut nested = segments.to_vec();
            nested.push(path.clone());
            let node = RouteNode {
                param: token.param_name().map(str::to_string),
                intercept: intercept.map(|level| Intercept::new(level, segments)),
                disambiguator: disambiguator.clone(),
                ..RouteNode::new(path)
            };
            let node = build_node(dir, node, &nested, config)?;
            push_child(&mut contents.children, Route::Node(node))?;
        }
        RouteNameToken::Layout | RouteNameToken::Index => {
            return Err(RouteError::UnresolvedPath(dir.src.clone()));
        }
    }
    Ok(())
}

fn slot_path(name: &str) -> String {
    format!("/{SLOT_MARKER}{name}")
}

fn merge_layout(
    target: &mut Option<String>,
    layout: Option<String>,
    src: &str,
) -> Result<(), RouteError> {
    match (target.as_ref(), layout) {
        (Some(_), Some(_)) => Err(RouteError::AmbiguousLayout(src.to_string())),
        (None, Some(layout)) => {
            *target = Some(layout);
            Ok(())
        }
        (_, None) => Ok(()),
    }
}

fn merge_index(target: &mut Option<String>, index: Option<String>, path: &str) -> Result<(), RouteError> {
    match (target.as_ref(), index) {
        (Some(_), Some(_)) => Err(RouteError::MergeConflict {
            kind: MergeKind::Index,
            path: path.to_string(),
        }),
        (None, Some(index)) => {
            *target = Some(index);
            Ok(())
        }
        (_, None) => Ok(()),
    }
}

fn merge_fallbacks(
    target: &mut BTreeMap<String, String>,
    fallbacks: BTreeMap<String, String>,
    path: &str,
) -> Result<(), RouteError> {
    for (name, file) in fallbacks {
        if target.contains_key(&name) {
            return Err(RouteError::MergeConflict {
                kind: MergeKind::Fallback,
                path: format!("{path}/*{name}"),
            });
        }
        target.insert(name, file);
    }
    Ok(())
}

fn merge_slots(
    target: &mut BTreeMap<String, RouteNode>,
    slots: BTreeMap<String, RouteNode>,
    path: &str,
) -> Result<(), RouteError> {
    for (key, slot) in slots {
        if target.contains_key(&key) {
            return Err(RouteError::MergeConflict {
                kind: MergeKind::Slot,
                path: format!("{path}/{key}"),
            });
        }
        target.insert(key, slot);
    }
    Ok(())
}

/// Add a slot declared in the directory being built. A slot file and a slot
/// directory of the same name combine into one node.
fn insert_slot(slots: &mut BTreeMap<String, RouteNode>, node: RouteNode) -> Result<(), RouteError> {
    let key = node.path.trim_start_matches('/').to_string();
    let merged = match slots.remove(&key) {
        Some(existing) => merge_nodes(existing, node)?,
        None => node,
    };
    slots.insert(key, merged);
    Ok(())
}

fn merge_nodes(mut left: RouteNode, right: RouteNode) -> Result<RouteNode, RouteError> {
    let path = left.path.clone();
    merge_layout(&mut left.layout, right.layout, &path)?;
    merge_index(&mut left.index, right.index, &path)?;
    merge_fallbacks(&mut left.fallback, right.fallback, &path)?;
    merge_slots(&mut left.slots, right.slots, &path)?;
    for child in right.children {
        push_child(&mut left.children, child)?;
    }
    Ok(left)
}

/// Append `route` to `children`, merging it into a sibling with the same
/// path, interception and escape suffix.
fn push_child(children: &mut Vec<Route>, route: Route) -> Result<(), RouteError> {
    check_param_siblings(children, &route)?;

    let existing = children.iter().position(|c| {
        c.path() == route.path()
            && c.intercept() == route.intercept()
            && c.disambiguator() == route.disambiguator()
    });
    match existing {
        Some(pos) => {
            let sibling = children.remove(pos);
            let merged = merge_nodes(sibling.into_node(), route.into_node())?;
            children.insert(pos, Route::Node(merged));
        }
        None => children.push(route),
    }
    Ok(())
}

/// Two parameters of the same kind under one parent would compete for the
/// same URL segments.
fn check_param_siblings(children: &[Route], route: &Route) -> Result<(), RouteError> {
    if route.is_intercepting() {
        return Ok(());
    }
    let RouteSegment::Param { name, kind } = RouteSegment::parse(route.path()) else {
        return Ok(());
    };
    let clash = children.iter().filter(|c| !c.is_intercepting()).any(|c| {
        matches!(
            RouteSegment::parse(c.path()),
            RouteSegment::Param { name: other, kind: other_kind }
                if other_kind == kind && other != name
        )
    });
    if clash {
        return Err(RouteError::MergeConflict {
            kind: MergeKind::Param,
            path: route.path().to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Persistence
// =============================================================================

pub fn to_json(routes: &RouteNode) -> Result<String, RouteError> {
    Ok(serde_json::to_string_pretty(routes)?)
}

pub fn from_json(json: &str) -> Result<RouteNode, RouteError> {
    let routes: RouteNode = serde_json::from_str(json)?;
    if routes.path != "/" {
        return Err(RouteError::InvalidRoot(routes.path));
    }
    Ok(routes)
}

pub fn save_routes(path: &Path, routes: &RouteNode) -> Result<(), RouteError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_json(routes)?)?;
    Ok(())
}

pub fn load_routes(path: &Path) -> Result<RouteNode, RouteError> {
    from_json(&fs::read_to_string(path)?)
}

// =============================================================================
// Traversal
// =============================================================================

/// One renderable page and the internal nodes above it.
#[derive(Debug, Clone)]
pub struct PageRef<'a> {
    /// Internal nodes from the root down to the page's parent. For an index
    /// page this excludes the node that owns the index; for a fallback it
    /// includes the node that declares it.
    pub ancestors: Vec<&'a RouteNode>,
    pub kind: PageKind<'a>,
}

#[derive(Debug, Clone, Copy)]
pub enum PageKind<'a> {
    Index(&'a RouteNode),
    Leaf(&'a LeafRoute),
    Fallback {
        node: &'a RouteNode,
        name: &'a str,
        file: &'a str,
    },
}

impl<'a> PageRef<'a> {
    /// The page component's file.
    pub fn file(&self) -> &'a str {
        match self.kind {
            PageKind::Index(node) => node.index.as_deref().unwrap_or_default(),
            PageKind::Leaf(leaf) => leaf.file.as_str(),
            PageKind::Fallback { file, .. } => file,
        }
    }

    /// Layout files wrapping the page, outermost first.
    pub fn layouts(&self) -> Vec<&'a str> {
        let mut layouts: Vec<&str> = self
            .ancestors
            .iter()
            .filter_map(|n| n.layout.as_deref())
            .collect();
        if let PageKind::Index(node) = self.kind
            && let Some(layout) = &node.layout
        {
            layouts.push(layout);
        }
        layouts
    }

    /// Path of the page's own route within its parent.
    fn own_path(&self) -> String {
        match self.kind {
            PageKind::Index(node) => node.pattern_path(),
            PageKind::Leaf(leaf) => leaf.pattern_path(),
            PageKind::Fallback { name, .. } => fallback_path(name),
        }
    }

    fn chain(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.ancestors.iter().map(|n| n.pattern_path()).collect();
        paths.push(self.own_path());
        paths
    }

    pub fn template_name(&self) -> String {
        let chain = self.chain();
        template_name(chain.iter().map(String::as_str))
    }

    /// Full route pattern, e.g. `/blog/:slug` or `/` for the root index.
    pub fn route_path(&self) -> String {
        let joined: String = self
            .chain()
            .iter()
            .filter(|p| *p != "/")
            .map(String::as_str)
            .collect();
        if joined.is_empty() {
            "/".to_string()
        } else {
            joined
        }
    }

    pub fn is_intercepting(&self) -> bool {
        match self.kind {
            PageKind::Index(node) => node.intercept.is_some(),
            PageKind::Leaf(leaf) => leaf.intercept.is_some(),
            PageKind::Fallback { .. } => false,
        }
    }
}

impl RouteNode {
    /// Every renderable page, depth-first.
    pub fn pages(&self) -> Vec<PageRef<'_>> {
        let mut pages = Vec::new();
        let mut chain = Vec::new();
        collect_pages(self, &mut chain, &mut pages);
        pages
    }

    /// Pages for which `predicate` holds, depth-first.
    pub fn find_pages<F>(&self, predicate: F) -> Vec<PageRef<'_>>
    where
        F: Fn(&PageRef<'_>) -> bool,
    {
        self.pages().into_iter().filter(|p| predicate(p)).collect()
    }

    /// Record the template name of every index and leaf route.
    pub fn annotate_templates(&mut self) {
        let mut chain = Vec::new();
        annotate(self, &mut chain);
    }
}

fn collect_pages<'a>(
    node: &'a RouteNode,
    chain: &mut Vec<&'a RouteNode>,
    pages: &mut Vec<PageRef<'a>>,
) {
    if node.index.is_some() {
        pages.push(PageRef {
            ancestors: chain.clone(),
            kind: PageKind::Index(node),
        });
    }

    chain.push(node);
    for (name, file) in &node.fallback {
        pages.push(PageRef {
            ancestors: chain.clone(),
            kind: PageKind::Fallback { node, name, file },
        });
    }
    for slot in node.slots.values() {
        collect_pages(slot, chain, pages);
    }
    for child in &node.children {
        match child {
            Route::Node(child) => collect_pages(child, chain, pages),
            Route::Leaf(leaf) => pages.push(PageRef {
                ancestors: chain.clone(),
                kind: PageKind::Leaf(leaf),
            }),
        }
    }
    chain.pop();
}

fn annotate(node: &mut RouteNode, chain: &mut Vec<String>) {
    chain.push(node.pattern_path());
    node.template = node
        .index
        .as_ref()
        .map(|_| template_name(chain.iter().map(String::as_str)));

    for slot in node.slots.values_mut() {
        annotate(slot, chain);
    }
    for child in &mut node.children {
        match child {
            Route::Node(child) => annotate(child, chain),
            Route::Leaf(leaf) => {
                chain.push(leaf.pattern_path());
                leaf.template = Some(template_name(chain.iter().map(String::as_str)));
                chain.pop();
            }
        }
    }
    chain.pop();
}
