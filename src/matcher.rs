//! URL matching against a route tree.
//!
//! Matching walks the tree one URL segment at a time, never backtracking. At
//! each node the candidates are tried in a fixed order:
//!
//! 1. a literal child whose path equals the segment (first in tree order);
//! 2. a required or optional parameter child, which binds the segment;
//! 3. a catch-all child, which binds every remaining segment.
//!
//! Intercepting children never take part in ordinary matching, and slots are
//! not URL-addressable. A leaf ends the walk: if segments remain after a leaf,
//! the URL does not match. When the segments run out at a node without an
//! index, an optional or catch-all child may still match with an empty
//! binding.
//!
//! On a miss, [`RouteMatch::fallback`] names the closest fallback page,
//! searching outward from the deepest node reached. A node declaring several
//! fallbacks offers the one whose name sorts first (`*404` before `*missing`);
//! routes.json keeps fallbacks as a sorted map, so declaration order is not
//! recorded.

use std::collections::BTreeMap;
use std::fmt;

use crate::naming::{ParamKind, RouteSegment, fallback_path};
use crate::project::template_name;
use crate::routes::{LeafRoute, Route, RouteNode};

/// Value bound to a parameter segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Segment(String),
    Rest(Vec<String>),
    /// An optional parameter that matched zero segments.
    Missing,
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Segment(value) => f.write_str(value),
            ParamValue::Rest(values) => f.write_str(&values.join("/")),
            ParamValue::Missing => Ok(()),
        }
    }
}

pub type Params = BTreeMap<String, ParamValue>;

#[derive(Debug, Clone, Copy)]
pub enum MatchedRoute<'a> {
    Node(&'a RouteNode),
    Leaf(&'a LeafRoute),
}

impl<'a> MatchedRoute<'a> {
    pub fn path(&self) -> &'a str {
        match self {
            MatchedRoute::Node(node) => &node.path,
            MatchedRoute::Leaf(leaf) => &leaf.path,
        }
    }

    pub fn pattern_path(&self) -> String {
        match self {
            MatchedRoute::Node(node) => node.pattern_path(),
            MatchedRoute::Leaf(leaf) => leaf.pattern_path(),
        }
    }
}

/// Fallback page chosen for a URL that matched nothing.
#[derive(Debug, Clone)]
pub struct FallbackMatch<'a> {
    /// Nodes from the root down to and including the declaring node.
    pub ancestors: Vec<&'a RouteNode>,
    pub name: &'a str,
    pub file: &'a str,
}

#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    /// Internal nodes traversed above the matched route.
    pub ancestors: Vec<&'a RouteNode>,
    pub route: Option<MatchedRoute<'a>>,
    pub params: Params,
    pub fallback: Option<FallbackMatch<'a>>,
}

impl<'a> RouteMatch<'a> {
    pub fn is_match(&self) -> bool {
        self.route.is_some()
    }

    /// Template of the matched route, or of the fallback on a miss.
    pub fn template_name(&self) -> Option<String> {
        let (ancestors, own) = match (&self.route, &self.fallback) {
            (Some(route), _) => (&self.ancestors, route.pattern_path()),
            (None, Some(fallback)) => (&fallback.ancestors, fallback_path(fallback.name)),
            (None, None) => return None,
        };
        let mut paths: Vec<String> = ancestors.iter().map(|n| n.pattern_path()).collect();
        paths.push(own);
        Some(template_name(paths.iter().map(String::as_str)))
    }

    /// Layout files wrapping the matched page, outermost first.
    pub fn layouts(&self) -> Vec<&'a str> {
        let chain = match (&self.route, &self.fallback) {
            (Some(_), _) => &self.ancestors,
            (None, Some(fallback)) => &fallback.ancestors,
            (None, None) => return Vec::new(),
        };
        let mut layouts: Vec<&str> = chain.iter().filter_map(|n| n.layout.as_deref()).collect();
        if let Some(MatchedRoute::Node(node)) = self.route
            && let Some(layout) = &node.layout
        {
            layouts.push(layout);
        }
        layouts
    }

    /// File of the page to render, if the match resolves to one.
    pub fn page_file(&self) -> Option<&'a str> {
        match self.route {
            Some(MatchedRoute::Node(node)) => node.index.as_deref(),
            Some(MatchedRoute::Leaf(leaf)) => Some(leaf.file.as_str()),
            None => self.fallback.as_ref().map(|f| f.file),
        }
    }
}

/// Split a URL path into its non-empty segments, ignoring any query string
/// or fragment.
pub fn split_path(url: &str) -> Vec<&str> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].split('/').filter(|s| !s.is_empty()).collect()
}

/// Match `url` against the route tree.
pub fn match_route<'a>(tree: &'a RouteNode, url: &str) -> RouteMatch<'a> {
    let segments = split_path(url);
    descend(tree, &segments, Vec::new(), Params::new())
}

/// Match `to` against the intercepting routes reachable from the route that
/// `from` resolves to.
///
/// Candidates are the intercepting children of the matched node (or of a
/// matched leaf's parent), including those declared inside its slots. A
/// candidate matches when the leading segments of `to` match its base, with
/// parameters in the base bound as in ordinary matching, and the rest of `to`
/// matches the candidate's own subtree.
pub fn match_intercepted<'a>(tree: &'a RouteNode, from: &str, to: &str) -> Option<RouteMatch<'a>> {
    let origin = match_route(tree, from);
    let (container, mut ancestors) = match origin.route? {
        MatchedRoute::Node(node) => (node, origin.ancestors),
        MatchedRoute::Leaf(_) => {
            let mut ancestors = origin.ancestors;
            let parent = ancestors.pop()?;
            (parent, ancestors)
        }
    };
    ancestors.push(container);

    let target = split_path(to);
    let scopes = std::iter::once(container).chain(container.slots.values());
    for scope in scopes {
        let mut chain = ancestors.clone();
        if !std::ptr::eq(scope, container) {
            chain.push(scope);
        }
        for child in scope.children.iter() {
            let Some(intercept) = child.intercept() else {
                continue;
            };
            let mut params = Params::new();
            let Some(rest) = strip_base(&intercept.base, &target, &mut params) else {
                continue;
            };
            if let Some(found) = enter(child, rest, chain.clone(), params)
                && found.is_match()
            {
                return Some(found);
            }
        }
    }
    None
}

/// Match the leading segments of `segments` against an intercept base such
/// as `/feed/:id`, binding its parameters, and return what is left for the
/// intercepting route. Optional and catch-all segments only take segments
/// the rest of the base and the route itself do not need.
fn strip_base<'s, 'u>(base: &str, segments: &'s [&'u str], params: &mut Params) -> Option<&'s [&'u str]> {
    let pattern: Vec<RouteSegment> = split_path(base).into_iter().map(RouteSegment::parse).collect();
    let mut rest = segments;

    for (i, part) in pattern.iter().enumerate() {
        let needed = 1 + pattern[i + 1..].iter().filter(|p| !can_be_empty(p)).count();
        match *part {
            RouteSegment::Literal(name) => {
                let (first, tail) = rest.split_first()?;
                if *first != name {
                    return None;
                }
                rest = tail;
            }
            RouteSegment::Param { name, kind: ParamKind::Required } => {
                let (first, tail) = rest.split_first()?;
                params.insert(name.to_string(), ParamValue::Segment(first.to_string()));
                rest = tail;
            }
            RouteSegment::Param { name, kind: ParamKind::Optional } => {
                if rest.len() > needed {
                    params.insert(name.to_string(), ParamValue::Segment(rest[0].to_string()));
                    rest = &rest[1..];
                } else {
                    params.insert(name.to_string(), ParamValue::Missing);
                }
            }
            RouteSegment::Param { name, kind: ParamKind::CatchAll } => {
                let take = rest.len().checked_sub(needed)?;
                let values = rest[..take].iter().map(|s| s.to_string()).collect();
                params.insert(name.to_string(), ParamValue::Rest(values));
                rest = &rest[take..];
            }
            RouteSegment::Root | RouteSegment::Slot(_) | RouteSegment::Fallback(_) => return None,
        }
    }
    Some(rest)
}

fn can_be_empty(segment: &RouteSegment) -> bool {
    matches!(
        segment,
        RouteSegment::Param {
            kind: ParamKind::Optional | ParamKind::CatchAll,
            ..
        }
    )
}

fn descend<'a>(
    start: &'a RouteNode,
    segments: &[&str],
    mut ancestors: Vec<&'a RouteNode>,
    mut params: Params,
) -> RouteMatch<'a> {
    let mut node = start;
    let mut rest = segments;

    loop {
        let Some((segment, _)) = rest.split_first() else {
            if node.index.is_none()
                && let Some(child) = empty_match_child(node)
            {
                bind(&mut params, child, &[]);
                ancestors.push(node);
                match child {
                    Route::Leaf(leaf) => return matched(ancestors, MatchedRoute::Leaf(leaf), params),
                    Route::Node(next) => {
                        node = next;
                        continue;
                    }
                }
            }
            return matched(ancestors, MatchedRoute::Node(node), params);
        };

        let Some(child) = select_child(node, segment) else {
            ancestors.push(node);
            return missed(ancestors, params);
        };

        let consumed = bind(&mut params, child, rest);
        rest = &rest[consumed..];
        ancestors.push(node);

        match child {
            Route::Leaf(leaf) if rest.is_empty() => {
                return matched(ancestors, MatchedRoute::Leaf(leaf), params);
            }
            Route::Leaf(_) => return missed(ancestors, params),
            Route::Node(next) => node = next,
        }
    }
}

/// Match `segments` starting at `route` itself rather than at its children.
fn enter<'a>(
    route: &'a Route,
    segments: &[&str],
    ancestors: Vec<&'a RouteNode>,
    mut params: Params,
) -> Option<RouteMatch<'a>> {
    let (segment, _) = segments.split_first()?;
    if !accepts(route, segment) {
        return None;
    }
    let consumed = bind(&mut params, route, segments);
    let rest = &segments[consumed..];
    match route {
        Route::Leaf(leaf) if rest.is_empty() => {
            Some(matched(ancestors, MatchedRoute::Leaf(leaf), params))
        }
        Route::Leaf(_) => None,
        Route::Node(node) => Some(descend(node, rest, ancestors, params)),
    }
}

fn accepts(route: &Route, segment: &str) -> bool {
    match RouteSegment::parse(route.path()) {
        RouteSegment::Literal(name) => name == segment,
        RouteSegment::Param { .. } => true,
        RouteSegment::Root | RouteSegment::Slot(_) | RouteSegment::Fallback(_) => false,
    }
}

fn select_child<'a>(node: &'a RouteNode, segment: &str) -> Option<&'a Route> {
    let candidates = || node.children.iter().filter(|c| !c.is_intercepting());

    candidates()
        .find(|c| matches!(RouteSegment::parse(c.path()), RouteSegment::Literal(name) if name == segment))
        .or_else(|| {
            candidates().find(|c| {
                matches!(
                    RouteSegment::parse(c.path()),
                    RouteSegment::Param {
                        kind: ParamKind::Required | ParamKind::Optional,
                        ..
                    }
                )
            })
        })
        .or_else(|| {
            candidates().find(|c| {
                matches!(
                    RouteSegment::parse(c.path()),
                    RouteSegment::Param {
                        kind: ParamKind::CatchAll,
                        ..
                    }
                )
            })
        })
}

/// Child that may match zero segments: an optional parameter first, then a
/// catch-all.
fn empty_match_child(node: &RouteNode) -> Option<&Route> {
    let find = |wanted: ParamKind| {
        node.children.iter().filter(|c| !c.is_intercepting()).find(|c| {
            matches!(RouteSegment::parse(c.path()), RouteSegment::Param { kind, .. } if kind == wanted)
        })
    };
    find(ParamKind::Optional).or_else(|| find(ParamKind::CatchAll))
}

/// Record the binding `route` makes for `segments` and return how many
/// segments it consumes.
fn bind(params: &mut Params, route: &Route, segments: &[&str]) -> usize {
    let RouteSegment::Param { name, kind } = RouteSegment::parse(route.path()) else {
        return segments.len().min(1);
    };
    let (value, consumed) = match (kind, segments.first()) {
        (ParamKind::CatchAll, _) => (
            ParamValue::Rest(segments.iter().map(|s| s.to_string()).collect()),
            segments.len(),
        ),
        (_, Some(segment)) => (ParamValue::Segment(segment.to_string()), 1),
        (_, None) => (ParamValue::Missing, 0),
    };
    params.insert(name.to_string(), value);
    consumed
}

fn matched<'a>(ancestors: Vec<&'a RouteNode>, route: MatchedRoute<'a>, params: Params) -> RouteMatch<'a> {
    RouteMatch {
        ancestors,
        route: Some(route),
        params,
        fallback: None,
    }
}

fn missed<'a>(ancestors: Vec<&'a RouteNode>, params: Params) -> RouteMatch<'a> {
    let fallback = (0..ancestors.len()).rev().find_map(|depth| {
        let node = ancestors[depth];
        node.fallback.first_key_value().map(|(name, file)| FallbackMatch {
            ancestors: ancestors[..=depth].to_vec(),
            name: name.as_str(),
            file: file.as_str(),
        })
    });
    RouteMatch {
        ancestors,
        route: None,
        params,
        fallback,
    }
}
