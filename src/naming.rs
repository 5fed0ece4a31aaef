//! Route name grammar for files and directories under the pages directory.
//!
//! Every filesystem entry is classified into exactly one [`RouteNameToken`].
//! Classification is an ordered list of matchers, highest precedence first;
//! the first matcher that accepts a name wins:
//!
//! | Order | Form | Token | Example |
//! |-------|------|-------|---------|
//! | 1 | `_` not followed by `_` (files only) | [`RouteNameToken::Layout`] | `_layout.tsx`, `_[id].tsx` |
//! | 2 | `(name)`, extension aside | [`RouteNameToken::Group`] | `(marketing)/` |
//! | 3 | `@name` | [`RouteNameToken::Slot`] | `@modal/` |
//! | 4 | `*name` | [`RouteNameToken::Fallback`] | `*404.tsx` |
//! | 5 | `[id]`, `[[id]]`, `[...id]` | [`RouteNameToken::Segment`] with a [`ParamKind`] | `[slug].tsx` |
//! | 6 | index token (files only) | [`RouteNameToken::Index`] | `index.tsx` |
//! | 7 | anything else | literal [`RouteNameToken::Segment`] | `about.tsx`, `about(v2).tsx` |
//!
//! Segment names may carry an interception prefix, `(.)`, `(..)`,
//! `(..)(..)` or `(...)`, which is stripped before the rest of the name is
//! classified.
//!
//! ## Path Forms
//!
//! Segments are stored in the route tree as path strings. The mapping is
//! reversible through [`RouteSegment::parse`]:
//!
//! - `about.tsx` → `/about`
//! - `[id].tsx` → `/:id`
//! - `[[lang]].tsx` → `/:lang?`
//! - `[...rest].tsx` → `/*rest`
//! - `@modal` → `/@modal`
//! - `about(v2).tsx` → `/about`, with `v2` kept as its disambiguator
//!
//! Template names use the source spelling instead (`/:id` → `[id]`), see
//! [`template_segment`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker opening a layout file name.
pub const LAYOUT_MARKER: char = '_';
/// Marker opening a slot name.
pub const SLOT_MARKER: char = '@';
/// Marker opening a fallback name.
pub const FALLBACK_MARKER: char = '*';

/// How a parameter segment consumes URL segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamKind {
    /// `[name]`: exactly one non-empty segment.
    Required,
    /// `[[name]]`: zero or one segment.
    Optional,
    /// `[...name]`: zero or more trailing segments.
    CatchAll,
}

/// Which ancestor an intercepting route is matched relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterceptLevel {
    /// `(.)`
    Same,
    /// `(..)`
    OneUp,
    /// `(..)(..)`
    TwoUp,
    /// `(...)`
    Root,
}

impl InterceptLevel {
    /// Number of trailing path segments dropped to find the base, `None`
    /// meaning "all of them".
    pub fn levels_up(self) -> Option<usize> {
        match self {
            InterceptLevel::Same => Some(0),
            InterceptLevel::OneUp => Some(1),
            InterceptLevel::TwoUp => Some(2),
            InterceptLevel::Root => None,
        }
    }

    /// Source spelling, `(.)` through `(...)`.
    pub fn prefix(self) -> &'static str {
        match self {
            InterceptLevel::Same => "(.)",
            InterceptLevel::OneUp => "(..)",
            InterceptLevel::TwoUp => "(..)(..)",
            InterceptLevel::Root => "(...)",
        }
    }
}

/// Classification of one file or directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteNameToken {
    Layout,
    Group {
        name: String,
    },
    Slot {
        name: String,
    },
    Fallback {
        name: String,
    },
    Index,
    Segment {
        name: String,
        param: Option<ParamKind>,
        intercept: Option<InterceptLevel>,
        /// Parenthetical suffix of an escaped literal, `about(v2)` → `v2`.
        disambiguator: Option<String>,
    },
}

impl RouteNameToken {
    /// Path string this token contributes, if it contributes one.
    pub fn segment_path(&self) -> Option<String> {
        match self {
            RouteNameToken::Segment { name, param, .. } => Some(match param {
                None => format!("/{name}"),
                Some(ParamKind::Required) => format!("/:{name}"),
                Some(ParamKind::Optional) => format!("/:{name}?"),
                Some(ParamKind::CatchAll) => format!("/*{name}"),
            }),
            RouteNameToken::Slot { name } => Some(format!("/{SLOT_MARKER}{name}")),
            RouteNameToken::Layout
            | RouteNameToken::Group { .. }
            | RouteNameToken::Fallback { .. }
            | RouteNameToken::Index => None,
        }
    }

    /// Parameter name, for parameter segments.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            RouteNameToken::Segment {
                name,
                param: Some(_),
                ..
            } => Some(name),
            _ => None,
        }
    }
}

/// A name to classify, with the context the grammar depends on.
#[derive(Debug, Clone, Copy)]
pub struct EntryName<'a> {
    pub name: &'a str,
    pub is_dir: bool,
    pub index_token: &'a str,
}

impl<'a> EntryName<'a> {
    pub fn file(name: &'a str, index_token: &'a str) -> Self {
        Self {
            name,
            is_dir: false,
            index_token,
        }
    }

    pub fn dir(name: &'a str) -> Self {
        Self {
            name,
            is_dir: true,
            index_token: "",
        }
    }

    /// Name without its extension. Directories keep their full name.
    pub fn stem(&self) -> &'a str {
        if self.is_dir {
            self.name
        } else {
            split_extension(self.name).0
        }
    }
}

type Matcher = fn(&EntryName) -> Option<RouteNameToken>;

/// Matchers in precedence order.
const MATCHERS: &[Matcher] = &[
    match_layout,
    match_group,
    match_slot,
    match_fallback,
    match_param,
    match_index,
    match_literal,
];

/// Classify a file or directory name.
///
/// Returns `None` for names that cannot produce any route construct, such as
/// an interception prefix with nothing after it.
pub fn parse_route_name(entry: &EntryName) -> Option<RouteNameToken> {
    MATCHERS.iter().find_map(|matcher| matcher(entry))
}

fn match_layout(entry: &EntryName) -> Option<RouteNameToken> {
    let mut chars = entry.name.chars();
    let first = chars.next()?;
    let second = chars.next();
    let is_layout = !entry.is_dir
        && first == LAYOUT_MARKER
        && second.is_some_and(|c| c != LAYOUT_MARKER);
    is_layout.then_some(RouteNameToken::Layout)
}

fn match_group(entry: &EntryName) -> Option<RouteNameToken> {
    let inner = entry.stem().strip_prefix('(')?.strip_suffix(')')?;
    let valid = !inner.is_empty()
        && !inner.contains(['(', ')'])
        && !inner.chars().all(|c| c == '.');
    valid.then(|| RouteNameToken::Group {
        name: inner.to_string(),
    })
}

fn match_slot(entry: &EntryName) -> Option<RouteNameToken> {
    let name = entry.stem().strip_prefix(SLOT_MARKER)?;
    (!name.is_empty()).then(|| RouteNameToken::Slot {
        name: name.to_string(),
    })
}

fn match_fallback(entry: &EntryName) -> Option<RouteNameToken> {
    let name = entry.stem().strip_prefix(FALLBACK_MARKER)?;
    (!name.is_empty()).then(|| RouteNameToken::Fallback {
        name: name.to_string(),
    })
}

fn match_param(entry: &EntryName) -> Option<RouteNameToken> {
    let (intercept, rest) = split_intercept(entry.stem());
    let (name, kind) = parse_param(rest)?;
    Some(RouteNameToken::Segment {
        name: name.to_string(),
        param: Some(kind),
        intercept,
        disambiguator: None,
    })
}

fn match_index(entry: &EntryName) -> Option<RouteNameToken> {
    (!entry.is_dir && entry.stem() == entry.index_token).then_some(RouteNameToken::Index)
}

fn match_literal(entry: &EntryName) -> Option<RouteNameToken> {
    let (intercept, rest) = split_intercept(entry.stem());
    if rest.is_empty() {
        return None;
    }
    let (name, disambiguator) = match parse_escaped(rest) {
        Some((segment, disambiguator)) => (segment, Some(disambiguator.to_string())),
        None => (rest, None),
    };
    Some(RouteNameToken::Segment {
        name: name.to_string(),
        param: None,
        intercept,
        disambiguator,
    })
}

/// Split `name.ext` at the last dot. The extension must not contain
/// brackets or parentheses, so `[...rest]` keeps its dots.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(dot) if dot > 0 && !name[dot + 1..].contains([']', ')', '[', '(']) => {
            (&name[..dot], Some(&name[dot + 1..]))
        }
        _ => (name, None),
    }
}

fn split_intercept(name: &str) -> (Option<InterceptLevel>, &str) {
    const PREFIXES: &[(&str, InterceptLevel)] = &[
        ("(..)(..)", InterceptLevel::TwoUp),
        ("(...)", InterceptLevel::Root),
        ("(..)", InterceptLevel::OneUp),
        ("(.)", InterceptLevel::Same),
    ];
    PREFIXES
        .iter()
        .find_map(|(prefix, level)| name.strip_prefix(prefix).map(|rest| (Some(*level), rest)))
        .unwrap_or((None, name))
}

fn parse_param(stem: &str) -> Option<(&str, ParamKind)> {
    let (inner, kind) = if let Some(inner) = stem.strip_prefix("[[").and_then(|s| s.strip_suffix("]]")) {
        (inner, ParamKind::Optional)
    } else if let Some(inner) = stem.strip_prefix("[...").and_then(|s| s.strip_suffix(']')) {
        (inner, ParamKind::CatchAll)
    } else {
        let inner = stem.strip_prefix('[')?.strip_suffix(']')?;
        (inner, ParamKind::Required)
    };
    let valid = !inner.is_empty() && !inner.contains(['.', '[', ']', '/']);
    valid.then_some((inner, kind))
}

/// `about(v2)` → `("about", "v2")`.
fn parse_escaped(stem: &str) -> Option<(&str, &str)> {
    let open = stem.find('(')?;
    let segment = &stem[..open];
    let disambiguator = stem[open + 1..].strip_suffix(')')?;
    let valid = !segment.is_empty()
        && !disambiguator.is_empty()
        && !disambiguator.contains(['(', ')']);
    valid.then_some((segment, disambiguator))
}

/// A route path parsed back into the construct that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSegment<'a> {
    Root,
    Literal(&'a str),
    Param { name: &'a str, kind: ParamKind },
    Slot(&'a str),
    Fallback(&'a str),
}

impl<'a> RouteSegment<'a> {
    pub fn parse(path: &'a str) -> Self {
        let segment = path.strip_prefix('/').unwrap_or(path);
        if segment.is_empty() {
            return RouteSegment::Root;
        }
        if let Some(name) = segment.strip_prefix(':') {
            return match name.strip_suffix('?') {
                Some(name) => RouteSegment::Param {
                    name,
                    kind: ParamKind::Optional,
                },
                None => RouteSegment::Param {
                    name,
                    kind: ParamKind::Required,
                },
            };
        }
        if let Some(name) = segment.strip_prefix('*') {
            return RouteSegment::Param {
                name,
                kind: ParamKind::CatchAll,
            };
        }
        if let Some(name) = segment.strip_prefix(SLOT_MARKER) {
            return RouteSegment::Slot(name);
        }
        if let Some(name) = segment.strip_prefix('^') {
            return RouteSegment::Fallback(name);
        }
        RouteSegment::Literal(segment)
    }
}

impl fmt::Display for RouteSegment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteSegment::Root => Ok(()),
            RouteSegment::Literal(name) => write!(f, "{name}"),
            RouteSegment::Param {
                name,
                kind: ParamKind::Required,
            } => write!(f, "[{name}]"),
            RouteSegment::Param {
                name,
                kind: ParamKind::Optional,
            } => write!(f, "[[{name}]]"),
            RouteSegment::Param {
                name,
                kind: ParamKind::CatchAll,
            } => write!(f, "[...{name}]"),
            RouteSegment::Slot(name) => write!(f, "{SLOT_MARKER}{name}"),
            RouteSegment::Fallback(name) => write!(f, "^{name}"),
        }
    }
}

/// Path used for a fallback page when it needs one (template naming).
pub fn fallback_path(name: &str) -> String {
    format!("/^{name}")
}

/// Route path of an intercepting route as written in its pattern,
/// `/:id` → `/(.):id`.
pub fn intercept_path(path: &str, level: Option<InterceptLevel>) -> String {
    match level {
        Some(level) => format!("/{}{}", level.prefix(), path.trim_start_matches('/')),
        None => path.to_string(),
    }
}

/// Path that tells a route apart from its siblings: the URL path with any
/// intercept prefix and escape suffix, `/about` → `/(.)about(v2)`.
pub fn pattern_path(path: &str, level: Option<InterceptLevel>, disambiguator: Option<&str>) -> String {
    let path = intercept_path(path, level);
    match disambiguator {
        Some(disambiguator) => format!("{path}({disambiguator})"),
        None => path,
    }
}

/// Template-name spelling of one route path: `/:id` → `[id]`, `/` → ``,
/// `/(.):id` → `(.)[id]`.
pub fn template_segment(path: &str) -> String {
    let segment = path.strip_prefix('/').unwrap_or(path);
    match split_intercept(segment) {
        (Some(level), rest) => format!("{}{}", level.prefix(), RouteSegment::parse(rest)),
        (None, _) => RouteSegment::parse(path).to_string(),
    }
}
