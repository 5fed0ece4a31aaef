//! Per-template asset lists and their HTML and header forms.
//!
//! An [`AssetList`] is what one template needs at request time:
//!
//! - `css`: every stylesheet of the client and server closures, in discovery order
//! - `jsEntry`: the client entry chunk, loaded with `<script type="module">`
//! - `jsImports`: the rest of the client closure, preloaded
//! - `dynamic`: chunks reachable only through dynamic imports, preloaded
//!
//! All lists are deduplicated. URLs are built by prefixing the bundler's output
//! file name with the configured asset prefix.

use maud::{Markup, html};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::chunks::ChunkRef;

/// Placeholder replaced by [`AssetList::link_tags`].
pub const LINKS_PLACEHOLDER: &str = "{{links}}";
/// Placeholder replaced by [`AssetList::script_tags`].
pub const SCRIPTS_PLACEHOLDER: &str = "{{scripts}}";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetList {
    pub css: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub js_entry: Option<String>,
    pub js_imports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dynamic: Vec<String>,
}

impl AssetList {
    /// Aggregate a client closure (entry first), the dynamic chunks reachable
    /// from it and a server closure whose css is also needed.
    pub fn from_closures(client: &[ChunkRef], dynamic: &[ChunkRef], server: &[ChunkRef]) -> Self {
        let css = client
            .iter()
            .chain(server)
            .flat_map(|c| c.chunk.css.iter().cloned());
        let js_imports = client.iter().skip(1).map(|c| c.chunk.file.clone());
        let dynamic = dynamic.iter().map(|c| c.chunk.file.clone());

        Self {
            css: uniq(css),
            js_entry: client.first().map(|c| c.chunk.file.clone()),
            js_imports: uniq(js_imports),
            dynamic: uniq(dynamic),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.css.is_empty()
            && self.js_entry.is_none()
            && self.js_imports.is_empty()
            && self.dynamic.is_empty()
    }

    fn preloads(&self) -> impl Iterator<Item = &String> {
        self.js_imports.iter().chain(&self.dynamic)
    }

    /// Stylesheet and modulepreload `<link>` tags.
    pub fn link_tags(&self, prefix: &str) -> Markup {
        html! {
            @for css in &self.css {
                link rel="stylesheet" href=(asset_url(prefix, css));
            }
            @for js in self.preloads() {
                link rel="modulepreload" href=(asset_url(prefix, js));
            }
        }
    }

    /// The entry `<script type="module">`, if the template hydrates anything.
    pub fn script_tags(&self, prefix: &str) -> Markup {
        html! {
            @if let Some(entry) = &self.js_entry {
                script type="module" src=(asset_url(prefix, entry)) {}
            }
        }
    }

    /// Value of an early-hint `Link` header, or `None` when there is nothing
    /// to preload.
    pub fn link_header(&self, prefix: &str) -> Option<String> {
        let styles = self
            .css
            .iter()
            .map(|css| format!("<{}>; rel=\"preload\"; as=\"style\"", asset_url(prefix, css)));
        let scripts = self
            .js_entry
            .iter()
            .chain(self.preloads())
            .map(|js| format!("<{}>; rel=\"modulepreload\"; as=\"script\"", asset_url(prefix, js)));
        let values: Vec<String> = styles.chain(scripts).collect();
        (!values.is_empty()).then(|| values.join(", "))
    }

    /// `template` with both placeholders filled from this list.
    pub fn fill(&self, template: &str, prefix: &str) -> String {
        fill_template(
            template,
            &self.link_tags(prefix).into_string(),
            &self.script_tags(prefix).into_string(),
        )
    }
}

/// Replace `{{links}}` and `{{scripts}}` in a template.
pub fn fill_template(template: &str, links: &str, scripts: &str) -> String {
    template
        .replace(LINKS_PLACEHOLDER, links)
        .replace(SCRIPTS_PLACEHOLDER, scripts)
}

fn asset_url(prefix: &str, file: &str) -> String {
    format!("{prefix}{}", file.trim_start_matches('/'))
}

/// Distinct values, first occurrence wins.
pub(crate) fn uniq(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::{BundlerManifest, ManifestChunk};

    fn chunk(file: &str, css: &[&str], imports: &[&str]) -> ManifestChunk {
        ManifestChunk {
            file: file.to_string(),
            css: css.iter().map(|s| s.to_string()).collect(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
            ..ManifestChunk::default()
        }
    }

    fn sample() -> AssetList {
        AssetList {
            css: vec!["assets/app.css".into()],
            js_entry: Some("assets/entry.js".into()),
            js_imports: vec!["assets/shared.js".into()],
            dynamic: Vec::new(),
        }
    }

    // =========================================================================
    // Aggregation
    // =========================================================================

    #[test]
    fn aggregates_client_and_server_closures() {
        let mut client = BundlerManifest::new();
        client.insert("entry", chunk("assets/entry.js", &["assets/entry.css"], &["a", "b"]));
        client.insert("a", chunk("assets/a.js", &["assets/shared.css"], &[]));
        client.insert("b", chunk("assets/b.js", &["assets/shared.css"], &[]));

        let mut server = BundlerManifest::new();
        server.insert("page", chunk("page.js", &["assets/page.css", "assets/entry.css"], &[]));

        let list = AssetList::from_closures(
            &client.get_chunks("entry").unwrap(),
            &[],
            &server.get_chunks("page").unwrap(),
        );

        assert_eq!(
            list.css,
            ["assets/entry.css", "assets/shared.css", "assets/page.css"]
        );
        assert_eq!(list.js_entry.as_deref(), Some("assets/entry.js"));
        assert_eq!(list.js_imports, ["assets/a.js", "assets/b.js"]);
        assert!(list.dynamic.is_empty());
    }

    #[test]
    fn server_only_has_no_js() {
        let mut server = BundlerManifest::new();
        server.insert("page", chunk("page.js", &["assets/page.css"], &[]));
        let list = AssetList::from_closures(&[], &[], &server.get_chunks("page").unwrap());

        assert_eq!(list.css, ["assets/page.css"]);
        assert!(list.js_entry.is_none());
        assert!(list.js_imports.is_empty());
        assert!(!list.is_empty());
        assert!(AssetList::default().is_empty());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["jsEntry"], "assets/entry.js");
        assert_eq!(json["jsImports"][0], "assets/shared.js");
        assert!(json.get("dynamic").is_none());
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    #[test]
    fn link_tags_render_styles_then_preloads() {
        let html = sample().link_tags("/").into_string();
        assert_eq!(
            html,
            "<link rel=\"stylesheet\" href=\"/assets/app.css\">\
             <link rel=\"modulepreload\" href=\"/assets/shared.js\">"
        );
    }

    #[test]
    fn script_tag_uses_prefix() {
        let html = sample().script_tags("/static/").into_string();
        assert_eq!(
            html,
            "<script type=\"module\" src=\"/static/assets/entry.js\"></script>"
        );
        assert_eq!(AssetList::default().script_tags("/").into_string(), "");
    }

    #[test]
    fn link_header_values() {
        let header = sample().link_header("/").unwrap();
        assert_eq!(
            header,
            "</assets/app.css>; rel=\"preload\"; as=\"style\", \
             </assets/entry.js>; rel=\"modulepreload\"; as=\"script\", \
             </assets/shared.js>; rel=\"modulepreload\"; as=\"script\""
        );
        assert_eq!(AssetList::default().link_header("/"), None);
    }

    #[test]
    fn fills_placeholders() {
        let template = "<head>{{links}}</head><body>x{{scripts}}</body>";
        let html = sample().fill(template, "/");
        assert!(html.contains("<head><link rel=\"stylesheet\""));
        assert!(html.ends_with("<script type=\"module\" src=\"/assets/entry.js\"></script></body>"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn fill_template_without_placeholders_is_unchanged() {
        assert_eq!(fill_template("<p>hi</p>", "L", "S"), "<p>hi</p>");
    }

    #[test]
    fn uniq_keeps_first_occurrence() {
        let values = ["b", "a", "b", "c", "a"].map(String::from);
        assert_eq!(uniq(values), ["b", "a", "c"]);
    }
}
