//! Hydration bootstrap source for one page.
//!
//! The generated module has three parts:
//!
//! ```text
//! /* @refresh reload */                      (devtools only)
//! import 'solid-devtools';                   (devtools only)
//! import { hydrate } from "solid-js/web";
//! import { createComponent } from "solid-js";  (unless jsx)
//! import "<additional>";
//! import Island0 from "<resolved path>";
//! import { Cart as Island1 } from "<resolved path>";
//!
//!
//! hydrate(() => createComponent(Island0, {}), document.getElementById("island-1a2b3c4d"), { renderId: "island-1a2b3c4d" });
//! ```
//!
//! Each distinct `(module, export)` pair is imported once; every island
//! instance gets its own `hydrate` call. Output depends only on the input
//! order, so the same registry snapshot always produces the same file.

use crate::config::ClientConfig;
use crate::island::IslandEntry;

/// Options for [`generate_client_entry`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientEntryOptions {
    /// Module that exports `hydrate`.
    pub runtime: String,
    /// Module that exports `createComponent`.
    pub component_module: String,
    pub devtools: bool,
    pub jsx: bool,
    /// Side-effect imports placed before the island imports.
    pub additional_imports: Vec<String>,
}

impl Default for ClientEntryOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for ClientEntryOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            runtime: config.runtime.clone(),
            component_module: config.component_module.clone(),
            devtools: config.devtools,
            jsx: config.jsx,
            additional_imports: Vec::new(),
        }
    }
}

/// Generate the client entry for `islands`.
///
/// `resolve_import_path` maps a project-relative file to the specifier
/// written in the import statement.
pub fn generate_client_entry<F>(
    islands: &[IslandEntry],
    options: &ClientEntryOptions,
    resolve_import_path: F,
) -> String
where
    F: Fn(&str) -> String,
{
    let mut lines = Vec::new();

    if options.devtools {
        lines.push("/* @refresh reload */".to_string());
        lines.push("import 'solid-devtools';".to_string());
    }

    lines.push(format!("import {{ hydrate }} from {};", quote(&options.runtime)));

    if !options.jsx {
        lines.push(format!(
            "import {{ createComponent }} from {};",
            quote(&options.component_module)
        ));
    }

    for file in &options.additional_imports {
        lines.push(format!("import {};", quote(&resolve_import_path(file))));
    }

    let mut aliases: Vec<(&str, &str, String)> = Vec::new();
    let mut hydrations = Vec::new();

    for island in islands {
        let known = aliases
            .iter()
            .find(|(file, export, _)| *file == island.file && *export == island.export_name);
        let alias = match known {
            Some((_, _, alias)) => alias.clone(),
            None => {
                let alias = format!("Island{}", aliases.len());
                let from = quote(&resolve_import_path(&island.file));
                lines.push(if island.is_default_export() {
                    format!("import {alias} from {from};")
                } else {
                    format!("import {{ {} as {alias} }} from {from};", island.export_name)
                });
                aliases.push((island.file.as_str(), island.export_name.as_str(), alias.clone()));
                alias
            }
        };

        let component = if options.jsx {
            format!("<{alias} />")
        } else {
            format!("createComponent({alias}, {{}})")
        };
        let id = quote(&island.id);
        hydrations.push(format!(
            "hydrate(() => {component}, document.getElementById({id}), {{ renderId: {id} }});"
        ));
    }

    lines.push("\n".to_string());
    lines.extend(hydrations);
    lines.join("\n")
}

/// JSON string literal, which is also a valid JS string literal.
fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn island(id: &str, file: &str, export_name: &str) -> IslandEntry {
        IslandEntry {
            id: id.to_string(),
            component: "C".to_string(),
            file: file.to_string(),
            export_name: export_name.to_string(),
        }
    }

    fn identity(file: &str) -> String {
        file.to_string()
    }

    fn count(code: &str, needle: &str) -> usize {
        code.matches(needle).count()
    }

    #[test]
    fn single_default_island() {
        let code = generate_client_entry(
            &[island("x", "a.page", "default")],
            &ClientEntryOptions::default(),
            identity,
        );

        assert_eq!(count(&code, "import Island0 from \"a.page\";"), 1);
        assert_eq!(count(&code, "hydrate(() =>"), 1);
        assert!(code.contains("document.getElementById(\"x\"), { renderId: \"x\" }"));
        assert!(code.contains("createComponent(Island0, {})"));
    }

    #[test]
    fn header_imports_in_order() {
        let options = ClientEntryOptions {
            devtools: true,
            additional_imports: vec!["src/styles/global.css".to_string()],
            ..ClientEntryOptions::default()
        };
        let code = generate_client_entry(&[], &options, |f| format!("/{f}"));
        let lines: Vec<&str> = code.lines().collect();

        assert_eq!(
            &lines[..5],
            &[
                "/* @refresh reload */",
                "import 'solid-devtools';",
                "import { hydrate } from \"solid-js/web\";",
                "import { createComponent } from \"solid-js\";",
                "import \"/src/styles/global.css\";",
            ]
        );
        assert!(!code.contains("hydrate(() =>"));
    }

    #[test]
    fn jsx_mode_skips_create_component() {
        let options = ClientEntryOptions {
            jsx: true,
            ..ClientEntryOptions::default()
        };
        let code = generate_client_entry(&[island("x", "a.tsx", "default")], &options, identity);
        assert!(!code.contains("createComponent"));
        assert!(code.contains("hydrate(() => <Island0 />, document.getElementById(\"x\")"));
    }

    #[test]
    fn named_export_import_syntax() {
        let code = generate_client_entry(
            &[island("x", "src/shop.tsx", "Cart")],
            &ClientEntryOptions::default(),
            identity,
        );
        assert!(code.contains("import { Cart as Island0 } from \"src/shop.tsx\";"));
        assert!(code.contains("createComponent(Island0, {})"));
    }

    #[test]
    fn distinct_exports_imported_once() {
        let islands = [
            island("a", "src/counter.tsx", "default"),
            island("b", "src/counter.tsx", "default"),
            island("c", "src/shop.tsx", "Cart"),
            island("d", "src/shop.tsx", "Badge"),
        ];
        let code = generate_client_entry(&islands, &ClientEntryOptions::default(), identity);

        assert_eq!(count(&code, "from \"src/counter.tsx\""), 1);
        assert_eq!(count(&code, "from \"src/shop.tsx\""), 2);
        assert_eq!(count(&code, "hydrate(() =>"), 4);
        assert!(code.contains("createComponent(Island0, {}), document.getElementById(\"b\")"));
        assert!(code.contains("createComponent(Island2, {}), document.getElementById(\"d\")"));
    }

    #[test]
    fn resolver_shapes_import_paths() {
        let code = generate_client_entry(
            &[island("x", "src/components/counter.tsx", "default")],
            &ClientEntryOptions::default(),
            |f| format!("../../../{f}"),
        );
        assert!(code.contains("from \"../../../src/components/counter.tsx\";"));
    }

    #[test]
    fn ids_are_escaped() {
        let code = generate_client_entry(
            &[island("a\"b", "a.tsx", "default")],
            &ClientEntryOptions::default(),
            identity,
        );
        assert!(code.contains(r#"document.getElementById("a\"b")"#));
    }

    #[test]
    fn output_is_deterministic() {
        let islands = [island("a", "x.tsx", "default"), island("b", "y.tsx", "Y")];
        let options = ClientEntryOptions::default();
        assert_eq!(
            generate_client_entry(&islands, &options, identity),
            generate_client_entry(&islands, &options, identity)
        );
    }

    #[test]
    fn options_follow_config() {
        let config = ClientConfig {
            runtime: "my-runtime".to_string(),
            jsx: true,
            ..ClientConfig::default()
        };
        let options = ClientEntryOptions::from(&config);
        assert_eq!(options.runtime, "my-runtime");
        assert!(options.jsx);
        assert!(options.additional_imports.is_empty());
    }
}
