//! Project configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by the user's `config.toml` at the project root.
//!
//! ## Location
//!
//! ```text
//! my-site/
//! ├── config.toml              # Project config (overrides stock defaults)
//! ├── routes.json              # Written by `atoll routes`
//! └── src/
//!     └── pages/               # The routed directory
//! ```
//!
//! ## Options
//!
//! ```toml
//! # Every key is optional; the values below are the defaults
//!
//! pages_dir = "src/pages"   # Routed directory, relative to the project root
//! build_dir = ".build"      # Generated entries and bundler output
//! output_dir = ".output"    # Templates, static assets, manifest.json
//!
//! [routes]
//! index = "index"           # Stem of files that become a directory's index
//! extensions = ["tsx", "jsx", "ts", "js"]  # Empty list routes every file
//!
//! [client]
//! runtime = "solid-js/web"  # Module providing `hydrate`
//! component_module = "solid-js"  # Module providing `createComponent`
//! devtools = false          # Prepend the refresh pragma and devtools import
//! jsx = false               # Emit `<IslandN />` instead of createComponent calls
//! entry_extension = "tsx"   # Extension of generated client entries
//!
//! [assets]
//! prefix = "/"              # URL prefix for links, scripts and Link headers
//!
//! [processing]
//! max_processes = 4         # Max parallel render workers (omit for auto = CPU cores)
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Routed directory, relative to the project root.
    pub pages_dir: String,
    /// Directory for generated client entries and bundler output.
    pub build_dir: String,
    /// Directory for templates, static assets and the persisted manifest.
    pub output_dir: String,
    /// Route naming settings.
    pub routes: RoutesConfig,
    /// Client entry generation settings.
    pub client: ClientConfig,
    /// Asset URL settings.
    pub assets: AssetsConfig,
    /// Parallel rendering settings.
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            pages_dir: "src/pages".to_string(),
            build_dir: ".build".to_string(),
            output_dir: ".output".to_string(),
            routes: RoutesConfig::default(),
            client: ClientConfig::default(),
            assets: AssetsConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("pages_dir", &self.pages_dir),
            ("build_dir", &self.build_dir),
            ("output_dir", &self.output_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        if self.build_dir == self.output_dir {
            return Err(ConfigError::Validation(
                "build_dir and output_dir must differ".into(),
            ));
        }
        if self.routes.index.is_empty() || self.routes.index.contains(['/', '.']) {
            return Err(ConfigError::Validation(
                "routes.index must be a bare file stem".into(),
            ));
        }
        if self.routes.extensions.iter().any(|e| e.starts_with('.')) {
            return Err(ConfigError::Validation(
                "routes.extensions are written without the leading dot".into(),
            ));
        }
        if self.client.entry_extension.is_empty() || self.client.entry_extension.starts_with('.')
        {
            return Err(ConfigError::Validation(
                "client.entry_extension must be non-empty, without the leading dot".into(),
            ));
        }
        if !self.assets.prefix.starts_with('/') || !self.assets.prefix.ends_with('/') {
            return Err(ConfigError::Validation(
                "assets.prefix must start and end with '/'".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Route naming settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutesConfig {
    /// File stem that marks a directory's index page.
    pub index: String,
    /// Extensions of files that become routes. Empty means every file.
    pub extensions: Vec<String>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            index: "index".to_string(),
            extensions: ["tsx", "jsx", "ts", "js"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl RoutesConfig {
    /// Whether a file name carries a routable extension.
    pub fn is_routable(&self, file_name: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => self.extensions.iter().any(|e| e == ext),
            _ => false,
        }
    }
}

/// Client entry generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Module that exports `hydrate`.
    pub runtime: String,
    /// Module that exports `createComponent`.
    pub component_module: String,
    /// Emit the devtools refresh pragma and import.
    pub devtools: bool,
    /// Instantiate islands with JSX instead of `createComponent`.
    pub jsx: bool,
    /// Extension of generated client entry files.
    pub entry_extension: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            runtime: "solid-js/web".to_string(),
            component_module: "solid-js".to_string(),
            devtools: false,
            jsx: false,
            entry_extension: "tsx".to_string(),
        }
    }
}

/// Asset URL settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Prefix joined in front of every bundler output file name.
    pub prefix: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            prefix: "/".to_string(),
        }
    }
}

/// Parallel rendering settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Upper bound on render workers; unset means one per core.
    pub max_processes: Option<usize>,
}

/// Worker count for the render pool: `max_processes` capped at the core count.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    match config.max_processes {
        Some(requested) => requested.min(cores),
        None => cores,
    }
}

// =============================================================================
// Layered loading
// =============================================================================

/// [`SiteConfig::default`] as a TOML value.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
}

/// Deep merge: tables merge per key, anything else in `overlay` wins.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    let toml::Value::Table(upper) = overlay else {
        return overlay;
    };
    let toml::Value::Table(mut table) = base else {
        return toml::Value::Table(upper);
    };
    for (key, value) in upper {
        let value = match table.remove(&key) {
            Some(lower) => merge_toml(lower, value),
            None => value,
        };
        table.insert(key, value);
    }
    toml::Value::Table(table)
}

/// The raw `config.toml` under `root`, `None` when the project has none.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let file = root.join("config.toml");
    if !file.is_file() {
        return Ok(None);
    }
    Ok(Some(toml::from_str(&fs::read_to_string(&file)?)?))
}

/// Apply `overlay` (if any) to `base`, deserialize, validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = overlay.into_iter().fold(base, merge_toml);
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Stock defaults with the project's `config.toml` layered on top.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    resolve_config(stock_defaults_value()?, load_raw_config(root)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# atoll Configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# Routed directory, relative to the project root.
pages_dir = "src/pages"

# Generated client entries (generated/client) and bundler output (bundle/).
build_dir = ".build"

# Templates, static assets and manifest.json.
output_dir = ".output"

# ---------------------------------------------------------------------------
# Route naming
# ---------------------------------------------------------------------------
[routes]
# File stem that becomes a directory's index page.
index = "index"

# Only files with these extensions become routes. An empty list routes
# every file in the pages directory.
extensions = ["tsx", "jsx", "ts", "js"]

# ---------------------------------------------------------------------------
# Client entries
# ---------------------------------------------------------------------------
[client]
# Module that exports `hydrate`.
runtime = "solid-js/web"

# Module that exports `createComponent` (unused when jsx = true).
component_module = "solid-js"

# Prepend the refresh pragma and the devtools import.
devtools = false

# Instantiate islands as <IslandN /> instead of createComponent(IslandN, {}).
jsx = false

# Extension of generated entry files.
entry_extension = "tsx"

# ---------------------------------------------------------------------------
# Assets
# ---------------------------------------------------------------------------
[assets]
# URL prefix for stylesheet links, scripts and early-hint Link headers.
prefix = "/"

# ---------------------------------------------------------------------------
# Parallel rendering
# ---------------------------------------------------------------------------
[processing]
# Maximum number of parallel render workers.
# Omit to auto-detect (uses all CPU cores).
# Values larger than the number of cores are clamped down.
# max_processes = 4
"##
}
