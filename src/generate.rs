//! Static page generation.
//!
//! For every page of the route tree the orchestrator:
//!
//! 1. composes the layout chain and the page into a module list, outermost
//!    layout first and the page last;
//! 2. hands it to the [`Renderer`] together with a fresh [`IslandRegistry`];
//! 3. writes the HTML to `templates/<name>.html`, with a doctype prepended
//!    when the renderer did not emit one;
//! 4. when the page registered islands, writes their client entry to
//!    `<build>/generated/client/entry-<name>.<ext>`;
//! 5. records the page in `pages.json`.
//!
//! ## Output Structure
//!
//! ```text
//! .build/generated/client/
//! ├── entry-about.tsx             # only for pages with islands
//! └── entry-blog-[slug].tsx
//! .output/
//! ├── pages.json                  # route pattern → template, entry
//! └── templates/
//!     ├── index.html
//!     ├── about.html
//!     └── blog-[slug].html
//! ```
//!
//! Pages render in parallel. A failing page does not stop the others: every
//! page that rendered is written, then the failures are returned together.

use maud::DOCTYPE;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client_entry::{ClientEntryOptions, generate_client_entry};
use crate::island::{IslandEntry, IslandError, IslandRegistry};
use crate::project::{ProjectLayout, Side, relative_path};
use crate::routes::{PageRef, RouteNode};
use crate::types::{PageIndex, PageIndexEntry, PageModule};

/// Error raised by a [`Renderer`].
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{0}")]
    Message(String),
    #[error("Island error: {0}")]
    Island(#[from] IslandError),
}

/// Why one page could not be generated.
#[derive(Error, Debug)]
pub enum PageError {
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Template '{0}' is already produced by another page")]
    DuplicateTemplate(String),
}

#[derive(Debug)]
pub struct PageFailure {
    pub route: String,
    pub template: String,
    pub error: PageError,
}

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{} page(s) failed: {}", .0.len(), summarize(.0))]
    Pages(Vec<PageFailure>),
}

fn summarize(failures: &[PageFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.route, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Renders a composed page to HTML.
///
/// Implementations register every island they emit in `islands`. One renderer
/// is shared by all pages of a build, each page with its own registry.
pub trait Renderer: Sync {
    fn render(&self, modules: &[PageModule], islands: &mut IslandRegistry) -> Result<String, RenderError>;
}

/// One page after rendering, before anything is written.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub route: String,
    pub template: String,
    pub html: String,
    pub islands: Vec<IslandEntry>,
}

/// One page after it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPage {
    pub route: String,
    pub template: String,
    /// Project-relative client entry, if the page has islands.
    pub entry: Option<String>,
    pub islands: Vec<IslandEntry>,
}

#[derive(Debug, Default)]
pub struct GenerateReport {
    pub pages: Vec<GeneratedPage>,
}

/// Layouts wrapping `page`, outermost first, followed by the page itself.
pub fn compose(page: &PageRef<'_>) -> Vec<PageModule> {
    page.layouts()
        .into_iter()
        .map(PageModule::layout)
        .chain(std::iter::once(PageModule::page(page.file())))
        .collect()
}

/// Render one page with a registry of its own.
pub fn render_page<R: Renderer + ?Sized>(
    page: &PageRef<'_>,
    renderer: &R,
) -> Result<RenderedPage, RenderError> {
    render_page_in(page, renderer, &mut IslandRegistry::new())
}

/// Render one page into a registry that outlives the render, as a dev server
/// holding one registry does. The registry is reset before the render and
/// drained after it, failed renders included.
pub fn render_page_in<R: Renderer + ?Sized>(
    page: &PageRef<'_>,
    renderer: &R,
    registry: &mut IslandRegistry,
) -> Result<RenderedPage, RenderError> {
    let modules = compose(page);
    registry.reset();
    let rendered = renderer.render(&modules, registry);
    let islands = registry.drain();
    let html = rendered?;

    Ok(RenderedPage {
        route: page.route_path(),
        template: page.template_name(),
        html: ensure_doctype(html),
        islands,
    })
}

fn ensure_doctype(html: String) -> String {
    let head = html.trim_start();
    if head.get(..9).is_some_and(|s| s.eq_ignore_ascii_case("<!doctype")) {
        html
    } else {
        format!("{}{html}", DOCTYPE.into_string())
    }
}

/// Render every page of `routes` and write templates, client entries and
/// `pages.json`.
pub fn generate<R: Renderer + ?Sized>(
    routes: &RouteNode,
    renderer: &R,
    layout: &ProjectLayout,
    options: &ClientEntryOptions,
) -> Result<GenerateReport, GenerateError> {
    fs::create_dir_all(layout.templates_dir())?;
    fs::create_dir_all(layout.entries_dir(Side::Client))?;

    let pages = routes.pages();
    let mut claimed = HashSet::new();
    let duplicates: Vec<bool> = pages
        .iter()
        .map(|p| !claimed.insert(p.template_name()))
        .collect();

    let results: Vec<Result<GeneratedPage, PageFailure>> = pages
        .par_iter()
        .zip(duplicates.par_iter())
        .map(|(page, &duplicate)| {
            let template = page.template_name();
            let outcome = if duplicate {
                Err(PageError::DuplicateTemplate(template.clone()))
            } else {
                write_page(page, renderer, layout, options)
            };
            outcome.map_err(|error| PageFailure {
                route: page.route_path(),
                template,
                error,
            })
        })
        .collect();

    let mut report = GenerateReport::default();
    let mut index = PageIndex::new();
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(page) => {
                index.insert(
                    page.route.clone(),
                    PageIndexEntry {
                        template: page.template.clone(),
                        entry: page.entry.clone(),
                    },
                );
                report.pages.push(page);
            }
            Err(failure) => {
                warn!(route = %failure.route, error = %failure.error, "page failed");
                failures.push(failure);
            }
        }
    }

    fs::write(layout.pages_file(), serde_json::to_string_pretty(&index)?)?;
    info!(
        pages = report.pages.len(),
        failed = failures.len(),
        "generation finished"
    );

    if failures.is_empty() {
        Ok(report)
    } else {
        Err(GenerateError::Pages(failures))
    }
}

fn write_page<R: Renderer + ?Sized>(
    page: &PageRef<'_>,
    renderer: &R,
    layout: &ProjectLayout,
    options: &ClientEntryOptions,
) -> Result<GeneratedPage, PageError> {
    let rendered = render_page(page, renderer)?;
    fs::write(layout.template_file(&rendered.template), &rendered.html)?;
    debug!(route = %rendered.route, template = %rendered.template, "page rendered");

    let entry = if rendered.islands.is_empty() {
        None
    } else {
        let from = layout.entries_dir_ref(Side::Client);
        let code = generate_client_entry(&rendered.islands, options, |file| {
            relative_path(&from, file)
        });
        let key = layout.entry_key(Side::Client, &rendered.template);
        fs::write(layout.entry_file(Side::Client, &rendered.template), code)?;
        debug!(entry = %key, islands = rendered.islands.len(), "client entry generated");
        Some(key)
    };

    Ok(GeneratedPage {
        route: rendered.route,
        template: rendered.template,
        entry,
        islands: rendered.islands,
    })
}
