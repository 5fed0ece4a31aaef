use atoll::project::ProjectLayout;
use atoll::{config, manifest, matcher, output, routes};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;

fn version_string() -> &'static str {
    let on_tag = env!("ATOLL_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("ATOLL_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "atoll")]
#[command(about = "File-system routed static site builder with islands")]
#[command(long_about = "\
File-system routed static site builder with islands

Your pages directory is the router. Files become routes, directories nest
them, and a few naming conventions add layouts, parameters and more:

  src/pages/
  ├── _layout.tsx                  # Layout wrapping every page below it
  ├── index.tsx                    # /
  ├── about.tsx                    # /about
  ├── *404.tsx                     # Fallback for unmatched URLs
  ├── blog/
  │   ├── index.tsx                # /blog
  │   └── [slug].tsx               # /blog/:slug
  ├── docs/[...rest].tsx           # /docs/*rest (catch-all)
  ├── [[lang]].tsx                 # /:lang? (optional)
  ├── (marketing)/pricing.tsx      # /pricing (group, adds no segment)
  ├── @modal/login.tsx             # Parallel slot
  └── feed/(..)photo/[id].tsx      # Intercepts /photo/:id from /feed

Components marked for hydration become islands; each page gets a client
entry that hydrates exactly its islands.

Run 'atoll gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project root (holds config.toml and routes.json)
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the pages directory into routes.json
    Routes,
    /// Validate the pages directory without writing anything
    Check,
    /// Show which route a URL resolves to
    Match {
        /// Request path, e.g. /blog/hello
        url: String,
    },
    /// Build the output manifest from routes.json and the bundler output
    Manifest,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Routes => {
            let (site_config, layout) = open_project(&cli.root)?;
            let tree = routes::scan_routes(&layout, &site_config.routes)?;
            routes::save_routes(&layout.routes_file(), &tree)?;
            output::print_routes(&tree);
        }
        Command::Check => {
            let (site_config, layout) = open_project(&cli.root)?;
            println!("==> Checking {}", layout.pages_dir().display());
            let tree = routes::scan_routes(&layout, &site_config.routes)?;
            output::print_routes(&tree);
            println!("==> Routes are valid");
        }
        Command::Match { url } => {
            let (site_config, layout) = open_project(&cli.root)?;
            let routes_file = layout.routes_file();
            let tree = if routes_file.exists() {
                routes::load_routes(&routes_file)?
            } else {
                routes::scan_routes(&layout, &site_config.routes)?
            };
            output::print_match(&url, &matcher::match_route(&tree, &url));
        }
        Command::Manifest => {
            let (_, layout) = open_project(&cli.root)?;
            let built = manifest::build_project_manifest(&layout)?;
            let collected = manifest::collect_static_assets(&built, &layout)?;
            built.save(&layout.manifest_file())?;
            output::print_manifest(&built, &collected);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load `config.toml` under `root` and size the thread pool from it.
fn open_project(root: &Path) -> Result<(config::SiteConfig, ProjectLayout), config::ConfigError> {
    let site_config = config::load_config(root)?;
    init_thread_pool(&site_config.processing);
    let layout = ProjectLayout::new(root, &site_config);
    Ok((site_config, layout))
}

/// Install the fmt subscriber. Logs go to stderr so stdout stays the report.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
