//! # Term Rank CLI (`trk`)
//!
//! The `trk` binary builds search-term rank indexes from a directory of
//! dated reports, queries them, and exports the results.
//!
//! ## Usage
//!
//! ```bash
//! trk [--config ./trk.toml] [-v | -q] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `trk build` | Ingest every report and optionally save an index snapshot |
//! | `trk query` | Select terms or products and export the flattened result |
//! | `trk stats` | Print what an index over the source directory holds |
//!
//! ## Examples
//!
//! ```bash
//! # Terms containing "shoe", one column of ranks per date
//! trk query --source ./reports --by by-term --policy loose shoe
//!
//! # Terms whose best rank is 40 or better, with their top products
//! trk query --source ./reports --by by-rank-with-products --policy loose 40
//!
//! # Every appearance of a product in slot 1-3, as JSON on stdout
//! trk query --source ./reports --by by-product --policy exact B000XYZ --format json --stdout
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use termrank::config::{self, Config};
use termrank::export::Format;
use termrank::logging;
use termrank::search::{self, SearchRequest};
use termrank::{ingest, snapshot, sources, stats};
use termrank_core::models::View;
use termrank_core::query::{Dimension, Policy, Query};
use termrank_core::store::Backend;

/// Term Rank CLI: a search-term rank index over dated search-frequency reports.
#[derive(Parser)]
#[command(
    name = "trk",
    about = "Term Rank: index and query dated search-term rank reports",
    version
)]
struct Cli {
    /// Path to a configuration file (TOML).
    ///
    /// Optional. Flags given on the command line override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest every report in the source directory.
    ///
    /// Fails on the first malformed report; no partial index is kept.
    Build {
        /// Directory holding the report files.
        #[arg(long)]
        source: Option<PathBuf>,

        /// Row layout: `basic` (term and rank) or `extended` (plus top products).
        #[arg(long, default_value = "basic")]
        view: View,

        /// Index backend: `associative` or `columnar`.
        #[arg(long)]
        backend: Option<Backend>,

        /// Write the built index to this file as a JSON snapshot.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Query the index and export the matches.
    ///
    /// The selector is one or more term patterns (`by-term*`), one rank
    /// threshold (`by-rank*`), or one or more product ids (`by-product`).
    Query {
        /// Query dimension, e.g. `by-term`, `by-rank-detail`, `by-product`.
        #[arg(long = "by")]
        dimension: Dimension,

        /// Selection policy: `loose`, `exact`, or `mean`.
        #[arg(long, default_value = "loose")]
        policy: Policy,

        /// Selector values.
        #[arg(required = true)]
        selector: Vec<String>,

        /// Directory holding the report files.
        #[arg(long)]
        source: Option<PathBuf>,

        /// Index backend: `associative` or `columnar`.
        #[arg(long)]
        backend: Option<Backend>,

        /// Directory for the result file. Defaults to the source directory.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Output format: `csv` or `json`.
        #[arg(long)]
        format: Option<Format>,

        /// Print the result table instead of writing a file.
        #[arg(long)]
        stdout: bool,
    },

    /// Print a summary of the index over the source directory.
    Stats {
        /// Directory holding the report files.
        #[arg(long)]
        source: Option<PathBuf>,

        /// Row layout: `basic` or `extended`.
        #[arg(long, default_value = "basic")]
        view: View,

        /// Index backend: `associative` or `columnar`.
        #[arg(long)]
        backend: Option<Backend>,
    },
}

fn source_dir(flag: Option<PathBuf>, cfg: &Config) -> Result<PathBuf> {
    flag.or_else(|| cfg.source.dir.clone())
        .context("No source directory: pass --source or set source.dir in the config")
}

fn backend(flag: Option<Backend>, cfg: &Config) -> Result<Backend> {
    match flag {
        Some(b) => Ok(b),
        None => cfg.engine.backend(),
    }
}

fn run_build(
    source: &Path,
    cfg: &Config,
    backend: Backend,
    view: View,
    snapshot_path: Option<&Path>,
) -> Result<()> {
    let files = sources::discover(source, &cfg.source)?;
    let index = ingest::build_index(&files, backend, view)?;
    let summary = index.summary();
    println!("Build {} ({} backend, {} view)", source.display(), backend, view);
    println!("  reports:   {}", files.reports.len());
    println!("  terms:     {}", summary.terms);
    println!("  snapshots: {}", summary.snapshots);
    if let Some(path) = snapshot_path {
        snapshot::write_snapshot(index.as_ref(), path)?;
        println!("  saved:     {}", path.display());
    }
    println!("ok");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::minimal(),
    };

    match cli.command {
        Commands::Build {
            source,
            view,
            backend: b,
            snapshot,
        } => {
            let dir = source_dir(source, &cfg)?;
            run_build(&dir, &cfg, backend(b, &cfg)?, view, snapshot.as_deref())?;
        }
        Commands::Query {
            dimension,
            policy,
            selector,
            source,
            backend: b,
            out,
            format,
            stdout,
        } => {
            let format = match format {
                Some(f) => f,
                None => cfg.output.format.parse()?,
            };
            let request = SearchRequest {
                query: Query {
                    dimension,
                    policy,
                    selector,
                },
                source_dir: source_dir(source, &cfg)?,
                backend: backend(b, &cfg)?,
                out_dir: out.or_else(|| cfg.output.dir.clone()),
                format,
                stdout,
            };
            search::run_search(&request, &cfg.source)?;
        }
        Commands::Stats {
            source,
            view,
            backend: b,
        } => {
            let dir = source_dir(source, &cfg)?;
            stats::run_stats(&dir, &cfg.source, backend(b, &cfg)?, view)?;
        }
    }

    Ok(())
}
