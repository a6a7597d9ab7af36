//! Log output for the `trk` binary.
//!
//! Everything is written to stderr so `--stdout` exports stay clean. The
//! filter comes from the first usable source of `TERMRANK_LOG`, `RUST_LOG`,
//! or the `-v`/`-q` flags.

use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TERMRANK_LOG";

/// Filter directives used when no environment variable applies.
pub fn flag_directives(verbose: bool, quiet: bool) -> &'static str {
    match (verbose, quiet) {
        (true, _) => "debug",
        (false, true) => "error",
        (false, false) => "info",
    }
}

/// Pick the filter from the environment values, skipping any that fail to
/// parse, and fall back to the flags.
pub fn resolve_filter(
    termrank_log: Option<&str>,
    rust_log: Option<&str>,
    verbose: bool,
    quiet: bool,
) -> EnvFilter {
    [termrank_log, rust_log]
        .into_iter()
        .flatten()
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(flag_directives(verbose, quiet)))
}

/// Install the global subscriber. Call once, first thing in `main`.
pub fn init(verbose: bool, quiet: bool) {
    let termrank_log = std::env::var(LOG_ENV).ok();
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = resolve_filter(termrank_log.as_deref(), rust_log.as_deref(), verbose, quiet);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_target(verbose)
        .without_time()
        .compact()
        .init();
}
