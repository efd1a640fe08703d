//! livereload — static file server that refreshes the browser on change.
//!
//! Usage:
//!   livereload                              # serve ./ on 127.0.0.1:8000, watch *.html *.css *.js
//!   livereload --root ./site --port 5500
//!   livereload -w '**/*.html' -w '**/*.css' --ignore 'drafts/**'

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use livereload::config::{DEFAULT_DEBOUNCE_MS, DEFAULT_HOST, DEFAULT_PORT};
use livereload::watcher::MAX_WINDOW;
use livereload::{ServerConfig, WatchSet};
use tracing_subscriber::EnvFilter;

// ───────────────────── CLI ─────────────────────

#[derive(Parser)]
#[command(name = "livereload", version, about = "Static file server with live reload")]
struct Cli {
    /// Root directory to serve
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Bind port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Bind host
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Glob of files that trigger a reload, relative to the root (can be repeated).
    /// Defaults to *.html, *.css and *.js
    #[arg(short, long = "watch", value_name = "GLOB")]
    watch: Vec<String>,

    /// Glob of files to never reload for (can be repeated)
    #[arg(long, value_name = "GLOB")]
    ignore: Vec<String>,

    /// Coalescing window for rapid changes, in milliseconds
    #[arg(
        long,
        value_name = "MS",
        default_value_t = DEFAULT_DEBOUNCE_MS,
        value_parser = clap::value_parser!(u64).range(0..=MAX_WINDOW.as_millis() as u64)
    )]
    delay: u64,

    /// Reload the whole page on every change (disable CSS hot swap)
    #[arg(long, default_value_t = false)]
    full_reload: bool,

    /// Do not inject the reload script into HTML pages
    #[arg(long, default_value_t = false)]
    no_inject: bool,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

// ───────────────────── Config ─────────────────────

fn build_config(cli: Cli) -> ServerConfig {
    let mut config = ServerConfig {
        root: cli.root,
        ..ServerConfig::default()
    }
    .with_host(cli.host)
    .with_port(cli.port)
    .with_debounce(Duration::from_millis(cli.delay))
    .with_full_reload(cli.full_reload)
    .with_inject(!cli.no_inject)
    .with_ignore(cli.ignore);

    if cli.watch.is_empty() {
        return config;
    }

    // --watch replaces the defaults. Bad patterns are reported and skipped
    config.watches = WatchSet::new();
    for pattern in &cli.watch {
        if let Err(e) = config.register_watch(pattern) {
            tracing::warn!(error = %e, "Ignoring watch pattern");
        }
    }

    config
}

fn init_tracing(verbose: bool) {
    // RUST_LOG wins; otherwise info, or debug with --verbose
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ───────────────────── Main ─────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = build_config(cli);
    livereload::serve(config)
        .await
        .context("Failed to start live-reload server")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_matches_defaults() {
        let cli = Cli::parse_from(["livereload"]);
        let config = build_config(cli);
        assert_eq!(config.root, PathBuf::from("."));
        assert_eq!(config.port, 8000);
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.inject);
        assert_eq!(
            config.watches.patterns().collect::<Vec<_>>(),
            ["*.html", "*.css", "*.js"]
        );
    }

    #[test]
    fn test_custom_watches_replace_defaults() {
        let cli = Cli::parse_from(["livereload", "-w", "**/*.md", "-w", "[bad", "-w", "**/*.md"]);
        let config = build_config(cli);
        assert_eq!(config.watches.patterns().collect::<Vec<_>>(), ["**/*.md"]);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "livereload",
            "--root",
            "site",
            "--port",
            "5500",
            "--delay",
            "300",
            "--full-reload",
            "--no-inject",
        ]);
        let config = build_config(cli);
        assert_eq!(config.root, PathBuf::from("site"));
        assert_eq!(config.port, 5500);
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert!(config.full_reload);
        assert!(!config.inject);
    }

    #[test]
    fn test_delay_is_bounded() {
        assert!(Cli::try_parse_from(["livereload", "--delay", "60000"]).is_ok());
        assert!(Cli::try_parse_from(["livereload", "--delay", "18446744073709551615"]).is_err());
    }
}
