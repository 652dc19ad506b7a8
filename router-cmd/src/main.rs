mod check;
mod replay;

use std::io::stderr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uav_router::config::{self, LoggingConfig, RouterConfig};

const LOG_ENV: &str = "UAV_ROUTER_LOG";

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a route configuration.
    ///
    /// Prints every route that survived parsing. Routes with errors are logged
    /// and left out.
    Check {
        /// Configuration file.
        config: PathBuf,

        /// Also compile and summarize the graph of this source endpoint. May be
        /// given more than once.
        #[arg(short, long, value_name = "name")]
        source: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: check::Format,
    },
    /// Route recorded input through a configuration offline.
    ///
    /// Input files are written to the graph of --source as if they were read from
    /// that endpoint. Outputs named in `endpoints.file` are written to their files,
    /// every other output is discarded. Filter counters are printed as JSON when done.
    Replay {
        /// Configuration file.
        config: PathBuf,

        /// Endpoint the input is read from.
        #[arg(short, long, value_name = "name")]
        source: String,

        /// Bytes per write.
        #[arg(short, long, default_value_t = 4096, value_parser = clap::value_parser!(u32).range(1..))]
        chunk: u32,

        /// Write these outputs to stdout. May be given more than once.
        #[arg(short, long, value_name = "name")]
        print: Vec<String>,

        /// Input files, replayed in order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

impl Commands {
    fn config(&self) -> &Path {
        match self {
            Commands::Check { config, .. } | Commands::Replay { config, .. } => config,
        }
    }
}

/// Directives of a `logging` section, with `info` as the default level unless the
/// section sets one.
fn log_directives(logging: &LoggingConfig) -> String {
    let mut directives = logging.directives();
    if !directives.iter().any(|d| !d.contains('=')) {
        directives.insert(0, "info".to_string());
    }
    directives.join(",")
}

fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(log_directives(logging)))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Load a configuration, installing the log subscriber before its routes are parsed.
fn load(path: &Path) -> Result<RouterConfig> {
    let doc = config::load_document(path)
        .with_context(|| format!("failed to read config {path:?}"))?;
    let logging = match doc.get("logging") {
        Some(section) => LoggingConfig::from_value(section).context("invalid logging section")?,
        None => LoggingConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(env_filter(&logging))
        .init();
    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    RouterConfig::from_value(&doc).with_context(|| format!("invalid config {path:?}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load(cli.command.config())?;

    match &cli.command {
        Commands::Check { source, format, .. } => check::check(&cfg, source, format),
        Commands::Replay {
            source,
            chunk,
            print,
            inputs,
            ..
        } => replay::replay(&cfg, source, *chunk as usize, print, inputs),
    }
}
