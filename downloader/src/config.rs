//! Command-line and environment configuration.
//!
//! Every flag can also be supplied through a `MACROFETCH_*` environment
//! variable; a `.env` file is loaded before parsing.

use clap::{Parser, ValueEnum};
use macrofetch_shared::DEFAULT_WORKERS;
use std::path::PathBuf;
use thiserror::Error;

/// How a macro's image is located on the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FetchMode {
    /// Look the file up by PHID through `file.download` (base64 payload).
    #[default]
    File,
    /// GET the macro's direct URI and take the body as-is.
    Uri,
}

/// Raw command line.
#[derive(Debug, Parser)]
#[command(name = "macrofetch", version, about = "Download every macro image from a Phabricator instance")]
pub struct Cli {
    /// Base URL of the Phabricator instance
    #[arg(long, env = "MACROFETCH_HOST")]
    pub host: Option<String>,

    /// Conduit API token
    #[arg(long, env = "MACROFETCH_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Output directory for the macro images
    #[arg(long, env = "MACROFETCH_DIR")]
    pub dir: Option<PathBuf>,

    /// Number of HTTP requests to have in flight concurrently
    #[arg(long, env = "MACROFETCH_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// How to download each macro's image
    #[arg(long, env = "MACROFETCH_FETCH_MODE", value_enum, default_value_t = FetchMode::File)]
    pub fetch_mode: FetchMode,

    /// Do not draw a progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("please specify a Phabricator host with the --host flag")]
    MissingHost,

    #[error("please specify an API key with the --key flag")]
    MissingKey,

    #[error("please specify an output directory with the --dir flag")]
    MissingDir,

    #[error("host must start with http:// or https://, got {0:?}")]
    InvalidHost(String),

    #[error("worker count must be a positive integer, got {0}")]
    InvalidWorkers(usize),
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub api_key: String,
    pub dir: PathBuf,
    pub workers: usize,
    pub fetch_mode: FetchMode,
    pub show_progress: bool,
    pub verbose: bool,
}

impl TryFrom<Cli> for Config {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let host = non_empty(cli.host).ok_or(ConfigError::MissingHost)?;
        let api_key = non_empty(cli.key).ok_or(ConfigError::MissingKey)?;
        let dir = cli
            .dir
            .filter(|d| !d.as_os_str().is_empty())
            .ok_or(ConfigError::MissingDir)?;

        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(ConfigError::InvalidHost(host));
        }
        if cli.workers == 0 {
            return Err(ConfigError::InvalidWorkers(cli.workers));
        }

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            api_key,
            dir,
            workers: cli.workers,
            fetch_mode: cli.fetch_mode,
            show_progress: !cli.no_progress,
            verbose: cli.verbose,
        })
    }
}

/// One-line cause for a command-line parse failure, without clap's
/// `error:` prefix and usage footer.
pub fn parse_error_cause(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default().trim();
    first.strip_prefix("error:").unwrap_or(first).trim().to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
