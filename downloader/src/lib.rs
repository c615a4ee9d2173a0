//! Macrofetch - download every Phabricator macro image into a directory.
//!
//! Wires the Conduit [`MacroSource`](macrofetch_shared::MacroSource) and the
//! filesystem [`Sink`](macrofetch_shared::Sink) into the shared pipeline.

pub mod conduit;
pub mod config;
pub mod fs_sink;

pub use conduit::ConduitSource;
pub use config::{Cli, Config, ConfigError, FetchMode};
pub use fs_sink::FsSink;

use anyhow::Context;
use macrofetch_shared::{Orchestrator, Report, RunError};
use std::sync::Arc;

/// Run the whole download for a validated configuration.
pub async fn run(config: &Config) -> anyhow::Result<Result<Report, RunError>> {
    let source = ConduitSource::new(&config.host, &config.api_key, config.fetch_mode)
        .context("failed to build HTTP client")?;
    let sink = FsSink::new(&config.dir);

    let outcome = Orchestrator::new(Arc::new(source), sink, config.workers)
        .with_progress(config.show_progress)
        .run()
        .await;
    Ok(outcome)
}
