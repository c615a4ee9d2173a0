/// Macrofetch - Main Entry Point
///
/// Downloads every macro image from a Phabricator instance into a local
/// directory, several requests at a time.
use clap::Parser;
use macrofetch::config::parse_error_cause;
use macrofetch::{Cli, Config};
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("macrofetch={level},macrofetch_shared={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(e) if !e.use_stderr() => {
            let _ = e.print();
            process::exit(0);
        }
        Err(e) => {
            println!("Failed to get config: {}", parse_error_cause(&e));
            process::exit(1);
        }
    };

    let config = match Config::try_from(cli) {
        Ok(config) => config,
        Err(e) => {
            println!("Failed to get config: {}", e);
            process::exit(1);
        }
    };

    init_tracing(config.verbose);

    info!(
        host = %config.host,
        dir = %config.dir.display(),
        workers = config.workers,
        "Starting macro download"
    );

    match macrofetch::run(&config).await {
        Ok(Ok(report)) => {
            print!("{}", report);
            process::exit(report.exit_code());
        }
        Ok(Err(fatal)) => {
            println!("{}", fatal);
            process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "Setup failed");
            println!("{:#}", e);
            process::exit(1);
        }
    }
}
