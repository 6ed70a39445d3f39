//! Dataset cache administration CLI
//!
//! Command-line interface for locating, inspecting, verifying and flushing
//! cached dataset snapshots.

use std::error::Error;
use std::process;

use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use dataset_cache::cli::{
    handle_config, handle_invalidate, handle_path, handle_stats, handle_verify, resolve_root, Cli,
    Commands,
};
use dataset_cache::app::VerifyOptions;
use dataset_cache::config::AppConfig;
use dataset_cache::constants::logging;
use dataset_cache::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    let config = AppConfig::load(cli.global.config.clone()).await?;

    init_logging(&cli, &config.logging.level);
    info!("Dataset Cache v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Path(args) => {
            let root = resolve_root(&cli.global, &config)?;
            handle_path(args, root).await
        }
        Commands::Stats { json } => {
            info!("Executing stats command");
            handle_stats(resolve_root(&cli.global, &config)?, json).await
        }
        Commands::Verify {
            namespace,
            dataset,
            prune,
            json,
        } => {
            info!("Executing verify command");
            let options = VerifyOptions {
                namespace,
                dataset_id: dataset,
                prune,
            };
            handle_verify(resolve_root(&cli.global, &config)?, options, json).await
        }
        Commands::Invalidate(args) => {
            info!("Executing invalidate command");
            let root = resolve_root(&cli.global, &config)?;
            handle_invalidate(args, &config, root).await
        }
        Commands::Config(args) => handle_config(args.action, &config).await,
    }
}

/// Initialize logging from CLI verbosity, falling back to the configured level
fn init_logging(cli: &Cli, configured_level: &str) {
    let log_level = cli.log_level(configured_level);

    let mut filter = EnvFilter::from_default_env();
    match format!("{}={}", logging::LOG_TARGET, log_level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring log level '{}': {}", log_level, e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    debug!("Logging initialized at level {}", log_level);
}
