// src/main.rs
use std::process::exit;
use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

use social_finder::cli::{execute_command, Args, Commands};
use social_finder::config::Config;
use social_finder::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // `init` must work even when the existing configuration is broken
    let config = match &args.command {
        Commands::Init { .. } => Config::default(),
        _ => match Config::load(args.config.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                init_logging(args.verbose, "info");
                error!("Failed to load configuration: {}", e);
                exit(1);
            }
        },
    };

    init_logging(args.verbose, &config.global.log_level);
    debug!("Starting social-finder v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = execute_command(&args.command, &config).await {
        error!("{:#}", e);
        exit(1);
    }

    Ok(())
}
