use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{LevelFilter, info};
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use shopmcp::config::Config;
use shopmcp::server::ToolServer;

/// Log to `<data dir>/shopmcp/logs/<mode>.log`, or stderr when that is not
/// writable. Never stdout: in `serve` mode stdout is the protocol channel.
fn setup_logging(mode: &str) -> Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        // Narrowed later from config via log::set_max_level
        builder.filter_level(LevelFilter::Trace);
    }

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shopmcp")
        .join("logs");
    let log_file = log_dir.join(format!("{}.log", mode));

    let opened = fs::create_dir_all(&log_dir).and_then(|_| {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
    });

    match opened {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file))).init();
            info!("Logging initialized, writing to: {}", log_file.display());
        }
        Err(e) => {
            builder.target(env_logger::Target::Stderr).init();
            info!("Logging to stderr, cannot open {}: {}", log_file.display(), e);
        }
    }
    Ok(())
}

fn apply_log_level(cli: &Cli, config: &Config) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let level = if cli.is_verbose() {
        LevelFilter::Debug
    } else {
        config
            .log_level
            .as_deref()
            .and_then(|l| l.parse().ok())
            .unwrap_or(LevelFilter::Info)
    };
    log::set_max_level(level);
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    match &cli.command {
        Some(Commands::Serve) => {
            let server = ToolServer::from_config(config);
            let stats = server.serve_stdio().await.context("Tool server failed")?;
            info!("Served {} requests", stats.requests);
            Ok(())
        }
        _ => {
            if cli.is_verbose() {
                println!("{}", "Verbose mode enabled".yellow());
            }
            cli::session::run(cli, config).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging first
    setup_logging(cli.mode()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    apply_log_level(&cli, &config);

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
