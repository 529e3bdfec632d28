//! Route Planner - orders a day's visits around opening hours
//!
//! Reads a list of stops, geocodes them, sequences them from the depot and
//! keeps the resulting itinerary in a local JSON file.

mod cli;
mod commands;
mod config;
mod defaults;
mod services;
mod types;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::services::storage::JsonFileRepository;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ./logs
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "route-planner.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // stdout carries command output, so the console layer writes to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,route_planner=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let config = config::Config::from_env()?;
    debug!("Configuration loaded: {:?}", config);

    let repo = JsonFileRepository::new(&config.store_path);
    debug!("Itinerary store: {}", repo.path().display());

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current lookup");
                cancel.cancel();
            }
        })
    };

    let result = commands::run(cli.command, &config, &repo, cancel).await;
    interrupt.abort();

    match result {
        Ok(output) => {
            print!("{}", output);
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}
