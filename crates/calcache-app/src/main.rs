mod commands;

use std::path::PathBuf;

use anyhow::Context;
use calcache_core::config::load_config;
use calcache_db::CalCache;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "calcache")]
#[command(about = "Inspect and fill a calendar component cache")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store every timezone and component of one or more .ics files
    Import { files: Vec<PathBuf> },
    /// List components occurring between two UTC times (YYYYMMDDTHHMMSSZ or YYYY-MM-DD)
    Range { start: String, end: String },
    /// Print the stored text of a component, or of every component with a UID
    Get { uid: String, rid: Option<String> },
    /// List stored timezone ids
    Timezones,
    /// Remove one stored component
    Remove { uid: String, rid: Option<String> },
}

fn main() -> anyhow::Result<()> {
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    let cli = Cli::parse();

    let config = load_config()?;
    tracing::debug!(config = ?config, "Configuration loaded");

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping debug");
    }

    let cache = CalCache::open_with_config(&config.cache)
        .with_context(|| format!("opening cache at {}", config.cache.path.display()))?;

    match cli.command {
        Command::Import { files } => commands::import(&cache, &files),
        Command::Range { start, end } => commands::range(&cache, &start, &end),
        Command::Get { uid, rid } => commands::get(&cache, &uid, rid.as_deref()),
        Command::Timezones => commands::timezones(&cache),
        Command::Remove { uid, rid } => commands::remove(&cache, &uid, rid.as_deref()),
    }
}
