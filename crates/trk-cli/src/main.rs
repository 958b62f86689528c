use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use trk_cli::commands::track::TrackAction;
use trk_cli::commands::{flush, queue, status, track};
use trk_cli::{Cli, Commands, Config};

/// Opens the database without starting a tracker, creating the parent directory.
fn open_database(config: &Config) -> Result<trk_store::Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    trk_store::Database::open(&config.database_path).context("failed to open database")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = io::stdout().lock();
    let action = match &cli.command {
        Some(Commands::Event { name, properties }) => Some(TrackAction::Event {
            name: name.clone(),
            properties: properties.clone(),
        }),
        Some(Commands::Set { properties }) => Some(TrackAction::Set {
            properties: properties.clone(),
        }),
        Some(Commands::Identify { identity }) => Some(TrackAction::Identify {
            identity: identity.clone(),
        }),
        Some(Commands::Alias { first, second }) => Some(TrackAction::Alias {
            first: first.clone(),
            second: second.clone(),
        }),
        Some(Commands::Reset) => Some(TrackAction::Reset),
        Some(Commands::Flush { timeout }) => {
            flush::run(&mut stdout, &config, timeout.map(Duration::from_secs))?;
            None
        }
        Some(Commands::Queue { json }) => {
            let mut db = open_database(&config)?;
            queue::run(&mut stdout, &mut db, *json)?;
            None
        }
        Some(Commands::Status) => {
            let mut db = open_database(&config)?;
            status::run(&mut stdout, &mut db, &config.database_path)?;
            None
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            None
        }
    };

    if let Some(action) = action {
        track::run(&mut stdout, &config, &action)?;
    }

    Ok(())
}
