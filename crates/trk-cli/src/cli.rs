//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Durable event tracking from the shell.
///
/// Tracking commands are queued in a local database and delivered in order
/// whenever the network allows.
#[derive(Debug, Parser)]
#[command(name = "trk", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record an event.
    Event {
        /// Event name.
        name: String,

        /// Event property as KEY=VALUE (repeatable).
        #[arg(short = 'p', long = "property", value_parser = parse_property)]
        properties: Vec<(String, String)>,
    },

    /// Set properties on the current identity.
    Set {
        /// Properties as KEY=VALUE.
        #[arg(required = true, value_parser = parse_property)]
        properties: Vec<(String, String)>,
    },

    /// Link the current identity to a new one and switch to it.
    Identify {
        /// The new identity (e.g. an email address).
        identity: String,
    },

    /// Link two identities without switching.
    Alias {
        /// First identity.
        first: String,

        /// Second identity.
        second: String,
    },

    /// Replace the current identity with a fresh anonymous one.
    Reset,

    /// Deliver pending requests.
    Flush {
        /// Seconds to wait for the queue to drain (defaults to config).
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// List pending requests.
    Queue {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show identity, device profile and queue size.
    Status,
}

/// Parses `KEY=VALUE`. The value may be empty and may contain `=`.
pub fn parse_property(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("property name cannot be empty in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
