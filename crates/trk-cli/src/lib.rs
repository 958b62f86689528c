//! Tracking client CLI library.
//!
//! This crate provides the `trk` command: queue tracking calls into a local
//! database and deliver them in order.

mod cli;
pub mod commands;
mod config;
pub mod session;

pub use cli::{Cli, Commands};
pub use config::Config;
