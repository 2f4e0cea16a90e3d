//! trackforge - AI music generation plumbing.
//!
//! Submits generation requests to Suno and Mureka, receives their webhook
//! callbacks into a SQLite library, and plays the results on the default
//! audio device.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod player;
pub mod providers;
#[cfg(test)]
pub mod test_utils;
pub mod webhook;

use clap::{CommandFactory, Parser};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("trackforge=info".parse()?))
        .init();

    if !cli::run_command(&args)? {
        cli::Cli::command().print_help()?;
    }
    Ok(())
}
