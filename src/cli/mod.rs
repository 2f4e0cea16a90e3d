//! Command-line interface for trackforge.
//!
//! Generation, library management, the webhook receiver and
//! playback all run from here.

mod commands;

pub use commands::{Cli, Commands, run_command};
