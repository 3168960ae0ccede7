//! Command-line interface.

mod status;

use clap::{Parser, Subcommand};

pub use status::run_status_command;

#[derive(Parser, Debug)]
#[command(name = "sprout", version, about = "Habit garden service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Apply the schema and serve the HTTP gateway (default).
    Serve,
    /// Apply the schema and exit.
    Migrate,
    /// Show configuration and database health.
    Status,
}

impl Cli {
    /// The subcommand to run, defaulting to `serve`.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
