//! CLI argument parsing for the contact-import-worker binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "contact-import-worker", about = "Contact CSV import worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
}
