//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{ListCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Run scripted action dispatches against the dispatch engine
#[derive(Debug, Parser, Clone)]
#[command(name = "actionpipe")]
#[command(author = "Actionpipe Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Priority-ordered action dispatch runner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print every lifecycle event while dispatching
    #[arg(short, long, global = true)]
    pub events: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the dispatches declared in a script
    Run(RunCommand),

    /// Validate a script
    Validate(ValidateCommand),

    /// List actions and their handlers in dispatch order
    List(ListCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
