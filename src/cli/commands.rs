//! CLI command definitions

use crate::core::ExecutionMode;
use clap::Args;

/// Run the dispatches declared in a script
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to script YAML file
    #[arg(short, long)]
    pub file: String,

    /// Execution mode forced on every dispatch
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Only run dispatches of this action
    #[arg(long)]
    pub action: Option<String>,

    /// Output results in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate a script
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to script YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List actions declared in a script
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Path to script YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Execution mode argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    Sequential,
    Parallel,
    Race,
}

impl From<ModeArg> for ExecutionMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Sequential => ExecutionMode::Sequential,
            ModeArg::Parallel => ExecutionMode::Parallel,
            ModeArg::Race => ExecutionMode::Race,
        }
    }
}
