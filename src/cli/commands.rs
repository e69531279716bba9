//! CLI subcommand definitions

use clap::Subcommand;

/// Main CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub(crate) enum Commands {
    /// Show daily usage (default)
    Daily,
    /// Show usage by hour of day, summed across all days
    Hourly,
    /// Show per-model totals
    Models,
    /// Show a one-block overview of the export
    Summary,
}

/// Resolve the command to run, defaulting to daily
pub(crate) fn parse_command(cmd: Option<Commands>) -> Commands {
    cmd.unwrap_or(Commands::Daily)
}
