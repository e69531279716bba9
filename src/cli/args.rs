//! CLI argument definitions
//!
//! Global CLI options and configuration merging logic.

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{Config, ConfigColorMode, ConfigSortOrder};

use super::commands::Commands;

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq)]
pub(crate) enum SortOrder {
    /// Oldest first (default)
    #[default]
    Asc,
    /// Newest first
    Desc,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq)]
pub(crate) enum ColorMode {
    /// Auto-detect based on terminal (default)
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Parser)]
#[command(name = "chatstats")]
#[command(about = "Token usage and cost statistics for ChatGPT conversation exports", version)]
pub(crate) struct Cli {
    /// Path to conversations.json from a ChatGPT data export
    #[arg(default_value = "conversations.json")]
    pub(crate) file: PathBuf,

    #[command(subcommand)]
    pub(crate) command: Option<Commands>,

    /// Show per-model breakdown
    #[arg(short, long, global = true)]
    pub(crate) breakdown: bool,

    /// Output as JSON
    #[arg(short, long, global = true)]
    pub(crate) json: bool,

    /// Sort order for results
    #[arg(short, long, global = true, value_enum, default_value = "asc")]
    pub(crate) order: SortOrder,

    /// Color output mode
    #[arg(long, global = true, value_enum, default_value = "auto")]
    pub(crate) color: ColorMode,

    /// Disable colored output (shorthand for --color=never)
    #[arg(long, global = true)]
    pub(crate) no_color: bool,

    /// Estimate tokens with the character heuristic instead of a BPE tokenizer
    #[arg(long, global = true)]
    pub(crate) heuristic: bool,

    /// BPE encoding used for text (o200k_base, cl100k_base)
    #[arg(long, global = true, value_name = "ENCODING")]
    pub(crate) encoding: Option<String>,

    /// Enable debug output (show processing details)
    #[arg(long, global = true)]
    pub(crate) debug: bool,
}

impl Cli {
    /// Merge config file values into CLI (CLI args take precedence)
    pub(crate) fn with_config(mut self, config: &Config) -> Self {
        // Boolean flags: config only applies if CLI left them off
        self.breakdown |= config.breakdown;
        self.no_color |= config.no_color;
        self.heuristic |= config.heuristic;
        self.debug |= config.debug;

        // Enum values: config only applies if CLI is at its default
        if self.order == SortOrder::Asc
            && let Some(ConfigSortOrder::Desc) = config.order
        {
            self.order = SortOrder::Desc;
        }
        if self.color == ColorMode::Auto {
            match config.color {
                Some(ConfigColorMode::Always) => self.color = ColorMode::Always,
                Some(ConfigColorMode::Never) => self.color = ColorMode::Never,
                Some(ConfigColorMode::Auto) | None => {}
            }
        }

        if self.encoding.is_none() {
            self.encoding = config.encoding.clone();
        }

        self
    }

    pub(crate) fn use_color(&self) -> bool {
        if self.no_color {
            return false;
        }
        match self.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("chatstats").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.file, PathBuf::from("conversations.json"));
        assert!(cli.command.is_none());
        assert_eq!(cli.order, SortOrder::Asc);
        assert!(!cli.heuristic);
    }

    #[test]
    fn file_command_and_global_flags() {
        let cli = parse(&["export.json", "models", "-j", "--heuristic", "-o", "desc"]);
        assert_eq!(cli.file, PathBuf::from("export.json"));
        assert!(matches!(cli.command, Some(Commands::Models)));
        assert!(cli.json);
        assert!(cli.heuristic);
        assert_eq!(cli.order, SortOrder::Desc);
    }

    #[test]
    fn config_fills_unset_values_only() {
        let config: Config = toml::from_str(
            r#"
            breakdown = true
            order = "desc"
            color = "never"
            encoding = "cl100k_base"
            "#,
        )
        .unwrap();
        let cli = parse(&["--encoding", "o200k_base"]).with_config(&config);
        assert!(cli.breakdown);
        assert_eq!(cli.order, SortOrder::Desc);
        assert_eq!(cli.color, ColorMode::Never);
        assert_eq!(cli.encoding.as_deref(), Some("o200k_base"));
        assert!(!cli.use_color());
    }

    #[test]
    fn no_color_wins() {
        let cli = parse(&["--color", "always", "--no-color"]);
        assert!(!cli.use_color());
    }
}
