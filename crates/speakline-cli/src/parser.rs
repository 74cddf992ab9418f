//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for speakline.
#[derive(Debug, Parser)]
#[command(name = "speakline")]
#[command(about = "Speak text through a COEIROINK-compatible synthesis engine")]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to <config dir>/speakline/config.json)
    #[arg(long = "config", global = true, env = "SPEAKLINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from(["speakline", "--verbose", "--config", "/tmp/s.json", "ping"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.json")));
        assert!(matches!(cli.command, Some(Commands::Ping)));
    }

    #[test]
    fn test_global_args_after_subcommand() {
        let cli = Cli::parse_from(["speakline", "say", "-v", "hello"]);
        assert!(cli.verbose);
    }
}
