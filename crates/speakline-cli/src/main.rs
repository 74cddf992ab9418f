//! CLI entry point - the composition root.
//!
//! Settings and infrastructure are wired together via bootstrap; command
//! dispatch routes to handlers.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use speakline_cli::error::exit_code_for;
use speakline_cli::{Cli, CliConfig, Commands, bootstrap, handlers, init_logging};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before reading SPEAKLINE_* overrides
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::from_cli(&cli);

    let Some(command) = cli.command else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap(&config)?;

    match command {
        Commands::Say(args) => handlers::say::execute(&ctx, args).await,
        Commands::Ping => handlers::ping::execute(&ctx).await,
    }
}
