//! partkit CLI - Command-line utility for OOXML package manifests, batch
//! edits and rule validation.

mod cli;
mod commands;
mod error;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let formatter = output::create_formatter(cli.json, cli.verbose, cli.quiet);

    match &cli.command {
        cli::Commands::Unwrap(args) => commands::unwrap::execute(&cli, args, &*formatter),
        cli::Commands::Rewrap(args) => commands::rewrap::execute(&cli, args, &*formatter),
        cli::Commands::Process(args) => commands::process::execute(&cli, args, &*formatter),
        cli::Commands::Validate(args) => commands::validate::execute(args, &*formatter),
        cli::Commands::Session { command } => {
            commands::session::execute(&cli, command, &*formatter)
        }
        cli::Commands::Completion { shell } => {
            commands::completion::execute(*shell);
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays clean for manifests and JSON output.
fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("partkit_core={level},partkit={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
