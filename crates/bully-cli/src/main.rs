mod cli;
mod commands;
mod terminal;

use clap::Parser;
use colored::*;
use std::process;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red(), e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = commands::load_config(&cli)?;

    match cli.command.clone().unwrap_or(Commands::Watch { no_clear: false }) {
        Commands::Watch { no_clear } => commands::watch(config, !no_clear).await,
        Commands::Status => commands::status(config).await,
        Commands::Config(config_cmd) => commands::handle_config_command(config_cmd, &config),
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    if quiet {
        return; // No logging in quiet mode
    }

    let level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the dashboard frames
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
