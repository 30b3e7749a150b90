//! idman: cloud identity administration toolkit.

mod cli;
mod commands;
mod context;
mod directory;
mod prompt;

use clap::Parser;
use std::process::ExitCode;

use cli::{Cli, Command};
use context::CommandContext;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("  suggestion: {}", error.recovery_suggestion());
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> idman_core::errors::IdmanResult<u8> {
    let ctx = CommandContext::build(cli.config.clone(), cli.profile.as_deref())?;
    match cli.command {
        Command::Bulk(command) => commands::bulk::run(&ctx, command).await,
        Command::Templates(command) => commands::templates::run(&ctx, command).await,
        Command::Backup(command) => commands::backup::run(&ctx, command).await,
        Command::Restore(command) => commands::restore::run(&ctx, command).await,
        Command::Retention(command) => commands::retention::run(&ctx, command).await,
        Command::Export(args) => commands::export::run_export(&ctx, args).await,
        Command::Import(args) => commands::export::run_import(&ctx, args).await,
    }
}
