pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "voicedesk",
    about = "Voicedesk operator CLI",
    long_about = "Apply migrations, inspect configuration, and reconcile the default agent.",
    after_help = "Examples:\n  voicedesk migrate\n  voicedesk config\n  voicedesk sync-default-agent"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(
        about = "Create or sync the default agent from the voice server config document",
        long_about = "Runs the same reconciliation the server performs at startup and reports \
                      the outcome as JSON."
    )]
    SyncDefaultAgent,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::CommandResult { exit_code: 0, output: commands::config::run() },
        Command::SyncDefaultAgent => commands::sync_default_agent::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
