pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "dabini",
    about = "Dabini operator CLI",
    long_about = "Inspect Dabini gateway configuration, run readiness checks, and print the slash-command registration payload.",
    after_help = "Examples:\n  dabini doctor --json\n  dabini config\n  dabini commands"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, the webhook public key, and engine reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the slash-command registration payload as JSON")]
    Commands,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Commands => commands::registration::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
