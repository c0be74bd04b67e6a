pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "supportdesk",
    about = "Supportdesk operator CLI",
    long_about = "Inspect configuration, check service readiness, manage the case database, and \
                  evaluate refund eligibility locally.",
    after_help = "Examples:\n  supportdesk doctor --json\n  supportdesk config\n  supportdesk \
                  eligibility --file products.json --today 2026-03-20"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo cases and order lines, then verify them")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database connectivity, and support/refund service health")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Evaluate refund eligibility for a JSON list of delivered products")]
    Eligibility {
        #[arg(long, help = "Path to a JSON array of {product_id, delivery_date, price}")]
        file: PathBuf,
        #[arg(long, help = "Evaluation date as YYYY-MM-DD (defaults to today, UTC)")]
        today: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Eligibility { file, today } => {
            commands::eligibility::run(&file, today.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
