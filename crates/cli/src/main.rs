//! psmctl - power shelf firmware diagnostic CLI
//!
//! Drives the firmware manager in-process against a single PMC: print the
//! artifact repositories, check whether an upgrade is allowed, or perform one.

#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use powershelf_service::{LoggingConfig, init_logging};

use crate::commands::FwArgs;
use crate::error::{category_of, exit_code};

#[derive(Parser, Debug)]
#[command(name = "psmctl")]
#[command(about = "Power shelf firmware diagnostics")]
#[command(long_about = "
psmctl talks to a power management controller directly, without psmd.
With the in-memory datastore an upgrade is queued, pushed and checked once
before the command returns. With the persistent datastore it is only queued.

Use --json for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output in JSON format for machine parsing
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// PMC firmware summary, upgrade check and upgrade
    Fw(FwArgs),
}

async fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Fw(args) => commands::firmware::execute(args, cli.json).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig::from_verbosity(tracing::Level::WARN, cli.verbose);
    if let Err(e) = init_logging(logging) {
        eprintln!("failed to initialize logging: {e}");
    }

    match execute_command(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let category = category_of(&e);
            if cli.json {
                output::print_error_json(&e, category);
            } else {
                output::print_error_human(&e);
            }
            ExitCode::from(exit_code(category))
        }
    }
}
