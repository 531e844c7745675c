//! # cfdi CLI entry point
//!
//! Parses command-line arguments, initializes logging on stderr and
//! dispatches to [`cfdi_cli::commands`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cfdi_cli::commands::{run, Command, Settings};
use cfdi_cli::ledger::DEFAULT_LEDGER;

/// Build, stamp and cancel CFDI 4.0 documents.
#[derive(Parser, Debug)]
#[command(name = "cfdi", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to the ledger file.
    #[arg(long, global = true, default_value = DEFAULT_LEDGER)]
    ledger: PathBuf,

    /// Use the in-process sandbox authority instead of the configured provider.
    #[arg(long, global = true)]
    sandbox: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "cfdi CLI starting");

    let settings = Settings {
        ledger: cli.ledger,
        sandbox: cli.sandbox,
    };

    match run(&cli.command, &settings).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}
