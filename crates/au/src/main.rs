//! au - dictionary-encoded binary records for log pipelines
//!
//! # Usage
//!
//! ```bash
//! # Decode to JSON lines
//! au cat events.au
//!
//! # Search by key and timestamp interval, with context
//! au grep -k logTime -t 2024-01-01T00:00:00,2024-01-02T00:00:00 events.au
//! au grep -u 42 -B 2 -A 2 events.au
//!
//! # Binary-search a sorted file instead of scanning it
//! au grep -b -k logTime -t 2024-01-01T00:00:00 events.au
//!
//! # Follow a growing file
//! au tail events.au
//!
//! # Convert line-delimited JSON
//! au json2au events.json events.au
//! ```

mod cmd;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit code for bad command-line arguments
const EXIT_USAGE: u8 = 1;
/// Exit code for I/O and parse failures
const EXIT_ERROR: u8 = 2;

/// Dictionary-encoded binary records for log pipelines
#[derive(Parser, Debug)]
#[command(name = "au")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode au files to JSON lines
    Cat(cmd::cat::CatArgs),

    /// Search au files for matching records
    Grep(cmd::grep::GrepArgs),

    /// Report stream statistics
    Stats(cmd::stats::StatsArgs),

    /// Follow a growing au file, emitting new records as JSON
    Tail(cmd::tail::TailArgs),

    /// Convert line-delimited JSON to au
    Json2au(cmd::json2au::Json2AuArgs),
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("{e}");
        return ExitCode::from(EXIT_USAGE);
    }

    let result = match cli.command {
        Command::Cat(args) => cmd::cat::run(args),
        Command::Grep(args) => cmd::grep::run(args),
        Command::Stats(args) => cmd::stats::run(args),
        Command::Tail(args) => cmd::tail::run(args),
        Command::Json2au(args) => cmd::json2au::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Initialize the tracing subscriber; logs go to stderr so stdout stays
/// clean for decoded output
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}
