use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod backends;
mod config;
mod dispatch;
mod operator;
mod render;
mod report;

#[derive(Parser, Debug)]
#[command(name = "exthub")]
#[command(about = "Manage extension instances and update them to new sources", long_about = None)]
struct Cli {
    /// State directory (default: $EXTHUB_HOME, else ~/.exthub).
    #[arg(long, global = true)]
    state_root: Option<PathBuf>,
    #[arg(long, global = true)]
    registry_root: Option<PathBuf>,
    #[arg(long, global = true)]
    project: Option<String>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Accept confirmations and take suggested parameter values without asking.
    #[arg(long, global = true)]
    non_interactive: bool,
    #[arg(long, global = true)]
    plain: bool,
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Enable updating from local directories and URLs.
    #[arg(long, global = true)]
    extdev: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Update an instance to the latest official version, or to a local directory or URL.
    Update {
        instance_id: String,
        source: Option<String>,
    },
    /// List the instances of the selected project.
    Instances,
    Info {
        instance_id: String,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch::run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("EXTHUB_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests;
