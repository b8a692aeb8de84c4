//! Synctide — scheduled rclone sync runner.
//!
//! # Usage
//!
//! ```text
//! synctide                 # run all configured tasks (terminal flags)
//! synctide run --service   # run with the background flag layer
//! synctide install         # register the recurring trigger
//! synctide uninstall       # remove the recurring trigger
//! synctide status          # show trigger schedule and recent log lines
//! ```

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(
    name = "synctide",
    version,
    about = "Run configured rclone sync jobs on a recurring schedule",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute all configured, non-disabled sync tasks once.
    Run(RunArgs),

    /// Register the recurring background trigger with the host scheduler.
    Install,

    /// Remove the recurring background trigger.
    Uninstall,

    /// Show the trigger schedule and recent run output.
    Status,
}

fn main() -> Result<()> {
    match Cli::parse().command {
        None => RunArgs::default().run(),
        Some(Commands::Run(args)) => args.run(),
        Some(Commands::Install) => commands::service::install(),
        Some(Commands::Uninstall) => commands::service::uninstall(),
        Some(Commands::Status) => commands::service::status(),
    }
}
