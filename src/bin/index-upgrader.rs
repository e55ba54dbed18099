//! Command line wrapper around the index upgrader.
//!
//! - index-upgrader detect <dir>
//! - index-upgrader upgrade <dir> [--config <file>]

use std::path::PathBuf;
use std::process::ExitCode;
use clap::{Parser, Subcommand};
use index_upgrader::logging::init_logger;
use index_upgrader::{UpgradeConfig, UpgradeError, detect, upgrade_with_config};

/// Upgrades legacy full-text indexes to the current on-disk format
#[derive(Parser, Debug)]
#[command(name = "index-upgrader")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the format generation of an index
    Detect {
        /// Index directory
        dir: PathBuf,
    },

    /// Upgrade an index in place to the current generation
    Upgrade {
        /// Index directory
        dir: PathBuf,

        /// JSON file with upgrade settings
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn run(cli: Cli) -> Result<(), UpgradeError> {
    match cli.command {
        Command::Detect { dir } => {
            let generation = detect(&dir)?;
            println!("{}", generation);
        }
        Command::Upgrade { dir, config } => {
            let config = match config {
                Some(path) => UpgradeConfig::from_json_file(&path).map_err(|e| UpgradeError::new(None, e))?,
                None => UpgradeConfig::default(),
            };
            let before = detect(&dir)?;
            let after = upgrade_with_config(&dir, config)?;
            if before == after {
                println!("{}: already at {}", dir.display(), after);
            } else {
                println!("{}: upgraded {} -> {}", dir.display(), before, after);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
