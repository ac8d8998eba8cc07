//! framecache CLI - Command-line interface
//!
//! This binary manages the framecache configuration and runs a synthetic
//! multi-viewport viewing session against the library.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;

#[derive(Parser)]
#[command(name = "framecache")]
#[command(version = framecache::VERSION)]
#[command(about = "Frame cache, eviction and prefetch toolkit for multi-frame image viewers", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.framecache/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Run a synthetic viewing session and print cache statistics
    Simulate(SimulateArgs),
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(framecache::config::config_file_path);

    let result = match cli.command {
        Commands::Config { action } => commands::config::run(action, &config_path),
        Commands::Simulate(args) => commands::simulate::run(args, &config_path),
    };

    if let Err(e) = result {
        e.exit();
    }
}
