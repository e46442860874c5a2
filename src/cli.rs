//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strictly Avalon - five-player hidden-role game server with LLM opponents
#[derive(Parser, Debug)]
#[command(name = "strictly_avalon")]
#[command(about = "Hidden-role mission game against language-model players", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP game server
    Http {
        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Play automated seats at random instead of calling a language model
        #[arg(long)]
        offline: bool,
    },
}
