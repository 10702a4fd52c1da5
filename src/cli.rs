// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines global flags and the deploy and targets subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shipit::output::OutputMode;

#[derive(Parser)]
#[command(name = "shipit")]
#[command(about = "Deploy to many targets at once, rolling all of them back if one fails")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: shipit.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Environment overlay to apply (defined in config)
    #[arg(short, long, global = true)]
    pub environment: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputMode::Normal, global = true)]
    pub output: OutputMode,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy every configured target
    Deploy {
        /// Version to deploy (default: contents of each target's version file)
        #[arg(long)]
        version: Option<String>,

        /// Image tag for targets that deploy a prebuilt image
        #[arg(long)]
        image_tag: Option<String>,
    },

    /// List configured targets and their shipper kinds
    Targets,
}
