// ABOUTME: Entry point for the shipit CLI application.
// ABOUTME: Parses arguments, initialises tracing, and dispatches to command handlers.

mod cli;
mod commands;

use std::env;

use clap::Parser;
use cli::{Cli, Commands};
use shipit::config::Config;
use shipit::engine::RunOptions;
use shipit::error::Result;
use shipit::output::Output;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(cli.output);
    let result = run(cli, output.clone()).await;

    if let Err(e) = result {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Deploy { version, image_tag } => {
            commands::deploy(config, RunOptions::new(version, image_tag), output).await
        }
        Commands::Targets => commands::targets(&config, &output),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(&env::current_dir()?)?,
    };

    let config = match &cli.environment {
        Some(name) => config.for_environment(name)?,
        None => config,
    };
    config.validate()?;
    Ok(config)
}
