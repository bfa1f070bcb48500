//! mpa - multi-page dev server with virtual HTML entries.

mod build;
mod cli;
mod config;
mod logger;
mod minify;
mod registry;
mod render;
mod rewrite;
mod server;
mod utils;
mod watch;

use anyhow::{Result, bail};
use build::build_pages;
use clap::Parser;
use cli::{Cli, Commands};
use config::AppConfig;
use server::{preview_pages, serve_pages};
use std::path::Path;

fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    let config: &'static AppConfig = Box::leak(Box::new(load_config(cli)?));

    match &cli.command {
        Commands::Build { .. } => build_pages(config),
        Commands::Serve { .. } => serve_pages(config),
        Commands::Preview { .. } => preview_pages(config),
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &'static Cli) -> Result<AppConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    if !config_path.exists() {
        bail!("Config file not found at {}.", config_path.display());
    }

    let mut config = AppConfig::from_path(&config_path)?;
    config.update_with_cli(cli);
    config.validate()?;

    Ok(config)
}
