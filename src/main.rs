//! gate-site - a static site builder for the gate landing pages.

mod assets;
mod build;
mod cli;
mod config;
mod data;
mod logger;
mod render;
mod serve;
mod watch;

use anyhow::Result;
use build::build_site;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use serve::serve_site;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config: &'static SiteConfig = Box::leak(Box::new(load_config(&cli)?));

    match &cli.command {
        Commands::Build => build_site(config).map(|_| ()),
        Commands::Serve { .. } => {
            build_site(config)?;
            serve_site(config)
        }
    }
}

/// Load the optional config file and apply CLI overrides.
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = SiteConfig::expand_tilde(root).join(&cli.config);

    let mut config = if config_path.exists() {
        SiteConfig::from_path(&config_path)?
    } else {
        SiteConfig::default()
    };
    config.update_with_cli(cli);
    config.validate()?;

    if config.config_path.exists() {
        crate::log!("config"; "using {}", config.config_path.display());
    }

    Ok(config)
}
