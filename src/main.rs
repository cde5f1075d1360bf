//! Plume - a small static site generator for HTML and Markdown sources.

mod build;
mod cli;
mod config;
mod page;
mod queue;
mod serve;
mod utils;
mod watch;

use anyhow::{Result, bail};
use build::Builder;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use serve::serve_site;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SiteConfig::load(&cli)?;

    match &cli.command {
        Commands::Build { clean } => {
            if *clean {
                build::clean(&config.destination)?;
            }
            let report = Builder::new(&config).build_tree()?;
            if report.failed > 0 {
                bail!("{} file(s) failed to build", report.failed);
            }
            Ok(())
        }
        Commands::Serve { .. } => serve_site(&config, Arc::new(Builder::new(&config))),
        Commands::Clean => build::clean(&config.destination),
    }
}
