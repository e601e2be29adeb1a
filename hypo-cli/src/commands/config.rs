//! `hypo config`: inspect the merged configuration and where it comes from.

use anyhow::Result;
use clap::{Args, Subcommand};
use hypo_client::ClientConfig;

use crate::config::{ConfigFlags, ConfigLoader, Location};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// List config layers and the state store, marking missing files
    Path,
}

pub fn run(args: ConfigArgs, flags: &ConfigFlags) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            let config = ConfigLoader::load(flags)?;
            print!("{}", render_config(&config)?);
        }
        ConfigCommands::Path => print!("{}", render_locations(&ConfigLoader::locations())),
    }
    Ok(())
}

fn render_config(config: &ClientConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

fn render_locations(locations: &[Location]) -> String {
    let width = locations.iter().map(|l| l.label.len()).max().unwrap_or(0);
    locations
        .iter()
        .map(|location| {
            let marker = if location.exists() { "" } else { " (missing)" };
            format!(
                "{:<width$}  {}{}\n",
                location.label,
                location.path.display(),
                marker,
                width = width
            )
        })
        .collect()
}
