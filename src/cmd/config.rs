//! Inspect and seed the TOML configuration.

use crate::config::{Config, ConfigManager};
use crate::error::{Rep365Error, Result};
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

pub fn show() -> Result<()> {
    let manager = ConfigManager::load()?;
    let config = manager.load_config()?;

    println!("{} {}", "Config file:".cyan().bold(), manager.config_file().display());
    if !manager.config_file().exists() {
        println!("  (not present — showing built-in defaults)");
    }
    println!();

    let rendered = toml::to_string_pretty(&config)
        .map_err(|e| Rep365Error::ConfigError(format!("Failed to render config: {}", e)))?;
    print!("{}", rendered);

    Ok(())
}

pub fn init(args: InitArgs) -> Result<()> {
    let manager = ConfigManager::load()?;
    let path = manager.config_file();

    if path.exists() && !args.force {
        return Err(Rep365Error::ConfigError(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    manager.save_config(&Config::default())?;
    println!(
        "{} Wrote default configuration to {}",
        "✓".green().bold(),
        path.display()
    );
    println!(
        "  → Set the bearer token in the {} environment variable",
        Config::default().api.token_env.cyan()
    );

    Ok(())
}
