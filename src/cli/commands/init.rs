//! Initialize command.

use std::path::{Path, PathBuf};

use console::style;

use crate::cli::helpers::open_store;
use crate::config::{Config, DEFAULT_CONFIG_FILE};

/// Create the database schema, and a default config file when none is in use.
pub fn cmd_init(config: &Config, config_path: Option<&Path>) -> anyhow::Result<()> {
    let store = open_store(config)?;
    println!(
        "{} Database ready at {}",
        style("✓").green(),
        store.path().display()
    );

    if config_path.is_none() {
        let path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if path.exists() {
            println!("  Using existing {}", path.display());
        } else {
            std::fs::write(&path, toml::to_string_pretty(config)?)?;
            println!("  {} Wrote default config to {}", style("✓").green(), path.display());
        }
    }

    Ok(())
}
