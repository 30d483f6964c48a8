//! CLI command implementations.

pub mod check;
pub mod run;

use anyhow::{Context, Result};
use dcs_feeder_sync::Config;
use std::path::Path;

/// Configuration file picked up from the working directory.
const DEFAULT_CONFIG_FILE: &str = "feeder.toml";

/// Load the configuration.
///
/// An explicit path must exist. Without one, `./feeder.toml` is used when
/// present and built-in defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                return Ok(Config::default());
            }
            default
        }
    };

    let config = Config::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}
