pub use kf_core::config::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .check()
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    for warning in config.validate() {
        tracing::warn!("{}: {}", path.display(), warning);
    }

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./kwzforge.toml",
        "./config.toml",
        "~/.config/kwzforge/config.toml",
        "/etc/kwzforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {}", path.display());
            return load_config(path);
        }
    }

    Ok(Config::default())
}
