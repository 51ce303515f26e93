pub mod config;
pub mod entries;

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

pub use config::{Config, ConfigStorage, GeneralConfig, TomlConfigStorage};
pub use entries::{DirectoryStorage, EntryStorage, StoredEntry};

/// Resolve an XDG base directory, falling back to a path under $HOME
fn xdg_dir(var: &str, home_fallback: &str) -> Result<PathBuf> {
    if let Ok(dir) = env::var(var)
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }

    let home = env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(home_fallback))
}

/// Default ring directory for a selection
///
/// XDG Base Directory Specification:
/// - Cache: $XDG_CACHE_HOME/xclipring/<selection> (default: ~/.cache/xclipring/<selection>)
pub fn default_storage_dir(selection: &str) -> Result<PathBuf> {
    let dir = xdg_dir("XDG_CACHE_HOME", ".cache")?
        .join("xclipring")
        .join(selection);
    log::debug!("Default storage directory for {}: {:?}", selection, dir);
    Ok(dir)
}

/// Default configuration file path
///
/// - Config: $XDG_CONFIG_HOME/xclipring/xclipring.toml (default: ~/.config/xclipring/xclipring.toml)
pub fn default_config_path() -> Result<PathBuf> {
    Ok(xdg_dir("XDG_CONFIG_HOME", ".config")?
        .join("xclipring")
        .join("xclipring.toml"))
}
