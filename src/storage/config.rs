use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
}

/// General configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Name of the selection to track (CLIPBOARD, PRIMARY, ...)
    #[serde(default = "default_selection")]
    pub selection: String,

    /// Number of clipboard entries kept in the ring
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Ring directory (default derived from the cache dir and selection)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,

    /// Log level: error, warn, info, debug or trace
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Daily-rotated log file (stderr only when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Make a rotated-to entry the newest history item once it is pasted
    #[serde(default = "default_promote_on_paste")]
    pub promote_on_paste: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            selection: default_selection(),
            capacity: default_capacity(),
            storage_dir: None,
            log_level: default_log_level(),
            log_file: None,
            promote_on_paste: default_promote_on_paste(),
        }
    }
}

impl Config {
    /// Reject values the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.general.capacity == 0 {
            return Err(anyhow!("capacity must be at least 1"));
        }
        if self.general.selection.is_empty() {
            return Err(anyhow!("selection name must not be empty"));
        }
        Ok(())
    }
}

// Default value functions for serde
fn default_selection() -> String {
    "CLIPBOARD".to_string()
}

fn default_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_promote_on_paste() -> bool {
    true
}

/// Trait for configuration storage
pub trait ConfigStorage {
    /// Load configuration from file
    fn load(&self) -> Result<Config>;

    /// Get the config file path
    fn path(&self) -> &PathBuf;

    /// Create default configuration file if it doesn't exist
    fn create_default(&self) -> Result<()>;
}

/// TOML-based implementation of ConfigStorage
pub struct TomlConfigStorage {
    path: PathBuf,
}

impl TomlConfigStorage {
    /// Create a new TomlConfigStorage with the given path
    pub fn new(path: PathBuf) -> Self {
        TomlConfigStorage { path }
    }
}

impl ConfigStorage for TomlConfigStorage {
    fn load(&self) -> Result<Config> {
        // If file doesn't exist, create default and return it
        if !self.path.exists() {
            log::info!(
                "Config file not found at {:?}, creating default configuration",
                self.path
            );
            if let Err(e) = self.create_default() {
                log::warn!("Could not write default configuration: {:#}", e);
            }
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config from {:?}", self.path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", self.path))?;

        log::debug!(
            "Loaded configuration from {:?}: selection={}, capacity={}",
            self.path,
            config.general.selection,
            config.general.capacity
        );

        Ok(config)
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }

    fn create_default(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        // Use the example config compiled into the binary
        let example_config = include_str!("../../xclipring.toml.example");

        fs::write(&self.path, example_config)
            .with_context(|| format!("Failed to create default config at {:?}", self.path))?;

        log::info!("Created default configuration at {:?}", self.path);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = GeneralConfig::default();
        assert_eq!(config.selection, "CLIPBOARD");
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.storage_dir, None);
        assert_eq!(config.log_level, "info");
        assert!(config.promote_on_paste);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let toml_str = r#"
        [general]
        selection = "PRIMARY"
        storage_dir = "/tmp/ring"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.selection, "PRIMARY");
        assert_eq!(config.general.storage_dir, Some(PathBuf::from("/tmp/ring")));
        assert_eq!(config.general.capacity, 1000);
        assert!(config.general.promote_on_paste);
    }

    #[test]
    fn test_zero_capacity_is_invalid() {
        let config: Config = toml::from_str("[general]\ncapacity = 0\n").unwrap();
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_bundled_example_parses() {
        let config: Config = toml::from_str(include_str!("../../xclipring.toml.example")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.general.selection, "CLIPBOARD");
    }

    #[test]
    fn test_missing_file_creates_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("xclipring.toml");
        let storage = TomlConfigStorage::new(path.clone());

        let config = storage.load().unwrap();
        assert_eq!(config.general.capacity, 1000);
        assert!(path.exists());
        assert_eq!(storage.path(), &path);
    }
}
