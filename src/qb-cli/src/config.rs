//! Configuration management for qbs

use anyhow::{Context, Result};
use qb_script::{Charset, ContainerConfig, Endian, NameTable, Platform};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub platform: Option<Platform>,
    pub endian: Option<Endian>,
    /// Characters allowed in script strings; unset means the built-in set
    pub charset: Option<String>,
    /// Global checksum name list
    pub names: Option<PathBuf>,
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("qb-script");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory at {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    /// Container settings, command-line values taking precedence
    pub fn container(&self, platform: Option<Platform>, endian: Option<Endian>) -> ContainerConfig {
        let platform = platform.or(self.platform).unwrap_or(Platform::Pc);
        let mut container = ContainerConfig::for_platform(platform);

        if let Some(endian) = endian.or(self.endian) {
            container = container.with_endian(endian);
        }
        if let Some(chars) = self.charset.as_deref().filter(|c| !c.is_empty()) {
            container = container.with_charset(Charset::new(chars));
        }

        container
    }

    /// Load the configured global name list, if any
    pub fn global_names(&self) -> Result<Option<NameTable>> {
        self.names.as_deref().map(load_names).transpose()
    }
}

/// Read a checksum name list
pub fn load_names(path: &Path) -> Result<NameTable> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read name list {}", path.display()))?;
    let table = NameTable::parse(&text);
    tracing::debug!(path = %path.display(), names = table.len(), "Loaded name list");
    Ok(table)
}
