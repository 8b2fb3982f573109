//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting qbs defaults.

use crate::config::Config;
use anyhow::{Context, Result};
use qb_script::{Endian, Platform};
use std::path::PathBuf;

/// Settings requested on the command line
#[derive(Debug, Default)]
pub struct Changes {
    pub platform: Option<Platform>,
    pub endian: Option<Endian>,
    pub charset: Option<String>,
    pub names: Option<PathBuf>,
}

impl Changes {
    fn is_empty(&self) -> bool {
        self.platform.is_none()
            && self.endian.is_none()
            && self.charset.is_none()
            && self.names.is_none()
    }
}

/// Handle the configure command
///
/// # Arguments
/// * `config` - Currently stored configuration
/// * `changes` - Settings to store
/// * `show` - If true, show current configuration
pub fn handle(mut config: Config, changes: Changes, show: bool) -> Result<()> {
    if show {
        show_config(&config);
        return Ok(());
    }

    if changes.is_empty() {
        show_usage();
        return Ok(());
    }

    apply(&mut config, changes)?;
    config.save()?;

    if let Ok(path) = Config::config_path() {
        println!("Config saved to: {}", path.display());
    }

    Ok(())
}

/// Merge requested settings into `config`
fn apply(config: &mut Config, changes: Changes) -> Result<()> {
    if let Some(platform) = changes.platform {
        config.platform = Some(platform);
        println!("Platform: {}", platform);
    }

    if let Some(endian) = changes.endian {
        config.endian = Some(endian);
        println!("Byte order: {:?}", endian);
    }

    if let Some(chars) = changes.charset {
        if chars.is_empty() {
            config.charset = None;
            println!("String charset: default");
        } else {
            println!("String charset: {} characters", chars.chars().count());
            config.charset = Some(chars);
        }
    }

    if let Some(names) = changes.names {
        let names = names
            .canonicalize()
            .with_context(|| format!("Name list {} not found", names.display()))?;
        println!("Name list: {}", names.display());
        config.names = Some(names);
    }

    Ok(())
}

/// Display current configuration
fn show_config(config: &Config) {
    match config.platform {
        Some(platform) => println!("Platform: {}", platform),
        None => println!("Platform: pc (default)"),
    }

    match config.endian {
        Some(endian) => println!("Byte order: {:?}", endian),
        None => println!("Byte order: platform default"),
    }

    match config.charset.as_deref() {
        Some(chars) => println!("String charset: {}", chars),
        None => println!("String charset: default"),
    }

    match &config.names {
        Some(path) => println!("Name list: {}", path.display()),
        None => println!("No name list configured"),
    }

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

/// Show usage help for the configure command
fn show_usage() {
    println!("Usage: qbs configure --platform PLATFORM [--endian big|little]");
    println!("   or: qbs configure --names NAMES_FILE");
    println!("   or: qbs configure --show");
    println!();
    println!("Platforms: wii, pc, xbox, xbox_xbx, ps2, pc_wpc");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_usage_does_not_panic() {
        show_usage();
    }

    #[test]
    fn test_apply_changes() {
        let mut config = Config {
            charset: Some("ABC".to_string()),
            ..Default::default()
        };

        apply(
            &mut config,
            Changes {
                platform: Some(Platform::Wii),
                endian: Some(Endian::Little),
                charset: Some(String::new()),
                names: None,
            },
        )
        .unwrap();

        assert_eq!(config.platform, Some(Platform::Wii));
        assert_eq!(config.endian, Some(Endian::Little));
        assert_eq!(config.charset, None);
    }

    #[test]
    fn test_apply_missing_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        let changes = Changes {
            names: Some(dir.path().join("missing.txt")),
            ..Default::default()
        };
        assert!(apply(&mut config, changes).is_err());
        assert!(config.names.is_none());
    }

    #[test]
    fn test_changes_empty() {
        assert!(Changes::default().is_empty());
    }
}
