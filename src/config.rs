//! Configuration file handling.
//!
//! This module provides loading and saving of layerscan configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/layerscan/config.toml`
//! - macOS: `~/Library/Application Support/layerscan/config.toml`
//! - Windows: `%APPDATA%\layerscan\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! scope = "squashed"
//! default_format = "table"
//! catalogers = ["python", "rust", "javascript"]
//! generate_cpes = true
//! parallel = true
//!
//! [log]
//! level = "warn"
//! structured = false
//!
//! [ignore]
//! packages = ["@types/*", "pip"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::CatalogOptions;
use crate::glob::glob_match;
use crate::model::Ecosystem;
use crate::source::Scope;

/// Application configuration.
///
/// Every field has a default, so a partial file (or none at all) is valid.
///
/// # Example
///
/// ```no_run
/// use layerscan::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Scope: {}", config.scope);
/// println!("Generate CPEs: {}", config.generate_cpes);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which view of an image to catalog when no `--scope` flag is provided.
    ///
    /// Valid values: "squashed", "all-layers"
    /// Default: "squashed"
    pub scope: Scope,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "table", "json"
    /// Default: "table"
    pub default_format: String,

    /// Which ecosystems to catalog when no `--cataloger` flag is provided.
    ///
    /// Default: all ecosystems
    pub catalogers: Vec<Ecosystem>,

    /// Whether to attach CPE candidates to every package.
    ///
    /// Default: true
    pub generate_cpes: bool,

    /// Whether to run catalogers concurrently.
    ///
    /// Default: true
    pub parallel: bool,

    pub log: LogConfig,

    /// Ignore list configuration for suppressing packages.
    pub ignore: IgnoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base level filter ("error", "warn", "info", "debug", "trace").
    ///
    /// `RUST_LOG` and `-v` take precedence.
    pub level: String,

    /// Emit JSON lines instead of human-readable logs.
    pub structured: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            structured: false,
        }
    }
}

/// Configuration for ignoring specific packages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names to exclude from results.
    ///
    /// Supports glob patterns (e.g., "lodash*", "@types/*").
    pub packages: Vec<String>,
}

impl IgnoreConfig {
    /// Check if a package should be ignored.
    pub fn should_ignore_package(&self, name: &str) -> bool {
        self.packages.iter().any(|pattern| {
            if pattern.contains(['*', '?']) {
                glob_match(pattern, name)
            } else {
                pattern == name
            }
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scope: Scope::default(),
            default_format: "table".to_string(),
            catalogers: Ecosystem::ALL.to_vec(),
            generate_cpes: true,
            parallel: true,
            log: LogConfig::default(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use layerscan::Config;
    ///
    /// let path = Config::config_path();
    /// assert!(path.ends_with("layerscan/config.toml"));
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("layerscan")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            parallel: self.parallel,
            generate_cpes: self.generate_cpes,
            ignore: self.ignore.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_config_packages() {
        let config = IgnoreConfig {
            packages: vec!["lodash".to_string(), "@types/*".to_string()],
        };

        assert!(config.should_ignore_package("lodash"));
        assert!(config.should_ignore_package("@types/node"));
        assert!(config.should_ignore_package("@types/react"));
        assert!(!config.should_ignore_package("underscore"));
        assert!(!config.should_ignore_package("@babel/core"));
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.scope, Scope::Squashed);
        assert_eq!(config.default_format, "table");
        assert!(config.generate_cpes);
        assert!(config.parallel);
        assert_eq!(config.catalogers.len(), 3);
        assert_eq!(config.log.level, "warn");
        assert!(config.ignore.packages.is_empty());
    }

    #[test]
    fn test_partial_config_file() {
        let config: Config = toml::from_str(
            r#"
            scope = "all-layers"
            catalogers = ["python"]

            [log]
            structured = true
            "#,
        )
        .unwrap();

        assert_eq!(config.scope, Scope::AllLayers);
        assert_eq!(config.catalogers, vec![Ecosystem::Python]);
        assert!(config.log.structured);
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.default_format, "table");
    }

    #[test]
    fn test_unknown_scope_is_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str(r#"scope = "everything""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.scope = Scope::AllLayers;
        config.ignore.packages.push("pip".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.scope, Scope::AllLayers);
        assert_eq!(loaded.ignore.packages, vec!["pip"]);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_from(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_format, "table");
    }
}
