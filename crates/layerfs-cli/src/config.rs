//! Layer stack configuration.
//!
//! Configuration is loaded from `~/.config/layerfs/layers.toml`:
//!
//! ```toml
//! [[layers]]
//! name = "overlay"
//! path = "/srv/overlay"
//!
//! [[layers]]
//! path = "/srv/base"
//! ```
//!
//! Layers are listed highest priority first.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Configuration for the layer stack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerfsConfig {
    /// Layers, highest priority first.
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

/// A single directory layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Label shown in listings; defaults to the path.
    #[serde(default)]
    pub name: Option<String>,

    /// Root directory of the layer.
    pub path: PathBuf,
}

impl LayerConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            path: path.into(),
        }
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.path.display().to_string(),
        }
    }
}

impl LayerfsConfig {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns an empty configuration.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Get the default config file path.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "layerfs")
            .context("Could not determine config directory")?;

        Ok(dirs.config_dir().join("layers.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LayerfsConfig::default();
        assert!(config.layers.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[[layers]]
name = "overlay"
path = "/srv/overlay"

[[layers]]
path = "/srv/base"
"#;

        let config: LayerfsConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.layers.len(), 2);
        assert_eq!(config.layers[0].display_name(), "overlay");
        assert_eq!(config.layers[1].name, None);
        assert_eq!(config.layers[1].display_name(), "/srv/base");
    }

    #[test]
    fn test_parse_empty_config() {
        let config: LayerfsConfig = toml::from_str("").unwrap();
        assert!(config.layers.is_empty());
    }

    #[test]
    fn test_layer_requires_path() {
        let result: Result<LayerfsConfig, _> = toml::from_str("[[layers]]\nname = \"x\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layers.toml");
        std::fs::write(&path, "[[layers]]\npath = \"/a\"\n").unwrap();

        let config = LayerfsConfig::load_from(&path).unwrap();
        assert_eq!(config.layers[0].path, PathBuf::from("/a"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LayerfsConfig::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
