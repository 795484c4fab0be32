//! Configuration management for the model resolver
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (resolver.toml)
//! - Environment variables (RESOLVER__*)
//!
//! ## Example config file (resolver.toml):
//! ```toml
//! [model]
//! path = "./model"
//! skip_prefixes = ["target/", ".git/"]
//!
//! [resolution]
//! emission_unit = "module"
//! deny_warnings = false
//! enum_imports = true
//!
//! [report]
//! output_format = "pretty"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::model::LoadConfig;

/// Main configuration for the resolver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Where the model comes from
    #[serde(default)]
    pub model: ModelConfig,

    /// Resolution behaviour
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Report output
    #[serde(default)]
    pub report: ReportConfig,
}

/// Model source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model JSON file or directory of fragments
    #[serde(default = "default_model_path")]
    pub path: PathBuf,

    /// Fragment path prefixes to skip when loading a directory
    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,
}

/// What counts as one emission unit when sequencing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmissionUnit {
    /// Superclasses are prerequisites only within the same module
    #[default]
    Module,
    /// One global order over the whole model
    Model,
}

/// Resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    #[serde(default)]
    pub emission_unit: EmissionUnit,

    /// Abort the pass when any warning diagnostic is produced
    #[serde(default)]
    pub deny_warnings: bool,

    /// Whether enumeration references produce import facts
    #[serde(default = "default_true")]
    pub enum_imports: bool,
}

/// Report configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReportConfig {
    /// Output format (pretty or compact)
    #[serde(default)]
    pub output_format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

// Default value functions
fn default_model_path() -> PathBuf {
    PathBuf::from("model")
}

fn default_skip_prefixes() -> Vec<String> {
    LoadConfig::default().skip_prefixes
}

fn default_true() -> bool {
    true
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            skip_prefixes: default_skip_prefixes(),
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            emission_unit: EmissionUnit::Module,
            deny_warnings: false,
            enum_imports: true,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, with an explicit file layered on top
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["resolver.toml", ".resolver.toml", "config/resolver.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "entity-resolver", "resolver") {
            let xdg_config = config_dir.config_dir().join("resolver.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        // Load from environment variables (RESOLVER__*)
        builder = builder.add_source(
            Environment::with_prefix("RESOLVER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_toml()?)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> std::io::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Get the model path (resolves relative paths)
    pub fn model_path(&self) -> PathBuf {
        if self.model.path.is_absolute() {
            self.model.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.model.path)
        }
    }

    /// Loader settings derived from `[model]`
    pub fn load_config(&self) -> LoadConfig {
        LoadConfig {
            skip_prefixes: self.model.skip_prefixes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert_eq!(config.resolution.emission_unit, EmissionUnit::Module);
        assert!(config.resolution.enum_imports);
        assert!(!config.resolution.deny_warnings);
        assert_eq!(config.report.output_format, OutputFormat::Pretty);
    }

    #[test]
    fn test_serialize_config() {
        let config = ResolverConfig::default();
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[resolution]"));
        assert!(toml_str.contains("emission_unit = \"module\""));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[resolution]\nemission_unit = \"model\"\ndeny_warnings = true\n\n[report]\noutput_format = \"compact\"\n",
        )
        .unwrap();

        let config = ResolverConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.resolution.emission_unit, EmissionUnit::Model);
        assert!(config.resolution.deny_warnings);
        assert!(config.resolution.enum_imports);
        assert_eq!(config.report.output_format, OutputFormat::Compact);
    }

    #[test]
    fn test_save_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = ResolverConfig::default();
        config.model.path = PathBuf::from("/srv/model");
        config.save(&path).unwrap();

        let loaded = ResolverConfig::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.model.path, PathBuf::from("/srv/model"));
    }
}
