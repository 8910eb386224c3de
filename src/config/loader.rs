//! Configuration loading and merging logic
//!
//! Handles loading configuration from multiple sources and merging them
//! according to precedence rules.

use super::{paths, schema::Config};
use anyhow::{Context, Result};
use std::path::Path;

/// Highest zoom level the host map accepts
pub const MAX_ZOOM_LEVEL: u8 = 24;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with all layers merged
    ///
    /// Precedence order (highest to lowest):
    /// 1. Environment variable overrides
    /// 2. Root config
    /// 3. Built-in defaults
    pub fn load() -> Result<Config> {
        Self::load_from(&paths::root_config_path())
    }

    /// Same as [`ConfigLoader::load`] with an explicit root config file
    pub fn load_from(path: &Path) -> Result<Config> {
        let mut config = Self::load_defaults();

        if path.exists() {
            let root_config = Self::load_file(path)?;
            config = Self::merge_config(config, root_config);
        }

        Ok(Self::apply_env_overrides(config))
    }

    /// Load configuration from a file
    pub fn load_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration by loading and checking for errors
    ///
    /// This performs strict validation - it will fail on:
    /// - Invalid YAML syntax or unknown keys
    /// - A root URL that does not parse
    /// - A zoom level out of range
    pub fn validate(path: &Path) -> Result<Config> {
        let config = Self::load_from(path).context("Failed to load merged configuration")?;
        Self::check(&config)?;
        Ok(config)
    }

    /// Value checks serde cannot express
    pub fn check(config: &Config) -> Result<()> {
        if !config.service.root_url.is_empty() {
            url::Url::parse(&config.service.root_url).with_context(|| {
                format!("service.rootUrl is not a valid URL: {}", config.service.root_url)
            })?;
        }

        if config.ui.zoom_level > MAX_ZOOM_LEVEL {
            return Err(anyhow::anyhow!(
                "ui.zoomLevel is {}, maximum is {}",
                config.ui.zoom_level,
                MAX_ZOOM_LEVEL
            ));
        }

        if config.ui.viewer_width == 0 || config.ui.viewer_height == 0 {
            return Err(anyhow::anyhow!("viewer size must be non-zero"));
        }

        if config.map.id_field.trim().is_empty() {
            return Err(anyhow::anyhow!("map.idField must not be empty"));
        }

        Ok(())
    }

    /// Load default configuration
    pub fn load_defaults() -> Config {
        Config::default()
    }

    /// Merge two configurations, with `other` taking precedence
    fn merge_config(_base: Config, other: Config) -> Config {
        Config {
            service: ServiceConfig {
                root_url: other.service.root_url.clone(),
                spatial_reference: other.service.spatial_reference,
                default_location_id: other.service.default_location_id.clone(),
            },
            ui: UiConfig {
                trace_label: other.ui.trace_label.clone(),
                zoom_level: other.ui.zoom_level,
                viewer_width: other.ui.viewer_width,
                viewer_height: other.ui.viewer_height,
            },
            map: MapConfig {
                widget_id: other.map.widget_id.clone(),
                id_field: other.map.id_field.clone(),
            },
            data_sources: other.data_sources.clone(),
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: Config) -> Config {
        // TRACE_DIAGRAM_SERVICE_URL override
        if let Ok(url) = std::env::var("TRACE_DIAGRAM_SERVICE_URL") {
            config.service.root_url = url;
        }

        // TRACE_DIAGRAM_ID_FIELD override
        if let Ok(field) = std::env::var("TRACE_DIAGRAM_ID_FIELD") {
            if !field.is_empty() {
                config.map.id_field = field;
            }
        }

        config
    }

    /// Save configuration to a file
    pub fn save(config: &Config, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Save root configuration
    pub fn save_root(config: &Config) -> Result<()> {
        Self::save(config, &paths::root_config_path())
    }
}

use super::schema::{MapConfig, ServiceConfig, UiConfig};
