//! Configuration system for trace-diagram
//!
//! Layered settings (built-in defaults, root config file, environment
//! overrides) plus dot-notation access for the `config` command.

pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{Config, MapConfig, ServiceConfig, UiConfig};

/// Keys understood by [`get_config_value`] and [`set_config_value`]
pub const CONFIG_KEYS: &[&str] = &[
    "service.rootUrl",
    "service.spatialReference",
    "service.defaultLocationId",
    "ui.traceLabel",
    "ui.zoomLevel",
    "ui.viewerWidth",
    "ui.viewerHeight",
    "map.widgetId",
    "map.idField",
    "dataSources",
];

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &schema::Config, key: &str) -> anyhow::Result<String> {
    match key {
        "service.rootUrl" => Ok(config.service.root_url.clone()),
        "service.spatialReference" => Ok(config.service.spatial_reference.to_string()),
        "service.defaultLocationId" => Ok(config.service.default_location_id.clone()),
        "ui.traceLabel" => Ok(config.ui.trace_label.clone()),
        "ui.zoomLevel" => Ok(config.ui.zoom_level.to_string()),
        "ui.viewerWidth" => Ok(config.ui.viewer_width.to_string()),
        "ui.viewerHeight" => Ok(config.ui.viewer_height.to_string()),
        "map.widgetId" => Ok(config.map.widget_id.clone().unwrap_or_default()),
        "map.idField" => Ok(config.map.id_field.clone()),
        "dataSources" => {
            // Return as YAML array
            serde_yaml::to_string(&config.data_sources)
                .map_err(|e| anyhow::anyhow!("Failed to serialize dataSources: {}", e))
        }
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}

/// Set a configuration value by key (dot notation)
pub fn set_config_value(config: &mut schema::Config, key: &str, value: &str) -> anyhow::Result<()> {
    use anyhow::Context;
    match key {
        "service.rootUrl" => {
            if !value.is_empty() {
                url::Url::parse(value).context("service.rootUrl must be a valid URL")?;
            }
            config.service.root_url = value.to_string();
        }
        "service.spatialReference" => {
            config.service.spatial_reference = value
                .parse()
                .context("service.spatialReference must be a wkid number")?;
        }
        "service.defaultLocationId" => {
            config.service.default_location_id = value.to_string();
        }
        "ui.traceLabel" => {
            config.ui.trace_label = value.to_string();
        }
        "ui.zoomLevel" => {
            let level: u8 = value.parse().context("ui.zoomLevel must be a number")?;
            if level > loader::MAX_ZOOM_LEVEL {
                return Err(anyhow::anyhow!(
                    "ui.zoomLevel must be at most {}, got {}",
                    loader::MAX_ZOOM_LEVEL,
                    level
                ));
            }
            config.ui.zoom_level = level;
        }
        "ui.viewerWidth" => {
            config.ui.viewer_width = value.parse().context("ui.viewerWidth must be a number")?;
        }
        "ui.viewerHeight" => {
            config.ui.viewer_height = value.parse().context("ui.viewerHeight must be a number")?;
        }
        "map.widgetId" => {
            if value.is_empty() {
                config.map.widget_id = None;
            } else {
                config.map.widget_id = Some(value.to_string());
            }
        }
        "map.idField" => {
            if value.trim().is_empty() {
                return Err(anyhow::anyhow!("map.idField must not be empty"));
            }
            config.map.id_field = value.to_string();
        }
        "dataSources" => {
            // Parse as YAML array or comma-separated list
            config.data_sources = if value.trim_start().starts_with('[') {
                serde_yaml::from_str(value)
                    .context("dataSources must be a YAML array (e.g., ['meters', 'poles'])")?
            } else {
                value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            };
        }
        _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_readable() {
        let config = Config::default();
        for key in CONFIG_KEYS {
            assert!(get_config_value(&config, key).is_ok(), "{}", key);
        }
    }

    #[test]
    fn test_set_data_sources_comma_list() {
        let mut config = Config::default();
        set_config_value(&mut config, "dataSources", "meters, poles,,").unwrap();
        assert_eq!(config.data_sources, vec!["meters", "poles"]);

        set_config_value(&mut config, "dataSources", "['transformers']").unwrap();
        assert_eq!(config.data_sources, vec!["transformers"]);
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(set_config_value(&mut config, "ui.zoomLevel", "25").is_err());
        assert!(set_config_value(&mut config, "ui.zoomLevel", "high").is_err());
        assert!(set_config_value(&mut config, "service.rootUrl", "::nope").is_err());
        assert!(set_config_value(&mut config, "ui.skin", "dark").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_clear_widget_id() {
        let mut config = Config::default();
        set_config_value(&mut config, "map.widgetId", "widget_12").unwrap();
        assert_eq!(get_config_value(&config, "map.widgetId").unwrap(), "widget_12");
        set_config_value(&mut config, "map.widgetId", "").unwrap();
        assert_eq!(config.map.widget_id, None);
    }
}
