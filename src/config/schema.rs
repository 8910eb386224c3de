//! Configuration schema definitions
//!
//! Defines the structure of configuration files using serde for serialization.

use serde::{Deserialize, Serialize};

use crate::map::SpatialReference;
use crate::service::DEFAULT_LOCATION_ID;
use crate::shell::ViewerOptions;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Trace service connection
    #[serde(default)]
    pub service: ServiceConfig,

    /// UI configuration
    #[serde(default)]
    pub ui: UiConfig,

    /// Host map binding
    #[serde(default)]
    pub map: MapConfig,

    /// External collections that receive trace selections (empty = all)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_sources: Vec<String>,
}

/// Trace service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServiceConfig {
    /// Root URL the service endpoints hang off
    #[serde(default)]
    pub root_url: String,

    /// Spatial reference (wkid) the service works in
    #[serde(default = "default_spatial_reference")]
    pub spatial_reference: u32,

    /// Location marker sent with subnetwork traces
    #[serde(default = "default_location_id")]
    pub default_location_id: String,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UiConfig {
    /// Label of the subnetwork selector
    #[serde(default = "default_trace_label")]
    pub trace_label: String,

    /// Zoom level used when jumping to a result row
    #[serde(default = "default_zoom_level")]
    pub zoom_level: u8,

    /// Size of the window exported diagrams open in
    #[serde(default = "default_viewer_width")]
    pub viewer_width: u32,

    #[serde(default = "default_viewer_height")]
    pub viewer_height: u32,
}

/// Map binding configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MapConfig {
    /// Host map widget the tools attach to; a fixture naming another widget is rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_id: Option<String>,

    /// Attribute holding the identifier the service traces with
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

// Default value functions
fn default_spatial_reference() -> u32 {
    3826
}

fn default_location_id() -> String {
    DEFAULT_LOCATION_ID.to_string()
}

fn default_trace_label() -> String {
    "Trace".to_string()
}

fn default_zoom_level() -> u8 {
    12
}

fn default_viewer_width() -> u32 {
    1000
}

fn default_viewer_height() -> u32 {
    700
}

fn default_id_field() -> String {
    "globalid".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            ui: UiConfig::default(),
            map: MapConfig::default(),
            data_sources: Vec::new(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root_url: String::new(),
            spatial_reference: default_spatial_reference(),
            default_location_id: default_location_id(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            trace_label: default_trace_label(),
            zoom_level: default_zoom_level(),
            viewer_width: default_viewer_width(),
            viewer_height: default_viewer_height(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            widget_id: None,
            id_field: default_id_field(),
        }
    }
}

impl Config {
    /// Window size for exported diagrams
    pub fn viewer(&self) -> ViewerOptions {
        ViewerOptions {
            width: self.ui.viewer_width,
            height: self.ui.viewer_height,
        }
    }

    /// Spatial reference picked points are projected into
    pub fn working_reference(&self) -> SpatialReference {
        SpatialReference::new(self.service.spatial_reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert!(config.service.root_url.is_empty());
        assert_eq!(config.service.spatial_reference, 3826);
        assert_eq!(config.ui.zoom_level, 12);
        assert_eq!(config.map.id_field, "globalid");
        assert_eq!(config.viewer(), ViewerOptions::default());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("rootUrl"));
        assert!(yaml.contains("zoomLevel"));
        assert!(!yaml.contains("dataSources"));
    }

    #[test]
    fn test_config_deserialization() {
        let yaml = r#"
service:
  rootUrl: http://gis.example/TraceService.asmx
ui:
  traceLabel: Feeder
dataSources:
  - meters
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.service.root_url, "http://gis.example/TraceService.asmx");
        assert_eq!(config.service.default_location_id, DEFAULT_LOCATION_ID);
        assert_eq!(config.ui.trace_label, "Feeder");
        assert_eq!(config.ui.viewer_height, 700);
        assert_eq!(config.data_sources, vec!["meters".to_string()]);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let yaml = "service:\n  rootURL: http://x\n";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }
}
