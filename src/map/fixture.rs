//! YAML map fixtures
//!
//! A fixture describes the layers of a map view and the external collections
//! bound to other components, so the pipeline can run headless.
//!
//! ```yaml
//! widgetId: widget_12
//! spatialReference: 3857
//! layers:
//!   - id: switches
//!     title: Switches
//!     features:
//!       - objectId: 1
//!         attributes: { globalid: "{S1}" }
//!         geometry: { type: point, x: 10.0, y: 10.0 }
//! collections:
//!   - id: meters
//!     geometryType: point
//!     records: []
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::memory::DEFAULT_HIT_TOLERANCE;
use super::{Feature, GeometryType, InMemoryLayer, InMemoryMap, SpatialReference};
use crate::selection::InMemoryCollection;

fn default_wkid() -> u32 {
    3857
}

fn default_hit_tolerance() -> f64 {
    DEFAULT_HIT_TOLERANCE
}

/// Root fixture document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapFixture {
    /// Host map widget the fixture stands in for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_id: Option<String>,

    /// View spatial reference (wkid)
    #[serde(default = "default_wkid")]
    pub spatial_reference: u32,

    /// Hit-test radius in screen units
    #[serde(default = "default_hit_tolerance")]
    pub hit_tolerance: f64,

    #[serde(default)]
    pub layers: Vec<LayerFixture>,

    #[serde(default)]
    pub collections: Vec<CollectionFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayerFixture {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionFixture {
    pub id: String,
    pub geometry_type: GeometryType,
    #[serde(default)]
    pub records: Vec<Feature>,
}

impl MapFixture {
    /// Load a fixture file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read map fixture: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse map fixture: {}", path.display()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let fixture: MapFixture = serde_yaml::from_str(yaml)?;

        for layer in &fixture.layers {
            if fixture.layers.iter().filter(|l| l.id == layer.id).count() > 1 {
                anyhow::bail!("duplicate layer id: {}", layer.id);
            }
        }

        Ok(fixture)
    }

    /// Check the fixture against the configured `map.widgetId`.
    ///
    /// A fixture without a widget id stands in for any widget.
    pub fn bind(&self, widget_id: Option<&str>) -> Result<()> {
        match (widget_id, self.widget_id.as_deref()) {
            (Some(expected), Some(actual)) if expected != actual => anyhow::bail!(
                "fixture describes map widget {}, but map.widgetId is {}",
                actual,
                expected
            ),
            _ => Ok(()),
        }
    }

    /// Build the map view
    pub fn build_map(&self) -> InMemoryMap {
        let layers = self
            .layers
            .iter()
            .map(|l| InMemoryLayer::new(&l.id, l.title.as_deref(), l.features.clone()))
            .collect();

        InMemoryMap::new(SpatialReference::new(self.spatial_reference), layers)
            .with_hit_tolerance(self.hit_tolerance)
    }

    /// Build the external collections, keeping only `selected` ids when given
    pub fn build_collections(&self, selected: &[String]) -> Vec<Arc<InMemoryCollection>> {
        self.collections
            .iter()
            .filter(|c| selected.is_empty() || selected.contains(&c.id))
            .map(|c| Arc::new(InMemoryCollection::new(&c.id, c.geometry_type, c.records.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
spatialReference: 3826
layers:
  - id: switches
    title: Switches
    features:
      - objectId: 1
        attributes: { globalid: "{S1}" }
        geometry: { type: point, x: 10.0, y: 10.0 }
  - id: lines
    features: []
collections:
  - id: meters
    geometryType: point
  - id: parcels
    geometryType: polygon
"#;

    #[test]
    fn test_parse_fixture() {
        let fixture = MapFixture::from_yaml(YAML).unwrap();
        assert_eq!(fixture.spatial_reference, 3826);
        assert_eq!(fixture.hit_tolerance, DEFAULT_HIT_TOLERANCE);
        assert_eq!(fixture.layers.len(), 2);
        assert_eq!(fixture.layers[0].features[0].object_id, 1);
        assert_eq!(fixture.collections[1].geometry_type, GeometryType::Polygon);
    }

    #[test]
    fn test_collection_selection_filter() {
        let fixture = MapFixture::from_yaml(YAML).unwrap();
        assert_eq!(fixture.build_collections(&[]).len(), 2);

        let only = fixture.build_collections(&["parcels".to_string()]);
        assert_eq!(only.len(), 1);
    }

    #[test]
    fn test_duplicate_layer_rejected() {
        let yaml = "layers:\n  - id: a\n  - id: a\n";
        assert!(MapFixture::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_bind_checks_widget_id() {
        let fixture = MapFixture::from_yaml("widgetId: widget_12\n").unwrap();
        assert!(fixture.bind(None).is_ok());
        assert!(fixture.bind(Some("widget_12")).is_ok());
        assert!(fixture.bind(Some("widget_3")).is_err());

        let anonymous = MapFixture::from_yaml(YAML).unwrap();
        assert_eq!(anonymous.widget_id, None);
        assert!(anonymous.bind(Some("widget_3")).is_ok());
    }
}
