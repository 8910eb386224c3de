//! Map capability boundary
//!
//! The host application owns the map view; this crate only consumes it through
//! the traits below. `memory` provides a data-backed implementation used by the
//! CLI and the tests, `fixture` loads one from YAML.

pub mod fixture;
mod geometry;
pub mod memory;

pub use fixture::MapFixture;
pub use geometry::{
    Extent, Feature, Geometry, GeometryType, MapClick, MapPoint, ScreenPoint, SpatialReference,
};
pub use memory::{InMemoryLayer, InMemoryMap};

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Attribute filter used for layer and collection queries
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureQuery {
    /// Field holding the feature identifier
    pub id_field: String,
    /// Identifiers to match; the query matches nothing when empty
    pub ids: Vec<String>,
    pub out_fields: Vec<String>,
    pub return_geometry: bool,
}

impl Default for FeatureQuery {
    fn default() -> Self {
        Self {
            id_field: String::new(),
            ids: Vec::new(),
            out_fields: vec!["*".to_string()],
            return_geometry: true,
        }
    }
}

impl FeatureQuery {
    /// Restrict the query to features whose `id_field` is one of `ids`
    pub fn with_ids(mut self, id_field: &str, ids: &[String]) -> Self {
        self.id_field = id_field.to_string();
        self.ids = ids.to_vec();
        self
    }

    /// Evaluate the filter against a feature held in memory
    pub fn matches(&self, feature: &Feature) -> bool {
        feature
            .attribute_str(&self.id_field)
            .is_some_and(|value| self.ids.iter().any(|id| id == value))
    }
}

/// One feature under a hit-tested screen point
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub layer_id: String,
    pub feature: Feature,
}

/// A layer whose features can be queried by attribute
#[async_trait]
pub trait FeatureLayer: Send + Sync {
    fn id(&self) -> &str;

    fn title(&self) -> Option<&str>;

    /// Label shown in the result table
    fn display_name(&self) -> &str {
        self.title().unwrap_or_else(|| self.id())
    }

    /// A query pre-populated with the layer's defaults
    fn create_query(&self) -> FeatureQuery {
        FeatureQuery::default()
    }

    async fn query_features(&self, query: &FeatureQuery) -> Result<Vec<Feature>>;
}

/// The rendered counterpart of a layer
pub trait LayerView: Send + Sync {
    /// Highlight features; the highlight lasts until the handle is removed
    fn highlight(&self, features: &[Feature]) -> Result<Box<dyn HighlightHandle>>;
}

/// A live highlight. Removing consumes the handle, so it can only happen once.
pub trait HighlightHandle: Send + Sync {
    fn remove(self: Box<Self>);
}

/// A registered click listener
pub trait ClickSubscription: Send + Sync {
    /// Detach the listener; its event channel closes
    fn remove(self: Box<Self>);
}

/// The host's map view
#[async_trait]
pub trait MapView: Send + Sync {
    fn spatial_reference(&self) -> SpatialReference;

    /// Every layer with feature-query capability
    fn feature_layers(&self) -> Vec<Arc<dyn FeatureLayer>>;

    async fn when_layer_view(&self, layer_id: &str) -> Result<Arc<dyn LayerView>>;

    /// Deliver clicks on `events` until the returned subscription is removed
    fn on_click(&self, events: mpsc::UnboundedSender<MapClick>) -> Box<dyn ClickSubscription>;

    async fn hit_test(&self, screen: ScreenPoint) -> Result<Vec<HitResult>>;

    async fn project(&self, point: MapPoint, target: SpatialReference) -> Result<MapPoint>;

    async fn go_to(&self, target: &Geometry, zoom: u8) -> Result<()>;

    fn open_popup(&self, features: Vec<Feature>, location: MapPoint);
}
