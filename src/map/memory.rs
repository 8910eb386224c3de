//! Data-backed map view
//!
//! Holds feature layers in memory and records everything the trace components
//! do to the view: live highlights, click listeners, camera moves and popups.
//! Screen and map coordinates coincide.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    ClickSubscription, Feature, FeatureLayer, FeatureQuery, Geometry, HighlightHandle, HitResult,
    LayerView, MapClick, MapPoint, MapView, ScreenPoint, SpatialReference,
};

pub const DEFAULT_HIT_TOLERANCE: f64 = 5.0;

/// Feature layer held in memory
pub struct InMemoryLayer {
    id: String,
    title: Option<String>,
    features: Vec<Feature>,
    fail_queries: AtomicBool,
}

impl InMemoryLayer {
    pub fn new(id: &str, title: Option<&str>, features: Vec<Feature>) -> Self {
        Self {
            id: id.to_string(),
            title: title.map(str::to_string),
            features,
            fail_queries: AtomicBool::new(false),
        }
    }

    /// Make every subsequent query fail
    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }
}

#[async_trait]
impl FeatureLayer for InMemoryLayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    async fn query_features(&self, query: &FeatureQuery) -> Result<Vec<Feature>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            anyhow::bail!("query failed on layer {}", self.id);
        }

        Ok(self
            .features
            .iter()
            .filter(|f| query.matches(f))
            .map(|f| {
                let mut f = f.clone();
                if !query.return_geometry {
                    f.geometry = None;
                }
                f
            })
            .collect())
    }
}

/// A highlight currently drawn on the view
#[derive(Debug, Clone, PartialEq)]
pub struct LiveHighlight {
    pub layer_id: String,
    pub object_ids: Vec<i64>,
}

/// A popup opened on the view
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedPopup {
    pub object_ids: Vec<i64>,
    pub location: MapPoint,
}

#[derive(Default)]
struct ViewState {
    next_id: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<MapClick>>,
    highlights: HashMap<u64, LiveHighlight>,
    camera: Option<(Geometry, u8)>,
    popups: Vec<OpenedPopup>,
    projection_failure: Option<String>,
    broken_layer_views: HashSet<String>,
}

impl ViewState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Map view backed by in-memory layers
pub struct InMemoryMap {
    spatial_reference: SpatialReference,
    hit_tolerance: f64,
    layers: Vec<Arc<InMemoryLayer>>,
    state: Arc<Mutex<ViewState>>,
}

impl InMemoryMap {
    pub fn new(spatial_reference: SpatialReference, layers: Vec<InMemoryLayer>) -> Self {
        Self {
            spatial_reference,
            hit_tolerance: DEFAULT_HIT_TOLERANCE,
            layers: layers.into_iter().map(Arc::new).collect(),
            state: Arc::new(Mutex::new(ViewState::default())),
        }
    }

    pub fn with_hit_tolerance(mut self, tolerance: f64) -> Self {
        self.hit_tolerance = tolerance;
        self
    }

    pub fn layer(&self, id: &str) -> Option<&Arc<InMemoryLayer>> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Simulate a user click; returns how many listeners received it
    pub fn click(&self, x: f64, y: f64) -> usize {
        let event = MapClick {
            screen: ScreenPoint { x, y },
            map_point: MapPoint {
                x,
                y,
                spatial_reference: self.spatial_reference,
            },
        };

        let state = self.state.lock().unwrap();
        state
            .listeners
            .values()
            .filter(|tx| tx.send(event).is_ok())
            .count()
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().unwrap().listeners.len()
    }

    /// Highlights not yet removed, ordered by layer id
    pub fn live_highlights(&self) -> Vec<LiveHighlight> {
        let state = self.state.lock().unwrap();
        let mut live: Vec<_> = state.highlights.values().cloned().collect();
        live.sort_by(|a, b| a.layer_id.cmp(&b.layer_id));
        live
    }

    pub fn camera(&self) -> Option<(Geometry, u8)> {
        self.state.lock().unwrap().camera.clone()
    }

    pub fn popups(&self) -> Vec<OpenedPopup> {
        self.state.lock().unwrap().popups.clone()
    }

    /// Make projection fail with `message` (`None` restores it)
    pub fn set_projection_failure(&self, message: Option<&str>) {
        self.state.lock().unwrap().projection_failure = message.map(str::to_string);
    }

    /// Make `when_layer_view` fail for one layer
    pub fn break_layer_view(&self, layer_id: &str) {
        self.state
            .lock()
            .unwrap()
            .broken_layer_views
            .insert(layer_id.to_string());
    }
}

struct InMemoryHighlight {
    id: u64,
    state: Arc<Mutex<ViewState>>,
}

impl HighlightHandle for InMemoryHighlight {
    fn remove(self: Box<Self>) {
        self.state.lock().unwrap().highlights.remove(&self.id);
    }
}

struct InMemoryClickSubscription {
    id: u64,
    state: Arc<Mutex<ViewState>>,
}

impl ClickSubscription for InMemoryClickSubscription {
    fn remove(self: Box<Self>) {
        // Dropping the sender closes the listener's channel
        self.state.lock().unwrap().listeners.remove(&self.id);
    }
}

struct InMemoryLayerView {
    layer_id: String,
    state: Arc<Mutex<ViewState>>,
}

impl LayerView for InMemoryLayerView {
    fn highlight(&self, features: &[Feature]) -> Result<Box<dyn HighlightHandle>> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.highlights.insert(
            id,
            LiveHighlight {
                layer_id: self.layer_id.clone(),
                object_ids: features.iter().map(|f| f.object_id).collect(),
            },
        );

        Ok(Box::new(InMemoryHighlight {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}

#[async_trait]
impl MapView for InMemoryMap {
    fn spatial_reference(&self) -> SpatialReference {
        self.spatial_reference
    }

    fn feature_layers(&self) -> Vec<Arc<dyn FeatureLayer>> {
        self.layers
            .iter()
            .map(|l| Arc::clone(l) as Arc<dyn FeatureLayer>)
            .collect()
    }

    async fn when_layer_view(&self, layer_id: &str) -> Result<Arc<dyn LayerView>> {
        if self.layer(layer_id).is_none() {
            anyhow::bail!("layer {} is not part of this view", layer_id);
        }
        if self.state.lock().unwrap().broken_layer_views.contains(layer_id) {
            anyhow::bail!("layer view for {} failed to load", layer_id);
        }

        Ok(Arc::new(InMemoryLayerView {
            layer_id: layer_id.to_string(),
            state: Arc::clone(&self.state),
        }))
    }

    fn on_click(&self, events: mpsc::UnboundedSender<MapClick>) -> Box<dyn ClickSubscription> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.listeners.insert(id, events);

        Box::new(InMemoryClickSubscription {
            id,
            state: Arc::clone(&self.state),
        })
    }

    async fn hit_test(&self, screen: ScreenPoint) -> Result<Vec<HitResult>> {
        let mut hits: Vec<(f64, HitResult)> = self
            .layers
            .iter()
            .flat_map(|layer| {
                layer.features.iter().filter_map(|feature| {
                    let distance = feature.geometry.as_ref()?.distance_to(screen.x, screen.y);
                    (distance <= self.hit_tolerance).then(|| {
                        (
                            distance,
                            HitResult {
                                layer_id: layer.id.clone(),
                                feature: feature.clone(),
                            },
                        )
                    })
                })
            })
            .collect();

        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(hits.into_iter().map(|(_, hit)| hit).collect())
    }

    async fn project(&self, point: MapPoint, target: SpatialReference) -> Result<MapPoint> {
        if let Some(message) = self.state.lock().unwrap().projection_failure.clone() {
            anyhow::bail!(message);
        }

        // Coordinates are kept as-is; only the reference is relabelled
        Ok(MapPoint {
            spatial_reference: target,
            ..point
        })
    }

    async fn go_to(&self, target: &Geometry, zoom: u8) -> Result<()> {
        self.state.lock().unwrap().camera = Some((target.clone(), zoom));
        Ok(())
    }

    fn open_popup(&self, features: Vec<Feature>, location: MapPoint) {
        self.state.lock().unwrap().popups.push(OpenedPopup {
            object_ids: features.iter().map(|f| f.object_id).collect(),
            location,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point_feature(object_id: i64, global_id: &str, x: f64, y: f64) -> Feature {
        let mut attributes = serde_json::Map::new();
        attributes.insert("globalid".to_string(), json!(global_id));
        Feature {
            object_id,
            attributes,
            geometry: Some(Geometry::Point { x, y }),
        }
    }

    fn map() -> InMemoryMap {
        InMemoryMap::new(
            SpatialReference::new(3857),
            vec![InMemoryLayer::new(
                "switches",
                Some("Switches"),
                vec![
                    point_feature(1, "{S1}", 10.0, 10.0),
                    point_feature(2, "{S2}", 100.0, 100.0),
                ],
            )],
        )
    }

    #[tokio::test]
    async fn test_hit_test_within_tolerance() {
        let map = map();
        let hits = map.hit_test(ScreenPoint { x: 12.0, y: 11.0 }).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].feature.object_id, 1);
        assert_eq!(hits[0].layer_id, "switches");

        let misses = map.hit_test(ScreenPoint { x: 50.0, y: 50.0 }).await.unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn test_highlight_handle_removal() {
        let map = map();
        let view = map.when_layer_view("switches").await.unwrap();
        let layer = map.layer("switches").unwrap();
        let handle = view.highlight(layer.features()).unwrap();
        assert_eq!(map.live_highlights().len(), 1);
        assert_eq!(map.live_highlights()[0].object_ids, vec![1, 2]);

        handle.remove();
        assert!(map.live_highlights().is_empty());
    }

    #[tokio::test]
    async fn test_click_subscription_closes_channel() {
        let map = map();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = map.on_click(tx);
        assert_eq!(map.click(1.0, 2.0), 1);
        assert_eq!(rx.recv().await.unwrap().screen, ScreenPoint { x: 1.0, y: 2.0 });

        subscription.remove();
        assert_eq!(map.listener_count(), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_projection_failure_injection() {
        let map = map();
        let point = MapPoint {
            x: 1.0,
            y: 1.0,
            spatial_reference: SpatialReference::new(3857),
        };
        let projected = map.project(point, SpatialReference::new(3826)).await.unwrap();
        assert_eq!(projected.spatial_reference.wkid, 3826);

        map.set_projection_failure(Some("grid file missing"));
        assert!(map.project(point, SpatialReference::new(3826)).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_layer_view() {
        let map = map();
        assert!(map.when_layer_view("poles").await.is_err());
        map.break_layer_view("switches");
        assert!(map.when_layer_view("switches").await.is_err());
    }
}
