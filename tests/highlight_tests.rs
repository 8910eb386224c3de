//! Highlight and selection tests with interleaved layer completions
//!
//! Wraps the in-memory map so one layer's query can be held back, then
//! checks that a result set replaced mid-flight never leaks highlights.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{Notify, mpsc};

use trace_diagram::map::{
    ClickSubscription, Feature, FeatureLayer, FeatureQuery, Geometry, GeometryType, HitResult,
    InMemoryLayer, InMemoryMap, LayerView, MapClick, MapPoint, MapView, ScreenPoint,
    SpatialReference,
};
use trace_diagram::selection::{InMemoryCollection, QueryableCollection, SelectionPropagator};
use trace_diagram::trace::HighlightManager;

fn feature(object_id: i64, global_id: &str) -> Feature {
    let mut attributes = serde_json::Map::new();
    attributes.insert("globalid".to_string(), json!(global_id));
    Feature {
        object_id,
        attributes,
        geometry: Some(Geometry::Point {
            x: object_id as f64,
            y: 0.0,
        }),
    }
}

/// Layer whose first query waits for a notification
struct GatedLayer {
    inner: InMemoryLayer,
    gate: Arc<Notify>,
    queries: AtomicUsize,
}

#[async_trait]
impl FeatureLayer for GatedLayer {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn title(&self) -> Option<&str> {
        self.inner.title()
    }

    async fn query_features(&self, query: &FeatureQuery) -> Result<Vec<Feature>> {
        if self.queries.fetch_add(1, Ordering::SeqCst) == 0 {
            self.gate.notified().await;
        }
        self.inner.query_features(query).await
    }
}

/// Map view that serves its own layer list and delegates everything else
struct GatedMap {
    inner: Arc<InMemoryMap>,
    layers: Vec<Arc<dyn FeatureLayer>>,
}

#[async_trait]
impl MapView for GatedMap {
    fn spatial_reference(&self) -> SpatialReference {
        self.inner.spatial_reference()
    }

    fn feature_layers(&self) -> Vec<Arc<dyn FeatureLayer>> {
        self.layers.clone()
    }

    async fn when_layer_view(&self, layer_id: &str) -> Result<Arc<dyn LayerView>> {
        self.inner.when_layer_view(layer_id).await
    }

    fn on_click(&self, events: mpsc::UnboundedSender<MapClick>) -> Box<dyn ClickSubscription> {
        self.inner.on_click(events)
    }

    async fn hit_test(&self, screen: ScreenPoint) -> Result<Vec<HitResult>> {
        self.inner.hit_test(screen).await
    }

    async fn project(&self, point: MapPoint, target: SpatialReference) -> Result<MapPoint> {
        self.inner.project(point, target).await
    }

    async fn go_to(&self, target: &Geometry, zoom: u8) -> Result<()> {
        self.inner.go_to(target, zoom).await
    }

    fn open_popup(&self, features: Vec<Feature>, location: MapPoint) {
        self.inner.open_popup(features, location)
    }
}

struct Scene {
    inner: Arc<InMemoryMap>,
    gated: Arc<GatedLayer>,
    gate: Arc<Notify>,
    manager: Arc<HighlightManager>,
}

fn scene() -> Scene {
    let inner = Arc::new(InMemoryMap::new(
        SpatialReference::new(3857),
        vec![
            InMemoryLayer::new("switches", Some("Switches"), vec![feature(1, "f1")]),
            InMemoryLayer::new("lines", Some("Lines"), vec![feature(2, "f2")]),
        ],
    ));
    let gate = Arc::new(Notify::new());
    let gated = Arc::new(GatedLayer {
        inner: InMemoryLayer::new("lines", Some("Lines"), vec![feature(2, "f2")]),
        gate: gate.clone(),
        queries: AtomicUsize::new(0),
    });
    let switches: Arc<dyn FeatureLayer> = Arc::new(InMemoryLayer::new(
        "switches",
        Some("Switches"),
        vec![feature(1, "f1")],
    ));

    let view = Arc::new(GatedMap {
        inner: inner.clone(),
        layers: vec![switches, gated.clone() as Arc<dyn FeatureLayer>],
    });
    let manager = Arc::new(HighlightManager::new(view, "globalid"));

    Scene {
        inner,
        gated,
        gate,
        manager,
    }
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_stale_layer_completion_leaks_nothing() {
    let s = scene();

    let first = {
        let manager = s.manager.clone();
        tokio::spawn(async move { manager.apply(&ids(&["f1", "f2"])).await })
    };
    while s.gated.queries.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    let second = s.manager.apply(&ids(&["f1", "f2"])).await;
    assert_eq!(second.layers, 2);
    assert!(!second.superseded);

    s.gate.notify_one();
    let first = first.await.unwrap();
    assert!(first.superseded);

    assert_eq!(s.manager.rows().len(), 2);
    assert_eq!(s.manager.handle_count(), 2);
    assert_eq!(s.inner.live_highlights().len(), 2);
}

#[tokio::test]
async fn test_clear_while_layer_pending() {
    let s = scene();

    let pending = {
        let manager = s.manager.clone();
        tokio::spawn(async move { manager.apply(&ids(&["f2"])).await })
    };
    while s.gated.queries.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    s.manager.clear();
    s.gate.notify_one();

    assert!(pending.await.unwrap().superseded);
    assert!(s.manager.rows().is_empty());
    assert!(s.inner.live_highlights().is_empty());
}

#[tokio::test]
async fn test_highlight_and_selection_share_identifiers() {
    let map = Arc::new(InMemoryMap::new(
        SpatialReference::new(3857),
        vec![InMemoryLayer::new(
            "switches",
            None,
            vec![feature(1, "f1"), feature(3, "f3")],
        )],
    ));
    let manager = HighlightManager::new(map.clone(), "globalid");

    let meters = Arc::new(InMemoryCollection::new(
        "meters",
        GeometryType::Polyline,
        vec![feature(11, "f1"), feature(13, "f3"), feature(14, "f4")],
    ));
    let propagator = SelectionPropagator::new(
        vec![meters.clone() as Arc<dyn QueryableCollection>],
        "globalid",
    );

    let traced = ids(&["f1", "f3"]);
    let (highlight, selection) =
        tokio::join!(manager.apply(&traced), propagator.propagate(&traced));

    assert_eq!(highlight.features, 2);
    assert!(manager.rows().iter().all(|r| r.display_label == "switches"));
    assert_eq!(selection.selected, vec![("meters".to_string(), 2)]);
    let mut selected = meters.selected();
    selected.sort();
    assert_eq!(selected, vec![11, 13]);
}
