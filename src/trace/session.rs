//! Trace session
//!
//! Wires the selector, picker, orchestrator, highlight manager and
//! propagator around one map view and one service client, the way the host
//! widget uses them: load candidates once, pick or select an input, generate,
//! browse result rows, tear down.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::highlight::HighlightManager;
use super::mode::TraceModeSelector;
use super::orchestrator::{LoadingFlag, PipelineOutcome, PipelineState, TraceOrchestrator};
use super::picker::{PickOutcome, StartPointPicker};
use crate::config::Config;
use crate::error::{TraceError, TraceResult};
use crate::models::{HighlightedFeature, TraceCandidate, TraceInput, TraceMode};
use crate::map::{MapPoint, MapView};
use crate::selection::{QueryableCollection, SelectionPropagator};
use crate::service::{HttpTransport, TraceService, TraceServiceClient};
use crate::shell::HostShell;

pub struct TraceSession {
    view: Arc<dyn MapView>,
    service: Arc<dyn TraceService>,
    shell: Arc<dyn HostShell>,
    selector: Arc<Mutex<TraceModeSelector>>,
    highlights: Arc<HighlightManager>,
    picker: Arc<StartPointPicker>,
    orchestrator: TraceOrchestrator,
    loading: Arc<LoadingFlag>,
    candidates: Mutex<Option<Vec<TraceCandidate>>>,
    zoom_level: u8,
}

impl TraceSession {
    pub fn new(
        config: &Config,
        view: Arc<dyn MapView>,
        collections: Vec<Arc<dyn QueryableCollection>>,
        shell: Arc<dyn HostShell>,
        service: Arc<dyn TraceService>,
    ) -> Self {
        let selector = Arc::new(Mutex::new(TraceModeSelector::new()));
        let loading = Arc::new(LoadingFlag::new());
        let highlights = Arc::new(HighlightManager::new(view.clone(), &config.map.id_field));
        let propagator = Arc::new(SelectionPropagator::new(collections, &config.map.id_field));

        let picker = Arc::new(StartPointPicker::new(
            view.clone(),
            service.clone(),
            selector.clone(),
            shell.clone(),
            config.working_reference(),
        ));

        let orchestrator = TraceOrchestrator::new(
            service.clone(),
            selector.clone(),
            highlights.clone(),
            propagator,
            shell.clone(),
            config.viewer(),
            loading.clone(),
        );

        Self {
            view,
            service,
            shell,
            selector,
            highlights,
            picker,
            orchestrator,
            loading,
            candidates: Mutex::new(None),
            zoom_level: config.ui.zoom_level,
        }
    }

    /// Build a session talking HTTP to the configured service
    pub fn connect(
        config: &Config,
        view: Arc<dyn MapView>,
        collections: Vec<Arc<dyn QueryableCollection>>,
        shell: Arc<dyn HostShell>,
    ) -> Result<Self> {
        if config.service.root_url.is_empty() {
            return Err(anyhow::anyhow!(
                "service.rootUrl is not configured (set it with `config set service.rootUrl <url>`)"
            ));
        }

        let transport = HttpTransport::new(&config.service.root_url)
            .context("Failed to create trace service transport")?;
        let service = TraceServiceClient::with_default_location(
            Arc::new(transport),
            &config.service.default_location_id,
        );

        Ok(Self::new(config, view, collections, shell, Arc::new(service)))
    }

    /// Load the candidate list once and select the first entry.
    ///
    /// Later calls return the cached list without contacting the service.
    pub async fn initialize(&self) -> TraceResult<Vec<TraceCandidate>> {
        let cached = self.candidates.lock().unwrap().clone();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        if !self.loading.try_acquire() {
            return Err(TraceError::Busy);
        }
        let result = self.service.list_candidates().await;
        self.loading.release();

        match result {
            Ok(candidates) => {
                tracing::debug!("Loaded {} trace candidate(s)", candidates.len());
                if let Some(first) = candidates.first() {
                    self.selector.lock().unwrap().select_candidate(&first.id);
                }
                *self.candidates.lock().unwrap() = Some(candidates.clone());
                Ok(candidates)
            }
            Err(e) => {
                tracing::warn!("Loading trace candidates failed: {}", e);
                self.shell.alert(&e.to_string());
                Err(e)
            }
        }
    }

    /// Loaded candidates; empty before `initialize` succeeds
    pub fn candidates(&self) -> Vec<TraceCandidate> {
        self.candidates.lock().unwrap().clone().unwrap_or_default()
    }

    pub fn select_candidate(&self, candidate_id: &str) {
        self.selector.lock().unwrap().select_candidate(candidate_id);
    }

    pub fn set_mode(&self, mode: TraceMode) {
        self.selector.lock().unwrap().set_mode(mode);
    }

    pub fn mode(&self) -> TraceMode {
        self.selector.lock().unwrap().mode()
    }

    /// Store a start point resolved elsewhere (e.g. passed on the command line)
    pub fn set_start_point(&self, global_id: &str) {
        self.selector
            .lock()
            .unwrap()
            .set_resolved_start_point(global_id);
    }

    pub fn trace_input(&self) -> TraceResult<TraceInput> {
        self.selector.lock().unwrap().trace_input()
    }

    pub fn begin_pick(&self) -> JoinHandle<PickOutcome> {
        self.picker.begin()
    }

    pub async fn generate(&self) -> TraceResult<PipelineOutcome> {
        self.orchestrator.generate().await
    }

    pub fn rows(&self) -> Vec<HighlightedFeature> {
        self.highlights.rows()
    }

    /// Number of highlight handles currently held
    pub fn highlight_count(&self) -> usize {
        self.highlights.handle_count()
    }

    /// Center the map on a result row and show its popup
    pub async fn zoom_to_row(&self, index: usize) -> TraceResult<()> {
        let row = self
            .highlights
            .row(index)
            .ok_or_else(|| TraceError::Map(format!("No result row at index {}", index)))?;

        let geometry = row.feature.geometry.clone().ok_or_else(|| {
            TraceError::Map(format!("Feature {} has no geometry", row.feature_id))
        })?;

        self.view
            .go_to(&geometry, self.zoom_level)
            .await
            .map_err(|e| TraceError::Map(format!("{:#}", e)))?;

        if let Some((x, y)) = geometry.anchor() {
            let location = MapPoint {
                x,
                y,
                spatial_reference: self.view.spatial_reference(),
            };
            self.view.open_popup(vec![row.feature], location);
        }

        Ok(())
    }

    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    pub fn state(&self) -> watch::Receiver<PipelineState> {
        self.orchestrator.state()
    }

    /// Detach from the map: disarm picking, drop any running pipeline and
    /// release every highlight
    pub fn teardown(&self) {
        tracing::debug!("Tearing down trace session");
        self.picker.cancel();
        self.orchestrator.supersede();
        self.highlights.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Feature, Geometry, InMemoryLayer, InMemoryMap, SpatialReference};
    use crate::service::MockTraceService;
    use crate::shell::RecordingShell;
    use serde_json::json;

    fn feature(object_id: i64, global_id: &str, geometry: Option<Geometry>) -> Feature {
        let mut attributes = serde_json::Map::new();
        attributes.insert("globalid".to_string(), json!(global_id));
        Feature {
            object_id,
            attributes,
            geometry,
        }
    }

    fn candidates() -> Vec<TraceCandidate> {
        vec![
            TraceCandidate {
                id: "A".to_string(),
                display_name: "Alpha".to_string(),
            },
            TraceCandidate {
                id: "B".to_string(),
                display_name: "Zeta".to_string(),
            },
        ]
    }

    fn session(service: MockTraceService) -> (Arc<InMemoryMap>, Arc<RecordingShell>, TraceSession) {
        let map = Arc::new(InMemoryMap::new(
            SpatialReference::new(3857),
            vec![InMemoryLayer::new(
                "lines",
                Some("Lines"),
                vec![
                    feature(
                        1,
                        "f1",
                        Some(Geometry::Polyline {
                            paths: vec![vec![[0.0, 0.0], [10.0, 20.0]]],
                        }),
                    ),
                    feature(2, "f2", None),
                ],
            )],
        ));
        let shell = Arc::new(RecordingShell::new());
        let session = TraceSession::new(
            &Config::default(),
            map.clone(),
            Vec::new(),
            shell.clone(),
            Arc::new(service),
        );
        (map, shell, session)
    }

    #[tokio::test]
    async fn test_initialize_selects_first_candidate_once() {
        let mut service = MockTraceService::new();
        service
            .expect_list_candidates()
            .times(1)
            .returning(|| Ok(candidates()));
        let (_, _, session) = session(service);

        let first = session.initialize().await.unwrap();
        let second = session.initialize().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            session.trace_input().unwrap(),
            TraceInput::Subnetwork {
                candidate_id: "A".to_string()
            }
        );
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_initialize_failure_is_surfaced() {
        let mut service = MockTraceService::new();
        service
            .expect_list_candidates()
            .returning(|| Err(TraceError::EmptyResult));
        let (_, shell, session) = session(service);

        assert_eq!(session.initialize().await, Err(TraceError::EmptyResult));
        assert_eq!(
            shell.alerts(),
            vec!["No data currently matches this condition".to_string()]
        );
        assert!(session.candidates().is_empty());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_zoom_to_row_centers_and_opens_popup() {
        let mut service = MockTraceService::new();
        service
            .expect_trace()
            .returning(|_| Ok(vec!["f1".to_string(), "f2".to_string()]));
        service
            .expect_build_diagram()
            .returning(|_| Ok("d".to_string()));
        service
            .expect_export_diagram()
            .returning(|_| Ok("http://host/d.pdf".to_string()));
        let (map, _, session) = session(service);
        session.select_candidate("A");

        let outcome = session.generate().await.unwrap();
        outcome.side_effects.highlight.await.unwrap();

        let index = session
            .rows()
            .iter()
            .position(|row| row.feature_id == "f1")
            .unwrap();
        session.zoom_to_row(index).await.unwrap();

        let (_, zoom) = map.camera().unwrap();
        assert_eq!(zoom, 12);
        let popups = map.popups();
        assert_eq!(popups.len(), 1);
        assert_eq!(popups[0].object_ids, vec![1]);
        assert_eq!((popups[0].location.x, popups[0].location.y), (5.0, 10.0));

        let bare = session
            .rows()
            .iter()
            .position(|row| row.feature_id == "f2")
            .unwrap();
        assert!(matches!(
            session.zoom_to_row(bare).await,
            Err(TraceError::Map(_))
        ));
        assert!(matches!(
            session.zoom_to_row(99).await,
            Err(TraceError::Map(_))
        ));
    }

    #[tokio::test]
    async fn test_teardown_releases_everything() {
        let mut service = MockTraceService::new();
        service
            .expect_trace()
            .returning(|_| Ok(vec!["f1".to_string()]));
        service
            .expect_build_diagram()
            .returning(|_| Ok("d".to_string()));
        service
            .expect_export_diagram()
            .returning(|_| Ok("http://host/d.pdf".to_string()));
        let (map, _, session) = session(service);

        let outcome = session.generate().await.unwrap();
        outcome.side_effects.highlight.await.unwrap();
        assert_eq!(session.highlight_count(), 1);

        let pick = session.begin_pick();
        session.teardown();

        assert_eq!(pick.await.unwrap(), PickOutcome::Superseded);
        assert!(session.rows().is_empty());
        assert!(map.live_highlights().is_empty());
        assert_eq!(map.listener_count(), 0);
        assert!(*session.state().borrow() == PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_teardown_before_highlight_task_runs() {
        let mut service = MockTraceService::new();
        service
            .expect_trace()
            .returning(|_| Ok(vec!["f1".to_string()]));
        service
            .expect_build_diagram()
            .returning(|_| Ok("d".to_string()));
        service
            .expect_export_diagram()
            .returning(|_| Ok("http://host/d.pdf".to_string()));
        let (map, _, session) = session(service);

        let outcome = session.generate().await.unwrap();
        session.teardown();
        let summary = outcome.side_effects.highlight.await.unwrap();

        assert!(summary.superseded);
        assert!(map.live_highlights().is_empty());
        assert!(session.rows().is_empty());
        assert_eq!(session.highlight_count(), 0);
    }
}
