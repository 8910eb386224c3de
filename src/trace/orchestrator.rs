//! Trace pipeline orchestration
//!
//! One run walks `ResolvingInput → Tracing → BuildingDiagram → Exporting`.
//! Every stage consumes the previous stage's output, so the first failure ends
//! the run and later stages are never attempted. Once the trace returns, the
//! identifiers are handed to the highlight manager and the selection
//! propagator on their own tasks; diagram building does not wait for them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::highlight::{HighlightManager, HighlightSummary};
use super::mode::TraceModeSelector;
use crate::error::{TraceError, TraceResult};
use crate::models::FeatureId;
use crate::selection::{PropagationSummary, SelectionPropagator};
use crate::service::TraceService;
use crate::shell::{HostShell, ViewerOptions};

/// Pipeline position. `Idle`, `Succeeded` and `Failed` are the resting states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    ResolvingInput,
    Tracing,
    BuildingDiagram,
    Exporting,
    Succeeded,
    Failed,
}

impl PipelineState {
    pub fn is_idle(self) -> bool {
        matches!(
            self,
            PipelineState::Idle | PipelineState::Succeeded | PipelineState::Failed
        )
    }
}

/// Busy flag shared by everything that talks to the service on the user's
/// behalf. The UI disables its triggers while it is set.
#[derive(Debug)]
pub struct LoadingFlag {
    tx: watch::Sender<bool>,
}

impl Default for LoadingFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingFlag {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Set the flag if it is clear; false when already set
    pub fn try_acquire(&self) -> bool {
        self.tx.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        })
    }

    pub fn release(&self) {
        self.tx.send_if_modified(|busy| std::mem::replace(busy, false));
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Work started from a trace result that the pipeline does not wait for
#[derive(Debug)]
pub struct SideEffects {
    pub highlight: JoinHandle<HighlightSummary>,
    pub propagation: JoinHandle<PropagationSummary>,
}

/// A completed run
#[derive(Debug)]
pub struct PipelineOutcome {
    pub identifiers: Vec<FeatureId>,
    pub diagram_name: String,
    pub download_link: String,
    pub side_effects: SideEffects,
}

pub struct TraceOrchestrator {
    service: Arc<dyn TraceService>,
    selector: Arc<Mutex<TraceModeSelector>>,
    highlights: Arc<HighlightManager>,
    propagator: Arc<SelectionPropagator>,
    shell: Arc<dyn HostShell>,
    viewer: ViewerOptions,
    loading: Arc<LoadingFlag>,
    state: watch::Sender<PipelineState>,
    epoch: AtomicU64,
}

impl TraceOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        service: Arc<dyn TraceService>,
        selector: Arc<Mutex<TraceModeSelector>>,
        highlights: Arc<HighlightManager>,
        propagator: Arc<SelectionPropagator>,
        shell: Arc<dyn HostShell>,
        viewer: ViewerOptions,
        loading: Arc<LoadingFlag>,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            service,
            selector,
            highlights,
            propagator,
            shell,
            viewer,
            loading,
            state,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Run the pipeline once.
    ///
    /// Rejected with `Busy` while anything holds the loading flag. Failures
    /// are shown through the host shell before being returned; on success the
    /// exported diagram is opened.
    pub async fn generate(&self) -> TraceResult<PipelineOutcome> {
        let result = self.run_exclusive().await;

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    "Trace of {} feature(s) exported as {}",
                    outcome.identifiers.len(),
                    outcome.diagram_name
                );
                self.state.send_replace(PipelineState::Succeeded);
                self.loading.release();
                self.shell.open_link(&outcome.download_link, &self.viewer);
            }
            Err(e) if e.is_terminal() => {
                tracing::warn!("Trace pipeline failed: {}", e);
                self.state.send_replace(PipelineState::Failed);
                self.loading.release();
                self.shell.alert(&e.to_string());
            }
            // Rejected or discarded: the flag and the state belong to someone else
            Err(e) => tracing::debug!("Generate not applied: {}", e),
        }

        result
    }

    /// Drop whatever run is in flight: its result is discarded when it lands
    pub fn supersede(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(PipelineState::Idle);
        self.loading.release();
    }

    async fn run_exclusive(&self) -> TraceResult<PipelineOutcome> {
        if !self.loading.try_acquire() {
            return Err(TraceError::Busy);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let result = self.run(epoch).await;

        if !self.is_current(epoch) {
            return Err(TraceError::Superseded);
        }
        result
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn enter(&self, epoch: u64, stage: PipelineState) -> TraceResult<()> {
        if !self.is_current(epoch) {
            return Err(TraceError::Superseded);
        }
        tracing::debug!("Pipeline stage: {:?}", stage);
        self.state.send_replace(stage);
        Ok(())
    }

    async fn run(&self, epoch: u64) -> TraceResult<PipelineOutcome> {
        self.enter(epoch, PipelineState::ResolvingInput)?;
        let input = self.selector.lock().unwrap().trace_input()?;

        self.enter(epoch, PipelineState::Tracing)?;
        let identifiers = self.service.trace(&input).await?;

        // Stale runs must not touch the highlights of a newer result set
        if !self.is_current(epoch) {
            return Err(TraceError::Superseded);
        }
        let side_effects = self.dispatch(&identifiers);

        self.enter(epoch, PipelineState::BuildingDiagram)?;
        let diagram_name = self.service.build_diagram(&identifiers).await?;

        self.enter(epoch, PipelineState::Exporting)?;
        let download_link = self.service.export_diagram(&diagram_name).await?;

        Ok(PipelineOutcome {
            identifiers,
            diagram_name,
            download_link,
            side_effects,
        })
    }

    fn dispatch(&self, identifiers: &[FeatureId]) -> SideEffects {
        // Reserved here so a teardown before the task runs still voids it
        let ticket = self.highlights.begin();
        let highlights = Arc::clone(&self.highlights);
        let highlight_ids = identifiers.to_vec();
        let highlight =
            tokio::spawn(async move { highlights.apply_with(ticket, &highlight_ids).await });

        let propagator = Arc::clone(&self.propagator);
        let propagation_ids = identifiers.to_vec();
        let propagation =
            tokio::spawn(async move { propagator.propagate(&propagation_ids).await });

        SideEffects {
            highlight,
            propagation,
        }
    }
}
