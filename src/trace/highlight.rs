//! Highlight and result-set management
//!
//! Owns every highlight handle on the map view. Each `apply` replaces the
//! previous result set as a whole: old handles are released and old rows
//! dropped before any layer is queried. Layers are processed concurrently and
//! rows are appended in the order layers complete.
//!
//! A caller that hands the work to another task reserves its result set with
//! [`HighlightManager::begin`] first, so a `clear` or a newer `begin` issued
//! before that task runs still supersedes it.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::future::join_all;

use crate::map::{FeatureLayer, HighlightHandle, MapView};
use crate::models::{FeatureId, HighlightedFeature};

/// Outcome of one `apply`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightSummary {
    /// Layers that contributed at least one feature
    pub layers: usize,
    pub features: usize,
    /// Layers whose query or highlight failed
    pub failed_layers: Vec<String>,
    /// A newer `apply` or `clear` replaced this result set before it finished
    pub superseded: bool,
}

/// Reservation of the next result set, taken by [`HighlightManager::begin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightTicket {
    generation: u64,
}

enum LayerOutcome {
    NoMatch,
    Highlighted(usize),
    Stale,
}

#[derive(Default)]
struct HighlightState {
    generation: u64,
    handles: Vec<Box<dyn HighlightHandle>>,
    rows: Vec<HighlightedFeature>,
}

pub struct HighlightManager {
    view: Arc<dyn MapView>,
    id_field: String,
    state: Mutex<HighlightState>,
}

impl HighlightManager {
    pub fn new(view: Arc<dyn MapView>, id_field: &str) -> Self {
        Self {
            view,
            id_field: id_field.to_string(),
            state: Mutex::new(HighlightState::default()),
        }
    }

    /// Rows of the result table
    pub fn rows(&self) -> Vec<HighlightedFeature> {
        self.state.lock().unwrap().rows.clone()
    }

    pub fn row(&self, index: usize) -> Option<HighlightedFeature> {
        self.state.lock().unwrap().rows.get(index).cloned()
    }

    /// Highlight handles currently held
    pub fn handle_count(&self) -> usize {
        self.state.lock().unwrap().handles.len()
    }

    /// Replace the current result set with features matching `ids`
    pub async fn apply(&self, ids: &[FeatureId]) -> HighlightSummary {
        let ticket = self.begin();
        self.apply_with(ticket, ids).await
    }

    /// Release the current result set and reserve the next one
    pub fn begin(&self) -> HighlightTicket {
        HighlightTicket {
            generation: self.reset(),
        }
    }

    /// Fill the result set reserved by `ticket`.
    ///
    /// Does nothing when a `clear` or a newer `begin` came after the ticket.
    pub async fn apply_with(&self, ticket: HighlightTicket, ids: &[FeatureId]) -> HighlightSummary {
        let generation = ticket.generation;
        let mut summary = HighlightSummary::default();
        if !self.is_current(generation) {
            tracing::debug!("Skipping superseded highlight generation {}", generation);
            summary.superseded = true;
            return summary;
        }
        if ids.is_empty() {
            return summary;
        }

        let layers = self.view.feature_layers();
        tracing::debug!(
            "Highlighting {} identifier(s) across {} layer(s)",
            ids.len(),
            layers.len()
        );

        let outcomes = join_all(layers.iter().map(|layer| async move {
            let outcome = self.highlight_layer(layer.as_ref(), ids, generation).await;
            (layer.id().to_string(), outcome)
        }))
        .await;

        for (layer_id, outcome) in outcomes {
            match outcome {
                Ok(LayerOutcome::NoMatch) => {}
                Ok(LayerOutcome::Highlighted(count)) => {
                    summary.layers += 1;
                    summary.features += count;
                }
                Ok(LayerOutcome::Stale) => summary.superseded = true,
                Err(e) => {
                    tracing::warn!("Highlighting layer {} failed: {:#}", layer_id, e);
                    summary.failed_layers.push(layer_id);
                }
            }
        }

        summary
    }

    /// Release every handle and drop every row
    pub fn clear(&self) {
        self.reset();
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().unwrap().generation == generation
    }

    fn reset(&self) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        for handle in state.handles.drain(..) {
            handle.remove();
        }
        state.rows.clear();
        state.generation
    }

    async fn highlight_layer(
        &self,
        layer: &dyn FeatureLayer,
        ids: &[FeatureId],
        generation: u64,
    ) -> Result<LayerOutcome> {
        let query = layer.create_query().with_ids(&self.id_field, ids);
        let features = layer.query_features(&query).await?;
        if features.is_empty() {
            return Ok(LayerOutcome::NoMatch);
        }

        let layer_view = self.view.when_layer_view(layer.id()).await?;
        let handle = layer_view.highlight(&features)?;

        let rows: Vec<HighlightedFeature> = features
            .into_iter()
            .map(|feature| HighlightedFeature {
                layer_id: layer.id().to_string(),
                feature_id: feature
                    .attribute_str(&self.id_field)
                    .unwrap_or_default()
                    .to_string(),
                feature,
                display_label: layer.display_name().to_string(),
            })
            .collect();

        Ok(self.store(generation, handle, rows))
    }

    fn store(
        &self,
        generation: u64,
        handle: Box<dyn HighlightHandle>,
        rows: Vec<HighlightedFeature>,
    ) -> LayerOutcome {
        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            // A newer result set owns the view now
            handle.remove();
            return LayerOutcome::Stale;
        }

        let count = rows.len();
        state.handles.push(handle);
        state.rows.extend(rows);
        LayerOutcome::Highlighted(count)
    }
}
