//! Domain data shared by the service client, the trace components and the CLI

use serde::{Deserialize, Serialize};

use crate::map::Feature;

/// Opaque identifier of a network feature as understood by the trace service
pub type FeatureId = String;

/// A subnetwork the user can trace from, as listed by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceCandidate {
    #[serde(rename = "globalId")]
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
}

/// Sort candidates by display name.
///
/// `sort_by` is stable, so equal names keep their arrival order.
pub fn sort_candidates(candidates: &mut [TraceCandidate]) {
    candidates.sort_by(|a, b| a.display_name.as_bytes().cmp(b.display_name.as_bytes()));
}

/// Which input the next trace is seeded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraceMode {
    /// Trace a pre-selected subnetwork candidate
    #[default]
    Subnetwork,
    /// Trace from a start point picked on the map
    StartPoint,
}

/// The value sent to the service for one trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceInput {
    Subnetwork { candidate_id: String },
    StartPoint { resolved_id: String },
}

/// One row of the result table: a matched feature on one layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightedFeature {
    pub layer_id: String,
    pub feature: Feature,
    pub feature_id: FeatureId,
    /// Layer title, or the layer id when the layer has no title
    pub display_label: String,
}
