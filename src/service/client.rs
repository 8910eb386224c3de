//! Trace service client
//!
//! Each operation is one request/response exchange. Bodies go through the
//! shared envelope step before their payload is interpreted.

use std::sync::Arc;

use async_trait::async_trait;

use super::envelope;
use super::transport::Transport;
use crate::error::{TraceError, TraceResult};
use crate::models::{FeatureId, TraceCandidate, TraceInput, sort_candidates};

pub const GET_TRACE_ITEMS: &str = "getTraceItems";
pub const TRACE: &str = "trace";
pub const CREATE_SINGLE_DIAGRAM: &str = "createSingleDiagram";
pub const EXPORT_SINGLE_DIAGRAM: &str = "exportSingleDiagram";
pub const QUERY_FOR_GLOBAL_ID: &str = "queryForGlobalId";

/// Location marker the service expects when tracing a whole subnetwork
pub const DEFAULT_LOCATION_ID: &str = "{57297DF8-B6B9-49FB-9A4D-E7112623297C}";

/// Operations offered by the trace service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TraceService: Send + Sync {
    /// Traceable subnetworks, sorted by display name
    async fn list_candidates(&self) -> TraceResult<Vec<TraceCandidate>>;

    /// Run a trace and return the identifiers of every reached feature
    async fn trace(&self, input: &TraceInput) -> TraceResult<Vec<FeatureId>>;

    /// Generate a schematic diagram from traced features, returning its name
    async fn build_diagram(&self, ids: &[FeatureId]) -> TraceResult<String>;

    /// Export a generated diagram, returning its download link
    async fn export_diagram(&self, diagram_name: &str) -> TraceResult<String>;

    /// Map a layer feature to the identifier the service traces from
    async fn resolve_global_id(&self, layer_id: &str, object_id: i64) -> TraceResult<FeatureId>;
}

/// Client speaking the service's enveloped text protocol over a [`Transport`]
pub struct TraceServiceClient {
    transport: Arc<dyn Transport>,
    default_location_id: String,
}

impl TraceServiceClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_default_location(transport, DEFAULT_LOCATION_ID)
    }

    /// Use a different location marker for subnetwork traces
    pub fn with_default_location(transport: Arc<dyn Transport>, location_id: &str) -> Self {
        Self {
            transport,
            default_location_id: location_id.to_string(),
        }
    }

    async fn get(&self, endpoint: &str) -> TraceResult<String> {
        let raw = self
            .transport
            .get(endpoint)
            .await
            .map_err(|e| TraceError::Transport(format!("{:#}", e)))?;
        envelope::decode(&raw)
    }

    async fn post(&self, endpoint: &str, fields: Vec<(String, String)>) -> TraceResult<String> {
        let raw = self
            .transport
            .post_form(endpoint, fields)
            .await
            .map_err(|e| TraceError::Transport(format!("{:#}", e)))?;
        envelope::decode(&raw)
    }

    fn trace_fields(&self, input: &TraceInput) -> Vec<(String, String)> {
        let (seed, location) = match input {
            TraceInput::Subnetwork { candidate_id } => {
                (candidate_id.clone(), self.default_location_id.clone())
            }
            TraceInput::StartPoint { resolved_id } => (String::new(), resolved_id.clone()),
        };
        vec![
            ("traceGlobalId".to_string(), seed),
            ("locationGlobalId".to_string(), location),
        ]
    }
}

#[async_trait]
impl TraceService for TraceServiceClient {
    async fn list_candidates(&self) -> TraceResult<Vec<TraceCandidate>> {
        let payload = self.get(GET_TRACE_ITEMS).await?;

        let mut candidates: Vec<TraceCandidate> = serde_json::from_str(&payload)
            .map_err(|e| TraceError::MalformedResult(format!("trace items: {}", e)))?;

        if candidates.is_empty() {
            return Err(TraceError::EmptyResult);
        }

        sort_candidates(&mut candidates);
        tracing::debug!("Loaded {} trace candidate(s)", candidates.len());
        Ok(candidates)
    }

    async fn trace(&self, input: &TraceInput) -> TraceResult<Vec<FeatureId>> {
        tracing::debug!("Tracing from {:?}", input);
        let payload = self.post(TRACE, self.trace_fields(input)).await?;

        let ids: Vec<FeatureId> = serde_json::from_str(&payload).map_err(|_| {
            TraceError::MalformedResult("no global ids were traced".to_string())
        })?;

        tracing::debug!("Trace returned {} identifier(s)", ids.len());
        Ok(ids)
    }

    async fn build_diagram(&self, ids: &[FeatureId]) -> TraceResult<String> {
        let initial_features = serde_json::to_string(ids)
            .map_err(|e| TraceError::MalformedResult(format!("initial features: {}", e)))?;

        self.post(
            CREATE_SINGLE_DIAGRAM,
            vec![("initialFeatures".to_string(), initial_features)],
        )
        .await
    }

    async fn export_diagram(&self, diagram_name: &str) -> TraceResult<String> {
        self.post(
            EXPORT_SINGLE_DIAGRAM,
            vec![("diagram_name".to_string(), diagram_name.to_string())],
        )
        .await
    }

    async fn resolve_global_id(&self, layer_id: &str, object_id: i64) -> TraceResult<FeatureId> {
        let id = self
            .post(
                QUERY_FOR_GLOBAL_ID,
                vec![
                    ("layerId".to_string(), layer_id.to_string()),
                    ("objectId".to_string(), object_id.to_string()),
                ],
            )
            .await?;

        if id.trim().is_empty() {
            return Err(TraceError::MalformedResult(format!(
                "no global id for object {} on layer {}",
                object_id, layer_id
            )));
        }
        Ok(id.trim().to_string())
    }
}
