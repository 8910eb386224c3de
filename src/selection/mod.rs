//! External selection propagation
//!
//! Other components on the page bind to their own queryable collections. After
//! a trace, the same identifiers are selected in each of them so every view
//! shows the traced network.

pub mod memory;

pub use memory::InMemoryCollection;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;

use crate::map::{Feature, FeatureQuery, GeometryType};
use crate::models::FeatureId;

/// A data source bound to another component
#[async_trait]
pub trait QueryableCollection: Send + Sync {
    fn id(&self) -> &str;

    fn geometry_type(&self) -> GeometryType;

    async fn query(&self, query: &FeatureQuery) -> Result<Vec<Feature>>;

    /// Mark records as selected, replacing the collection's current selection
    fn select_records_by_ids(&self, object_ids: &[i64]);
}

/// Outcome of one propagation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationSummary {
    /// Collection id and number of records selected in it
    pub selected: Vec<(String, usize)>,
    pub failed: Vec<String>,
}

/// Selects traced identifiers in every external collection
pub struct SelectionPropagator {
    collections: Vec<Arc<dyn QueryableCollection>>,
    id_field: String,
}

impl SelectionPropagator {
    pub fn new(collections: Vec<Arc<dyn QueryableCollection>>, id_field: &str) -> Self {
        Self {
            collections,
            id_field: id_field.to_string(),
        }
    }

    /// Query and select in every eligible collection concurrently.
    ///
    /// Failures are logged per collection and never affect the others.
    pub async fn propagate(&self, ids: &[FeatureId]) -> PropagationSummary {
        let eligible = self
            .collections
            .iter()
            .filter(|c| c.geometry_type().accepts_selection());

        let results = join_all(eligible.map(|collection| async move {
            let outcome = self.propagate_one(collection.as_ref(), ids).await;
            (collection.id().to_string(), outcome)
        }))
        .await;

        let mut summary = PropagationSummary::default();
        for (id, outcome) in results {
            match outcome {
                Ok(0) => {}
                Ok(count) => summary.selected.push((id, count)),
                Err(e) => {
                    tracing::warn!("Selection propagation to {} failed: {:#}", id, e);
                    summary.failed.push(id);
                }
            }
        }
        summary
    }

    async fn propagate_one(
        &self,
        collection: &dyn QueryableCollection,
        ids: &[FeatureId],
    ) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let query = FeatureQuery {
            return_geometry: false,
            ..FeatureQuery::default()
        }
        .with_ids(&self.id_field, ids);

        let records = collection.query(&query).await?;
        if records.is_empty() {
            tracing::debug!("No traced records in collection {}", collection.id());
            return Ok(0);
        }

        let object_ids: Vec<i64> = records.iter().map(|r| r.object_id).collect();
        collection.select_records_by_ids(&object_ids);
        tracing::debug!(
            "Selected {} record(s) in collection {}",
            object_ids.len(),
            collection.id()
        );
        Ok(object_ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(object_id: i64, global_id: &str) -> Feature {
        let mut attributes = serde_json::Map::new();
        attributes.insert("globalid".to_string(), json!(global_id));
        Feature {
            object_id,
            attributes,
            geometry: None,
        }
    }

    fn ids(list: &[&str]) -> Vec<FeatureId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_point_collection_selects_exact_matches() {
        let points = Arc::new(InMemoryCollection::new(
            "meters",
            GeometryType::Point,
            vec![record(1, "f1"), record(2, "f2"), record(3, "f3")],
        ));
        let propagator = SelectionPropagator::new(vec![points.clone()], "globalid");

        let summary = propagator.propagate(&ids(&["f1", "f3", "zz"])).await;

        assert_eq!(points.selected(), vec![1, 3]);
        assert_eq!(summary.selected, vec![("meters".to_string(), 2)]);
        assert!(summary.failed.is_empty());
    }

    #[tokio::test]
    async fn test_zero_matches_selects_nothing() {
        let points = Arc::new(InMemoryCollection::new(
            "meters",
            GeometryType::Point,
            vec![record(1, "f1")],
        ));
        let propagator = SelectionPropagator::new(vec![points.clone()], "globalid");

        let summary = propagator.propagate(&ids(&["nope"])).await;

        assert!(points.selected().is_empty());
        assert_eq!(points.selection_calls(), 0);
        assert_eq!(summary, PropagationSummary::default());
    }

    #[tokio::test]
    async fn test_failure_is_contained() {
        let broken = Arc::new(InMemoryCollection::new(
            "broken",
            GeometryType::Polyline,
            vec![record(1, "f1")],
        ));
        broken.set_fail_queries(true);
        let healthy = Arc::new(InMemoryCollection::new(
            "lines",
            GeometryType::Polyline,
            vec![record(5, "f1")],
        ));
        let propagator =
            SelectionPropagator::new(vec![broken.clone(), healthy.clone()], "globalid");

        let summary = propagator.propagate(&ids(&["f1"])).await;

        assert_eq!(healthy.selected(), vec![5]);
        assert_eq!(summary.failed, vec!["broken".to_string()]);
    }

    #[tokio::test]
    async fn test_ineligible_geometry_is_skipped() {
        let patches = Arc::new(InMemoryCollection::new(
            "buildings",
            GeometryType::Multipatch,
            vec![record(1, "f1")],
        ));
        let propagator = SelectionPropagator::new(vec![patches.clone()], "globalid");

        propagator.propagate(&ids(&["f1"])).await;

        assert_eq!(patches.query_calls(), 0);
        assert!(patches.selected().is_empty());
    }
}
