//! In-memory queryable collection

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use super::QueryableCollection;
use crate::map::{Feature, FeatureQuery, GeometryType};

/// Collection of records held in memory, recording its selection
pub struct InMemoryCollection {
    id: String,
    geometry_type: GeometryType,
    records: Vec<Feature>,
    selected: Mutex<Vec<i64>>,
    fail_queries: AtomicBool,
    query_calls: AtomicUsize,
    selection_calls: AtomicUsize,
}

impl InMemoryCollection {
    pub fn new(id: &str, geometry_type: GeometryType, records: Vec<Feature>) -> Self {
        Self {
            id: id.to_string(),
            geometry_type,
            records,
            selected: Mutex::new(Vec::new()),
            fail_queries: AtomicBool::new(false),
            query_calls: AtomicUsize::new(0),
            selection_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Object ids currently selected
    pub fn selected(&self) -> Vec<i64> {
        self.selected.lock().unwrap().clone()
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn selection_calls(&self) -> usize {
        self.selection_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryableCollection for InMemoryCollection {
    fn id(&self) -> &str {
        &self.id
    }

    fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    async fn query(&self, query: &FeatureQuery) -> Result<Vec<Feature>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            anyhow::bail!("query failed on collection {}", self.id);
        }

        Ok(self
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect())
    }

    fn select_records_by_ids(&self, object_ids: &[i64]) {
        self.selection_calls.fetch_add(1, Ordering::SeqCst);
        *self.selected.lock().unwrap() = object_ids.to_vec();
    }
}
