//! Query execution against the published snapshot.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::query::{ParsedQuery, extract_filters};
use crate::config::SearchConfig;
use crate::embedding::Encoder;
use crate::error::SearchError;
use crate::vector::{
    EventMetadata, IndexSnapshot, QueryFilters, SnapshotStore, TopK, VectorError,
};

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub event: EventMetadata,
    /// Cosine similarity between query and event, in [-1, 1]
    pub score: f32,
}

/// Read-only consumer of the snapshot store. Never triggers a refresh.
pub struct QueryEngine {
    encoder: Arc<dyn Encoder>,
    store: Arc<SnapshotStore>,
    top_k: TopK,
    extract_filters: bool,
    filter_by_date: bool,
    min_score: Option<f32>,
}

impl QueryEngine {
    pub fn new(encoder: Arc<dyn Encoder>, store: Arc<SnapshotStore>) -> Self {
        Self {
            encoder,
            store,
            top_k: TopK::default(),
            extract_filters: false,
            filter_by_date: false,
            min_score: None,
        }
    }

    /// # Errors
    /// `InvalidTopK` if `search.top_k` is zero.
    pub fn with_config(mut self, config: &SearchConfig) -> Result<Self, VectorError> {
        self.top_k = TopK::new(config.top_k)?;
        self.extract_filters = config.extract_filters;
        self.filter_by_date = config.filter_by_date;
        self.min_score = config.min_score;
        Ok(self)
    }

    pub fn with_top_k(mut self, top_k: TopK) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter_extraction(mut self, enabled: bool) -> Self {
        self.extract_filters = enabled;
        self
    }

    pub fn with_date_filter(mut self, enabled: bool) -> Self {
        self.filter_by_date = enabled;
        self
    }

    pub fn top_k(&self) -> TopK {
        self.top_k
    }

    /// Rank events against `query`, scoped to global events plus those owned
    /// by `requester`.
    ///
    /// Blank queries and an empty snapshot both yield no results. Only an
    /// encoder failure on the query itself is an error.
    ///
    /// When extracted filters leave nothing, the whole query is ranked again
    /// with only the requester scope applied.
    pub fn search(
        &self,
        query: &str,
        requester: Option<&str>,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self.store.current();
        if snapshot.is_empty() {
            debug!("search on empty snapshot");
            return Ok(Vec::new());
        }

        let scope = QueryFilters {
            requester: requester.map(str::to_string),
            ..QueryFilters::default()
        };

        if self.extract_filters {
            let ParsedQuery {
                text,
                mut filters,
                date,
            } = extract_filters(query);
            if self.filter_by_date {
                filters.date = date;
            }

            if filters.is_unconstrained() {
                return self.rank(&snapshot, &text, &scope);
            }

            filters.requester = scope.requester.clone();
            let hits = self.rank(&snapshot, &text, &filters)?;
            if !hits.is_empty() {
                return Ok(hits);
            }
            debug!(?filters, "extracted filters matched nothing, ranking unfiltered");
        }

        self.rank(&snapshot, query, &scope)
    }

    fn rank(
        &self,
        snapshot: &IndexSnapshot,
        text: &str,
        filters: &QueryFilters,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let vector = self.encoder.encode(text)?;
        let hits: Vec<SearchHit> = snapshot
            .query(&vector, self.top_k, filters)?
            .into_iter()
            .filter(|n| self.min_score.is_none_or(|min| n.score >= min))
            .map(|n| SearchHit {
                event: n.entry.metadata.clone(),
                score: n.score,
            })
            .collect();

        debug!(query = %text, ?filters, hits = hits.len(), "search complete");
        Ok(hits)
    }
}
