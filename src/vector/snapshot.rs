//! Immutable index snapshots and top-k similarity queries.
//!
//! A snapshot is built once from a complete set of entries and never
//! mutated afterwards. Refreshes build a fresh snapshot and hand it to
//! [`SnapshotStore::publish`](super::SnapshotStore::publish); readers keep
//! whatever `Arc<IndexSnapshot>` they loaded until they drop it.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{QueryFilters, TopK, VectorDimension, VectorError, cosine_similarity};
use crate::catalog::EventRecord;

/// Display metadata denormalised into the index so search results can be
/// rendered without a second catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub category: String,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub is_free: bool,
    pub price: String,
    pub tags: Vec<String>,
    pub organizer: String,
    pub url: String,
    pub image_url: String,
    pub created_at: Option<NaiveDateTime>,
    pub owner: Option<String>,
}

impl From<&EventRecord> for EventMetadata {
    fn from(record: &EventRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            location: record.location.clone(),
            category: record.category_name().to_string(),
            start_time: record.start_time,
            end_time: record.end_time,
            is_free: record.is_free,
            price: record.price.clone(),
            tags: record.tags.clone(),
            organizer: record.organizer_name(),
            url: record.url.clone(),
            image_url: record.image_url.clone(),
            created_at: record.created_at,
            // "global" is how the catalog marks shared events
            owner: record.owner.clone().filter(|owner| owner != "global"),
        }
    }
}

/// One indexed event: its embedding plus the metadata copy.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingEntry {
    pub vector: Vec<f32>,
    pub metadata: EventMetadata,
}

impl EmbeddingEntry {
    pub fn new(vector: Vec<f32>, metadata: EventMetadata) -> Self {
        Self { vector, metadata }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

/// A ranked hit borrowed from a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub entry: &'a EmbeddingEntry,
    pub score: f32,
}

impl Neighbor<'_> {
    pub fn id(&self) -> &str {
        self.entry.id()
    }
}

/// The full set of entries considered current for queries.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    /// Sorted by id ascending; this is the stable catalog order
    entries: Vec<EmbeddingEntry>,
    positions: HashMap<String, usize>,
    dimension: VectorDimension,
    model_id: String,
    built_at: DateTime<Utc>,
}

impl IndexSnapshot {
    /// A snapshot with no entries, served before the first refresh completes.
    pub fn empty(dimension: VectorDimension, model_id: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
            dimension,
            model_id: model_id.into(),
            built_at: Utc::now(),
        }
    }

    /// Builds a complete fresh snapshot.
    ///
    /// # Errors
    /// Fails if any vector has the wrong dimension or two entries share an id.
    /// Nothing previously published is touched either way.
    pub fn build(
        entries: Vec<EmbeddingEntry>,
        dimension: VectorDimension,
        model_id: impl Into<String>,
    ) -> Result<Self, VectorError> {
        Self::build_at(entries, dimension, model_id, Utc::now())
    }

    pub(crate) fn build_at(
        mut entries: Vec<EmbeddingEntry>,
        dimension: VectorDimension,
        model_id: impl Into<String>,
        built_at: DateTime<Utc>,
    ) -> Result<Self, VectorError> {
        for entry in &entries {
            dimension.validate_vector(&entry.vector)?;
        }

        entries.sort_by(|a, b| a.id().cmp(b.id()));

        let mut positions = HashMap::with_capacity(entries.len());
        for (pos, entry) in entries.iter().enumerate() {
            if positions.insert(entry.id().to_string(), pos).is_some() {
                return Err(VectorError::DuplicateId(entry.id().to_string()));
            }
        }

        Ok(Self {
            entries,
            positions,
            dimension,
            model_id: model_id.into(),
            built_at,
        })
    }

    /// Returns up to `top_k` entries passing `filters`, by descending cosine
    /// similarity. Equal scores are ordered by id ascending.
    pub fn query(
        &self,
        vector: &[f32],
        top_k: TopK,
        filters: &QueryFilters,
    ) -> Result<Vec<Neighbor<'_>>, VectorError> {
        self.dimension.validate_vector(vector)?;

        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<Neighbor<'_>> = self
            .entries
            .iter()
            .filter(|entry| filters.matches(&entry.metadata))
            .map(|entry| Neighbor {
                entry,
                score: cosine_similarity(vector, &entry.vector),
            })
            .collect();

        // Entries are already in id order, so a stable sort on score alone
        // keeps ties in catalog order. The explicit tie-break documents it.
        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.id().cmp(b.id()))
        });
        candidates.truncate(top_k.get());

        Ok(candidates)
    }

    pub fn get(&self, id: &str) -> Option<&EmbeddingEntry> {
        self.positions.get(id).map(|&pos| &self.entries[pos])
    }

    /// All entries in stable catalog order.
    pub fn entries(&self) -> &[EmbeddingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim(n: usize) -> VectorDimension {
        VectorDimension::new(n).unwrap()
    }

    fn entry(id: &str, vector: Vec<f32>) -> EmbeddingEntry {
        EmbeddingEntry::new(vector, EventMetadata::from(&EventRecord::new(id, id)))
    }

    #[test]
    fn test_build_sorts_by_id() {
        let snapshot = IndexSnapshot::build(
            vec![
                entry("c", vec![1.0, 0.0]),
                entry("a", vec![0.0, 1.0]),
                entry("b", vec![1.0, 1.0]),
            ],
            dim(2),
            "test",
        )
        .unwrap();

        let ids: Vec<&str> = snapshot.entries().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(snapshot.get("b").unwrap().vector, vec![1.0, 1.0]);
        assert!(snapshot.get("z").is_none());
    }

    #[test]
    fn test_build_rejects_bad_input() {
        let wrong_dim = IndexSnapshot::build(vec![entry("a", vec![1.0])], dim(2), "test");
        assert!(matches!(
            wrong_dim,
            Err(VectorError::DimensionMismatch { .. })
        ));

        let duplicate = IndexSnapshot::build(
            vec![entry("a", vec![1.0, 0.0]), entry("a", vec![0.0, 1.0])],
            dim(2),
            "test",
        );
        assert!(matches!(duplicate, Err(VectorError::DuplicateId(id)) if id == "a"));
    }

    #[test]
    fn test_query_ranks_descending() {
        let snapshot = IndexSnapshot::build(
            vec![
                entry("far", vec![0.0, 1.0]),
                entry("near", vec![1.0, 0.1]),
                entry("mid", vec![1.0, 1.0]),
            ],
            dim(2),
            "test",
        )
        .unwrap();

        let hits = snapshot
            .query(&[1.0, 0.0], TopK::new(2).unwrap(), &QueryFilters::default())
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_query_ties_break_by_id() {
        let snapshot = IndexSnapshot::build(
            vec![
                entry("b", vec![1.0, 0.0]),
                entry("c", vec![1.0, 0.0]),
                entry("a", vec![1.0, 0.0]),
            ],
            dim(2),
            "test",
        )
        .unwrap();

        let hits = snapshot
            .query(&[1.0, 0.0], TopK::default(), &QueryFilters::default())
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_query_empty_and_dimension() {
        let snapshot = IndexSnapshot::empty(dim(3), "test");
        let hits = snapshot
            .query(&[0.0, 0.0, 1.0], TopK::default(), &QueryFilters::default())
            .unwrap();
        assert!(hits.is_empty());

        let bad = snapshot.query(&[1.0], TopK::default(), &QueryFilters::default());
        assert!(bad.is_err());
    }

    #[test]
    fn test_query_applies_filters_before_ranking() {
        let mut free = EventRecord::new("free", "free");
        free.is_free = true;
        let snapshot = IndexSnapshot::build(
            vec![
                entry("paid", vec![1.0, 0.0]),
                EmbeddingEntry::new(vec![0.0, 1.0], EventMetadata::from(&free)),
            ],
            dim(2),
            "test",
        )
        .unwrap();

        let filters = QueryFilters {
            is_free: Some(true),
            ..QueryFilters::default()
        };
        let hits = snapshot
            .query(&[1.0, 0.0], TopK::new(1).unwrap(), &filters)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), "free");
    }
}
