//! Vector index for event embeddings.
//!
//! # Architecture
//! Snapshots are immutable. A refresh builds a complete [`IndexSnapshot`]
//! off to the side and publishes it through the [`SnapshotStore`], which
//! swaps a single `Arc`. Queries run against whichever snapshot they loaded
//! and never wait on a build.

mod filter;
mod similarity;
mod snapshot;
mod storage;
mod store;
mod types;

pub use filter::QueryFilters;
pub use similarity::{cosine_similarity, normalize};
pub use snapshot::{EmbeddingEntry, EventMetadata, IndexSnapshot, Neighbor};
pub use storage::{SnapshotMetadata, SnapshotPersistence};
pub use store::SnapshotStore;
pub use types::{
    DEFAULT_TOP_K, TopK, VECTOR_DIMENSION_384, VectorDimension, VectorError,
    VectorResult,
};
