//! Semantic search over an event catalog with a continuously refreshed
//! embedding index.

pub mod catalog;
pub mod config;
pub mod display;
pub mod embedding;
pub mod error;
pub mod io;
pub mod logging;
pub mod refresh;
pub mod search;
pub mod service;
pub mod vector;

// Explicit exports for better API clarity
pub use catalog::{CatalogSource, EventRecord, JsonFileCatalog, SampleCatalog};
pub use config::Settings;
pub use embedding::{Encoder, FastEmbedEncoder, HashEncoder};
pub use error::{
    CatalogError, CatalogResult, EncoderError, EncoderResult, RefreshError, SearchError,
    StartupError,
};
pub use refresh::{RefreshController, RefreshOutcome, RefreshStatus};
pub use search::{QueryEngine, SearchHit};
pub use service::{EventPage, EventSearchService, Health};
pub use vector::{IndexSnapshot, SnapshotStore, TopK, VectorError, VectorResult};
