//! Bundled sample events.
//!
//! Serves as a catalog of its own for demos and as the fallback dataset
//! when a live catalog comes back empty.

use super::{CatalogSource, EventRecord};
use crate::error::{CatalogError, CatalogResult};

const SAMPLE_EVENTS: &str = include_str!("sample_events.json");

#[derive(Debug, Clone, Copy, Default)]
pub struct SampleCatalog;

impl SampleCatalog {
    /// The ten bundled events, in catalog order.
    pub fn events() -> CatalogResult<Vec<EventRecord>> {
        serde_json::from_str(SAMPLE_EVENTS).map_err(|e| CatalogError::Malformed {
            path: "sample_events.json".into(),
            reason: e.to_string(),
        })
    }
}

impl CatalogSource for SampleCatalog {
    fn list_all_events(&self) -> CatalogResult<Vec<EventRecord>> {
        Self::events()
    }

    fn name(&self) -> &str {
        "sample"
    }
}
