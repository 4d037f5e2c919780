//! Catalog sources: where the refresh pulls event records from.

mod json;
mod record;
mod sample;

pub use json::JsonFileCatalog;
pub use record::{Category, EventRecord, Organizer};
pub use sample::SampleCatalog;

use std::sync::Arc;

use crate::config::{CatalogConfig, CatalogKind};
use crate::error::{CatalogError, CatalogResult};

/// Supplies the current full set of event records.
///
/// Pulls are synchronous; the refresh controller runs them on a blocking
/// thread under a timeout, so an implementation may block on I/O.
pub trait CatalogSource: Send + Sync {
    /// Every event the catalog currently knows about.
    ///
    /// # Errors
    /// `Unreachable` when the backing store cannot be contacted,
    /// `Malformed` when it answers with data that does not parse.
    fn list_all_events(&self) -> CatalogResult<Vec<EventRecord>>;

    /// Short name used in logs and errors.
    fn name(&self) -> &str;
}

/// Builds the catalog selected by configuration.
pub fn create_catalog(config: &CatalogConfig) -> CatalogResult<Arc<dyn CatalogSource>> {
    match config.kind {
        CatalogKind::Sample => Ok(Arc::new(SampleCatalog)),
        CatalogKind::JsonFile => {
            let path = config.path.clone().ok_or_else(|| CatalogError::Unreachable {
                source_name: "json_file".to_string(),
                reason: "catalog.path is not set".to_string(),
            })?;
            Ok(Arc::new(JsonFileCatalog::new(path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_create_sample_catalog() {
        let catalog = create_catalog(&CatalogConfig::default()).unwrap();
        assert_eq!(catalog.name(), "sample");
        assert_eq!(catalog.list_all_events().unwrap().len(), 10);
    }

    #[test]
    fn test_create_json_catalog_requires_path() {
        let config = CatalogConfig {
            kind: CatalogKind::JsonFile,
            path: None,
        };
        assert!(create_catalog(&config).is_err());

        let config = CatalogConfig {
            kind: CatalogKind::JsonFile,
            path: Some(PathBuf::from("events.json")),
        };
        assert_eq!(create_catalog(&config).unwrap().name(), "json_file");
    }
}
