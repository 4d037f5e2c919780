//! Catalog backed by a JSON export on disk.

use std::path::{Path, PathBuf};
use tracing::debug;

use super::{CatalogSource, EventRecord};
use crate::error::{CatalogError, CatalogResult};

/// Reads a JSON array of events, re-reading the file on every pull so a
/// refresh always sees the latest export.
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for JsonFileCatalog {
    fn list_all_events(&self) -> CatalogResult<Vec<EventRecord>> {
        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| CatalogError::Unreachable {
                source_name: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        let records: Vec<EventRecord> =
            serde_json::from_str(&contents).map_err(|e| CatalogError::Malformed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        debug!(path = %self.path.display(), count = records.len(), "read catalog file");
        Ok(records)
    }

    fn name(&self) -> &str {
        "json_file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_reads_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("events.json");
        fs::write(
            &path,
            r#"[
                {"_id": "a", "title": "Harbour Swim", "isFree": true},
                {"_id": "b", "title": "Kite Day", "user_id": "u1"}
            ]"#,
        )
        .unwrap();

        let records = JsonFileCatalog::new(&path).list_all_events().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_free);
        assert_eq!(records[1].owner.as_deref(), Some("u1"));
    }

    #[test]
    fn test_missing_file_is_unreachable() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = JsonFileCatalog::new(temp_dir.path().join("nope.json"));
        assert!(matches!(
            catalog.list_all_events(),
            Err(CatalogError::Unreachable { .. })
        ));
    }

    #[test]
    fn test_bad_json_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("events.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonFileCatalog::new(&path).list_all_events(),
            Err(CatalogError::Malformed { .. })
        ));
    }
}
