#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

use eventdex::catalog::{CatalogSource, EventRecord};
use eventdex::config::EmbeddingBackend;
use eventdex::embedding::{Encoder, HashEncoder};
use eventdex::error::{CatalogError, CatalogResult, EncoderError, EncoderResult};
use eventdex::refresh::RefreshController;
use eventdex::vector::{IndexSnapshot, SnapshotStore, VectorDimension};
use eventdex::{EventSearchService, Settings};

/// Events with no vocabulary in common and no words the query parser
/// treats as filters.
pub fn distinct_events() -> Vec<EventRecord> {
    vec![
        EventRecord::new("a", "Harbour kayak tour")
            .with_description("Paddle past lighthouses and seals")
            .with_location("Seattle, WA"),
        EventRecord::new("b", "Pottery wheel basics")
            .with_description("Throw bowls and glaze mugs")
            .with_location("Portland, OR"),
        EventRecord::new("c", "Night sky photography walk")
            .with_description("Long exposures of constellations")
            .with_location("Tucson, AZ"),
    ]
}

/// Catalog whose answer can be swapped between pulls.
pub struct TestCatalog {
    response: Mutex<CatalogResult<Vec<EventRecord>>>,
    pulls: AtomicUsize,
}

impl TestCatalog {
    pub fn new(records: Vec<EventRecord>) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(records)),
            pulls: AtomicUsize::new(0),
        })
    }

    pub fn set_records(&self, records: Vec<EventRecord>) {
        *self.response.lock() = Ok(records);
    }

    /// Simulate the catalog dropping the connection part way through a pull.
    pub fn disconnect(&self) {
        *self.response.lock() = Err(CatalogError::Unreachable {
            source_name: "test".to_string(),
            reason: "connection reset after partial read".to_string(),
        });
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

impl CatalogSource for TestCatalog {
    fn list_all_events(&self) -> CatalogResult<Vec<EventRecord>> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.response.lock().clone()
    }

    fn name(&self) -> &str {
        "test"
    }
}

/// Catalog that blocks for a configurable time before answering.
pub struct SlowCatalog {
    records: Mutex<Vec<EventRecord>>,
    delay_ms: AtomicU64,
    pulls: AtomicUsize,
}

impl SlowCatalog {
    pub fn new(records: Vec<EventRecord>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
            delay_ms: AtomicU64::new(delay.as_millis() as u64),
            pulls: AtomicUsize::new(0),
        })
    }

    pub fn set_records(&self, records: Vec<EventRecord>) {
        *self.records.lock() = records;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

impl CatalogSource for SlowCatalog {
    fn list_all_events(&self) -> CatalogResult<Vec<EventRecord>> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(self.delay_ms.load(Ordering::SeqCst)));
        Ok(self.records.lock().clone())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Hash encoder that refuses any text containing `marker`.
pub struct FailingEncoder {
    inner: HashEncoder,
    marker: &'static str,
}

impl FailingEncoder {
    pub fn new(marker: &'static str) -> Self {
        Self {
            inner: HashEncoder::default(),
            marker,
        }
    }
}

impl Encoder for FailingEncoder {
    fn generate_embeddings(&self, texts: &[&str]) -> EncoderResult<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains(self.marker)) {
            return Err(EncoderError::ModelUnavailable {
                reason: format!("cannot encode text containing {}", self.marker),
            });
        }
        self.inner.generate_embeddings(texts)
    }

    fn dimension(&self) -> VectorDimension {
        self.inner.dimension()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

pub fn empty_store() -> Arc<SnapshotStore> {
    let encoder = HashEncoder::default();
    Arc::new(SnapshotStore::new(IndexSnapshot::empty(
        encoder.dimension(),
        encoder.model_id(),
    )))
}

pub fn hash_controller(catalog: Arc<dyn CatalogSource>) -> RefreshController {
    RefreshController::new(catalog, Arc::new(HashEncoder::default()), empty_store())
}

/// Settings using the hash backend with the index under `temp_dir`.
pub fn test_settings(temp_dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.embedding.backend = EmbeddingBackend::Hash;
    settings.index.path = temp_dir.path().join("index");
    settings
}

pub fn hash_service(settings: &Settings, catalog: Arc<dyn CatalogSource>) -> EventSearchService {
    EventSearchService::with_components(settings, catalog, Arc::new(HashEncoder::default()))
        .expect("Failed to build service")
}
