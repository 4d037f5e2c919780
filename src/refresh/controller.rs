//! Rebuilds the served snapshot from the catalog.
//!
//! A refresh pulls every record, encodes each one, builds a complete
//! snapshot and publishes it in a single swap. Pulling and encoding run on
//! a blocking thread under a timeout; the publish happens back on the async
//! side and only when the build finished in time, so a stalled run can
//! neither publish late nor keep the running marker.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::{RefreshBroadcaster, RefreshEvent, RefreshState, RefreshStatus};
use crate::catalog::{CatalogSource, EventRecord, SampleCatalog};
use crate::config::{EmptyCatalogPolicy, RefreshConfig};
use crate::embedding::Encoder;
use crate::error::RefreshError;
use crate::vector::{
    EmbeddingEntry, EventMetadata, IndexSnapshot, SnapshotPersistence, SnapshotStore,
};

/// Result of encoding one catalog record.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeOutcome {
    Encoded(EmbeddingEntry),
    Skipped { id: String, reason: String },
}

/// What a caller of `manual_refresh` gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Succeeded { entries: usize, skipped: usize },
    AlreadyRunning,
    Failed { reason: String },
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded { entries, skipped } => {
                write!(f, "succeeded: {entries} entries indexed, {skipped} skipped")
            }
            Self::AlreadyRunning => write!(f, "refresh already in progress"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Scheduled,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

enum Built {
    Snapshot { snapshot: IndexSnapshot, skipped: usize },
    /// Empty catalog under `KeepPrevious`: nothing to publish
    KeepPrevious,
}

/// Exclusive writer of the served snapshot and of [`RefreshState`].
pub struct RefreshController {
    catalog: Arc<dyn CatalogSource>,
    encoder: Arc<dyn Encoder>,
    store: Arc<SnapshotStore>,
    state: RefreshState,
    timeout: Duration,
    empty_catalog: EmptyCatalogPolicy,
    persistence: Option<SnapshotPersistence>,
    broadcaster: Option<RefreshBroadcaster>,
}

impl RefreshController {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        encoder: Arc<dyn Encoder>,
        store: Arc<SnapshotStore>,
    ) -> Self {
        let defaults = RefreshConfig::default();
        Self {
            catalog,
            encoder,
            store,
            state: RefreshState::new(),
            timeout: defaults.timeout(),
            empty_catalog: defaults.empty_catalog,
            persistence: None,
            broadcaster: None,
        }
    }

    /// Apply timeout and empty-catalog policy from configuration.
    pub fn with_config(mut self, config: &RefreshConfig) -> Self {
        self.timeout = config.timeout();
        self.empty_catalog = config.empty_catalog;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_empty_catalog_policy(mut self, policy: EmptyCatalogPolicy) -> Self {
        self.empty_catalog = policy;
        self
    }

    /// Persist every published snapshot here.
    pub fn with_persistence(mut self, persistence: SnapshotPersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: RefreshBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Timer entry point. A no-op while another refresh is running.
    pub async fn scheduled_refresh(&self) -> RefreshOutcome {
        self.run(Trigger::Scheduled).await
    }

    /// On-demand entry point with the same single-flight guarantee.
    pub async fn manual_refresh(&self) -> RefreshOutcome {
        self.run(Trigger::Manual).await
    }

    pub fn status(&self) -> RefreshStatus {
        self.state.status()
    }

    pub fn state(&self) -> &RefreshState {
        &self.state
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Publish the persisted snapshot, if there is one built by the active
    /// encoder. Returns whether anything was loaded.
    ///
    /// Failures are logged and ignored; the next refresh rebuilds anyway.
    pub fn warm_start(&self) -> bool {
        let Some(persistence) = &self.persistence else {
            return false;
        };
        if !persistence.exists() {
            debug!(path = %persistence.base_path().display(), "no persisted snapshot");
            return false;
        }

        let snapshot = match persistence.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to load persisted snapshot: {e}");
                return false;
            }
        };

        if snapshot.model_id() != self.encoder.model_id()
            || snapshot.dimension() != self.encoder.dimension()
        {
            warn!(
                persisted_model = snapshot.model_id(),
                active_model = self.encoder.model_id(),
                "persisted snapshot was built by a different encoder, ignoring it"
            );
            return false;
        }

        let entries = snapshot.len();
        self.state.record_warm_start(snapshot.built_at(), entries);
        self.store.publish(snapshot);
        info!(entries, "serving persisted snapshot until the first refresh");
        true
    }

    async fn run(&self, trigger: Trigger) -> RefreshOutcome {
        let Some(_running) = self.state.try_begin() else {
            info!(%trigger, "refresh already in progress, skipping");
            self.notify(RefreshEvent::Skipped);
            return RefreshOutcome::AlreadyRunning;
        };

        info!(%trigger, catalog = self.catalog.name(), "refresh started");
        self.notify(RefreshEvent::Started);
        let started = Instant::now();

        match self.build_with_timeout().await {
            Ok(Built::Snapshot { snapshot, skipped }) => {
                let entries = snapshot.len();
                self.store.publish(snapshot);
                self.state.record_success(entries, skipped);
                info!(
                    entries,
                    skipped,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "published new snapshot"
                );
                self.persist_current().await;
                self.notify(RefreshEvent::Published { entries, skipped });
                RefreshOutcome::Succeeded { entries, skipped }
            }
            Ok(Built::KeepPrevious) => {
                let entries = self.store.current().len();
                self.state.record_success(entries, 0);
                info!(entries, "catalog is empty, keeping the current snapshot");
                self.notify(RefreshEvent::Published {
                    entries,
                    skipped: 0,
                });
                RefreshOutcome::Succeeded {
                    entries,
                    skipped: 0,
                }
            }
            Err(e) => {
                error!(code = e.status_code(), "refresh failed: {e}");
                let reason = e.to_string();
                self.state.record_failure(reason.clone());
                self.notify(RefreshEvent::Failed {
                    reason: reason.clone(),
                });
                RefreshOutcome::Failed { reason }
            }
        }
    }

    async fn build_with_timeout(&self) -> Result<Built, RefreshError> {
        let catalog = Arc::clone(&self.catalog);
        let encoder = Arc::clone(&self.encoder);
        let policy = self.empty_catalog;

        let task =
            spawn_blocking(move || build_snapshot(catalog.as_ref(), encoder.as_ref(), policy));

        // On timeout the blocking task is abandoned; its result is dropped
        // unpublished whenever it eventually finishes.
        match timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(RefreshError::TaskFailed {
                reason: join_error.to_string(),
            }),
            Err(_) => Err(RefreshError::TimedOut {
                after: self.timeout,
            }),
        }
    }

    async fn persist_current(&self) {
        let Some(persistence) = self.persistence.clone() else {
            return;
        };
        let snapshot = self.store.current();

        let task = spawn_blocking(move || persistence.save(&snapshot));
        match timeout(self.timeout, task).await {
            Ok(Ok(Ok(metadata))) => debug!(entries = metadata.entry_count, "snapshot persisted"),
            Ok(Ok(Err(e))) => warn!("Failed to persist snapshot: {e}"),
            Ok(Err(e)) => warn!("Snapshot persistence task failed: {e}"),
            Err(_) => warn!(after = ?self.timeout, "snapshot persistence timed out"),
        }
    }

    fn notify(&self, event: RefreshEvent) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.send(event);
        }
    }
}

/// Encode every record, isolating failures to the record that caused them.
///
/// Outcomes are in record order. A repeated id is skipped once an earlier
/// copy has encoded; a copy that failed to encode does not claim the id.
pub fn encode_records(encoder: &dyn Encoder, records: &[EventRecord]) -> Vec<EncodeOutcome> {
    let documents: Vec<String> = records.iter().map(EventRecord::document_text).collect();
    let texts: Vec<&str> = documents.iter().map(String::as_str).collect();

    let mut seen = HashSet::with_capacity(records.len());
    records
        .iter()
        .zip(encoder.encode_each(&texts))
        .map(|(record, result)| match result {
            Ok(_) if seen.contains(record.id.as_str()) => EncodeOutcome::Skipped {
                id: record.id.clone(),
                reason: "duplicate id".to_string(),
            },
            Ok(vector) => {
                seen.insert(record.id.as_str());
                EncodeOutcome::Encoded(EmbeddingEntry::new(vector, EventMetadata::from(record)))
            }
            Err(e) => EncodeOutcome::Skipped {
                id: record.id.clone(),
                reason: e.to_string(),
            },
        })
        .collect()
}

fn build_snapshot(
    catalog: &dyn CatalogSource,
    encoder: &dyn Encoder,
    policy: EmptyCatalogPolicy,
) -> Result<Built, RefreshError> {
    let mut records = catalog.list_all_events()?;
    debug!(catalog = catalog.name(), count = records.len(), "pulled catalog");

    if records.is_empty() {
        match policy {
            EmptyCatalogPolicy::Fallback => {
                warn!("catalog returned no events, indexing the sample events instead");
                records = SampleCatalog::events()?;
            }
            EmptyCatalogPolicy::PublishEmpty => {
                info!("catalog returned no events, publishing an empty snapshot");
            }
            EmptyCatalogPolicy::KeepPrevious => return Ok(Built::KeepPrevious),
        }
    }

    let mut entries = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for outcome in encode_records(encoder, &records) {
        match outcome {
            EncodeOutcome::Encoded(entry) => entries.push(entry),
            EncodeOutcome::Skipped { id, reason } => {
                warn!(event_id = %id, %reason, "skipping record");
                skipped += 1;
            }
        }
    }

    let snapshot = IndexSnapshot::build(entries, encoder.dimension(), encoder.model_id())
        .map_err(RefreshError::Build)?;
    Ok(Built::Snapshot { snapshot, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEncoder;
    use crate::error::{CatalogError, CatalogResult, EncoderError, EncoderResult};
    use crate::vector::VectorDimension;
    use parking_lot::Mutex;

    struct VecCatalog(Mutex<CatalogResult<Vec<EventRecord>>>);

    impl VecCatalog {
        fn new(records: Vec<EventRecord>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(Ok(records))))
        }

        fn set(&self, next: CatalogResult<Vec<EventRecord>>) {
            *self.0.lock() = next;
        }
    }

    impl CatalogSource for VecCatalog {
        fn list_all_events(&self) -> CatalogResult<Vec<EventRecord>> {
            self.0.lock().clone()
        }

        fn name(&self) -> &str {
            "vec"
        }
    }

    /// Refuses any text mentioning "unencodable".
    struct RefusingEncoder(HashEncoder);

    impl Encoder for RefusingEncoder {
        fn generate_embeddings(&self, texts: &[&str]) -> EncoderResult<Vec<Vec<f32>>> {
            if texts.iter().any(|t| t.contains("unencodable")) {
                return Err(EncoderError::ModelUnavailable {
                    reason: "refused".to_string(),
                });
            }
            self.0.generate_embeddings(texts)
        }

        fn dimension(&self) -> VectorDimension {
            self.0.dimension()
        }

        fn model_id(&self) -> &str {
            self.0.model_id()
        }
    }

    fn store() -> Arc<SnapshotStore> {
        let encoder = HashEncoder::default();
        Arc::new(SnapshotStore::new(IndexSnapshot::empty(
            encoder.dimension(),
            encoder.model_id(),
        )))
    }

    fn records(ids: &[&str]) -> Vec<EventRecord> {
        ids.iter()
            .map(|id| EventRecord::new(*id, format!("Gathering number {id}")))
            .collect()
    }

    #[test]
    fn test_encode_records_skips_failures_and_duplicates() {
        let encoder = RefusingEncoder(HashEncoder::default());
        let mut input = records(&["a", "b"]);
        input.push(EventRecord::new("c", "unencodable title"));
        input.push(EventRecord::new("a", "Second copy of a"));

        let outcomes = encode_records(&encoder, &input);
        assert_eq!(outcomes.len(), 4);
        assert!(matches!(&outcomes[0], EncodeOutcome::Encoded(e) if e.id() == "a"));
        assert!(matches!(&outcomes[1], EncodeOutcome::Encoded(e) if e.id() == "b"));
        assert!(matches!(&outcomes[2], EncodeOutcome::Skipped { id, .. } if id == "c"));
        assert!(
            matches!(&outcomes[3], EncodeOutcome::Skipped { id, reason } if id == "a" && reason == "duplicate id")
        );
    }

    #[test]
    fn test_failed_copy_does_not_claim_id() {
        let encoder = RefusingEncoder(HashEncoder::default());
        let input = vec![
            EventRecord::new("a", "unencodable first copy"),
            EventRecord::new("a", "Readable second copy"),
            EventRecord::new("a", "Third copy"),
        ];

        let outcomes = encode_records(&encoder, &input);
        assert!(matches!(&outcomes[0], EncodeOutcome::Skipped { id, .. } if id == "a"));
        assert!(
            matches!(&outcomes[1], EncodeOutcome::Encoded(e) if e.metadata.title == "Readable second copy")
        );
        assert!(
            matches!(&outcomes[2], EncodeOutcome::Skipped { reason, .. } if reason == "duplicate id")
        );
    }

    #[tokio::test]
    async fn test_refresh_publishes_and_records_success() {
        let catalog = VecCatalog::new(records(&["1", "2", "3"]));
        let store = store();
        let controller =
            RefreshController::new(catalog, Arc::new(HashEncoder::default()), Arc::clone(&store));

        let outcome = controller.manual_refresh().await;
        assert_eq!(
            outcome,
            RefreshOutcome::Succeeded {
                entries: 3,
                skipped: 0
            }
        );
        assert_eq!(store.current().len(), 3);

        let status = controller.status();
        assert!(!status.running);
        assert!(status.last_success.is_some());
        assert_eq!(status.last_entry_count, 3);
    }

    #[tokio::test]
    async fn test_unreachable_catalog_keeps_snapshot() {
        let catalog = VecCatalog::new(records(&["1", "2"]));
        let store = store();
        let controller = RefreshController::new(
            Arc::clone(&catalog) as Arc<dyn CatalogSource>,
            Arc::new(HashEncoder::default()),
            Arc::clone(&store),
        );
        assert!(controller.manual_refresh().await.is_success());
        let before = store.current();

        catalog.set(Err(CatalogError::Unreachable {
            source_name: "vec".to_string(),
            reason: "connection reset".to_string(),
        }));
        let outcome = controller.scheduled_refresh().await;

        assert!(matches!(outcome, RefreshOutcome::Failed { ref reason } if reason.contains("connection reset")));
        assert!(Arc::ptr_eq(&before, &store.current()));
        let status = controller.status();
        assert!(status.last_error.is_some());
        assert!(status.last_success.is_some());
        assert!(!status.running);
    }

    #[tokio::test]
    async fn test_empty_catalog_policies() {
        let encoder: Arc<dyn Encoder> = Arc::new(HashEncoder::default());

        let fallback = RefreshController::new(VecCatalog::new(Vec::new()), Arc::clone(&encoder), store());
        assert_eq!(
            fallback.manual_refresh().await,
            RefreshOutcome::Succeeded {
                entries: 10,
                skipped: 0
            }
        );

        let empty = RefreshController::new(VecCatalog::new(Vec::new()), Arc::clone(&encoder), store())
            .with_empty_catalog_policy(EmptyCatalogPolicy::PublishEmpty);
        assert!(empty.manual_refresh().await.is_success());
        assert!(empty.store().current().is_empty());

        let catalog = VecCatalog::new(records(&["x", "y"]));
        let keep = RefreshController::new(
            Arc::clone(&catalog) as Arc<dyn CatalogSource>,
            Arc::clone(&encoder),
            store(),
        )
        .with_empty_catalog_policy(EmptyCatalogPolicy::KeepPrevious);
        keep.manual_refresh().await;
        catalog.set(Ok(Vec::new()));
        assert!(keep.manual_refresh().await.is_success());
        assert_eq!(keep.store().current().len(), 2);
    }

    #[tokio::test]
    async fn test_persist_and_warm_start() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let persistence = SnapshotPersistence::new(temp_dir.path().join("index"));
        let encoder: Arc<dyn Encoder> = Arc::new(HashEncoder::default());

        let controller = RefreshController::new(
            VecCatalog::new(records(&["1", "2", "3", "4"])),
            Arc::clone(&encoder),
            store(),
        )
        .with_persistence(persistence.clone());
        assert!(controller.manual_refresh().await.is_success());
        assert!(persistence.exists());

        let restarted = RefreshController::new(VecCatalog::new(Vec::new()), encoder, store())
            .with_persistence(persistence.clone());
        assert!(restarted.warm_start());
        assert_eq!(restarted.store().current().len(), 4);
        assert!(restarted.status().last_success.is_some());

        // Snapshot from a different encoder is ignored
        let other = RefreshController::new(
            VecCatalog::new(Vec::new()),
            Arc::new(HashEncoder::new(VectorDimension::new(64).unwrap())),
            store(),
        )
        .with_persistence(persistence);
        assert!(!other.warm_start());
    }

    #[test]
    fn test_outcome_display_and_json() {
        assert_eq!(
            RefreshOutcome::AlreadyRunning.to_string(),
            "refresh already in progress"
        );
        let json = serde_json::to_value(RefreshOutcome::Succeeded {
            entries: 2,
            skipped: 1,
        })
        .unwrap();
        assert_eq!(json["status"], "succeeded");
        assert_eq!(json["entries"], 2);
    }
}
