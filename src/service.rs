//! The operations exposed to request-handling collaborators.
//!
//! [`EventSearchService`] wires a catalog, an encoder, the snapshot store,
//! the refresh controller and the query engine together, and exposes
//! `search`, `manual_refresh`, `get_all` and `health`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::catalog::{CatalogSource, create_catalog};
use crate::config::{RefreshConfig, Settings};
use crate::embedding::{Encoder, create_encoder};
use crate::error::{SearchError, StartupError};
use crate::refresh::{
    RefreshBroadcaster, RefreshController, RefreshEvent, RefreshOutcome, RefreshScheduler,
    RefreshStatus,
};
use crate::search::{QueryEngine, SearchHit};
use crate::vector::{EventMetadata, IndexSnapshot, SnapshotPersistence, SnapshotStore};

/// Answer to `health()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// A snapshot has been published since startup (or loaded from disk)
    pub index_ready: bool,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Answer to `get_all()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<EventMetadata>,
    /// Entries in the snapshot, regardless of `limit`
    pub total: usize,
}

pub struct EventSearchService {
    controller: Arc<RefreshController>,
    engine: QueryEngine,
    broadcaster: RefreshBroadcaster,
    refresh: RefreshConfig,
}

impl EventSearchService {
    /// Build every component from configuration.
    ///
    /// # Errors
    /// Invalid settings, an encoder that cannot load, or a catalog that
    /// cannot be constructed.
    pub fn from_settings(settings: &Settings) -> Result<Self, StartupError> {
        settings.validate().map_err(StartupError::Config)?;
        let encoder = create_encoder(&settings.embedding)?;
        let catalog = create_catalog(&settings.catalog)?;
        Self::with_components(settings, catalog, encoder)
    }

    /// Build around caller-supplied catalog and encoder.
    ///
    /// A persisted snapshot from the same encoder is published immediately
    /// when persistence is enabled.
    pub fn with_components(
        settings: &Settings,
        catalog: Arc<dyn CatalogSource>,
        encoder: Arc<dyn Encoder>,
    ) -> Result<Self, StartupError> {
        let store = Arc::new(SnapshotStore::new(IndexSnapshot::empty(
            encoder.dimension(),
            encoder.model_id(),
        )));
        let broadcaster = RefreshBroadcaster::default();

        let mut controller =
            RefreshController::new(catalog, Arc::clone(&encoder), Arc::clone(&store))
                .with_config(&settings.refresh)
                .with_broadcaster(broadcaster.clone());
        if settings.index.persist {
            controller =
                controller.with_persistence(SnapshotPersistence::new(&settings.index.path));
        }
        let controller = Arc::new(controller);
        controller.warm_start();

        let engine = QueryEngine::new(encoder, store).with_config(&settings.search)?;

        Ok(Self {
            controller,
            engine,
            broadcaster,
            refresh: settings.refresh.clone(),
        })
    }

    /// Ranked events for `query`, scoped to global events and those owned
    /// by `user_id`. Never triggers a refresh.
    pub fn search(
        &self,
        query: &str,
        user_id: Option<&str>,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.engine.search(query, user_id)
    }

    /// Rebuild now. Returns `AlreadyRunning` instead of waiting when a
    /// refresh is in flight.
    pub async fn manual_refresh(&self) -> RefreshOutcome {
        self.controller.manual_refresh().await
    }

    /// The callable a scheduling facility invokes on its interval.
    pub async fn scheduled_refresh(&self) -> RefreshOutcome {
        self.controller.scheduled_refresh().await
    }

    /// Metadata of the served snapshot in stable catalog order.
    pub fn get_all(&self, limit: Option<usize>) -> EventPage {
        let snapshot = self.controller.store().current();
        let events = snapshot
            .entries()
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|entry| entry.metadata.clone())
            .collect();
        EventPage {
            events,
            total: snapshot.len(),
        }
    }

    pub fn health(&self) -> Health {
        let status = self.controller.status();
        Health {
            index_ready: status.last_success.is_some(),
            last_refresh: status.last_success,
        }
    }

    pub fn status(&self) -> RefreshStatus {
        self.controller.status()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.broadcaster.subscribe()
    }

    /// Start the background refresh timer. It stops when `cancel` fires.
    pub fn start_scheduler(&self, cancel: CancellationToken) -> JoinHandle<()> {
        info!(
            interval_secs = self.refresh.interval_secs,
            refresh_on_start = self.refresh.refresh_on_start,
            "starting refresh scheduler"
        );
        RefreshScheduler::from_config(Arc::clone(&self.controller), &self.refresh).spawn(cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SampleCatalog;
    use crate::config::EmbeddingBackend;
    use crate::embedding::HashEncoder;
    use tempfile::TempDir;

    fn settings(temp_dir: &TempDir) -> Settings {
        let mut settings = Settings::default();
        settings.embedding.backend = EmbeddingBackend::Hash;
        settings.index.path = temp_dir.path().join("index");
        settings
    }

    #[tokio::test]
    async fn test_cold_service_is_not_ready() {
        let temp_dir = TempDir::new().unwrap();
        let service = EventSearchService::from_settings(&settings(&temp_dir)).unwrap();

        assert_eq!(
            service.health(),
            Health {
                index_ready: false,
                last_refresh: None
            }
        );
        assert!(service.search("jazz", None).unwrap().is_empty());
        assert_eq!(service.get_all(None).total, 0);
    }

    #[tokio::test]
    async fn test_refresh_then_query() {
        let temp_dir = TempDir::new().unwrap();
        let service = EventSearchService::from_settings(&settings(&temp_dir)).unwrap();

        assert!(service.manual_refresh().await.is_success());

        let health = service.health();
        assert!(health.index_ready);
        assert!(health.last_refresh.is_some());

        let page = service.get_all(Some(3));
        assert_eq!(page.total, 10);
        assert_eq!(page.events.len(), 3);
        // Stable catalog order is id order
        assert_eq!(page.events[0].id, "1");
        assert_eq!(page.events[1].id, "10");

        let hits = service.search("marathon charity running", None).unwrap();
        assert_eq!(hits[0].event.id, "4");
    }

    #[tokio::test]
    async fn test_restart_warm_starts_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(&temp_dir);

        let first = EventSearchService::with_components(
            &settings,
            Arc::new(SampleCatalog),
            Arc::new(HashEncoder::default()),
        )
        .unwrap();
        first.manual_refresh().await;
        drop(first);

        let second = EventSearchService::with_components(
            &settings,
            Arc::new(SampleCatalog),
            Arc::new(HashEncoder::default()),
        )
        .unwrap();
        assert!(second.health().index_ready);
        assert_eq!(second.get_all(None).total, 10);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = settings(&temp_dir);
        settings.search.top_k = 0;

        let err = EventSearchService::from_settings(&settings).err().unwrap();
        assert_eq!(err.status_code(), "CONFIG_INVALID");
    }

    #[tokio::test]
    async fn test_subscribe_sees_refresh() {
        let temp_dir = TempDir::new().unwrap();
        let service = EventSearchService::from_settings(&settings(&temp_dir)).unwrap();
        let mut events = service.subscribe();

        service.manual_refresh().await;

        assert_eq!(events.recv().await.unwrap(), RefreshEvent::Started);
        assert!(matches!(
            events.recv().await.unwrap(),
            RefreshEvent::Published { entries: 10, .. }
        ));
    }
}
