//! Timer that drives scheduled refreshes.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::RefreshController;
use crate::config::RefreshConfig;

/// Calls [`RefreshController::scheduled_refresh`] on a fixed interval until
/// cancelled.
pub struct RefreshScheduler {
    controller: Arc<RefreshController>,
    interval: Duration,
    refresh_on_start: bool,
}

impl RefreshScheduler {
    pub fn new(controller: Arc<RefreshController>, interval: Duration) -> Self {
        Self {
            controller,
            interval,
            refresh_on_start: true,
        }
    }

    pub fn from_config(controller: Arc<RefreshController>, config: &RefreshConfig) -> Self {
        Self::new(controller, config.interval()).with_refresh_on_start(config.refresh_on_start)
    }

    pub fn with_refresh_on_start(mut self, refresh_on_start: bool) -> Self {
        self.refresh_on_start = refresh_on_start;
        self
    }

    /// Run on the current task until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        // A refresh that overruns its slot should not cause a burst of catch-up runs
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        if !self.refresh_on_start {
            // The first tick completes immediately
            ticker.tick().await;
        }

        info!(
            "Starting refresh scheduler with {} second interval",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("refresh scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let outcome = self.controller.scheduled_refresh().await;
                    debug!(%outcome, "scheduled refresh finished");
                }
            }
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSource, EventRecord};
    use crate::embedding::{Encoder, HashEncoder};
    use crate::error::CatalogResult;
    use crate::vector::{IndexSnapshot, SnapshotStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCatalog {
        pulls: AtomicUsize,
    }

    impl CatalogSource for CountingCatalog {
        fn list_all_events(&self) -> CatalogResult<Vec<EventRecord>> {
            let n = self.pulls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![EventRecord::new(format!("e{n}"), "Rooftop cinema")])
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn controller(catalog: Arc<CountingCatalog>) -> Arc<RefreshController> {
        let encoder = HashEncoder::default();
        let store = Arc::new(SnapshotStore::new(IndexSnapshot::empty(
            encoder.dimension(),
            encoder.model_id(),
        )));
        Arc::new(RefreshController::new(catalog, Arc::new(encoder), store))
    }

    #[tokio::test]
    async fn test_scheduler_ticks_until_cancelled() {
        let catalog = Arc::new(CountingCatalog::default());
        let controller = controller(Arc::clone(&catalog));
        let cancel = CancellationToken::new();

        let handle = RefreshScheduler::new(Arc::clone(&controller), Duration::from_millis(40))
            .spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
        handle.await.unwrap();

        let pulls = catalog.pulls.load(Ordering::SeqCst);
        assert!(pulls >= 2, "expected repeated refreshes, got {pulls}");
        assert!(controller.status().last_success.is_some());

        // Nothing runs after cancellation
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(catalog.pulls.load(Ordering::SeqCst), pulls);
    }

    #[tokio::test]
    async fn test_no_refresh_on_start() {
        let catalog = Arc::new(CountingCatalog::default());
        let cancel = CancellationToken::new();

        let handle = RefreshScheduler::new(controller(Arc::clone(&catalog)), Duration::from_secs(60))
            .with_refresh_on_start(false)
            .spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(catalog.pulls.load(Ordering::SeqCst), 0);
    }
}
