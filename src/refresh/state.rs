//! Process-wide refresh status with a single-flight guard.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Point-in-time view of the refresh lifecycle, for health and status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStatus {
    pub running: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Entries in the snapshot published by the last successful refresh
    pub last_entry_count: usize,
    /// Records skipped during the last successful refresh
    pub last_skipped: usize,
}

#[derive(Debug, Default)]
struct History {
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_entry_count: usize,
    last_skipped: usize,
}

/// Owned by the refresh controller. `running` is the single-flight marker;
/// everything else is bookkeeping updated when a run ends.
#[derive(Debug, Default)]
pub struct RefreshState {
    running: AtomicBool,
    history: Mutex<History>,
}

/// Marks a refresh as running until dropped.
///
/// Dropping is the only way back to idle, so a run that errors, times out
/// or panics still releases the marker.
#[derive(Debug)]
#[must_use = "the refresh is marked idle as soon as the guard is dropped"]
pub struct RunningGuard<'a> {
    state: &'a RefreshState,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::Release);
    }
}

impl RefreshState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the running marker. Returns `None` if a refresh already holds it.
    pub fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard { state: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn record_success(&self, entries: usize, skipped: usize) {
        let mut history = self.history.lock();
        history.last_success = Some(Utc::now());
        history.last_error = None;
        history.last_entry_count = entries;
        history.last_skipped = skipped;
    }

    /// Keeps `last_success` so health still reports the snapshot being served.
    pub fn record_failure(&self, reason: impl Into<String>) {
        self.history.lock().last_error = Some(reason.into());
    }

    /// Seed history from a snapshot loaded at startup.
    pub fn record_warm_start(&self, built_at: DateTime<Utc>, entries: usize) {
        let mut history = self.history.lock();
        history.last_success = Some(built_at);
        history.last_entry_count = entries;
    }

    pub fn status(&self) -> RefreshStatus {
        let history = self.history.lock();
        RefreshStatus {
            running: self.is_running(),
            last_success: history.last_success,
            last_error: history.last_error.clone(),
            last_entry_count: history.last_entry_count,
            last_skipped: history.last_skipped,
        }
    }
}
